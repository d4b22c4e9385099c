pub mod campaign;
pub mod member;
pub mod order;

pub use campaign::CampaignStatus;
pub use order::OrderStatus;
