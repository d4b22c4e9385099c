pub use sea_orm_migration::prelude::*;

mod m20260201_000001_create_members_table;
mod m20260201_000002_create_orders_table;
mod m20260215_000003_create_campaigns_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260201_000001_create_members_table::Migration),
            Box::new(m20260201_000002_create_orders_table::Migration),
            Box::new(m20260215_000003_create_campaigns_table::Migration),
        ]
    }
}
