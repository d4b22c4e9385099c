//! Mock authentication for the admin frontend.
//!
//! This is a stub collaborator, not a credential store: three hard-coded
//! users share one password, tokens are opaque strings kept in process
//! memory, and the menu tree is static. It exists so the single-page admin
//! can log in, render role-dependent navigation and hide buttons.

pub mod directory;
pub mod menus;
pub mod sessions;

pub use directory::{resolve_user, AuthSession};
pub use sessions::SessionStore;

/// Password accepted for every mock user.
pub const MOCK_PASSWORD: &str = "123456";

/// Extracts the token from an `Authorization` header value, with or without
/// a `Bearer ` prefix.
pub fn parse_auth_token(raw: &str) -> Option<&str> {
    let raw = raw.trim();
    let token = match raw.get(..7) {
        Some(prefix) if prefix.eq_ignore_ascii_case("bearer ") => raw[7..].trim(),
        _ => raw,
    };
    (!token.is_empty()).then_some(token)
}
