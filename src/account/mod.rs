//! Auth session and saved search history.

pub mod auth;
pub mod history;

pub use auth::{validate_login, validate_registration, AuthContext, AuthError, AuthSession, FieldErrors};
pub use history::SearchHistory;
