pub mod auth;

pub use auth::{authenticate, AdminUser, CurrentUser};
