//! Bearer-token authentication.

pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{CurrentUser, require_auth};
pub use password::PasswordHash;
pub use token::TokenService;
