//! Authentication for Waypoint
//!
//! Provides:
//! - JWT token generation and validation (cookie-based sessions)
//! - Admin credential verification with Argon2

pub mod jwt;
pub mod password;

pub use jwt::{
    extract_token_from_cookie, extract_token_from_header, Claims, JwtValidator,
};
pub use password::{hash_password, verify_admin_login, verify_password};
