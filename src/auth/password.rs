//! Admin credential verification using Argon2
//!
//! The admin password is configured either as an Argon2id PHC hash
//! (ADMIN_PASSWORD_HASH) or, for development, as plaintext (ADMIN_PASSWORD).

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::config::Args;
use crate::types::WaypointError;

/// Hash a password using Argon2id
///
/// Returns the PHC-formatted hash string that includes the salt and parameters.
pub fn hash_password(password: &str) -> Result<String, WaypointError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| WaypointError::Auth(format!("Failed to hash password: {e}")))
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, hash: &str) -> Result<bool, WaypointError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| WaypointError::Auth(format!("Invalid password hash format: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Check a login attempt against the configured admin credential.
///
/// Prefers the Argon2 hash when configured; the plaintext comparison exists
/// for development setups only.
pub fn verify_admin_login(args: &Args, username: &str, password: &str) -> bool {
    let Some(admin_username) = args.admin_username.as_deref() else {
        return false;
    };
    if username != admin_username {
        return false;
    }

    if let Some(hash) = args.admin_password_hash.as_deref() {
        return verify_password(password, hash).unwrap_or(false);
    }

    match args.admin_password.as_deref() {
        Some(plain) => password == plain,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args_with(username: &str, password: Option<&str>, hash: Option<String>) -> Args {
        let mut args = Args::parse_from(["waypoint"]);
        args.admin_username = Some(username.to_string());
        args.admin_password = password.map(str::to_string);
        args.admin_password_hash = hash;
        args
    }

    #[test]
    fn test_hash_and_verify() {
        let password = "correct-horse-battery-staple";
        let hash = hash_password(password).unwrap();

        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn test_admin_login_with_hash() {
        let hash = hash_password("hunter2").unwrap();
        let args = args_with("admin", None, Some(hash));

        assert!(verify_admin_login(&args, "admin", "hunter2"));
        assert!(!verify_admin_login(&args, "admin", "wrong"));
        assert!(!verify_admin_login(&args, "someone-else", "hunter2"));
    }

    #[test]
    fn test_admin_login_plaintext_fallback() {
        let args = args_with("admin", Some("hunter2"), None);

        assert!(verify_admin_login(&args, "admin", "hunter2"));
        assert!(!verify_admin_login(&args, "admin", "wrong"));
    }

    #[test]
    fn test_admin_login_without_credentials_configured() {
        let mut args = Args::parse_from(["waypoint"]);
        args.admin_username = None;
        assert!(!verify_admin_login(&args, "admin", "anything"));
    }
}
