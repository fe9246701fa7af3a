//! JWT token generation and validation
//!
//! HS256 tokens with `sub` (username) and `exp` claims, carried either in an
//! HttpOnly `access_token` cookie or an `Authorization: Bearer` header.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::types::WaypointError;

/// Cookie name the session token travels in
pub const TOKEN_COOKIE: &str = "access_token";

/// Claims carried in a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to
    pub sub: String,
    /// Expiry as unix seconds
    pub exp: u64,
    /// Issued-at as unix seconds
    pub iat: u64,
}

/// Issues and validates session tokens
#[derive(Clone)]
pub struct JwtValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expiry_seconds: u64,
}

impl JwtValidator {
    pub fn new(secret: &str, expiry_seconds: u64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expiry_seconds,
        }
    }

    /// Issue a token for the given username
    pub fn create_token(&self, username: &str) -> Result<String, WaypointError> {
        let now = unix_now();
        let claims = Claims {
            sub: username.to_string(),
            exp: now + self.expiry_seconds,
            iat: now,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| WaypointError::Auth(format!("Failed to sign token: {e}")))
    }

    /// Validate a token and return its claims
    pub fn verify_token(&self, token: &str) -> Result<Claims, WaypointError> {
        decode::<Claims>(token, &self.decoding, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| WaypointError::Auth(format!("Invalid token: {e}")))
    }

    pub fn expiry_seconds(&self) -> u64 {
        self.expiry_seconds
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Extract a bearer token from an Authorization header value
pub fn extract_token_from_header(header: Option<&str>) -> Option<&str> {
    header?.strip_prefix("Bearer ").map(str::trim)
}

/// Extract the session token from a Cookie header value
pub fn extract_token_from_cookie(header: Option<&str>) -> Option<String> {
    for pair in header?.split(';') {
        if let Some((key, value)) = pair.trim().split_once('=') {
            if key == TOKEN_COOKIE {
                return Some(value.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let jwt = JwtValidator::new("test-secret", 3600);
        let token = jwt.create_token("admin").unwrap();

        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, "admin");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let jwt = JwtValidator::new("secret-a", 3600);
        let token = jwt.create_token("admin").unwrap();

        let other = JwtValidator::new("secret-b", 3600);
        assert!(other.verify_token(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // Expiry in the past: exp = iat + 0, and jsonwebtoken's default
        // leeway is 60s, so issue well in the past via a negative offset.
        let jwt = JwtValidator::new("test-secret", 3600);
        let stale = Claims {
            sub: "admin".into(),
            exp: 1,
            iat: 0,
        };
        let token = encode(
            &Header::default(),
            &stale,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap();
        assert!(jwt.verify_token(&token).is_err());
    }

    #[test]
    fn test_extract_from_header() {
        assert_eq!(
            extract_token_from_header(Some("Bearer abc.def.ghi")),
            Some("abc.def.ghi")
        );
        assert_eq!(extract_token_from_header(Some("Basic xyz")), None);
        assert_eq!(extract_token_from_header(None), None);
    }

    #[test]
    fn test_extract_from_cookie() {
        assert_eq!(
            extract_token_from_cookie(Some("theme=dark; access_token=abc.def; lang=en")),
            Some("abc.def".to_string())
        );
        assert_eq!(extract_token_from_cookie(Some("theme=dark")), None);
        assert_eq!(extract_token_from_cookie(None), None);
    }
}
