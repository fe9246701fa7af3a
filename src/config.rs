//! Configuration for Waypoint
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use uuid::Uuid;

/// Waypoint - internal checklist gateway
#[derive(Parser, Debug, Clone)]
#[command(name = "waypoint")]
#[command(about = "Checklist gateway with a live worker registry and relay")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Enable development mode (relaxed config requirements)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "waypoint")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "SECRET_KEY")]
    pub jwt_secret: Option<String>,

    /// JWT token expiry in seconds
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Admin username accepted at /auth/login
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    /// Argon2 PHC hash of the admin password (preferred)
    #[arg(long, env = "ADMIN_PASSWORD_HASH")]
    pub admin_password_hash: Option<String>,

    /// Plaintext admin password (dev fallback, compared byte-for-byte)
    #[arg(long, env = "ADMIN_PASSWORD")]
    pub admin_password: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret.clone().unwrap_or_default()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("SECRET_KEY is required in production mode".to_string());
            }
            if self.admin_username.is_none() {
                return Err("ADMIN_USERNAME is required in production mode".to_string());
            }
            if self.admin_password_hash.is_none() && self.admin_password.is_none() {
                return Err(
                    "ADMIN_PASSWORD_HASH or ADMIN_PASSWORD is required in production mode"
                        .to_string(),
                );
            }
        }

        if self.jwt_expiry_seconds == 0 {
            return Err("ACCESS_TOKEN_EXPIRE_SECONDS must be greater than zero".to_string());
        }

        Ok(())
    }
}

/// Configuration for the agent-side keepalive loop
#[derive(Parser, Debug, Clone)]
#[command(name = "waypoint-agent")]
#[command(about = "Worker agent that registers with a Waypoint gateway")]
pub struct AgentArgs {
    /// Registration endpoint of the primary gateway
    #[arg(
        long,
        env = "WAYPOINT_URL",
        default_value = "ws://localhost:8000/ws/workers/register"
    )]
    pub waypoint_url: String,

    /// Display name this worker registers under
    #[arg(long, env = "WORKER_NAME", default_value = "Unnamed")]
    pub worker_name: String,

    /// Seconds between liveness pings
    #[arg(long, env = "PING_INTERVAL_SECS", default_value = "30")]
    pub ping_interval_secs: u64,

    /// Seconds to wait before reconnecting after a failure
    #[arg(long, env = "RECONNECT_BACKOFF_SECS", default_value = "5")]
    pub reconnect_backoff_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl AgentArgs {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["waypoint"])
    }

    #[test]
    fn test_dev_mode_allows_missing_secret() {
        let mut args = base_args();
        args.dev_mode = true;
        args.jwt_secret = None;
        assert!(args.validate().is_ok());
        assert_eq!(args.jwt_secret(), "dev-only-insecure-secret");
    }

    #[test]
    fn test_production_requires_secret_and_admin() {
        let mut args = base_args();
        args.dev_mode = false;
        args.jwt_secret = None;
        args.admin_username = None;
        assert!(args.validate().is_err());

        args.jwt_secret = Some("s3cret".into());
        assert!(args.validate().is_err());

        args.admin_username = Some("admin".into());
        args.admin_password = Some("password".into());
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_zero_expiry_rejected() {
        let mut args = base_args();
        args.dev_mode = true;
        args.jwt_expiry_seconds = 0;
        assert!(args.validate().is_err());
    }
}
