// src/config.rs

//! Application configuration loaded from environment variables.
//!
//! This module defines all startup-time configuration for the service.
//! Configuration is validated eagerly and failures are treated as
//! deployment errors rather than recoverable runtime conditions.

use anyhow::Result;
use std::time::Duration;

// ============================================================
// Local macros (config-only, intentionally explicit)
// ============================================================

/// Reads a required environment variable.
///
/// # Behavior
/// - Fails fast if the variable is missing
/// - Produces a clear, human-readable error message
/// - Intended for startup-time configuration validation
///
/// Missing configuration is treated as a deployment error,
/// not a recoverable runtime condition.
macro_rules! required_env {
    // ---
    ($key:literal) => {
        std::env::var($key)
            .map_err(|_| anyhow::anyhow!(concat!("Missing required configuration: ", $key)))?
    };
}

/// Reads an optional environment variable and attempts to parse it.
///
/// If the variable is missing or cannot be parsed, the provided
/// default value is used. This macro is appropriate for non-critical
/// tuning parameters where fallback behavior is acceptable.
macro_rules! optional_env_parse {
    // ---
    ($key:literal, $ty:ty, $default:expr) => {
        std::env::var($key)
            .ok()
            .and_then(|v| v.parse::<$ty>().ok())
            .unwrap_or($default)
    };
}

#[cfg(test)]
/// Asserts that a configuration constructor fails due to a missing
/// required environment variable.
///
/// This macro is intended for config unit tests only and enforces
/// consistent error messages across failure cases.
macro_rules! assert_missing_config {
    // ---
    ($expr:expr, $key:literal) => {{
        let err = $expr.expect_err("expected configuration error");
        assert!(
            err.to_string()
                .contains(concat!("Missing required configuration: ", $key)),
            "unexpected error: {err}"
        );
    }};
}

// ============================================================
// Public configuration facade
// ============================================================

/// Aggregated application configuration.
///
/// This is the single source of truth for startup configuration.
/// All required configuration is validated eagerly during initialization.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: database::DatabaseConfig,
    pub redis: redis::RedisConfig,
    pub auth: auth::AuthConfig,
    pub attendance: attendance::AttendanceConfig,
    pub rate_limit: rate_limit::RateLimitConfig,
}

impl AppConfig {
    /// Loads and validates all application configuration from the environment.
    ///
    /// # Errors
    /// Returns an error if any required configuration is missing or invalid.
    /// This function is intended to be called exactly once at startup.
    pub fn from_env() -> Result<Self> {
        // ---
        Ok(Self {
            database: database::DatabaseConfig::from_env()?,
            redis: redis::RedisConfig::from_env()?,
            auth: auth::AuthConfig::from_env()?,
            attendance: attendance::AttendanceConfig::from_env()?,
            rate_limit: rate_limit::RateLimitConfig::from_env()?,
        })
    }
}

// ============================================================
// Database configuration
// ============================================================

mod database {
    // ---
    use super::*;

    /// Database-related configuration derived from environment variables.
    ///
    /// This configuration is required for the service to function and
    /// is validated eagerly during startup.
    #[derive(Debug, Clone)]
    pub struct DatabaseConfig {
        /// PostgreSQL connection string.
        pub database_url: String,

        /// Number of retry attempts when initializing the database schema. Defaults to 50.
        pub retry_count: u32,

        /// Maximum time to wait when acquiring a connection from the pool. Defaults to 30 seconds.
        pub acquire_timeout: Duration,

        /// Minimum number of connections to keep in the pool, even when idle. Defaults to 2.
        pub min_connections: u32,

        /// Maximum number of connections to be open concurrently. Defaults to 15.
        pub max_connections: u32,
    }

    impl DatabaseConfig {
        /// Builds a [`DatabaseConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        /// Startup will fail fast rather than continuing with incomplete
        /// or invalid configuration.
        pub fn from_env() -> Result<Self> {
            // ---
            let database_url = required_env!("DATABASE_URL");
            let retry_count = optional_env_parse!("ATTEND_DB_RETRY_COUNT", u32, 50);
            let acquire_timeout_secs = optional_env_parse!("ATTEND_DB_ACQUIRE_TIMEOUT_SEC", u64, 30);
            let min_connections = optional_env_parse!("ATTEND_DB_MIN_CONNECTIONS", u32, 2);
            let max_connections = optional_env_parse!("ATTEND_DB_MAX_CONNECTIONS", u32, 15);

            Ok(Self {
                database_url,
                retry_count,
                acquire_timeout: Duration::from_secs(acquire_timeout_secs),
                min_connections,
                max_connections,
            })
        }
    }
}
pub use database::DatabaseConfig;

// ============================================================
// Redis configuration
// ============================================================

mod redis {
    // ---
    use super::*;

    /// Redis-related configuration. Redis holds ephemeral session state
    /// with a bounded time-to-live; durable entities live in Postgres.
    #[derive(Debug, Clone)]
    pub struct RedisConfig {
        /// Redis connection string.
        pub url: String,

        /// Time-to-live for bearer session tokens. Defaults to 7 days.
        pub session_ttl: Duration,
    }

    impl RedisConfig {
        /// Builds a [`RedisConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let url = required_env!("ATTEND_REDIS_URL");

            let ttl_secs = optional_env_parse!("ATTEND_SESSION_TTL_SEC", u64, 604_800);

            Ok(Self {
                url,
                session_ttl: Duration::from_secs(ttl_secs),
            })
        }
    }
}
pub use redis::RedisConfig;

// ============================================================
// Auth configuration
// ============================================================

mod auth {
    // ---
    use super::*;

    /// Authentication and token-signing configuration.
    #[derive(Debug, Clone)]
    pub struct AuthConfig {
        /// Secret used to sign QR session tokens. Security-critical and
        /// must be explicitly provided.
        pub token_secret: String,
    }

    impl AuthConfig {
        /// Builds an [`AuthConfig`] from environment variables.
        ///
        /// # Errors
        /// Returns an error if required configuration is missing.
        pub fn from_env() -> Result<Self> {
            // ---
            let token_secret = required_env!("ATTEND_TOKEN_SECRET");

            Ok(Self { token_secret })
        }
    }
}
pub use auth::AuthConfig;

// ============================================================
// Attendance policy configuration
// ============================================================

mod attendance {
    // ---
    use super::*;

    /// Attendance-marking policy knobs.
    #[derive(Debug, Clone)]
    pub struct AttendanceConfig {
        /// Time-to-live for issued QR session tokens. Defaults to 5 minutes.
        pub qr_ttl: Duration,

        /// Grace period after session start before a mark becomes `late`.
        /// Defaults to 15 minutes.
        pub grace: Duration,

        /// Whether a selfie capture is required when marking attendance.
        /// Defaults to false.
        pub selfie_required: bool,
    }

    impl AttendanceConfig {
        /// Builds an [`AttendanceConfig`] from environment variables.
        pub fn from_env() -> Result<Self> {
            // ---
            let qr_ttl_secs = optional_env_parse!("ATTEND_QR_TTL_SEC", u64, 300);
            let grace_minutes = optional_env_parse!("ATTEND_GRACE_MINUTES", u64, 15);
            let selfie_required = optional_env_parse!("ATTEND_SELFIE_REQUIRED", bool, false);

            Ok(Self {
                qr_ttl: Duration::from_secs(qr_ttl_secs),
                grace: Duration::from_secs(grace_minutes * 60),
                selfie_required,
            })
        }
    }
}
pub use attendance::AttendanceConfig;

// ============================================================
// Rate limiting configuration
// ============================================================

mod rate_limit {
    // ---
    use super::*;

    /// Request-rate limits. Exact limits are a deployment concern, not
    /// part of the API contract.
    #[derive(Debug, Clone)]
    pub struct RateLimitConfig {
        /// Maximum registration/login requests per client per window. Defaults to 10.
        pub auth_max_requests: u32,

        /// Maximum requests per client per window across the API. Defaults to 120.
        pub api_max_requests: u32,

        /// Size of the limiting window. Defaults to 60 seconds.
        pub window: Duration,

        /// Hard cap on tracked client keys, bounding limiter memory. Defaults to 10,000.
        pub max_tracked_clients: usize,
    }

    impl RateLimitConfig {
        /// Builds a [`RateLimitConfig`] from environment variables.
        pub fn from_env() -> Result<Self> {
            // ---
            let auth_max_requests = optional_env_parse!("ATTEND_RATE_AUTH_MAX", u32, 10);
            let api_max_requests = optional_env_parse!("ATTEND_RATE_API_MAX", u32, 120);
            let window_secs = optional_env_parse!("ATTEND_RATE_WINDOW_SEC", u64, 60);
            let max_tracked_clients = optional_env_parse!("ATTEND_RATE_MAX_CLIENTS", usize, 10_000);

            Ok(Self {
                auth_max_requests,
                api_max_requests,
                window: Duration::from_secs(window_secs),
                max_tracked_clients,
            })
        }
    }
}
pub use rate_limit::RateLimitConfig;

// ============================================================
// Tests
// ============================================================
