//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested
//! sections use `__` as the separator, e.g. `SESSION__TTL_HOURS`.

use chrono::Duration as ChronoDuration;
use linkgate_core::Result;
use linkgate_link_token::DEFAULT_VALIDITY_WINDOW_MS;
use linkgate_session::{DEFAULT_SESSION_TTL_HOURS, SessionError, SessionPolicy};

use crate::auth::line::LINE_VERIFY_URL;
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Shared secret for signing and verifying link tokens.
    pub link_secret: String,

    /// Base URL of the frontend; redirects land here.
    #[serde(default = "default_frontend_url")]
    pub frontend_url: String,

    /// Public base URL of this API, used when printing links.
    #[serde(default = "default_public_api_url")]
    pub public_api_url: String,

    /// Socket address to listen on.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// LINE Login channel the LIFF app belongs to. LIFF sign-in is
    /// disabled when unset.
    #[serde(default)]
    pub line_channel_id: Option<String>,

    /// ID-token verification endpoint.
    #[serde(default = "default_line_verify_url")]
    pub line_verify_url: String,

    /// PostgreSQL connection URL. Sessions stay in memory when unset.
    #[serde(default)]
    pub database_url: Option<String>,

    /// Connection pool configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
}

/// Connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Idle connections are closed after this many milliseconds.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Requests fail with a timeout if no connection frees up in time.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

/// Session-related configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session lifetime in hours.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,

    /// Interval between expired-session sweeps, in seconds.
    #[serde(default = "default_sweep_interval_seconds")]
    pub sweep_interval_seconds: u64,

    /// Whether each verification is appended to the session's access log.
    #[serde(default = "default_record_access_log")]
    pub record_access_log: bool,

    /// Maximum age of a link token, in seconds.
    #[serde(default = "default_link_window_seconds")]
    pub link_window_seconds: i64,

    /// Whether to set the Secure flag on cookies (requires HTTPS).
    /// Set to false for local HTTP development.
    #[serde(default = "default_secure_cookies")]
    pub secure_cookies: bool,
}

fn default_frontend_url() -> String {
    "http://localhost:5173".to_string()
}

fn default_public_api_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_line_verify_url() -> String {
    LINE_VERIFY_URL.to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_idle_timeout_ms() -> u64 {
    10_000
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

fn default_ttl_hours() -> i64 {
    DEFAULT_SESSION_TTL_HOURS
}

fn default_sweep_interval_seconds() -> u64 {
    3600
}

fn default_record_access_log() -> bool {
    true
}

fn default_link_window_seconds() -> i64 {
    DEFAULT_VALIDITY_WINDOW_MS / 1000
}

fn default_secure_cookies() -> bool {
    true
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            idle_timeout_ms: default_idle_timeout_ms(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
        }
    }
}

impl DatabaseConfig {
    #[must_use]
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    #[must_use]
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            sweep_interval_seconds: default_sweep_interval_seconds(),
            record_access_log: default_record_access_log(),
            link_window_seconds: default_link_window_seconds(),
            secure_cookies: default_secure_cookies(),
        }
    }
}

impl SessionConfig {
    /// Builds the session policy.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPolicy` if the TTL is not positive or too long.
    pub fn policy(&self) -> Result<SessionPolicy, SessionError> {
        let ttl = ChronoDuration::try_hours(self.ttl_hours).ok_or_else(|| {
            SessionError::InvalidPolicy {
                reason: format!("session TTL of {}h is out of range", self.ttl_hours),
            }
        })?;
        Ok(SessionPolicy::new(ttl)?.with_access_log(self.record_access_log))
    }

    /// Returns the link-token validity window.
    #[must_use]
    pub fn link_window(&self) -> ChronoDuration {
        ChronoDuration::seconds(self.link_window_seconds)
    }

    /// Returns the sweep period.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> std::result::Result<Self, config::ConfigError> {
        Self::load(None)
    }

    /// Loads configuration from `vars` instead of the process environment.
    ///
    /// Keys use the same names as the environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_vars(
        vars: config::Map<String, String>,
    ) -> std::result::Result<Self, config::ConfigError> {
        Self::load(Some(vars))
    }

    fn load(
        source: Option<config::Map<String, String>>,
    ) -> std::result::Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true)
                    .source(source),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> config::Map<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn session_config_has_correct_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.ttl_hours, 24);
        assert_eq!(config.sweep_interval_seconds, 3600);
        assert!(config.record_access_log);
        assert_eq!(config.link_window(), ChronoDuration::minutes(5));
    }

    #[test]
    fn database_config_has_correct_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
        assert_eq!(config.acquire_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn loads_minimal_environment() {
        let config = ServerConfig::from_vars(vars(&[("LINK_SECRET", "s3cret")])).expect("config");
        assert_eq!(config.link_secret, "s3cret");
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert!(config.database_url.is_none());
        assert!(config.line_channel_id.is_none());
        assert_eq!(config.line_verify_url, LINE_VERIFY_URL);
        assert_eq!(config.session.ttl_hours, 24);
    }

    #[test]
    fn loads_nested_sections() {
        let config = ServerConfig::from_vars(vars(&[
            ("LINK_SECRET", "s3cret"),
            ("FRONTEND_URL", "https://app.example.com"),
            ("DATABASE_URL", "postgres://localhost/linkgate"),
            ("DATABASE__MAX_CONNECTIONS", "20"),
            ("LINE_CHANNEL_ID", "channel-1234"),
            ("SESSION__TTL_HOURS", "12"),
            ("SESSION__RECORD_ACCESS_LOG", "false"),
        ]))
        .expect("config");

        assert_eq!(config.frontend_url, "https://app.example.com");
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/linkgate")
        );
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.line_channel_id.as_deref(), Some("channel-1234"));
        let policy = config.session.policy().expect("policy");
        assert_eq!(policy.ttl(), ChronoDuration::hours(12));
        assert!(!policy.record_access_log());
    }

    #[test]
    fn missing_secret_is_an_error() {
        assert!(ServerConfig::from_vars(vars(&[("BIND_ADDR", "127.0.0.1:8080")])).is_err());
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        let config = SessionConfig {
            ttl_hours: 0,
            ..SessionConfig::default()
        };
        assert!(config.policy().is_err());
    }

    #[test]
    fn oversized_ttl_is_rejected_at_load() {
        let config = ServerConfig::from_vars(vars(&[
            ("LINK_SECRET", "s3cret"),
            ("SESSION__TTL_HOURS", "10000000000"),
        ]))
        .expect("config");
        assert!(config.session.policy().is_err());

        let config = SessionConfig {
            ttl_hours: i64::MAX,
            ..SessionConfig::default()
        };
        assert!(config.policy().is_err());
    }
}
