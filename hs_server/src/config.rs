//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
};

use hydraulisc::{AdmissionMode, auth::DEFAULT_SESSION_TTL_SECS, db::DatabaseConfig};

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Minimum accepted pepper length
pub const MIN_PEPPER_LEN: usize = 16;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Security configuration
    pub security: SecurityConfig,
    /// Session configuration
    pub session: SessionConfig,
    /// Admission configuration
    pub admission: AdmissionSettings,
    /// Base URL used to build invite links, without trailing slash
    pub public_url: String,
    /// Prometheus listener, disabled when unset
    pub metrics_bind: Option<SocketAddr>,
    /// Keep everything in process memory instead of PostgreSQL
    pub in_memory: bool,
    /// Reverse proxies allowed to report the client address via `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Password hashing pepper (required)
    pub password_pepper: String,
}

/// Session lifetime configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Rolling session lifetime in seconds
    pub ttl_secs: i64,
}

/// Where the admission mode comes from
#[derive(Debug, Clone)]
pub struct AdmissionSettings {
    /// JSON file re-read on SIGHUP
    pub config_path: Option<PathBuf>,
    /// Mode used when no file is configured
    pub mode: AdmissionMode,
}

/// Values given on the command line, taking precedence over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub admission_config: Option<PathBuf>,
    pub in_memory: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_socket_env("SERVER_BIND", DEFAULT_BIND)?,
        };

        let mut database = DatabaseConfig::from_env();
        if let Some(url) = overrides.database_url {
            database.database_url = url;
        }

        // Security configuration (REQUIRED)
        let password_pepper =
            std::env::var("PASSWORD_PEPPER").map_err(|_| ConfigError::MissingRequired {
                var: "PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        let session = SessionConfig {
            ttl_secs: parse_env_or("SESSION_TTL_SECS", DEFAULT_SESSION_TTL_SECS),
        };

        let mode = match std::env::var("ADMISSION_MODE") {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                var: "ADMISSION_MODE".to_string(),
                reason: format!("Unknown mode {raw:?}, expected open, inviteOnly or closed"),
            })?,
            Err(_) => AdmissionMode::Closed,
        };

        let admission = AdmissionSettings {
            config_path: overrides
                .admission_config
                .or_else(|| std::env::var("ADMISSION_CONFIG").ok().map(PathBuf::from)),
            mode,
        };

        let public_url = std::env::var("PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{bind}"))
            .trim_end_matches('/')
            .to_string();

        let metrics_bind = match std::env::var("METRICS_BIND") {
            Ok(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("{raw:?} is not a socket address"),
            })?),
            Err(_) => None,
        };

        let trusted_proxies = parse_ip_list_env("TRUSTED_PROXIES")?;

        Ok(ServerConfig {
            bind,
            database,
            security: SecurityConfig { password_pepper },
            session,
            admission,
            public_url,
            metrics_bind,
            in_memory: overrides.in_memory || parse_env_or("IN_MEMORY", false),
            trusted_proxies,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.password_pepper.len() < MIN_PEPPER_LEN {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: format!("Must be at least {MIN_PEPPER_LEN} characters"),
            });
        }

        if self.session.ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "SESSION_TTL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if !self.public_url.starts_with("http://") && !self.public_url.starts_with("https://") {
            return Err(ConfigError::Invalid {
                var: "PUBLIC_URL".to_string(),
                reason: "Must start with http:// or https://".to_string(),
            });
        }

        if !self.in_memory && self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed DB_MAX_CONNECTIONS ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
    }

    /// Invite link handed out for a code
    pub fn invite_link(public_url: &str, code: &str) -> String {
        format!("{public_url}/register/{code}")
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Helper to parse environment variable with default fallback
fn parse_env_or<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parse a socket address from the environment, rejecting garbage instead of
/// silently falling back
fn parse_socket_env(key: &str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = std::env::var(key).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|_| ConfigError::Invalid {
        var: key.to_string(),
        reason: format!("{raw:?} is not a socket address"),
    })
}

/// Comma-separated IP addresses; unset means none
fn parse_ip_list_env(key: &str) -> Result<Vec<IpAddr>, ConfigError> {
    let Ok(raw) = std::env::var(key) else {
        return Ok(Vec::new());
    };

    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse().map_err(|_| ConfigError::Invalid {
                var: key.to_string(),
                reason: format!("{entry:?} is not an IP address"),
            })
        })
        .collect()
}
