//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use blog_core::content::DEFAULT_MAX_UPLOAD_BYTES;
use blog_core::db::DatabaseConfig;
use blog_core::verification::DEFAULT_CODE_LENGTH;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind: SocketAddr,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Redis URL; `None` runs on the in-process store
    pub redis_url: Option<String>,
    /// Security configuration
    pub security: SecurityConfig,
    /// Upload configuration
    pub uploads: UploadConfig,
    /// Characters in an email verification code
    pub verification_code_length: usize,
    /// Prometheus listener, disabled when `None`
    pub metrics_bind: Option<SocketAddr>,
}

/// Security-related configuration
#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// JWT signing secret (required)
    pub jwt_secret: String,
    /// Password hashing pepper (required)
    pub password_pepper: String,
}

#[derive(Debug, Clone)]
pub struct UploadConfig {
    /// Directory blobs are written to and served from under `/img`
    pub dir: PathBuf,
    pub max_bytes: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Arguments
    ///
    /// * `bind_override` - Optional bind address override (from CLI args)
    /// * `database_url_override` - Optional database URL override (from CLI args)
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok(), bind_override, database_url_override)
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => parse_or(&lookup, "SERVER_BIND", SocketAddr::from(([127, 0, 0, 1], 8080)))?,
        };

        // Database configuration
        let defaults = DatabaseConfig::development();
        let database_url = database_url_override
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or(defaults.database_url);

        let database = DatabaseConfig {
            database_url,
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", defaults.max_connections)?,
            min_connections: parse_or(&lookup, "DB_MIN_CONNECTIONS", defaults.min_connections)?,
            connection_timeout_secs: parse_or(
                &lookup,
                "DB_CONNECTION_TIMEOUT_SECS",
                defaults.connection_timeout_secs,
            )?,
            idle_timeout_secs: parse_or(&lookup, "DB_IDLE_TIMEOUT_SECS", defaults.idle_timeout_secs)?,
            max_lifetime_secs: parse_or(&lookup, "DB_MAX_LIFETIME_SECS", defaults.max_lifetime_secs)?,
        };

        let redis_url = lookup("REDIS_URL").filter(|url| !url.is_empty());

        // Security configuration (REQUIRED)
        let jwt_secret = lookup("JWT_SECRET").ok_or_else(|| ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let password_pepper =
            lookup("PASSWORD_PEPPER").ok_or_else(|| ConfigError::MissingRequired {
                var: "PASSWORD_PEPPER".to_string(),
                hint: "Generate with: openssl rand -hex 16".to_string(),
            })?;

        if jwt_secret.len() < 32 {
            return Err(ConfigError::Invalid {
                var: "JWT_SECRET".to_string(),
                reason: "Must be at least 32 characters (128-bit security)".to_string(),
            });
        }

        if password_pepper.len() < 16 {
            return Err(ConfigError::Invalid {
                var: "PASSWORD_PEPPER".to_string(),
                reason: "Must be at least 16 characters (64-bit security)".to_string(),
            });
        }

        let uploads = UploadConfig {
            dir: lookup("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./img")),
            max_bytes: parse_or(&lookup, "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        };

        let metrics_bind: Option<SocketAddr> = match lookup("METRICS_BIND").filter(|v| !v.is_empty()) {
            Some(raw) => Some(raw.parse().map_err(|_| ConfigError::Invalid {
                var: "METRICS_BIND".to_string(),
                reason: format!("Not a socket address: {raw}"),
            })?),
            None => None,
        };

        Ok(ServerConfig {
            bind,
            database,
            redis_url,
            security: SecurityConfig {
                jwt_secret,
                password_pepper,
            },
            uploads,
            verification_code_length: parse_or(
                &lookup,
                "VERIFICATION_CODE_LENGTH",
                DEFAULT_CODE_LENGTH,
            )?,
            metrics_bind,
        })
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.verification_code_length == 0 {
            return Err(ConfigError::Invalid {
                var: "VERIFICATION_CODE_LENGTH".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.uploads.max_bytes == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_UPLOAD_BYTES".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::Invalid {
                var: "DB_MIN_CONNECTIONS".to_string(),
                reason: format!(
                    "Cannot exceed max connections ({})",
                    self.database.max_connections
                ),
            });
        }

        Ok(())
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

/// Parse `key` if set, `default` if unset; a malformed value is an error
fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("Cannot parse {raw:?}"),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("JWT_SECRET", "0123456789abcdef0123456789abcdef"),
            ("PASSWORD_PEPPER", "0123456789abcdef"),
        ]
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MissingRequired {
            var: "JWT_SECRET".to_string(),
            hint: "Use openssl".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("JWT_SECRET"));
        assert!(msg.contains("Use openssl"));
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(env(&required()), None, None).unwrap();

        assert_eq!(config.bind, "127.0.0.1:8080".parse().unwrap());
        assert_eq!(config.database.database_url, "sqlite://blog.db?mode=rwc");
        assert_eq!(config.uploads.dir, PathBuf::from("./img"));
        assert_eq!(config.uploads.max_bytes, 10 * 1024 * 1024);
        assert_eq!(config.verification_code_length, 10);
        assert!(config.redis_url.is_none());
        assert!(config.metrics_bind.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_overrides_win() {
        let mut vars = required();
        vars.push(("SERVER_BIND", "0.0.0.0:9000"));
        vars.push(("DATABASE_URL", "sqlite://from-env.db"));
        let bind: SocketAddr = "127.0.0.1:7000".parse().unwrap();

        let config =
            ServerConfig::from_lookup(env(&vars), Some(bind), Some("sqlite://cli.db".to_string()))
                .unwrap();
        assert_eq!(config.bind, bind);
        assert_eq!(config.database.database_url, "sqlite://cli.db");
    }

    #[test]
    fn test_missing_secret() {
        let err = ServerConfig::from_lookup(env(&[("PASSWORD_PEPPER", "0123456789abcdef")]), None, None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired { ref var, .. } if var == "JWT_SECRET"));
    }

    #[test]
    fn test_short_secret() {
        let vars = [("JWT_SECRET", "short"), ("PASSWORD_PEPPER", "0123456789abcdef")];
        let err = ServerConfig::from_lookup(env(&vars), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_malformed_number() {
        let mut vars = required();
        vars.push(("MAX_UPLOAD_BYTES", "lots"));
        let err = ServerConfig::from_lookup(env(&vars), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "MAX_UPLOAD_BYTES"));
    }

    #[test]
    fn test_validation_rejects_zero_code_length() {
        let mut vars = required();
        vars.push(("VERIFICATION_CODE_LENGTH", "0"));
        let config = ServerConfig::from_lookup(env(&vars), None, None).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_inverted_pool_bounds() {
        let mut vars = required();
        vars.push(("DB_MIN_CONNECTIONS", "20"));
        vars.push(("DB_MAX_CONNECTIONS", "5"));
        let config = ServerConfig::from_lookup(env(&vars), None, None).unwrap();

        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref var, .. } if var == "DB_MIN_CONNECTIONS"));
    }
}
