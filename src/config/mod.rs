//! Configuration loading and management
//!
//! ```yaml
//! server:
//!   host: 0.0.0.0
//!   port: 3000
//! environment: development
//! cache:
//!   backend: memory
//!   ttl_seconds: 3600
//! logging:
//!   level: info
//!   json: false
//! auth:
//!   tokens:
//!     - token: admin-secret
//!       user_id: u-1
//!       role: admin
//! access:
//!   courses:
//!     write: role:admin
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::core::auth::{AccessPolicy, Principal, Role, StaticTokenProvider};
use crate::core::error::ConfigError;
use crate::core::sort_cache::{DEFAULT_SORT_TTL_SECONDS, MAX_SORT_TTL_SECONDS};

/// Port used when none is configured
pub const DEFAULT_PORT: u16 = 3000;

/// Runtime environment, selects how errors are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" => Ok(Environment::Development),
            "production" => Ok(Environment::Production),
            other => Err(ConfigError::Invalid {
                message: format!("unknown environment '{}'", other),
            }),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Which cache stores sorted views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    pub redis_url: Option<String>,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::Memory,
            redis_url: None,
            ttl_seconds: DEFAULT_SORT_TTL_SECONDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `campus=debug,tower_http=info`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// A bearer token accepted by the static token provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenConfig>,
}

impl AuthConfig {
    /// Build the token provider
    pub fn provider(&self) -> StaticTokenProvider {
        self.tokens
            .iter()
            .fold(StaticTokenProvider::new(), |provider, entry| {
                provider.with_token(
                    entry.token.clone(),
                    Principal {
                        user_id: entry.user_id.clone(),
                        role: entry.role,
                    },
                )
            })
    }
}

/// Access policy overrides for one resource
///
/// Values: `public`, `authenticated` or `role:<name>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub read: Option<String>,
    pub write: Option<String>,
}

impl AccessConfig {
    pub fn read_policy(&self) -> Result<Option<AccessPolicy>, ConfigError> {
        Self::parse(self.read.as_deref())
    }

    pub fn write_policy(&self) -> Result<Option<AccessPolicy>, ConfigError> {
        Self::parse(self.write.as_deref())
    }

    fn parse(value: Option<&str>) -> Result<Option<AccessPolicy>, ConfigError> {
        value
            .map(|v| {
                AccessPolicy::parse_policy(v).map_err(|e| ConfigError::Invalid {
                    message: e.to_string(),
                })
            })
            .transpose()
    }
}

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub environment: Environment,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    /// Per-resource access overrides, keyed by plural resource name
    pub access: IndexMap<String, AccessConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply process environment overrides
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_yaml_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `CAMPUS_PORT`, `REDIS_URL`, `CAMPUS_ENV` and `LOG_LEVEL`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("CAMPUS_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::Invalid {
                message: format!("CAMPUS_PORT must be a port number, got '{}'", port),
            })?;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.backend = CacheBackend::Redis;
            self.cache.redis_url = Some(url);
        }
        if let Some(env) = lookup("CAMPUS_ENV") {
            self.environment = Environment::parse(&env)?;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        self.validate()
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.backend == CacheBackend::Redis && self.cache.redis_url.is_none() {
            return Err(ConfigError::Invalid {
                message: "cache.redis_url is required when cache.backend is redis".into(),
            });
        }
        if !(1..=MAX_SORT_TTL_SECONDS).contains(&self.cache.ttl_seconds) {
            return Err(ConfigError::Invalid {
                message: format!(
                    "cache.ttl_seconds must be between 1 and {}, got {}",
                    MAX_SORT_TTL_SECONDS, self.cache.ttl_seconds
                ),
            });
        }
        for (resource, access) in &self.access {
            access.read_policy().and(access.write_policy()).map_err(|e| {
                ConfigError::Invalid {
                    message: format!("access.{}: {}", resource, e),
                }
            })?;
        }
        Ok(())
    }

    /// `host:port` for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
