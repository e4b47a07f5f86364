use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Hard staleness defaults to this multiple of soft staleness.
const HARD_STALENESS_FACTOR: u32 = 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Remote API
    pub api_url: String,
    pub image_cdn_url: String,
    pub http_timeout: Duration,

    // Local store
    pub database_path: PathBuf,

    // Scheduling policy
    pub staleness: StalenessPolicy,
    pub autoload: AutoloadPolicy,
}

/// Thresholds governing incremental top-up versus full reset of a
/// range-scan channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StalenessPolicy {
    /// Past this age the cache is topped up with an ascending scan.
    pub soft: Duration,
    /// Past this age the cache is cleared and rebuilt from the newest posts.
    pub hard: Duration,
}

impl StalenessPolicy {
    #[must_use]
    pub fn new(soft: Duration, hard: Duration) -> Self {
        Self { soft, hard }
    }

    /// Soft threshold with hard staleness at the default multiple of it.
    #[must_use]
    pub fn from_soft(soft: Duration) -> Self {
        Self {
            soft,
            hard: soft.saturating_mul(HARD_STALENESS_FACTOR),
        }
    }
}

impl Default for StalenessPolicy {
    fn default() -> Self {
        Self::from_soft(Duration::from_secs(300))
    }
}

/// Conditions the scroll position must meet before an autoload fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoloadPolicy {
    /// Below this content height "near the bottom" is meaningless.
    pub min_content_height: u32,
    /// Maximum remaining distance to the bottom of the content.
    pub scroll_threshold: u32,
    /// Minimum time between two firings.
    pub cooldown: Duration,
}

impl Default for AutoloadPolicy {
    fn default() -> Self {
        Self {
            min_content_height: 1500,
            scroll_threshold: 500,
            cooldown: Duration::from_millis(2500),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let soft = Duration::from_secs(parse_env_u64("SOFT_STALENESS_SECS", 300)?);
        let hard = Duration::from_secs(parse_env_u64(
            "HARD_STALENESS_SECS",
            soft.as_secs()
                .saturating_mul(u64::from(HARD_STALENESS_FACTOR)),
        )?);

        let defaults = AutoloadPolicy::default();

        Ok(Self {
            // Remote API
            api_url: required_env("API_URL")?,
            image_cdn_url: env_or_default(
                "IMAGE_CDN_URL",
                "https://us-east-1.linodeobjects.com/druidis-cdn",
            ),
            http_timeout: Duration::from_secs(parse_env_u64("HTTP_TIMEOUT_SECS", 30)?),

            // Local store
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/cache.sqlite")),

            // Scheduling policy
            staleness: StalenessPolicy::new(soft, hard),
            autoload: AutoloadPolicy {
                min_content_height: parse_env_u32(
                    "AUTOLOAD_MIN_CONTENT_HEIGHT",
                    defaults.min_content_height,
                )?,
                scroll_threshold: parse_env_u32(
                    "AUTOLOAD_SCROLL_THRESHOLD",
                    defaults.scroll_threshold,
                )?,
                cooldown: Duration::from_millis(parse_env_u64("AUTOLOAD_COOLDOWN_MS", 2500)?),
            },
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(ConfigError::InvalidValue {
                name: "API_URL".to_string(),
                message: "cannot be empty".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(&self.api_url) {
            return Err(ConfigError::InvalidValue {
                name: "API_URL".to_string(),
                message: format!("not a valid URL: {e}"),
            });
        }
        if self.staleness.soft.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "SOFT_STALENESS_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.staleness.hard < self.staleness.soft {
            return Err(ConfigError::InvalidValue {
                name: "HARD_STALENESS_SECS".to_string(),
                message: "must not be shorter than SOFT_STALENESS_SECS".to_string(),
            });
        }
        if self.http_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                name: "HTTP_TIMEOUT_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Configuration with defaults suitable for tests.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            api_url: "http://localhost/api".to_string(),
            image_cdn_url: "https://cdn.example.com".to_string(),
            http_timeout: Duration::from_secs(10),
            database_path: PathBuf::from(":memory:"),
            staleness: StalenessPolicy::default(),
            autoload: AutoloadPolicy::default(),
        }
    }
}

fn required_env(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingEnvVar(name.to_string()))
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}
