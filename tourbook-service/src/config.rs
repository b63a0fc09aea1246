//! Configuration management using Figment
//!
//! Configuration is loaded from multiple sources with the following precedence (highest to lowest):
//! 1. Environment variables (prefix: `TOURBOOK_`, nesting separator `__`)
//! 2. An explicit file passed to [`Config::load_from`]
//! 3. Current working directory: ./config.toml
//! 4. XDG config directory: ~/.config/tourbook/config.toml
//! 5. Default values
//!
//! `TOURBOOK_SERVICE__PORT=8000` sets `service.port`; a single underscore
//! stays part of the key so `TOURBOOK_RATE_LIMIT__MAX_REQUESTS` reaches
//! `rate_limit.max_requests`.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Result;

const ENV_PREFIX: &str = "TOURBOOK_";
const ENV_SEPARATOR: &str = "__";
const XDG_PREFIX: &str = "tourbook";
const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Service configuration
    pub service: ServiceConfig,

    /// Middleware configuration
    #[serde(default)]
    pub middleware: MiddlewareConfig,

    /// Per-IP rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Response security headers
    #[serde(default)]
    pub security_headers: SecurityHeadersConfig,

    /// List query shaping
    #[serde(default)]
    pub query: QueryConfig,

    /// Document store
    #[serde(default)]
    pub store: StoreConfig,
}

/// Deployment posture; decides how much of an error reaches the client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[serde(alias = "dev")]
    Development,
    #[serde(alias = "prod")]
    Production,
}

impl Environment {
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub environment: Environment,
}

/// Middleware configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Request body size limit in KB; JSON bodies above it are rejected with 413
    #[serde(default = "default_body_limit_kb")]
    pub body_limit_kb: usize,

    /// Enable panic recovery middleware
    #[serde(default = "default_true")]
    pub catch_panic: bool,

    /// Enable compression
    #[serde(default = "default_true")]
    pub compression: bool,

    /// CORS configuration
    #[serde(default)]
    pub cors_mode: CorsMode,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            body_limit_kb: default_body_limit_kb(),
            catch_panic: true,
            compression: true,
            cors_mode: CorsMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorsMode {
    #[default]
    Permissive,
    Restrictive,
    Disabled,
}

/// Per-IP request budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Requests allowed per client IP within one window
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Only paths under this prefix are limited
    #[serde(default = "default_rate_limit_prefix")]
    pub path_prefix: String,

    /// Message sent with 429 responses
    #[serde(default = "default_rate_limit_message")]
    pub message: String,
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            path_prefix: default_rate_limit_prefix(),
            message: default_rate_limit_message(),
        }
    }
}

/// Security headers applied to every response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityHeadersConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sent only when `hsts` is set; the service itself speaks plain HTTP
    #[serde(default)]
    pub hsts: bool,

    #[serde(default = "default_hsts_max_age")]
    pub hsts_max_age_secs: u64,

    #[serde(default = "default_true")]
    pub hsts_include_subdomains: bool,

    #[serde(default = "default_true")]
    pub x_content_type_options: bool,

    /// Empty disables the header
    #[serde(default = "default_frame_options")]
    pub x_frame_options: String,

    #[serde(default = "default_true")]
    pub x_xss_protection: bool,

    /// Empty disables the header
    #[serde(default = "default_referrer_policy")]
    pub referrer_policy: String,

    #[serde(default = "default_true")]
    pub x_dns_prefetch_control: bool,

    #[serde(default)]
    pub permissions_policy: Option<String>,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hsts: false,
            hsts_max_age_secs: default_hsts_max_age(),
            hsts_include_subdomains: true,
            x_content_type_options: true,
            x_frame_options: default_frame_options(),
            x_xss_protection: true,
            referrer_policy: default_referrer_policy(),
            x_dns_prefetch_control: true,
            permissions_policy: None,
        }
    }
}

/// List query shaping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Upper bound for `limit`; unset means no bound
    #[serde(default)]
    pub max_limit: Option<u64>,

    /// Filter keys that may repeat to match any of several values; other
    /// repeated keys keep their last value
    #[serde(default = "default_repeatable_params")]
    pub repeatable_params: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            max_limit: None,
            repeatable_params: default_repeatable_params(),
        }
    }
}

/// Document store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of `{collection}.json` files imported at startup
    #[serde(default)]
    pub seed_dir: Option<PathBuf>,
}

fn default_repeatable_params() -> Vec<String> {
    [
        "duration",
        "ratingsQuantity",
        "ratingsAverage",
        "maxGroupSize",
        "difficulty",
        "price",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_service_name() -> String {
    "tourbook".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_body_limit_kb() -> usize {
    10
}

fn default_max_requests() -> u32 {
    100
}

fn default_window_secs() -> u64 {
    60 * 60
}

fn default_rate_limit_prefix() -> String {
    "/api".to_string()
}

fn default_rate_limit_message() -> String {
    "Too many requests from this IP, please try again in an hour!".to_string()
}

fn default_hsts_max_age() -> u64 {
    15_552_000
}

fn default_frame_options() -> String {
    "SAMEORIGIN".to_string()
}

fn default_referrer_policy() -> String {
    "no-referrer".to_string()
}

impl Config {
    /// Load configuration from the XDG directory, the working directory and
    /// the environment
    pub fn load() -> Result<Self> {
        let mut figment = Self::defaults();

        // Lowest priority first so later files override earlier ones
        for path in Self::find_config_paths().iter().rev() {
            if path.exists() {
                tracing::info!("Loading configuration from: {}", path.display());
                figment = figment.merge(Toml::file(path));
            }
        }

        Self::extract(figment)
    }

    /// Load configuration with an explicit file on top of the usual sources
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(crate::error::Error::ConfigNotFound(path.to_path_buf()));
        }

        let mut figment = Self::defaults();
        for candidate in Self::find_config_paths().iter().rev() {
            if candidate.exists() {
                figment = figment.merge(Toml::file(candidate));
            }
        }
        tracing::info!("Loading configuration from: {}", path.display());
        figment = figment.merge(Toml::file(path));

        Self::extract(figment)
    }

    fn defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
            .extract()?;
        Ok(config)
    }

    /// Candidate config files, highest priority first
    fn find_config_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(CONFIG_FILE)];

        let xdg_dirs = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        if let Some(path) = xdg_dirs.find_config_file(CONFIG_FILE) {
            paths.push(path);
        }

        tracing::debug!(?paths, "Searching for config files");
        paths
    }

    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.service.timeout_secs)
    }

    pub fn body_limit_bytes(&self) -> usize {
        self.middleware.body_limit_kb.saturating_mul(1024)
    }

    pub fn environment(&self) -> Environment {
        self.service.environment
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                name: default_service_name(),
                port: default_port(),
                log_level: default_log_level(),
                timeout_secs: default_timeout(),
                environment: Environment::default(),
            },
            middleware: MiddlewareConfig::default(),
            rate_limit: RateLimitConfig::default(),
            security_headers: SecurityHeadersConfig::default(),
            query: QueryConfig::default(),
            store: StoreConfig::default(),
        }
    }
}
