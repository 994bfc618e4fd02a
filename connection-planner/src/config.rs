//! Application configuration.
//!
//! Settings come from an optional YAML file named by `PLANNER_CONFIG`; every
//! field has a default, so a partial file (or none at all) is fine. The API key
//! and bind address can be overridden from the environment.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::planner::{ConfigError, PlanConfig};

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_VAR: &str = "PLANNER_CONFIG";

/// Environment variable overriding the MBTA API key.
pub const API_KEY_VAR: &str = "MBTA_API_KEY";

/// Environment variable overriding the listen address.
pub const BIND_VAR: &str = "PLANNER_BIND";

/// Errors loading the application configuration.
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid bind address {0:?}")]
    InvalidBind(String),

    #[error("invalid plan settings: {0}")]
    Plan(#[from] ConfigError),
}

/// Top-level settings for the server binary.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Planner settings.
    pub plan: PlanConfig,

    /// MBTA API key; anonymous access works at a lower rate limit.
    pub api_key: Option<String>,

    /// MBTA API base URL.
    pub base_url: String,

    /// Listen address for the HTTP server.
    pub bind: String,

    /// Seconds between background plan refreshes.
    pub refresh_secs: u64,

    /// Maximum concurrent requests to the API.
    pub max_concurrent: usize,

    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            plan: PlanConfig::default(),
            api_key: None,
            base_url: "https://api-v3.mbta.com".to_string(),
            bind: "127.0.0.1:3000".to_string(),
            refresh_secs: 60,
            max_concurrent: 5,
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Parse a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, AppConfigError> {
        serde_yaml::from_str(content).map_err(|e| AppConfigError::Parse(e.to_string()))
    }

    /// Load from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AppConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| AppConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&content)
    }

    /// Load from the process environment: the file named by `PLANNER_CONFIG`
    /// if set, then the variable overrides, then validation.
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::resolve(|name| std::env::var(name).ok())
    }

    /// As [`AppConfig::from_env`], reading variables through `var`.
    pub fn resolve(var: impl Fn(&str) -> Option<String>) -> Result<Self, AppConfigError> {
        let mut config = match var(CONFIG_PATH_VAR).filter(|p| !p.is_empty()) {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        if let Some(key) = var(API_KEY_VAR).filter(|k| !k.is_empty()) {
            config.api_key = Some(key);
        }
        if let Some(bind) = var(BIND_VAR).filter(|b| !b.is_empty()) {
            config.bind = bind;
        }

        config.validate()?;
        Ok(config)
    }

    /// Check the settings can run a server.
    pub fn validate(&self) -> Result<(), AppConfigError> {
        self.plan.validate()?;
        self.bind_addr()?;
        Ok(())
    }

    /// The parsed listen address.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppConfigError> {
        self.bind
            .parse()
            .map_err(|_| AppConfigError::InvalidBind(self.bind.clone()))
    }

    /// Interval between background refreshes, at least one second.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs.max(1))
    }
}
