use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GatewayError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub base_url: String,
    /// Model name reported back to callers.
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://llm-server:8082".to_string(),
            model: "distilgpt2".to_string(),
            timeout_secs: 30,
        }
    }
}

impl BackendConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    /// Clients with no request newer than this are evicted by the reclaimer.
    pub idle_grace_secs: u64,
    pub sweep_interval_secs: u64,
    pub trust_forwarded_headers: bool,
    /// When non-empty, forwarded headers are only honoured for these peers.
    pub trusted_proxies: Vec<IpAddr>,
    pub quotas: RouteQuotas,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            idle_grace_secs: 300,
            sweep_interval_secs: 300,
            trust_forwarded_headers: true,
            trusted_proxies: Vec::new(),
            quotas: RouteQuotas::default(),
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn idle_grace(&self) -> Duration {
        Duration::from_secs(self.idle_grace_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

/// Requests per window, per client, bound to each route group at wiring time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteQuotas {
    pub ai: u32,
    pub model_info: u32,
    pub health: u32,
    pub index: u32,
}

impl Default for RouteQuotas {
    fn default() -> Self {
        Self {
            ai: 30,
            model_info: 100,
            health: 200,
            index: 100,
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`Settings::load`] with environment lookups supplied by `env`.
    pub fn load_with(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut settings = match Self::find_config_file(&env) {
            Some(path) => Self::from_file(&path)?,
            None => {
                tracing::warn!(
                    "No custom-config.toml or config.toml found, using built-in defaults"
                );
                Settings::default()
            }
        };
        settings.apply_env_overrides(&env);
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(settings)
    }

    fn find_config_file(env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
        if let Some(explicit) = env("GATEWAY_CONFIG") {
            if !explicit.trim().is_empty() {
                return Some(PathBuf::from(explicit.trim()));
            }
        }

        ["custom-config.toml", "config.toml"]
            .iter()
            .map(PathBuf::from)
            .find(|p| p.exists())
    }

    fn apply_env_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(url) = env("GATEWAY_BACKEND_URL") {
            if !url.trim().is_empty() {
                self.backend.base_url = url.trim().to_string();
            }
        }
        if let Some(port) = env("GATEWAY_PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            self.server.port = port;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.backend.base_url)
            .map_err(|_| GatewayError::Config("backend.base_url is not a valid URL".into()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(GatewayError::Config(
                "backend.base_url must use http or https".into(),
            ));
        }
        if self.backend.timeout_secs == 0 {
            return Err(GatewayError::Config(
                "backend.timeout_secs must be greater than zero".into(),
            ));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(GatewayError::Config(
                "rate_limit.window_secs must be greater than zero".into(),
            ));
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            return Err(GatewayError::Config(
                "rate_limit.sweep_interval_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
