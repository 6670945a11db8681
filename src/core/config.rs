use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, net::SocketAddr, path::PathBuf, time::Duration};
use tracing::debug;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub base_url: String,
    pub referer: String,
    /// Per-request timeout for provider calls
    pub timeout_ms: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        ProviderConfig {
            base_url: "https://api.vanguard.com".to_string(),
            referer: "https://investor.vanguard.com/".to_string(),
            timeout_ms: 20_000,
        }
    }
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AnalyticsConfig {
    pub account_id: String,
    #[serde(default = "AnalyticsConfig::default_endpoint")]
    pub endpoint: String,
}

impl AnalyticsConfig {
    fn default_endpoint() -> String {
        "https://www.google-analytics.com/collect".to_string()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    /// Upper bound on the time spent answering one request
    pub deadline_ms: u64,
    pub provider: ProviderConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analytics: Option<AnalyticsConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            deadline_ms: 30_000,
            provider: ProviderConfig::default(),
            analytics: None,
        }
    }
}

impl AppConfig {
    /// Loads the per-user config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "fundxml", "fundxml")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// YAML written by `setup`: the defaults plus a commented-out analytics section.
    pub fn default_yaml() -> Result<String> {
        let mut yaml =
            serde_yaml::to_string(&Self::default()).context("Failed to serialize config")?;
        yaml.push_str(
            "# Report every request as a page view:\n\
             # analytics:\n\
             #   account_id: \"UA-XXXXXX-X\"\n\
             #   endpoint: \"https://www.google-analytics.com/collect\"\n",
        );
        Ok(yaml)
    }

    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}
