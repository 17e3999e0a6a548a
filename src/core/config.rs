use crate::core::rate_provider::{OnFetchFailure, REFRESH_INTERVAL, RefreshOptions};
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fmt, fs, path::PathBuf};
use tracing::debug;

/// Environment variable holding the openexchangerates.org app id.
pub const APP_ID_ENV: &str = "OPENEXCHANGERATES_APP_ID";

pub const DEFAULT_OPENEXCHANGERATES_URL: &str = "https://openexchangerates.org/api";

#[derive(Deserialize, Serialize, Clone)]
pub struct OpenExchangeRatesConfig {
    pub base_url: String,
    #[serde(default)]
    pub app_id: Option<String>,
}

impl fmt::Debug for OpenExchangeRatesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenExchangeRatesConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for OpenExchangeRatesConfig {
    fn default() -> Self {
        OpenExchangeRatesConfig {
            base_url: DEFAULT_OPENEXCHANGERATES_URL.to_string(),
            app_id: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub openexchangerates: Option<OpenExchangeRatesConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            openexchangerates: Some(OpenExchangeRatesConfig::default()),
        }
    }
}

fn default_fetch_timeout_secs() -> u64 {
    10
}

fn default_retries() -> usize {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RefreshConfig {
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default)]
    pub on_failure: OnFetchFailure,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            fetch_timeout_secs: default_fetch_timeout_secs(),
            retries: default_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            on_failure: OnFetchFailure::default(),
        }
    }
}

impl RefreshConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn options(&self) -> RefreshOptions {
        RefreshOptions {
            interval: REFRESH_INTERVAL,
            on_failure: self.on_failure,
        }
    }
}

fn default_display_currencies() -> Vec<String> {
    ["EUR", "BGN", "USD", "ALL"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Display currency used when a conversion names no target.
    pub currency: String,
    #[serde(default = "default_display_currencies")]
    pub display_currencies: Vec<String>,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.refresh.fetch_timeout_secs == 0 {
            bail!("refresh.fetch_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Base URL of the openexchangerates.org API.
    pub fn openexchangerates_url(&self) -> &str {
        self.providers
            .openexchangerates
            .as_ref()
            .map_or(DEFAULT_OPENEXCHANGERATES_URL, |p| &p.base_url)
    }

    /// Resolves the API credential; the environment wins over the file.
    pub fn app_id(&self) -> Result<SecretString> {
        self.resolve_app_id(std::env::var(APP_ID_ENV).ok())
    }

    fn resolve_app_id(&self, from_env: Option<String>) -> Result<SecretString> {
        let from_file = self
            .providers
            .openexchangerates
            .as_ref()
            .and_then(|p| p.app_id.clone());

        match from_env
            .filter(|v| !v.trim().is_empty())
            .or(from_file.filter(|v| !v.trim().is_empty()))
        {
            Some(app_id) => Ok(SecretString::from(app_id)),
            None => bail!(
                "No exchange rate API credential configured. Set {} or providers.openexchangerates.app_id",
                APP_ID_ENV
            ),
        }
    }
}
