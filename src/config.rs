use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

const APP_DIR: &str = "campus-events";
const BASE_URL_ENV: &str = "CAMPUS_API_BASE_URL";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_base_url: String,
    pub poll_interval_secs: u64,
    pub request_timeout_secs: u64,
    /// Timezone label attached to schedules this client creates.
    pub timezone: String,
    pub session_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:4000".to_string(),
            poll_interval_secs: 30,
            request_timeout_secs: 10,
            timezone: "UTC".to_string(),
            session_path: default_session_path(),
        }
    }
}

impl Config {
    /// Reads the config file if there is one, then applies environment
    /// overrides. Never fails; a broken file is logged and ignored.
    pub fn load() -> Self {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path).unwrap_or_else(|e| {
                warn!("Ignoring {}: {e}", path.display());
                Self::default()
            }),
            _ => {
                info!("No config file found, using defaults");
                Self::default()
            }
        };

        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            info!("{BASE_URL_ENV} set, using {url}");
            config.api_base_url = url;
        }
        config
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        file.into_config()
    }
}

fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

fn default_session_path() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join(APP_DIR).join("session.toml"))
}

// ── TOML config types ──

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    api_base_url: Option<String>,
    poll_interval_secs: Option<u64>,
    request_timeout_secs: Option<u64>,
    timezone: Option<String>,
    session_path: Option<PathBuf>,
}

impl ConfigFile {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::default();

        if let Some(url) = self.api_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!("api_base_url must be http(s): {url}")));
            }
            config.api_base_url = url;
        }
        if let Some(secs) = self.poll_interval_secs {
            if secs == 0 {
                return Err(Error::Config("poll_interval_secs must be positive".into()));
            }
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.request_timeout_secs {
            if secs == 0 {
                return Err(Error::Config("request_timeout_secs must be positive".into()));
            }
            config.request_timeout_secs = secs;
        }
        if let Some(tz) = self.timezone {
            config.timezone = tz;
        }
        if self.session_path.is_some() {
            config.session_path = self.session_path;
        }

        Ok(config)
    }
}
