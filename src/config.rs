use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable that relocates the whole config directory.
pub const HOME_ENV: &str = "PROTOPLAYER_HOME";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_share_base_url")]
    pub share_base_url: String,
    /// When false the engine behaves as if adaptive streaming were unsupported
    /// and always uses the direct locator.
    #[serde(default = "default_true")]
    pub adaptive_streaming: bool,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_companion_program")]
    pub companion_program: String,
    #[serde(default)]
    pub presence_file: Option<PathBuf>,
}

fn default_api_base_url() -> String {
    "https://protomusic-proxy.onrender.com".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_share_base_url() -> String {
    "https://v2.protogen.fr/video".to_string()
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("protoplayer/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_companion_program() -> String {
    "mpv".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            api_prefix: default_api_prefix(),
            share_base_url: default_share_base_url(),
            adaptive_streaming: true,
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
            companion_program: default_companion_program(),
            presence_file: None,
        }
    }
}

impl AppConfig {
    pub fn config_dir() -> AppResult<PathBuf> {
        if let Some(dir) = std::env::var_os(HOME_ENV) {
            return Ok(PathBuf::from(dir));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::Config("Cannot find home directory".into()))?;
        Ok(home.join(".protoplayer"))
    }

    pub fn config_path() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    pub fn prefs_dir() -> AppResult<PathBuf> {
        Ok(Self::config_dir()?.join("prefs"))
    }

    pub fn load() -> AppResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(AppError::Config(format!(
                "Config file not found at {}",
                path.display()
            )));
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load the config, or fall back to defaults and write them back so the
    /// file exists on the next launch.
    pub fn load_or_init() -> Self {
        match Self::load() {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Failed to load config: {}. Using defaults.", e);
                let config = Self::default();
                if let Err(save_err) = config.save() {
                    log::error!("Failed to save default config: {}", save_err);
                }
                config
            }
        }
    }

    /// Full URL of a PHP endpoint under the API prefix.
    pub fn api_url(&self, endpoint: &str) -> String {
        format!(
            "{}{}{}",
            self.api_base_url.trim_end_matches('/'),
            self.api_prefix,
            endpoint
        )
    }

    /// Full URL of a path directly under the base URL.
    pub fn base_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), path)
    }
}
