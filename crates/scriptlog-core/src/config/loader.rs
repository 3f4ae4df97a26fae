//! Configuration loader for YAML files and environment overrides

use std::env;
use std::path::Path;
use tokio::fs;

use crate::config::types::ScriptlogConfig;
use crate::errors::ConfigError;

pub const ENV_ENGINE_PATH: &str = "SCRIPTLOG_ENGINE_PATH";
pub const ENV_TIMEOUT_SECS: &str = "SCRIPTLOG_TIMEOUT_SECS";
pub const ENV_SETTINGS_PATH: &str = "SCRIPTLOG_SETTINGS_PATH";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<ScriptlogConfig, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_str(&content)
    }

    /// Like [`ConfigLoader::from_file`], but a missing file yields the defaults.
    pub async fn load_or_default<P: AsRef<Path>>(path: P) -> Result<ScriptlogConfig, ConfigError> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            log::info!("Loading configuration from {}", path.display());
            Self::from_file(path).await
        } else {
            log::info!(
                "No configuration at {}, using defaults",
                path.display()
            );
            Self::finish(ScriptlogConfig::default())
        }
    }

    /// Load configuration from a YAML string
    pub fn from_str(content: &str) -> Result<ScriptlogConfig, ConfigError> {
        let config: ScriptlogConfig = if content.trim().is_empty() {
            ScriptlogConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        Self::finish(config)
    }

    fn finish(mut config: ScriptlogConfig) -> Result<ScriptlogConfig, ConfigError> {
        Self::apply_env_overrides(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(config: &mut ScriptlogConfig) -> Result<(), ConfigError> {
        if let Ok(path) = env::var(ENV_ENGINE_PATH) {
            if !path.trim().is_empty() {
                config.engine.path = Some(path.into());
            }
        }

        if let Ok(raw) = env::var(ENV_TIMEOUT_SECS) {
            config.engine.timeout_secs = raw.trim().parse().map_err(|e| {
                ConfigError::Invalid(format!("{} must be a whole number of seconds: {}", ENV_TIMEOUT_SECS, e))
            })?;
        }

        if let Ok(path) = env::var(ENV_SETTINGS_PATH) {
            if !path.trim().is_empty() {
                config.settings.path = path.into();
            }
        }

        Ok(())
    }
}
