//! Configuration types for a scriptlog deployment
//!
//! Every field has a default, so an empty (or absent) `scriptlog.yaml`
//! describes the stock setup: `lune run src/code_reconstructor_advanced.lua`
//! with a 30 second limit, replies inline below 1900 characters, settings in
//! `bot_settings.json`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;
use crate::executors::{EngineCommand, EngineLocator};
use crate::output::OutputRouter;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScriptlogConfig {
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_log_command")]
    pub log_command: String,
    #[serde(default = "default_settings_command")]
    pub settings_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Program name searched for in the working directory and on `PATH`.
    #[serde(default = "default_engine_binary")]
    pub binary: String,
    /// Explicit engine path, tried before anything else.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Arguments placed before the entry script.
    #[serde(default = "default_engine_args")]
    pub args: Vec<String>,
    #[serde(default = "default_entry_script")]
    pub entry_script: PathBuf,
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_file_extension")]
    pub file_extension: String,
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_fetch_max_bytes")]
    pub max_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_inline_threshold")]
    pub inline_threshold: usize,
    #[serde(default = "default_output_language")]
    pub language: String,
    #[serde(default = "default_output_file_name")]
    pub file_name: String,
    #[serde(default = "default_output_file_message")]
    pub file_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Environment variable holding the bearer token relays must present.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            log_command: default_log_command(),
            settings_command: default_settings_command(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: default_engine_binary(),
            path: None,
            args: default_engine_args(),
            entry_script: default_entry_script(),
            working_dir: default_working_dir(),
            file_extension: default_file_extension(),
            timeout_secs: default_engine_timeout(),
            scratch_dir: None,
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_fetch_timeout(),
            max_bytes: default_fetch_max_bytes(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            inline_threshold: default_inline_threshold(),
            language: default_output_language(),
            file_name: default_output_file_name(),
            file_message: default_output_file_message(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            token_env: default_token_env(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_command_prefix() -> String { "!".to_string() }
fn default_log_command() -> String { "log".to_string() }
fn default_settings_command() -> String { "settings".to_string() }
fn default_engine_binary() -> String { "lune".to_string() }
fn default_engine_args() -> Vec<String> { vec!["run".to_string()] }
fn default_entry_script() -> PathBuf { PathBuf::from("src").join("code_reconstructor_advanced.lua") }
fn default_working_dir() -> PathBuf { PathBuf::from(".") }
fn default_file_extension() -> String { "lua".to_string() }
fn default_engine_timeout() -> u64 { 30 }
fn default_fetch_timeout() -> u64 { 15 }
fn default_fetch_max_bytes() -> usize { 4 * 1024 * 1024 }
fn default_inline_threshold() -> usize { 1900 }
fn default_output_language() -> String { "lua".to_string() }
fn default_output_file_name() -> String { "reconstructed.lua".to_string() }
fn default_output_file_message() -> String { "✅ Reconstructed code (executable Lua):".to_string() }
fn default_settings_path() -> PathBuf { PathBuf::from("bot_settings.json") }
fn default_bind_addr() -> String { "127.0.0.1:8080".to_string() }
fn default_token_env() -> String { "SCRIPTLOG_TOKEN".to_string() }
fn default_max_body_bytes() -> usize { 8 * 1024 * 1024 }

impl EngineConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn locator(&self) -> EngineLocator {
        let locator = EngineLocator::new(&self.binary, &self.working_dir);
        match &self.path {
            Some(path) => locator.with_explicit_path(path),
            None => locator,
        }
    }

    pub fn command(&self) -> EngineCommand {
        EngineCommand {
            args: self.args.clone(),
            entry_script: self.entry_script.clone(),
            working_dir: self.working_dir.clone(),
            file_extension: self.file_extension.clone(),
            scratch_dir: self.scratch_dir.clone(),
        }
    }
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl OutputConfig {
    pub fn router(&self, scratch_dir: Option<PathBuf>) -> OutputRouter {
        OutputRouter {
            inline_threshold: self.inline_threshold,
            language: self.language.clone(),
            file_name: self.file_name.clone(),
            file_message: self.file_message.clone(),
            scratch_dir,
        }
    }
}

impl ScriptlogConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let bot = &self.bot;
        if bot.log_command.trim().is_empty() || bot.settings_command.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "Bot command words cannot be empty".to_string(),
            ));
        }
        if bot.log_command == bot.settings_command {
            return Err(ConfigError::Invalid(format!(
                "Bot commands must differ (both are '{}')",
                bot.log_command
            )));
        }

        let engine = &self.engine;
        if engine.binary.trim().is_empty() {
            return Err(ConfigError::Invalid("Engine binary cannot be empty".to_string()));
        }
        if engine.entry_script.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Engine entry_script cannot be empty".to_string()));
        }
        if engine.file_extension.trim().is_empty() || engine.file_extension.contains('.') {
            return Err(ConfigError::Invalid(format!(
                "Engine file_extension must be a bare extension, got '{}'",
                engine.file_extension
            )));
        }
        if engine.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "Engine timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.fetch.timeout_secs == 0 || self.fetch.max_bytes == 0 {
            return Err(ConfigError::Invalid(
                "Fetch timeout_secs and max_bytes must be greater than 0".to_string(),
            ));
        }

        if self.output.inline_threshold == 0 {
            return Err(ConfigError::Invalid(
                "Output inline_threshold must be greater than 0".to_string(),
            ));
        }
        if self.output.file_name.trim().is_empty() {
            return Err(ConfigError::Invalid("Output file_name cannot be empty".to_string()));
        }

        if self.settings.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("Settings path cannot be empty".to_string()));
        }

        if self.gateway.token_env.trim().is_empty() {
            return Err(ConfigError::Invalid("Gateway token_env cannot be empty".to_string()));
        }

        Ok(())
    }
}
