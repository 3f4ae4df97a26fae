//! Error types for the script logging pipeline
//!
//! Each stage of the pipeline owns its failure type so the dispatcher can
//! turn every one of them into exactly one user-facing reply. None of these
//! errors are retried; a failed request ends with the reply.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Unknown setting '{0}'")]
    UnknownSetting(String),
    #[error("Failed to persist settings to {path}: {message}")]
    Persist { path: String, message: String },
    #[error("Settings file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },
    #[error("{0}")]
    Request(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Error reading attachment: {0}")]
    AttachmentFetch(String),
    #[error("Error fetching URL: {0}")]
    UrlFetch(String),
}

#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Script engine not found (searched: {})", searched.join(", "))]
    EngineNotFound { searched: Vec<String> },
    #[error("Could not create temporary script file: {0}")]
    TempFile(std::io::Error),
    #[error("Failed to start script engine '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Script engine exited with code {exit_code:?}:\nStdout: {stdout}\nStderr: {stderr}")]
    ProcessFailed {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    #[error("I/O error while running script engine: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: String, message: String },
    #[error("Failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to deliver reply: {0}")]
    Delivery(String),
    #[error("I/O error while preparing reply: {0}")]
    IoError(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Settings store error: {0}")]
    Settings(#[from] SettingsError),
    #[error("HTTP client error: {0}")]
    Fetch(#[from] FetchError),
}
