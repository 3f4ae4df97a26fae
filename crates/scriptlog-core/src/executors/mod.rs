//! Sandboxed execution of submitted scripts.
//!
//! A [`CodeExecutor`] takes one [`ExecutionRequest`] (code, the caller's
//! settings snapshot and a wall-clock limit) and reports what the engine
//! printed. The production implementation is [`ProcessExecutor`], which runs
//! the external engine as a child process.

use async_trait::async_trait;
use std::time::Duration;

use crate::errors::ExecutorError;
use crate::settings::CallerSettings;

pub mod engine;
pub mod process;

pub use engine::{EngineLocation, EngineLocator};
pub use process::{EngineCommand, ProcessExecutor};

#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    pub code: String,
    pub settings: CallerSettings,
    pub timeout: Duration,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>, settings: CallerSettings, timeout: Duration) -> Self {
        Self {
            code: code.into(),
            settings,
            timeout,
        }
    }

    /// Variables added on top of the ambient environment.
    pub fn environment(&self) -> Vec<(String, String)> {
        self.settings.to_env()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    /// The engine ran past its limit and was killed. Streams are empty.
    pub timed_out: bool,
}

impl ExecutionResult {
    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutorError>;
}
