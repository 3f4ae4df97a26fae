//! One `log` request, end to end.
//!
//! ```text
//! Resolving -> (Fetching)? -> Executing -> Routing -> Done
//!      \            \             \
//!       +------------+-------------+--> Failed(reason)
//! ```
//!
//! Every failure becomes exactly one reply to the caller and ends the request.
//! Nothing is retried.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{ExecutorError, ResolveError};
use crate::executors::{CodeExecutor, ExecutionRequest};
use crate::output::{combine, OutputRouter};
use crate::settings::SettingsStore;
use crate::source::{SourceResolver, SourceShape};
use crate::transport::{Attachment, Reply, ReplySink};

pub const NO_CODE_MESSAGE: &str = "Please provide code to log.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Fetching,
    Executing,
    Routing,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Delivered { shape: SourceShape, inline: bool },
    /// Nothing to run; the caller was asked for code.
    NoCode,
    Failed { stage: Stage, reason: String },
}

pub struct ScriptPipeline {
    store: Arc<SettingsStore>,
    resolver: SourceResolver,
    executor: Arc<dyn CodeExecutor>,
    router: OutputRouter,
    timeout: Duration,
}

impl ScriptPipeline {
    pub fn new(
        store: Arc<SettingsStore>,
        resolver: SourceResolver,
        executor: Arc<dyn CodeExecutor>,
        router: OutputRouter,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            resolver,
            executor,
            router,
            timeout,
        }
    }

    pub async fn run(
        &self,
        caller_id: &str,
        payload: &str,
        attachments: &[Attachment],
        sink: &dyn ReplySink,
    ) -> PipelineOutcome {
        let request_id = Uuid::new_v4();
        log::debug!("[{}] {:?} for caller {}", request_id, Stage::Resolving, caller_id);

        let candidate = match self.resolver.resolve(payload, attachments).await {
            Ok(candidate) => candidate,
            Err(e) => {
                log::warn!("[{}] Source resolution failed: {}", request_id, e);
                let stage = match e {
                    ResolveError::AttachmentFetch(_) | ResolveError::UrlFetch(_) => Stage::Fetching,
                };
                return fail(sink, stage, e.to_string()).await;
            }
        };

        if candidate.is_empty() {
            reply(sink, Reply::Text(NO_CODE_MESSAGE.to_string())).await;
            return PipelineOutcome::NoCode;
        }

        let settings = self.store.get(caller_id).await;
        let request = ExecutionRequest::new(candidate.code, settings, self.timeout);
        log::debug!(
            "[{}] {:?} {} bytes from {:?}",
            request_id,
            Stage::Executing,
            request.code.len(),
            candidate.shape
        );

        let result = match self.executor.execute(&request).await {
            Ok(result) => result,
            Err(ExecutorError::ProcessFailed {
                exit_code,
                stdout,
                stderr,
            }) => {
                log::warn!("[{}] Script engine failed with {:?}", request_id, exit_code);
                return self.report_process_failure(sink, exit_code, &stdout, &stderr).await;
            }
            Err(e) => {
                log::error!("[{}] Execution failed: {}", request_id, e);
                return fail(sink, Stage::Executing, format!("An error occurred: {}", e)).await;
            }
        };

        if result.timed_out {
            log::warn!("[{}] Execution timed out after {:?}", request_id, self.timeout);
            return fail(sink, Stage::Executing, timeout_message(self.timeout)).await;
        }

        log::debug!("[{}] {:?}", request_id, Stage::Routing);
        let payload = self.router.route(&result);
        let inline = payload.is_inline();
        if let Err(e) = self.router.deliver(payload, None, sink).await {
            log::error!("[{}] Failed to deliver output: {}", request_id, e);
            return PipelineOutcome::Failed {
                stage: Stage::Routing,
                reason: e.to_string(),
            };
        }

        log::debug!("[{}] {:?}", request_id, Stage::Done);
        PipelineOutcome::Delivered {
            shape: candidate.shape,
            inline,
        }
    }

    async fn report_process_failure(
        &self,
        sink: &dyn ReplySink,
        exit_code: Option<i32>,
        stdout: &str,
        stderr: &str,
    ) -> PipelineOutcome {
        let code = exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        if stdout.trim().is_empty() && stderr.trim().is_empty() {
            let reason = format!("❌ Script engine exited with code {} and produced no output.", code);
            return fail(sink, Stage::Executing, reason).await;
        }

        let caption = format!("❌ Script engine exited with code {}:", code);
        let payload = self.router.route_text(combine(stdout, stderr));
        if let Err(e) = self.router.deliver(payload, Some(&caption), sink).await {
            log::error!("Failed to deliver engine failure output: {}", e);
        }
        PipelineOutcome::Failed {
            stage: Stage::Executing,
            reason: caption,
        }
    }
}

pub fn timeout_message(limit: Duration) -> String {
    if limit.as_secs() > 0 && limit.subsec_millis() == 0 {
        format!("Execution timed out ({}s limit).", limit.as_secs())
    } else {
        format!("Execution timed out ({}ms limit).", limit.as_millis())
    }
}

async fn reply(sink: &dyn ReplySink, message: Reply<'_>) {
    if let Err(e) = sink.send(message).await {
        log::error!("Failed to send reply: {}", e);
    }
}

async fn fail(sink: &dyn ReplySink, stage: Stage, reason: String) -> PipelineOutcome {
    reply(sink, Reply::Text(reason.clone())).await;
    PipelineOutcome::Failed { stage, reason }
}
