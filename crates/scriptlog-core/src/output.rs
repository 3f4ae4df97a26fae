//! Turns engine output into a reply.
//!
//! stdout and stderr are combined (stderr under a marker, only when there is
//! any), and the character count of the combined text picks the delivery
//! mode: below the threshold it goes inline in a code block, at or above it
//! becomes a file. File replies are staged in a temporary file that is removed
//! as soon as the send returns, whether or not it succeeded.

use std::path::PathBuf;

use crate::errors::TransportError;
use crate::executors::ExecutionResult;
use crate::transport::{Reply, ReplySink};

pub const STDERR_MARKER: &str = "\n-- STDERR --\n";
pub const NO_OUTPUT: &str = "-- No output --";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputPayload {
    Inline { text: String },
    File { filename: String, bytes: Vec<u8> },
}

impl OutputPayload {
    pub fn is_inline(&self) -> bool {
        matches!(self, OutputPayload::Inline { .. })
    }
}

#[derive(Debug, Clone)]
pub struct OutputRouter {
    /// Combined output of this many characters or more is sent as a file.
    pub inline_threshold: usize,
    /// Code block language for inline replies.
    pub language: String,
    pub file_name: String,
    /// Caption sent with file replies.
    pub file_message: String,
    pub scratch_dir: Option<PathBuf>,
}

impl Default for OutputRouter {
    fn default() -> Self {
        Self {
            inline_threshold: 1900,
            language: "lua".to_string(),
            file_name: "reconstructed.lua".to_string(),
            file_message: "✅ Reconstructed code (executable Lua):".to_string(),
            scratch_dir: None,
        }
    }
}

/// stdout, then stderr under [`STDERR_MARKER`] when non-empty; the
/// [`NO_OUTPUT`] placeholder when both are empty.
pub fn combine(stdout: &str, stderr: &str) -> String {
    let mut output = stdout.to_string();
    if !stderr.is_empty() {
        output.push_str(STDERR_MARKER);
        output.push_str(stderr);
    }
    if output.is_empty() {
        output.push_str(NO_OUTPUT);
    }
    output
}

impl OutputRouter {
    pub fn route(&self, result: &ExecutionResult) -> OutputPayload {
        self.route_text(combine(&result.stdout, &result.stderr))
    }

    pub fn route_text(&self, text: String) -> OutputPayload {
        if text.chars().count() < self.inline_threshold {
            OutputPayload::Inline {
                text: format!("```{}\n{}\n```", self.language, text),
            }
        } else {
            OutputPayload::File {
                filename: self.file_name.clone(),
                bytes: text.into_bytes(),
            }
        }
    }

    /// Sends the payload. `caption` prefixes inline replies and replaces the
    /// default file caption.
    pub async fn deliver(
        &self,
        payload: OutputPayload,
        caption: Option<&str>,
        sink: &dyn ReplySink,
    ) -> Result<(), TransportError> {
        match payload {
            OutputPayload::Inline { text } => {
                let text = match caption {
                    Some(caption) => format!("{}\n{}", caption, text),
                    None => text,
                };
                sink.send(Reply::Text(text)).await
            }
            OutputPayload::File { filename, bytes } => {
                let artifact = self.stage(&bytes).await?;
                let sent = sink
                    .send(Reply::File {
                        message: caption.unwrap_or(self.file_message.as_str()).to_string(),
                        filename,
                        path: &*artifact,
                    })
                    .await;
                if let Err(e) = artifact.close() {
                    log::warn!("Failed to remove staged output file: {}", e);
                }
                sent
            }
        }
    }

    async fn stage(&self, bytes: &[u8]) -> Result<tempfile::TempPath, TransportError> {
        let suffix = std::path::Path::new(&self.file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();
        let mut builder = tempfile::Builder::new();
        builder.prefix("scriptlog-out-").suffix(&suffix);
        let file = match &self.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }?;
        let path = file.into_temp_path();
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }
}
