//! Reply sink for the local `exec` and `settings` commands.

use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

use scriptlog_core::errors::TransportError;
use scriptlog_core::transport::{Reply, ReplySink};

/// Writes text replies to `out` and copies file replies into `out_dir`.
pub struct ConsoleSink<W> {
    out_dir: PathBuf,
    out: Mutex<W>,
}

impl<W: Write + Send> ConsoleSink<W> {
    pub fn new(out_dir: impl Into<PathBuf>, out: W) -> Self {
        Self {
            out_dir: out_dir.into(),
            out: Mutex::new(out),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_line(&self, line: &str) -> Result<(), TransportError> {
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(out, "{}", line)?;
        Ok(())
    }
}

#[async_trait]
impl<W: Write + Send> ReplySink for ConsoleSink<W> {
    async fn send(&self, reply: Reply<'_>) -> Result<(), TransportError> {
        match reply {
            Reply::Text(text) | Reply::Ephemeral(text) => self.write_line(&text),
            Reply::File {
                message,
                filename,
                path,
            } => {
                // Only the final component, so a configured name cannot escape out_dir.
                let name = std::path::Path::new(&filename)
                    .file_name()
                    .map(|name| name.to_os_string())
                    .ok_or_else(|| TransportError::Delivery(format!("Bad file name '{}'", filename)))?;
                let target = self.out_dir.join(name);
                tokio::fs::create_dir_all(&self.out_dir).await?;
                tokio::fs::copy(path, &target).await?;
                self.write_line(&format!("{}\n{}", message, target.display()))
            }
            Reply::Settings(view) => self.write_line(&view.to_text()),
        }
    }
}
