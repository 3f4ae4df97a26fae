//! Runs the engine as a child process against a temporary copy of the code.
//!
//! The child gets the ambient environment plus one `SETTING_*` variable per
//! toggle. On unix it leads its own process group, and the whole group is
//! killed once the engine is done (or out of time), so nothing the script
//! spawned outlives the request or keeps the output pipes open. On expiry
//! nothing the engine printed is returned. The temporary script lives in a
//! [`TempPath`], which removes it on every exit path.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use super::{CodeExecutor, EngineLocator, ExecutionRequest, ExecutionResult};
use crate::errors::ExecutorError;

/// How the engine is invoked: `<engine> <args..> <entry_script> <script>`.
#[derive(Debug, Clone)]
pub struct EngineCommand {
    pub args: Vec<String>,
    pub entry_script: PathBuf,
    pub working_dir: PathBuf,
    pub file_extension: String,
    /// Where temporary scripts are written; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
}

pub struct ProcessExecutor {
    locator: EngineLocator,
    command: EngineCommand,
}

impl ProcessExecutor {
    pub fn new(locator: EngineLocator, command: EngineCommand) -> Self {
        Self { locator, command }
    }

    async fn write_script(&self, code: &str) -> Result<TempPath, ExecutorError> {
        let suffix = format!(".{}", self.command.file_extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("scriptlog-").suffix(&suffix);
        let file = match &self.command.scratch_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ExecutorError::TempFile)?;

        let path = file.into_temp_path();
        tokio::fs::write(&path, code)
            .await
            .map_err(ExecutorError::TempFile)?;
        Ok(path)
    }

    fn build_command(&self, engine: &Path, script: &Path, request: &ExecutionRequest) -> Command {
        let mut cmd = Command::new(engine);
        cmd.args(&self.command.args)
            .arg(&self.command.entry_script)
            .arg(script)
            .current_dir(&self.command.working_dir)
            .envs(request.environment())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        cmd
    }
}

#[async_trait]
impl CodeExecutor for ProcessExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutorError> {
        let engine = self.locator.locate()?;
        let script = self.write_script(&request.code).await?;

        log::info!(
            "Running {} {} {} {}",
            engine.display(),
            self.command.args.join(" "),
            self.command.entry_script.display(),
            script.display()
        );
        log::debug!("Engine toggles: {:?}", request.environment());

        let mut child = self
            .build_command(&engine, &script, request)
            .spawn()
            .map_err(|source| ExecutorError::Spawn {
                program: engine.display().to_string(),
                source,
            })?;

        let pgid = child.id();
        let stdout_pipe = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr_pipe = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;
        let mut stdout_reader = drain(stdout_pipe);
        let mut stderr_reader = drain(stderr_pipe);

        let deadline = tokio::time::Instant::now() + request.timeout;
        let outcome = tokio::time::timeout_at(deadline, child.wait()).await;
        let status = match outcome {
            Ok(status) => {
                // Descendants left behind would hold the pipes open.
                kill_process_group(pgid);
                status?
            }
            Err(_elapsed) => {
                log::warn!(
                    "Script engine exceeded {:?}, killing process group {:?}",
                    request.timeout,
                    pgid
                );
                kill_process_group(pgid);
                if let Err(e) = child.kill().await {
                    log::error!("Failed to kill timed out script engine: {}", e);
                }
                stdout_reader.abort();
                stderr_reader.abort();
                return Ok(ExecutionResult::timed_out());
            }
        };

        let drained = tokio::time::timeout_at(deadline, async {
            let stdout = collect(&mut stdout_reader).await?;
            let stderr = collect(&mut stderr_reader).await?;
            Ok::<_, ExecutorError>((stdout, stderr))
        })
        .await;
        let (stdout, stderr) = match drained {
            Ok(streams) => streams?,
            Err(_elapsed) => {
                log::warn!("Script engine output still open after {:?}", request.timeout);
                stdout_reader.abort();
                stderr_reader.abort();
                return Ok(ExecutionResult::timed_out());
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();
        let exit_code = status.code();

        if !status.success() && stdout.trim().is_empty() {
            return Err(ExecutorError::ProcessFailed {
                exit_code,
                stdout,
                stderr,
            });
        }

        Ok(ExecutionResult {
            stdout,
            stderr,
            exit_code,
            timed_out: false,
        })
    }
}

fn drain<R>(mut pipe: R) -> JoinHandle<std::io::Result<Vec<u8>>>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf).await?;
        Ok(buf)
    })
}

async fn collect(reader: &mut JoinHandle<std::io::Result<Vec<u8>>>) -> Result<Vec<u8>, ExecutorError> {
    reader
        .await
        .map_err(|e| ExecutorError::IoError(std::io::Error::other(e)))?
        .map_err(ExecutorError::IoError)
}

/// SIGKILL to every process in the engine's group. The group may already be
/// empty.
#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pgid) = pgid else { return };
    match killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => log::warn!("Failed to kill process group {}: {}", pgid, e),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

fn missing_pipe(name: &str) -> ExecutorError {
    ExecutorError::IoError(std::io::Error::new(
        std::io::ErrorKind::BrokenPipe,
        format!("script engine {} was not captured", name),
    ))
}
