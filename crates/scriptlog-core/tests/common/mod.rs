#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use scriptlog_core::errors::ExecutorError;
use scriptlog_core::executors::{CodeExecutor, ExecutionRequest, ExecutionResult};
use scriptlog_core::output::OutputRouter;
use scriptlog_core::pipeline::ScriptPipeline;
use scriptlog_core::settings::SettingsStore;
use scriptlog_core::source::{HttpFetcher, SourceResolver};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Serves fixed script bodies under `/files/<name>`; anything else is a 404.
pub struct MockFileServer {
    addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl MockFileServer {
    pub async fn start(files: &[(&str, &str)]) -> Self {
        let files: Arc<HashMap<String, String>> = Arc::new(
            files
                .iter()
                .map(|(name, body)| (name.to_string(), body.to_string()))
                .collect(),
        );

        let app = Router::new().route(
            "/files/{name}",
            get(move |Path(name): Path<String>| {
                let files = files.clone();
                async move {
                    match files.get(&name) {
                        Some(body) => Ok(body.clone()),
                        None => Err(StatusCode::NOT_FOUND),
                    }
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock file server");
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap_or_else(|e| log::error!("Mock file server error: {}", e));
        });

        Self { addr, shutdown_tx }
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/files/{}", self.addr, name)
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Records every request and answers with a canned result.
pub struct RecordingExecutor {
    pub requests: Mutex<Vec<ExecutionRequest>>,
    respond: Box<dyn Fn(&ExecutionRequest) -> Result<ExecutionResult, ExecutorError> + Send + Sync>,
}

impl RecordingExecutor {
    pub fn new<F>(respond: F) -> Arc<Self>
    where
        F: Fn(&ExecutionRequest) -> Result<ExecutionResult, ExecutorError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            respond: Box::new(respond),
        })
    }

    /// Echoes the code back on stdout.
    pub fn echo() -> Arc<Self> {
        Self::new(|request| Ok(stdout(&request.code)))
    }

    pub fn calls(&self) -> Vec<ExecutionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeExecutor for RecordingExecutor {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult, ExecutorError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.respond)(request)
    }
}

pub fn stdout(text: &str) -> ExecutionResult {
    ExecutionResult {
        stdout: text.to_string(),
        stderr: String::new(),
        exit_code: Some(0),
        timed_out: false,
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store: Arc<SettingsStore>,
    pub pipeline: ScriptPipeline,
}

pub async fn harness(executor: Arc<dyn CodeExecutor>, router: OutputRouter) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(
        SettingsStore::open(dir.path().join("bot_settings.json"))
            .await
            .unwrap(),
    );
    let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(5), 64 * 1024).unwrap());
    let pipeline = ScriptPipeline::new(
        store.clone(),
        SourceResolver::new(fetcher),
        executor,
        router,
        Duration::from_secs(30),
    );
    Harness {
        dir,
        store,
        pipeline,
    }
}

/// Answers one request with a `Transfer-Encoding: chunked` body and no
/// Content-Length, streaming `chunks` chunks of `chunk_size` bytes until the
/// client hangs up. The task resolves to the number of body bytes written.
pub struct ChunkedServer {
    addr: SocketAddr,
    task: tokio::task::JoinHandle<usize>,
}

impl ChunkedServer {
    pub async fn start(chunk_size: usize, chunks: usize) -> Self {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind chunked server");
        let addr = listener.local_addr().unwrap();

        let task = tokio::spawn(async move {
            let (mut socket, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => return 0,
            };

            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => return 0,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }

            let head = "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nTransfer-Encoding: chunked\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return 0;
            }

            let chunk = vec![b'-'; chunk_size];
            let mut written = 0;
            for _ in 0..chunks {
                let frame_head = format!("{:x}\r\n", chunk_size);
                let sent = async {
                    socket.write_all(frame_head.as_bytes()).await?;
                    socket.write_all(&chunk).await?;
                    socket.write_all(b"\r\n").await
                }
                .await;
                if sent.is_err() {
                    return written;
                }
                written += chunk_size;
            }
            let _ = socket.write_all(b"0\r\n\r\n").await;
            written
        });

        Self { addr, task }
    }

    pub fn url(&self) -> String {
        format!("http://{}/big.lua", self.addr)
    }

    pub async fn bytes_written(self) -> usize {
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("chunked server did not notice the hang-up")
            .unwrap()
    }
}
