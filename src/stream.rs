/// Per-RPC streaming coordination between the worker and the transport
use crate::gate::Permit;
use crate::proto::ExecutionLog;
use crate::runner::CancelToken;
use crate::sandbox;
use crate::types::{ExecutionResult, Result as SandboxResult, SandboxError};
use log::{error, info, warn};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tonic::Status;

/// Chunks buffered between the worker and the transport before the
/// producer blocks.
const CHANNEL_CAPACITY: usize = 32;

type ChunkResult = std::result::Result<ExecutionLog, Status>;

/// Response stream for one admitted `Execute` call.
///
/// Owns the worker thread that drives the sandbox pipeline and the
/// bounded handoff that serializes its output chunks onto the client
/// stream: the sink order is the send order, the transport polls one
/// message at a time, and a full queue blocks the producer.
pub struct ExecutionStream {
    chunks: mpsc::Receiver<ChunkResult>,
    worker: Option<JoinHandle<()>>,
    cancel: Arc<CancelToken>,
    _permit: Permit,
}

impl ExecutionStream {
    /// Spawns the worker for one admitted request.
    pub fn spawn(language: String, code: String, permit: Permit) -> Self {
        Self::spawn_job(
            move |sink: &mut dyn FnMut(&[u8], &[u8]), cancel: &CancelToken| {
                sandbox::execute(&language, &code, sink, cancel)
            },
            permit,
        )
    }

    fn spawn_job<F>(job: F, permit: Permit) -> Self
    where
        F: FnOnce(&mut dyn FnMut(&[u8], &[u8]), &CancelToken) -> SandboxResult<ExecutionResult>
            + Send
            + 'static,
    {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let cancel = Arc::new(CancelToken::default());
        let worker_cancel = Arc::clone(&cancel);

        let worker = thread::spawn(move || {
            let chunk_tx = tx.clone();
            let mut client_gone = false;
            let mut sink = move |stdout: &[u8], stderr: &[u8]| {
                if client_gone || (stdout.is_empty() && stderr.is_empty()) {
                    return;
                }
                let chunk = ExecutionLog {
                    stdout_chunk: stdout.to_vec(),
                    stderr_chunk: stderr.to_vec(),
                };
                // A failed send means the client is gone; keep draining
                // the child, stop forwarding.
                if chunk_tx.blocking_send(Ok(chunk)).is_err() {
                    client_gone = true;
                }
            };

            match job(&mut sink, &worker_cancel) {
                Ok(result) if result.success => info!("job completed: exit 0"),
                Ok(result) => info!(
                    "job failed: exit {} ({})",
                    result.exit_code,
                    result.error_message.as_deref().unwrap_or("no detail")
                ),
                Err(err) => {
                    warn!("job rejected: {err}");
                    let _ = tx.blocking_send(Err(terminal_status(&err)));
                }
            }
            // tx drops here; stream exhaustion finalizes the RPC with OK.
        });

        Self {
            chunks: rx,
            worker: Some(worker),
            cancel,
            _permit: permit,
        }
    }
}

fn terminal_status(err: &SandboxError) -> Status {
    match err {
        SandboxError::UnsupportedLanguage(language) => {
            Status::invalid_argument(format!("unsupported language: {language}"))
        }
        SandboxError::Io(_) => Status::internal("sandbox setup failed"),
    }
}

impl Stream for ExecutionStream {
    type Item = ChunkResult;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().chunks.poll_recv(cx)
    }
}

impl Drop for ExecutionStream {
    fn drop(&mut self) {
        // Unblock a producer stuck on a full channel before joining.
        self.chunks.close();
        // Kill the child's process group so an abandoned RPC tears down
        // promptly instead of waiting out the rlimits.
        self.cancel.cancel();
        if let Some(worker) = self.worker.take() {
            // Bounded by the child's CPU limit plus the pipe-drain tail.
            if worker.join().is_err() {
                error!("execution worker panicked");
            }
        }
        // The admission permit drops after this body, once the worker and
        // its child are gone.
    }
}
