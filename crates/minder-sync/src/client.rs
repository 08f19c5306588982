//! Sync bus client side
//!
//! `Connection` is one plain request/response connection. `SyncClient` is
//! the reconnecting wrapper surfaces actually run: connect, Hello,
//! handler-driven initial reads, Subscribe, then a pure-push event loop.
//! Every transport failure is retried after a fixed delay, forever, until
//! the client is disposed. A rejected credential is the one terminal error:
//! retrying it cannot help, so it is surfaced to the owning flow instead.

use minder_api::{Command, ErrorCode, Frame, Request, Response, ResponsePayload, ResponseResult, SurfaceRole};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::{SyncError, SyncResult};

/// Fixed delay between reconnect attempts
pub const RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// One connection to the daemon
pub struct Connection {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
    writer: tokio::net::unix::OwnedWriteHalf,
    next_request_id: u64,
}

impl Connection {
    pub async fn connect(socket_path: impl AsRef<Path>) -> SyncResult<Self> {
        let stream = UnixStream::connect(socket_path).await?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            next_request_id: 1,
        })
    }

    /// Send a command and wait for its response
    pub async fn send(&mut self, command: Command) -> SyncResult<Response> {
        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let request = Request::new(request_id, command);
        let mut json = serde_json::to_string(&request)?;
        json.push('\n');

        self.writer.write_all(json.as_bytes()).await?;

        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(SyncError::ConnectionClosed);
        }

        let response: Response = serde_json::from_str(line.trim())?;
        Ok(response)
    }

    /// Authenticate with a device credential
    pub async fn hello(&mut self, device_token: &str) -> SyncResult<SurfaceRole> {
        let response = self
            .send(Command::Hello {
                device_token: device_token.to_string(),
            })
            .await?;

        match response.result {
            ResponseResult::Ok(ResponsePayload::Authenticated { role }) => Ok(role),
            ResponseResult::Ok(_) => Err(SyncError::ServerError("Unexpected Hello reply".into())),
            ResponseResult::Err(e) if e.code == ErrorCode::CredentialRejected => {
                Err(SyncError::CredentialRejected)
            }
            ResponseResult::Err(e) => Err(SyncError::ServerError(e.message)),
        }
    }

    /// Subscribe to sync frames and consume this connection into a pure-push
    /// stream
    pub async fn subscribe(mut self) -> SyncResult<FrameStream> {
        let response = self.send(Command::Subscribe).await?;

        match response.result {
            ResponseResult::Ok(_) => {}
            ResponseResult::Err(e) => {
                return Err(SyncError::ServerError(e.message));
            }
        }

        Ok(FrameStream {
            reader: self.reader,
        })
    }
}

/// Stream of frames from the daemon
pub struct FrameStream {
    reader: BufReader<tokio::net::unix::OwnedReadHalf>,
}

impl FrameStream {
    /// Wait for the next frame
    pub async fn next(&mut self) -> SyncResult<Frame> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).await?;
        if n == 0 {
            return Err(SyncError::ConnectionClosed);
        }

        let frame: Frame = serde_json::from_str(line.trim())?;
        Ok(frame)
    }
}

/// Consumer of a reconnecting client
#[async_trait::async_trait]
pub trait FrameHandler: Send + Sync {
    /// Called after every successful Hello, before Subscribe. Events may
    /// have been missed while disconnected, so implementations re-fetch the
    /// state they mirror here.
    async fn on_connected(&self, conn: &mut Connection) -> SyncResult<()>;

    /// Called for every received frame
    async fn on_frame(&self, frame: Frame);

    /// Called when the connection drops (before the retry delay)
    fn on_disconnected(&self) {}
}

/// Handle used to stop a running `SyncClient` from another task
#[derive(Clone)]
pub struct DisposeHandle(Arc<AtomicBool>);

impl DisposeHandle {
    pub fn dispose(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Reconnecting sync client
pub struct SyncClient {
    socket_path: PathBuf,
    device_token: String,
    disposed: Arc<AtomicBool>,
}

impl SyncClient {
    pub fn new(socket_path: impl AsRef<Path>, device_token: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            device_token: device_token.into(),
            disposed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn dispose_handle(&self) -> DisposeHandle {
        DisposeHandle(self.disposed.clone())
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Run until disposed. Returns early only on credential rejection.
    pub async fn run(&self, handler: Arc<dyn FrameHandler>) -> SyncResult<()> {
        loop {
            if self.is_disposed() {
                debug!("Sync client disposed");
                return Ok(());
            }

            match self.connect_once(handler.as_ref()).await {
                Ok(()) => return Ok(()),
                Err(SyncError::CredentialRejected) => {
                    warn!("Device credential rejected; giving up");
                    return Err(SyncError::CredentialRejected);
                }
                Err(e) => {
                    debug!(error = %e, "Sync connection lost");
                    handler.on_disconnected();
                }
            }

            if self.is_disposed() {
                return Ok(());
            }
            sleep(RECONNECT_DELAY).await;
        }
    }

    async fn connect_once(&self, handler: &dyn FrameHandler) -> SyncResult<()> {
        let mut conn = Connection::connect(&self.socket_path).await?;
        conn.hello(&self.device_token).await?;

        info!(path = %self.socket_path.display(), "Sync connection established");
        handler.on_connected(&mut conn).await?;

        let mut frames = conn.subscribe().await?;

        loop {
            if self.is_disposed() {
                return Ok(());
            }

            let frame = frames.next().await?;
            handler.on_frame(frame).await;
        }
    }
}
