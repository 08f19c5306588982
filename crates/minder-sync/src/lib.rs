//! Sync bus transport for minder
//!
//! NDJSON over a Unix domain socket, one duplex connection per surface:
//! - `SyncServer`: accepts connections, routes responses per client, fans
//!   sync frames out to subscribed clients
//! - `Connection` / `FrameStream`: one request/response connection that can
//!   be upgraded into a pure-push frame stream
//! - `SyncClient`: the reconnecting wrapper surfaces run (fixed backoff,
//!   retries forever, disposed flag, credential rejection surfaced)

mod client;
mod server;

pub use client::*;
pub use server::*;

use thiserror::Error;

/// Sync transport errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    /// The daemon refused this device's credential. Terminal: the client
    /// loop never retries past it.
    #[error("Device credential rejected")]
    CredentialRejected,

    #[error("Server error: {0}")]
    ServerError(String),
}

pub type SyncResult<T> = Result<T, SyncError>;
