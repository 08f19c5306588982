//! Daemon-backed collaborators for the session driver

use minder_api::{Command, Request, ResponsePayload, ResponseResult, UsageSegment};
use minder_budget::UsageSnapshot;
use minder_session::{ExitSender, LedgerClient, SessionError};
use minder_sync::Connection;
use minder_util::{ItemId, ProfileId};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Ledger access over the daemon socket, one short-lived connection per
/// call (the push stream lives on its own connection)
pub struct DaemonLedgerClient {
    socket_path: PathBuf,
    device_token: String,
}

impl DaemonLedgerClient {
    pub fn new(socket_path: impl AsRef<Path>, device_token: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            device_token: device_token.into(),
        }
    }

    async fn authed_connection(&self) -> Result<Connection, SessionError> {
        let mut conn = Connection::connect(&self.socket_path)
            .await
            .map_err(|e| SessionError::LedgerUnavailable(e.to_string()))?;
        conn.hello(&self.device_token)
            .await
            .map_err(|e| SessionError::LedgerUnavailable(e.to_string()))?;
        Ok(conn)
    }
}

#[async_trait::async_trait]
impl LedgerClient for DaemonLedgerClient {
    async fn fetch_snapshot(
        &self,
        profile: &ProfileId,
        item: &ItemId,
    ) -> Result<UsageSnapshot, SessionError> {
        let mut conn = self.authed_connection().await?;
        let response = conn
            .send(Command::GetUsage {
                profile_id: profile.clone(),
                item_id: item.clone(),
            })
            .await
            .map_err(|e| SessionError::LedgerUnavailable(e.to_string()))?;

        match response.result {
            ResponseResult::Ok(ResponsePayload::Usage(snapshot)) => Ok(snapshot),
            ResponseResult::Ok(_) => {
                Err(SessionError::LedgerUnavailable("Unexpected reply".into()))
            }
            ResponseResult::Err(e) => Err(SessionError::LedgerUnavailable(e.message)),
        }
    }

    async fn append_segment(
        &self,
        profile: &ProfileId,
        segment: &UsageSegment,
    ) -> Result<bool, SessionError> {
        let mut conn = self.authed_connection().await?;
        let response = conn
            .send(Command::AppendSegment {
                profile_id: profile.clone(),
                segment: segment.clone(),
            })
            .await
            .map_err(|e| SessionError::LedgerUnavailable(e.to_string()))?;

        match response.result {
            ResponseResult::Ok(ResponsePayload::Appended { recorded }) => Ok(recorded),
            ResponseResult::Ok(_) => {
                Err(SessionError::LedgerUnavailable("Unexpected reply".into()))
            }
            ResponseResult::Err(e) => Err(SessionError::LedgerUnavailable(e.message)),
        }
    }
}

/// Fire-and-forget teardown flush.
///
/// Writes one Hello and one AppendSegment line over a blocking socket and
/// never reads a reply: the process is exiting and must not wait on the
/// daemon. A lost write costs at most one heartbeat interval of usage.
pub struct DaemonExitSender {
    socket_path: PathBuf,
    device_token: String,
}

impl DaemonExitSender {
    pub fn new(socket_path: impl AsRef<Path>, device_token: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            device_token: device_token.into(),
        }
    }

    fn try_send(&self, profile: &ProfileId, segment: &UsageSegment) -> std::io::Result<()> {
        let mut stream = std::os::unix::net::UnixStream::connect(&self.socket_path)?;
        stream.set_write_timeout(Some(Duration::from_secs(2)))?;

        let hello = Request::new(
            1,
            Command::Hello {
                device_token: self.device_token.clone(),
            },
        );
        let append = Request::new(
            2,
            Command::AppendSegment {
                profile_id: profile.clone(),
                segment: segment.clone(),
            },
        );

        let mut payload = serde_json::to_string(&hello).unwrap_or_default();
        payload.push('\n');
        payload.push_str(&serde_json::to_string(&append).unwrap_or_default());
        payload.push('\n');

        stream.write_all(payload.as_bytes())?;
        stream.flush()
    }
}

impl ExitSender for DaemonExitSender {
    fn send_final(&self, profile: &ProfileId, segment: UsageSegment) {
        match self.try_send(profile, &segment) {
            Ok(()) => debug!(secs = segment.duration_seconds, "Final segment sent"),
            Err(e) => warn!(error = %e, "Final segment flush failed"),
        }
    }
}
