//! Command types for the minderd protocol

use minder_budget::UsageSnapshot;
use minder_util::{ClientId, ItemId, ProfileId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, SurfaceRole, SyncEvent, UsageSegment};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    /// Device credential unknown or revoked. Never retried automatically;
    /// surfaced to the owning flow (the pairing screen).
    CredentialRejected,
    ProfileNotFound,
    ItemNotFound,
    PermissionDenied,
    RateLimited,
    LedgerError,
    InternalError,
}

/// All possible commands from surfaces.
///
/// Everything except `Hello` requires an authenticated connection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Authenticate this connection with a per-device credential
    Hello { device_token: String },

    /// Read the usage snapshot for one (profile, item) pair
    GetUsage {
        profile_id: ProfileId,
        item_id: ItemId,
    },

    /// Append one usage segment (append-only, duplicate-tolerant)
    AppendSegment {
        profile_id: ProfileId,
        segment: UsageSegment,
    },

    /// Grant bonus minutes to a profile (admin only)
    GrantBonus { profile_id: ProfileId, minutes: u32 },

    /// Broadcast a targeted sync event on behalf of an admin-side write
    /// (admin only)
    Publish { event: SyncEvent },

    /// Subscribe to sync events (returns immediately, frames stream
    /// separately)
    Subscribe,

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Authenticated { role: SurfaceRole },
    Usage(UsageSnapshot),
    /// `recorded = false` means the segment was discarded (sub-second) or
    /// was a duplicate; both are defined outcomes, not errors.
    Appended { recorded: bool },
    Granted,
    Published,
    Subscribed { client_id: ClientId },
    Pong,
}
