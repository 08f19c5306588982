//! Shared types for the minderd API

use chrono::{DateTime, Local};
use minder_util::{ClientId, DeviceId, ItemId, ProfileId};
use serde::{Deserialize, Serialize};

/// One contiguous recorded span of usage time.
///
/// Append-only and atomic: segments are never mutated or deleted. Spans
/// shorter than one second are discarded by the ledger, not rounded up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSegment {
    pub item_id: ItemId,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    pub duration_seconds: u64,
}

/// Parent- or challenge-granted extra minutes, additive to the daily budget
/// only (never the weekly ceiling or the daily hard cap).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusGrant {
    pub profile_id: ProfileId,
    pub minutes: u32,
    pub granted_at: DateTime<Local>,
}

/// Software-update state of a kiosk device, as shown on the dashboard
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UpdateStatus {
    Idle,
    Downloading { percent: u8 },
    Installing,
    Failed { message: String },
}

/// One device row in the dashboard's device list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRow {
    pub device_id: DeviceId,
    pub online: bool,
    pub version: Option<String>,
    pub update_status: UpdateStatus,
}

impl DeviceRow {
    pub fn new(device_id: DeviceId) -> Self {
        Self {
            device_id,
            online: false,
            version: None,
            update_status: UpdateStatus::Idle,
        }
    }
}

/// Which kind of surface a credential belongs to, for authorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceRole {
    /// Kid-facing menu bar - reads usage, records segments
    Kiosk,
    /// Locked-down content view - reads usage, records segments
    Content,
    /// Parent dashboard - may also grant bonus time and publish events
    Admin,
}

impl SurfaceRole {
    /// Whether this surface spends budget (appends usage segments)
    pub fn can_record_usage(&self) -> bool {
        matches!(self, SurfaceRole::Kiosk | SurfaceRole::Content)
    }

    pub fn can_grant_bonus(&self) -> bool {
        matches!(self, SurfaceRole::Admin)
    }

    pub fn can_publish(&self) -> bool {
        matches!(self, SurfaceRole::Admin)
    }
}

/// Connection info for an authenticated client (set by the sync layer)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub client_id: ClientId,
    pub device_id: DeviceId,
    pub role: SurfaceRole,
}
