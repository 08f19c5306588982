//! Device list cache for the admin dashboard

use minder_api::{DeviceRow, UpdateStatus};
use minder_util::DeviceId;
use std::collections::HashMap;
use tracing::debug;

/// Cache of kiosk device rows, merged from targeted sync events.
///
/// Events address exactly one row. Events for devices the cache has not
/// loaded yet are dropped: the row (with its current status) arrives with
/// the next full fetch anyway, and inventing half-filled rows from events
/// would let duplicates resurrect deleted devices.
#[derive(Debug, Default)]
pub struct DeviceCache {
    rows: HashMap<DeviceId, DeviceRow>,
}

impl DeviceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache contents from a full fetch
    pub fn load(&mut self, rows: Vec<DeviceRow>) {
        self.rows = rows.into_iter().map(|r| (r.device_id.clone(), r)).collect();
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<&DeviceRow> {
        self.rows.get(device_id)
    }

    pub fn rows(&self) -> impl Iterator<Item = &DeviceRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn set_online(&mut self, device_id: &DeviceId, online: bool) {
        match self.rows.get_mut(device_id) {
            Some(row) => row.online = online,
            None => debug!(device_id = %device_id, "Status event for unknown device ignored"),
        }
    }

    pub fn set_version(&mut self, device_id: &DeviceId, version: String) {
        match self.rows.get_mut(device_id) {
            Some(row) => row.version = Some(version),
            None => debug!(device_id = %device_id, "Version event for unknown device ignored"),
        }
    }

    pub fn set_update_status(&mut self, device_id: &DeviceId, status: UpdateStatus) {
        match self.rows.get_mut(device_id) {
            Some(row) => row.update_status = status,
            None => debug!(device_id = %device_id, "Update event for unknown device ignored"),
        }
    }
}
