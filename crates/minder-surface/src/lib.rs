//! Surface-side reconciliation for minder
//!
//! Each surface mirrors a slice of server state in local caches and keeps
//! them consistent from pushed sync events. Every reducer is idempotent:
//! the bus delivers at-least-once with no ordering guarantee, so duplicates
//! and reordering are normal operation, not errors.

mod client;
mod devices;
mod messages;
mod pins;

pub use client::*;
pub use devices::*;
pub use messages::*;
pub use pins::*;

use minder_api::SyncEvent;
use minder_util::ProfileId;
use tracing::debug;

/// Tracks whether a broad `refresh` invalidation is outstanding
#[derive(Debug, Default)]
pub struct RefreshFlag {
    stale: bool,
}

impl RefreshFlag {
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    /// Called after a full re-load of everything the surface shows
    pub fn clear(&mut self) {
        self.stale = false;
    }
}

/// All caches one surface maintains, plus the event dispatcher
#[derive(Debug, Default)]
pub struct SurfaceState {
    /// The signed-in profile, for filtering addressed events
    profile_id: Option<ProfileId>,

    pub devices: DeviceCache,
    pub messages: MessageCache,
    pub pins: PinCache,
    pub refresh: RefreshFlag,
}

impl SurfaceState {
    pub fn new(profile_id: Option<ProfileId>) -> Self {
        Self {
            profile_id,
            ..Default::default()
        }
    }

    /// Route one sync event to its reducer
    pub fn apply(&mut self, event: &SyncEvent) {
        match event {
            SyncEvent::Refresh => {
                debug!("Broad refresh received");
                self.refresh.mark_stale();
            }

            SyncEvent::NewMessage {
                message_id,
                conversation_id,
                recipient_id,
            } => {
                if self.addressed_to_me(recipient_id) {
                    self.messages
                        .on_new_message(message_id.clone(), conversation_id);
                }
            }

            SyncEvent::MessageRead {
                message_id,
                recipient_id,
                ..
            } => {
                if self.addressed_to_me(recipient_id) {
                    self.messages.on_message_read(message_id.clone());
                }
            }

            SyncEvent::BulletinPin { post_id, action } => {
                self.pins.apply(post_id.clone(), *action);
            }

            SyncEvent::KioskStatusChange { device_id, online } => {
                self.devices.set_online(device_id, *online);
            }

            SyncEvent::KioskVersion { device_id, version } => {
                self.devices.set_version(device_id, version.clone());
            }

            SyncEvent::KioskUpdateStatus { device_id, status } => {
                self.devices.set_update_status(device_id, status.clone());
            }
        }
    }

    fn addressed_to_me(&self, recipient: &ProfileId) -> bool {
        // Admin surfaces run without a profile and track everything
        self.profile_id
            .as_ref()
            .map(|p| p == recipient)
            .unwrap_or(true)
    }
}
