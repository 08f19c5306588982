//! Sync events pushed from minderd to every connected surface
//!
//! Delivery is at-least-once with no ordering guarantee: duplicates and
//! reordering within a bounded window are normal, so every consumer must
//! merge idempotently. `Refresh` is the only broad invalidation; all other
//! tags are targeted single-entity merges and must never force a full
//! re-fetch.

use chrono::{DateTime, Local};
use minder_util::{ConversationId, DeviceId, MessageId, PostId, ProfileId};
use serde::{Deserialize, Serialize};

use crate::{API_VERSION, UpdateStatus};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub event: SyncEvent,
}

impl Frame {
    pub fn new(event: SyncEvent) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: minder_util::now(),
            event,
        }
    }
}

/// Pin action for bulletin posts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinAction {
    Add,
    Remove,
}

/// All sync event tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Broad invalidation: ledger- or display-affecting state changed and
    /// caches should re-fetch what they show
    Refresh,

    /// A message was delivered to a recipient profile
    NewMessage {
        message_id: MessageId,
        conversation_id: ConversationId,
        recipient_id: ProfileId,
    },

    /// A previously-delivered message was read by its recipient
    MessageRead {
        message_id: MessageId,
        conversation_id: ConversationId,
        recipient_id: ProfileId,
    },

    /// A bulletin post was pinned or unpinned
    BulletinPin { post_id: PostId, action: PinAction },

    /// A kiosk device went online or offline
    KioskStatusChange { device_id: DeviceId, online: bool },

    /// A kiosk device reported its software version
    KioskVersion { device_id: DeviceId, version: String },

    /// A kiosk device's software update progressed
    KioskUpdateStatus {
        device_id: DeviceId,
        status: UpdateStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_serialization() {
        let frame = Frame::new(SyncEvent::KioskStatusChange {
            device_id: DeviceId::new("kiosk-1"),
            online: true,
        });

        let json = serde_json::to_string(&frame).unwrap();
        assert!(json.contains("kiosk_status_change"));

        let parsed: Frame = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.event,
            SyncEvent::KioskStatusChange { online: true, .. }
        ));
    }

    #[test]
    fn tag_names_are_stable() {
        let cases = [
            (SyncEvent::Refresh, "refresh"),
            (
                SyncEvent::BulletinPin {
                    post_id: PostId::new("post-1"),
                    action: PinAction::Add,
                },
                "bulletin_pin",
            ),
            (
                SyncEvent::KioskVersion {
                    device_id: DeviceId::new("kiosk-1"),
                    version: "1.4.0".into(),
                },
                "kiosk_version",
            ),
        ];

        for (event, tag) in cases {
            let json = serde_json::to_string(&event).unwrap();
            assert!(json.contains(tag), "expected {tag} in {json}");
        }
    }

    #[test]
    fn events_roundtrip() {
        let event = SyncEvent::NewMessage {
            message_id: MessageId::new(),
            conversation_id: ConversationId::new("conv-1"),
            recipient_id: ProfileId::new("kid-a"),
        };

        let json = serde_json::to_string(&event).unwrap();
        let parsed: SyncEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
