//! Unread message counter cache
//!
//! Sync delivery is at-least-once and unordered, so this reducer dedupes by
//! message id. Ids are remembered in bounded sliding windows; the windows
//! only need to cover the reorder horizon of the bus, not all history.

use minder_util::{ConversationId, MessageId};
use std::collections::{HashSet, VecDeque};

/// How many recent message ids each window remembers
const ID_WINDOW: usize = 256;

/// Insertion-ordered id set with a bounded memory
#[derive(Debug, Default)]
struct IdWindow {
    order: VecDeque<MessageId>,
    ids: HashSet<MessageId>,
}

impl IdWindow {
    fn insert(&mut self, id: MessageId) -> bool {
        if !self.ids.insert(id.clone()) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > ID_WINDOW
            && let Some(evicted) = self.order.pop_front()
        {
            self.ids.remove(&evicted);
        }
        true
    }

    fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }
}

/// Reducer over new/read message events
#[derive(Debug, Default)]
pub struct MessageCache {
    unread: u64,
    open_conversation: Option<ConversationId>,
    counted: IdWindow,
    read: IdWindow,
    pending_notifications: Vec<MessageId>,
}

impl MessageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the unread count from a full fetch
    pub fn load(&mut self, unread: u64) {
        self.unread = unread;
    }

    pub fn unread(&self) -> u64 {
        self.unread
    }

    /// Mark a conversation as open on this surface. New-message events for
    /// it still count as unread but raise no notification; the user is
    /// already looking at it.
    pub fn set_open_conversation(&mut self, conversation: Option<ConversationId>) {
        self.open_conversation = conversation;
    }

    /// Drain notifications raised since the last call
    pub fn take_notifications(&mut self) -> Vec<MessageId> {
        std::mem::take(&mut self.pending_notifications)
    }

    pub fn on_new_message(&mut self, message_id: MessageId, conversation_id: &ConversationId) {
        if !self.counted.insert(message_id.clone()) {
            // Duplicate delivery
            return;
        }

        // The read event may have arrived first; the pair cancels out
        if self.read.contains(&message_id) {
            return;
        }

        self.unread += 1;

        if self.open_conversation.as_ref() != Some(conversation_id) {
            self.pending_notifications.push(message_id);
        }
    }

    pub fn on_message_read(&mut self, message_id: MessageId) {
        if !self.read.insert(message_id.clone()) {
            return;
        }

        if self.counted.contains(&message_id) {
            self.unread = self.unread.saturating_sub(1);
        }
        // Not counted yet: the matching new_message is either still in
        // flight (it will see the read window) or outside our windows, in
        // which case the next full fetch reconciles
    }
}
