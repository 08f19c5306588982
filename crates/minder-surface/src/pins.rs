//! Bulletin pin cache

use minder_api::PinAction;
use minder_util::PostId;
use std::collections::HashSet;

/// Set of pinned bulletin posts. Set semantics make the reducer naturally
/// idempotent under duplicate delivery.
#[derive(Debug, Default)]
pub struct PinCache {
    pinned: HashSet<PostId>,
}

impl PinCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cache contents from a full fetch
    pub fn load(&mut self, pinned: impl IntoIterator<Item = PostId>) {
        self.pinned = pinned.into_iter().collect();
    }

    pub fn apply(&mut self, post_id: PostId, action: PinAction) {
        match action {
            PinAction::Add => {
                self.pinned.insert(post_id);
            }
            PinAction::Remove => {
                self.pinned.remove(&post_id);
            }
        }
    }

    pub fn is_pinned(&self, post_id: &PostId) -> bool {
        self.pinned.contains(post_id)
    }

    pub fn len(&self) -> usize {
        self.pinned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty()
    }
}
