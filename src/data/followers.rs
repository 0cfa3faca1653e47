//! Follower registry
//!
//! Volatile, bidirectional mapping between a follower's inbox URI and the id
//! of the Follow activity that admitted it. Cleared on restart.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bimap::BiHashMap;

use crate::metrics::FOLLOWERS_TOTAL;

/// Accepted followers, keyed by inbox and by Follow activity id.
///
/// Every operation takes the lock once and never awaits while holding it,
/// so concurrent handlers never observe half of an update.
#[derive(Debug, Default)]
pub struct FollowerRegistry {
    /// inbox URI <-> Follow activity id
    entries: Mutex<BiHashMap<String, String>>,
}

impl FollowerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BiHashMap<String, String>> {
        // Pairs are inserted and removed whole, a poisoned map is still consistent.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `inbox` as admitted by `follow_id`, replacing any earlier
    /// pair that used either value.
    pub fn add(&self, inbox: impl Into<String>, follow_id: impl Into<String>) {
        let mut entries = self.lock();
        entries.insert(inbox.into(), follow_id.into());
        FOLLOWERS_TOTAL.set(entries.len() as i64);
    }

    /// Remove the follower with this inbox.
    ///
    /// Returns the Follow activity id it was registered with, or `None`
    /// if the inbox was not a follower.
    pub fn remove_by_inbox(&self, inbox: &str) -> Option<String> {
        let mut entries = self.lock();
        let removed = entries.remove_by_left(inbox).map(|(_, follow_id)| follow_id);
        FOLLOWERS_TOTAL.set(entries.len() as i64);
        removed
    }

    /// Remove the follower admitted by `follow_id`.
    ///
    /// Returns the removed inbox; unknown ids are logged and ignored.
    pub fn remove_by_follow_id(&self, follow_id: &str) -> Option<String> {
        let mut entries = self.lock();
        let removed = entries.remove_by_right(follow_id).map(|(inbox, _)| inbox);
        FOLLOWERS_TOTAL.set(entries.len() as i64);
        drop(entries);

        if removed.is_none() {
            tracing::info!(follow_id, "No follower registered for Follow activity, ignoring");
        }
        removed
    }

    pub fn contains(&self, inbox: &str) -> bool {
        self.lock().contains_left(inbox)
    }

    /// Follow activity id currently associated with `inbox`.
    pub fn follow_id(&self, inbox: &str) -> Option<String> {
        self.lock().get_by_left(inbox).cloned()
    }

    /// Point-in-time copy of the follower inboxes, sorted.
    pub fn snapshot(&self) -> Vec<String> {
        let mut inboxes: Vec<String> = self.lock().left_values().cloned().collect();
        inboxes.sort();
        inboxes
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
