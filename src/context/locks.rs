//! Per-conversation write locks
//!
//! Compaction replaces the summary state wholesale, so two concurrent calls
//! for the same conversation would lose one update. Callers that may run
//! compaction concurrently serialize it per conversation through this registry.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of async mutexes keyed by conversation id
#[derive(Debug, Default)]
pub struct ConversationLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `conversation_id`
    pub async fn acquire(&self, conversation_id: &str) -> OwnedMutexGuard<()> {
        // clone out of the map so the shard lock is not held across the await
        let lock = self
            .locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Forget the lock of `conversation_id` if nobody holds or waits on it
    pub fn release(&self, conversation_id: &str) -> bool {
        self.locks
            .remove_if(conversation_id, |_, lock| Arc::strong_count(lock) == 1)
            .is_some()
    }

    /// Number of tracked conversations
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
