use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, RwLock};
use uuid::Uuid;

pub mod subscription;

pub use subscription::EventSubscription;

/// Wakes waiters when a conversation's event log grows.
///
/// Carries no payload: a waiter that wakes re-reads the log from its own
/// cursor, so a missed or coalesced notification never loses events.
#[derive(Default, Clone)]
pub struct EventNotifier {
    // conversation_id -> append counter
    inner: Arc<RwLock<HashMap<Uuid, watch::Sender<u64>>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a conversation. Changes after this call are
    /// observable through `changed()` on the returned receiver.
    ///
    /// Entries whose waiters have all gone away are dropped on the way in.
    pub async fn subscribe(&self, conversation_id: Uuid) -> watch::Receiver<u64> {
        let mut guard = self.inner.write().await;
        guard.retain(|id, sender| *id == conversation_id || sender.receiver_count() > 0);
        guard
            .entry(conversation_id)
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    /// Drop every entry without a live waiter. Returns how many were removed.
    pub async fn prune_idle(&self) -> usize {
        let mut guard = self.inner.write().await;
        let before = guard.len();
        guard.retain(|_, sender| sender.receiver_count() > 0);
        before - guard.len()
    }

    /// Number of conversations currently tracked.
    pub async fn tracked(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Signal an append. Entries without live receivers are dropped.
    pub async fn notify(&self, conversation_id: Uuid) {
        let mut guard = self.inner.write().await;
        let Some(sender) = guard.get(&conversation_id) else {
            return;
        };

        if sender.receiver_count() == 0 {
            guard.remove(&conversation_id);
            tracing::debug!(
                "Removed idle conversation {} from event notifier",
                conversation_id
            );
            return;
        }

        sender.send_modify(|seq| *seq = seq.wrapping_add(1));
    }

    /// Number of live waiters for a conversation.
    pub async fn watcher_count(&self, conversation_id: Uuid) -> usize {
        let guard = self.inner.read().await;
        guard
            .get(&conversation_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
