use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{from_millis, ConversationEvent, EventCursor, EventKind};
use crate::realtime::EventNotifier;
use crate::repository::EventStore;

/// Append-only per-conversation event log with change notification.
pub struct EventLog {
    store: Arc<dyn EventStore>,
    notifier: EventNotifier,
    max_batch: usize,
}

impl EventLog {
    pub fn new(store: Arc<dyn EventStore>, notifier: EventNotifier, max_batch: usize) -> Self {
        Self {
            store,
            notifier,
            max_batch: max_batch.max(1),
        }
    }

    pub fn notifier(&self) -> &EventNotifier {
        &self.notifier
    }

    pub fn max_batch(&self) -> usize {
        self.max_batch
    }

    pub async fn append(
        &self,
        conversation_id: Uuid,
        user_id: Option<Uuid>,
        kind: EventKind,
    ) -> AppResult<ConversationEvent> {
        let event = ConversationEvent::new(conversation_id, user_id, kind);
        self.store.append_event(&event).await?;

        metrics::record_event_appended(event.kind.type_name());
        tracing::debug!(
            conversation_id = %conversation_id,
            event_id = %event.id,
            event_type = event.kind.type_name(),
            "event appended"
        );

        self.notifier.notify(conversation_id).await;
        Ok(event)
    }

    /// Append after a primary write that has already committed. A failure is
    /// logged and counted but not returned, since the caller cannot undo the
    /// primary write.
    pub async fn append_best_effort(
        &self,
        conversation_id: Uuid,
        user_id: Option<Uuid>,
        kind: EventKind,
    ) -> Option<ConversationEvent> {
        let event_type = kind.type_name();
        match self.append(conversation_id, user_id, kind).await {
            Ok(event) => Some(event),
            Err(e) => {
                metrics::record_event_append_failure(event_type);
                tracing::error!(
                    conversation_id = %conversation_id,
                    event_type = event_type,
                    error = %e,
                    "failed to append conversation event"
                );
                None
            }
        }
    }

    /// Events past `cursor`, oldest first.
    pub async fn fetch_since(
        &self,
        conversation_id: Uuid,
        cursor: &EventCursor,
        limit: usize,
    ) -> AppResult<Vec<ConversationEvent>> {
        let since = from_millis(cursor.since_ms)
            .ok_or_else(|| AppError::BadRequest(format!("invalid cursor {}", cursor.since_ms)))?;
        let limit = limit.clamp(1, self.max_batch);
        Ok(self
            .store
            .events_since(
                conversation_id,
                since,
                cursor.inclusive,
                cursor.after_id.as_ref(),
                limit,
            )
            .await?)
    }

    /// Like [`fetch_since`](Self::fetch_since), but when nothing is pending,
    /// block up to `wait` for the next append and fetch once more.
    pub async fn fetch_or_wait(
        &self,
        conversation_id: Uuid,
        cursor: &EventCursor,
        limit: usize,
        wait: Duration,
    ) -> AppResult<Vec<ConversationEvent>> {
        // Subscribe before reading so an append between the read and the
        // wait still wakes us.
        let mut changes = self.notifier.subscribe(conversation_id).await;

        let events = self.fetch_since(conversation_id, cursor, limit).await?;
        if !events.is_empty() || wait.is_zero() {
            return Ok(events);
        }

        match tokio::time::timeout(wait, changes.changed()).await {
            Ok(_) => self.fetch_since(conversation_id, cursor, limit).await,
            Err(_) => Ok(Vec::new()),
        }
    }
}
