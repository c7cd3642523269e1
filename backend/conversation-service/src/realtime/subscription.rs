use std::time::Duration;

use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{ConversationEvent, EventCursor};
use crate::services::event_log::EventLog;

/// Cursor over one conversation's event log.
///
/// The first fetch is inclusive of the starting timestamp so an event stamped
/// in the same millisecond the subscriber connected is not skipped. Once a
/// batch has been delivered the cursor is pinned to the last event's
/// `(created_at, id)` and later fetches resume strictly after it.
#[derive(Debug, Clone)]
pub struct EventSubscription {
    conversation_id: Uuid,
    cursor: EventCursor,
    batch_size: usize,
}

impl EventSubscription {
    pub fn open(conversation_id: Uuid, since_ms: i64, batch_size: usize) -> Self {
        Self {
            conversation_id,
            cursor: EventCursor::at(since_ms, true),
            batch_size,
        }
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn cursor(&self) -> &EventCursor {
        &self.cursor
    }

    /// Next batch, waiting up to `idle` for an append when nothing is pending.
    /// Returns an empty batch when the wait times out.
    pub async fn next_batch(
        &mut self,
        log: &EventLog,
        idle: Duration,
    ) -> AppResult<Vec<ConversationEvent>> {
        let events = log
            .fetch_or_wait(self.conversation_id, &self.cursor, self.batch_size, idle)
            .await?;
        self.advance(&events);
        Ok(events)
    }

    fn advance(&mut self, events: &[ConversationEvent]) {
        if let Some(last) = events.last() {
            self.cursor = EventCursor::after(last);
        }
    }
}
