use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{now_millis, MarkReadOutcome, Message, NewMessage};
use crate::repository::MessageStore;

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

pub struct MessageService {
    store: Arc<dyn MessageStore>,
}

impl MessageService {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Persist a message with a fresh id and timestamp.
    pub async fn send(&self, new: NewMessage) -> AppResult<Message> {
        new.content.validate().map_err(AppError::BadRequest)?;
        let message = Message::from_new(new, now_millis());
        self.store.insert_message(&message).await?;
        tracing::info!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            message_type = message.content.kind().as_str(),
            "message stored"
        );
        Ok(message)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Message> {
        self.store
            .get_message(id)
            .await?
            .ok_or(AppError::NotFound("message"))
    }

    /// Newest page of messages, oldest first. `limit` is clamped to `1..=200`.
    pub async fn list(
        &self,
        conversation_id: Uuid,
        limit: Option<usize>,
        before: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<Message>> {
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        Ok(self
            .store
            .list_messages(conversation_id, limit, before)
            .await?)
    }

    pub async fn message_ids(&self, conversation_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(self.store.message_ids(conversation_id).await?)
    }

    /// Mark every unread message addressed to `reader_id` as read.
    /// Repeating the call updates nothing.
    pub async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> AppResult<MarkReadOutcome> {
        let read_at = now_millis();
        let message_ids = self
            .store
            .mark_read(conversation_id, reader_id, read_at)
            .await?;
        Ok(MarkReadOutcome {
            updated: message_ids.len(),
            read_at: (!message_ids.is_empty()).then_some(read_at),
            message_ids,
        })
    }
}
