use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Message, MessageContent, MessageKind};
use crate::repository::{MessageStore, StoreError, StoreResult};

const MESSAGE_COLUMNS: &str = "id, conversation_id, from_user_id, to_user_id, message_type, \
     text, audio_storage_id, duration_ms, image_storage_id, created_at, read_at";

fn message_from_row(row: &Row) -> StoreResult<Message> {
    let kind: String = row.get("message_type");
    let content = match MessageKind::parse(&kind) {
        Some(MessageKind::Text) => MessageContent::Text {
            text: row.get::<_, Option<String>>("text").unwrap_or_default(),
        },
        Some(MessageKind::Voice) => MessageContent::Voice {
            audio_storage_id: row
                .get::<_, Option<String>>("audio_storage_id")
                .unwrap_or_default(),
            duration_ms: row
                .get::<_, Option<i64>>("duration_ms")
                .and_then(|d| u32::try_from(d).ok()),
        },
        Some(MessageKind::Image) => MessageContent::Image {
            image_storage_id: row
                .get::<_, Option<String>>("image_storage_id")
                .unwrap_or_default(),
            text: row.get("text"),
        },
        None => return Err(StoreError::Corrupt(format!("unknown message_type '{kind}'"))),
    };

    Ok(Message {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        from_user_id: row.get("from_user_id"),
        to_user_id: row.get("to_user_id"),
        content,
        created_at: row.get("created_at"),
        read_at: row.get("read_at"),
    })
}

#[async_trait]
impl MessageStore for PgStore {
    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        let client = self.client().await?;
        let (text, audio, duration, image): (Option<&str>, Option<&str>, Option<i64>, Option<&str>) =
            match &message.content {
                MessageContent::Text { text } => (Some(text.as_str()), None, None, None),
                MessageContent::Voice {
                    audio_storage_id,
                    duration_ms,
                } => (
                    None,
                    Some(audio_storage_id.as_str()),
                    duration_ms.map(i64::from),
                    None,
                ),
                MessageContent::Image {
                    image_storage_id,
                    text,
                } => (text.as_deref(), None, None, Some(image_storage_id.as_str())),
            };

        client
            .execute(
                r#"
                INSERT INTO messages (id, conversation_id, from_user_id, to_user_id, message_type,
                                      text, audio_storage_id, duration_ms, image_storage_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                "#,
                &[
                    &message.id,
                    &message.conversation_id,
                    &message.from_user_id,
                    &message.to_user_id,
                    &message.content.kind().as_str(),
                    &text,
                    &audio,
                    &duration,
                    &image,
                    &message.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let client = self.client().await?;
        let sql = format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1");
        client
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(message_from_row)
            .transpose()
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
        before: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Message>> {
        let client = self.client().await?;
        let limit = limit as i64;
        let sql = format!(
            r#"
            SELECT * FROM (
                SELECT {MESSAGE_COLUMNS}
                FROM messages
                WHERE conversation_id = $1
                  AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
                ORDER BY created_at DESC
                LIMIT $3
            ) recent
            ORDER BY created_at ASC
            "#
        );
        let rows = client
            .query(&sql, &[&conversation_id, &before, &limit])
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    async fn message_ids(&self, conversation_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let client = self.client().await?;
        let rows = client
            .query(
                "SELECT id FROM messages WHERE conversation_id = $1 ORDER BY created_at ASC",
                &[&conversation_id],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                UPDATE messages
                SET read_at = GREATEST($3, created_at)
                WHERE conversation_id = $1
                  AND to_user_id = $2
                  AND read_at IS NULL
                RETURNING id
                "#,
                &[&conversation_id, &reader_id, &read_at],
            )
            .await?;
        Ok(rows.iter().map(|r| r.get("id")).collect())
    }
}
