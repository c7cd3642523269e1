use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

use super::PgStore;
use crate::models::{ConversationEvent, EventId, EventKind};
use crate::repository::{EventStore, StoreError, StoreResult};

fn event_from_row(row: &Row) -> StoreResult<ConversationEvent> {
    let payload: serde_json::Value = row.get("payload");
    let kind: EventKind = serde_json::from_value(payload)
        .map_err(|e| StoreError::Corrupt(format!("event payload: {e}")))?;
    Ok(ConversationEvent {
        id: EventId::from_raw(row.get::<_, String>("id")),
        conversation_id: row.get("conversation_id"),
        created_at: row.get("created_at"),
        user_id: row.get("user_id"),
        kind,
    })
}

#[async_trait]
impl EventStore for PgStore {
    async fn append_event(&self, event: &ConversationEvent) -> StoreResult<()> {
        let payload = serde_json::to_value(&event.kind)
            .map_err(|e| StoreError::Corrupt(format!("event payload: {e}")))?;
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO conversation_events (id, conversation_id, event_type, user_id, payload, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
                &[
                    &event.id.as_str(),
                    &event.conversation_id,
                    &event.kind.type_name(),
                    &event.user_id,
                    &payload,
                    &event.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn events_since(
        &self,
        conversation_id: Uuid,
        since: DateTime<Utc>,
        inclusive: bool,
        after_id: Option<&EventId>,
        limit: usize,
    ) -> StoreResult<Vec<ConversationEvent>> {
        let client = self.client().await?;
        let rows = match after_id {
            Some(after) => {
                client
                    .query(
                        r#"
                        SELECT id, conversation_id, user_id, payload, created_at
                        FROM conversation_events
                        WHERE conversation_id = $1 AND (created_at, id) > ($2::TIMESTAMPTZ, $3::TEXT)
                        ORDER BY created_at ASC, id ASC
                        LIMIT $4
                        "#,
                        &[&conversation_id, &since, &after.as_str(), &(limit as i64)],
                    )
                    .await?
            }
            None => {
                let comparison = if inclusive { ">=" } else { ">" };
                let sql = format!(
                    r#"
                    SELECT id, conversation_id, user_id, payload, created_at
                    FROM conversation_events
                    WHERE conversation_id = $1 AND created_at {comparison} $2
                    ORDER BY created_at ASC, id ASC
                    LIMIT $3
                    "#
                );
                client
                    .query(&sql, &[&conversation_id, &since, &(limit as i64)])
                    .await?
            }
        };
        rows.iter().map(event_from_row).collect()
    }
}
