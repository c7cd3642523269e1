use async_trait::async_trait;
use tokio_postgres::Row;
use uuid::Uuid;

use super::PgStore;
use crate::models::Conversation;
use crate::repository::{ConversationStore, StoreError, StoreResult};

fn conversation_from_row(row: &Row) -> Conversation {
    Conversation {
        id: row.get("id"),
        participant_ids: [row.get("user_a"), row.get("user_b")],
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl ConversationStore for PgStore {
    async fn upsert_conversation(&self, conversation: &Conversation) -> StoreResult<Conversation> {
        let client = self.client().await?;
        let [user_a, user_b] = conversation.participant_ids;
        client
            .execute(
                r#"
                INSERT INTO conversations (id, user_a, user_b, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
                &[&conversation.id, &user_a, &user_b, &conversation.created_at],
            )
            .await?;

        let row = client
            .query_opt(
                "SELECT id, user_a, user_b, created_at FROM conversations WHERE id = $1",
                &[&conversation.id],
            )
            .await?
            .ok_or_else(|| StoreError::Unavailable("conversation vanished after upsert".into()))?;
        Ok(conversation_from_row(&row))
    }

    async fn get_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, user_a, user_b, created_at FROM conversations WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(conversation_from_row))
    }
}
