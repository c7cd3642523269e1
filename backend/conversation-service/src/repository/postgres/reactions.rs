use async_trait::async_trait;
use uuid::Uuid;

use super::{advisory_lock, PgStore};
use crate::models::{Reaction, ToggleOutcome};
use crate::repository::{ReactionStore, StoreResult};

#[async_trait]
impl ReactionStore for PgStore {
    async fn toggle_reaction(&self, reaction: &Reaction) -> StoreResult<ToggleOutcome> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;

        // Two toggles racing on an absent row would both miss the DELETE.
        advisory_lock(&tx, &format!("reaction:{}", reaction.id)).await?;

        let row = tx
            .query_one(
                r#"
                WITH removed AS (
                    DELETE FROM message_reactions WHERE id = $1 RETURNING id
                ), added AS (
                    INSERT INTO message_reactions (id, message_id, user_id, emoji, created_at)
                    SELECT $1, $2::UUID, $3::UUID, $4::TEXT, $5::TIMESTAMPTZ
                    WHERE NOT EXISTS (SELECT 1 FROM removed)
                    ON CONFLICT (id) DO NOTHING
                    RETURNING id
                )
                SELECT EXISTS (SELECT 1 FROM added) AS added
                "#,
                &[
                    &reaction.id,
                    &reaction.message_id,
                    &reaction.user_id,
                    &reaction.emoji,
                    &reaction.created_at,
                ],
            )
            .await?;
        tx.commit().await?;

        let added: bool = row.get("added");
        Ok(if added {
            ToggleOutcome::On
        } else {
            ToggleOutcome::Off
        })
    }

    async fn reactions_for_message(&self, message_id: Uuid) -> StoreResult<Vec<Reaction>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT id, message_id, user_id, emoji, created_at
                FROM message_reactions
                WHERE message_id = $1
                ORDER BY created_at ASC
                "#,
                &[&message_id],
            )
            .await?;
        Ok(rows
            .iter()
            .map(|row| Reaction {
                id: row.get("id"),
                message_id: row.get("message_id"),
                user_id: row.get("user_id"),
                emoji: row.get("emoji"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
