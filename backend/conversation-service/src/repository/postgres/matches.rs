use async_trait::async_trait;
use tokio_postgres::Row;
use uuid::Uuid;

use super::PgStore;
use crate::models::Match;
use crate::repository::{MatchStore, StoreError, StoreResult};

fn match_from_row(row: &Row) -> Match {
    Match {
        id: row.get("id"),
        user_ids: [row.get("user_a"), row.get("user_b")],
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl MatchStore for PgStore {
    async fn insert_match_if_absent(&self, m: &Match) -> StoreResult<(Match, bool)> {
        let client = self.client().await?;
        let inserted = client
            .query_opt(
                r#"
                INSERT INTO matches (id, user_a, user_b, created_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                RETURNING id, user_a, user_b, created_at
                "#,
                &[&m.id, &m.user_ids[0], &m.user_ids[1], &m.created_at],
            )
            .await?;
        if let Some(row) = inserted {
            return Ok((match_from_row(&row), true));
        }

        let existing = self.get_match(&m.id).await?.ok_or_else(|| {
            StoreError::Unavailable(format!("match {} conflicted but is not readable", m.id))
        })?;
        Ok((existing, false))
    }

    async fn get_match(&self, id: &str) -> StoreResult<Option<Match>> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT id, user_a, user_b, created_at FROM matches WHERE id = $1",
                &[&id],
            )
            .await?;
        Ok(row.as_ref().map(match_from_row))
    }

    async fn matches_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Match>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT id, user_a, user_b, created_at
                FROM matches
                WHERE user_a = $1 OR user_b = $1
                ORDER BY created_at DESC
                "#,
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(match_from_row).collect())
    }
}
