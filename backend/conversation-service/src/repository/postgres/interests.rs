use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::Row;
use uuid::Uuid;

use super::PgStore;
use crate::models::{Interest, InterestStatus};
use crate::repository::{InterestInsert, InterestResolution, InterestStore, StoreError, StoreResult};

const INTEREST_COLUMNS: &str = "id, from_user_id, to_user_id, status, created_at, updated_at";

fn interest_from_row(row: &Row) -> StoreResult<Interest> {
    let status: String = row.get("status");
    let status = InterestStatus::parse(&status)
        .ok_or_else(|| StoreError::Corrupt(format!("unknown interest status '{status}'")))?;
    Ok(Interest {
        id: row.get("id"),
        from_user_id: row.get("from_user_id"),
        to_user_id: row.get("to_user_id"),
        status,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait]
impl InterestStore for PgStore {
    async fn insert_interest(&self, interest: &Interest) -> StoreResult<InterestInsert> {
        let client = self.client().await?;
        let inserted = client
            .query_opt(
                r#"
                INSERT INTO interests (id, from_user_id, to_user_id, status, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (from_user_id, to_user_id) WHERE status = 'pending' DO NOTHING
                RETURNING id
                "#,
                &[
                    &interest.id,
                    &interest.from_user_id,
                    &interest.to_user_id,
                    &interest.status.as_str(),
                    &interest.created_at,
                    &interest.updated_at,
                ],
            )
            .await?;
        if inserted.is_some() {
            return Ok(InterestInsert::Inserted);
        }

        match self
            .pending_between(interest.from_user_id, interest.to_user_id)
            .await?
        {
            Some(existing) => Ok(InterestInsert::DuplicatePending(existing)),
            // Resolved between our insert and this read.
            None => Err(StoreError::Unavailable(
                "pending interest changed concurrently".into(),
            )),
        }
    }

    async fn get_interest(&self, id: Uuid) -> StoreResult<Option<Interest>> {
        let client = self.client().await?;
        let sql = format!("SELECT {INTEREST_COLUMNS} FROM interests WHERE id = $1");
        client
            .query_opt(&sql, &[&id])
            .await?
            .as_ref()
            .map(interest_from_row)
            .transpose()
    }

    async fn pending_between(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> StoreResult<Option<Interest>> {
        let client = self.client().await?;
        let sql = format!(
            "SELECT {INTEREST_COLUMNS} FROM interests \
             WHERE from_user_id = $1 AND to_user_id = $2 AND status = 'pending'"
        );
        client
            .query_opt(&sql, &[&from_user_id, &to_user_id])
            .await?
            .as_ref()
            .map(interest_from_row)
            .transpose()
    }

    async fn resolve_interest(
        &self,
        id: Uuid,
        status: InterestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<InterestResolution> {
        let client = self.client().await?;
        let sql = format!(
            r#"
            UPDATE interests
            SET status = $2, updated_at = $3
            WHERE id = $1 AND status = 'pending'
            RETURNING {INTEREST_COLUMNS}
            "#
        );
        if let Some(row) = client.query_opt(&sql, &[&id, &status.as_str(), &at]).await? {
            return Ok(InterestResolution::Resolved(interest_from_row(&row)?));
        }

        Ok(match self.get_interest(id).await? {
            Some(current) => InterestResolution::AlreadyResolved(current),
            None => InterestResolution::Missing,
        })
    }

    async fn accepted_without_match(&self, limit: usize) -> StoreResult<Vec<Interest>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT i.id, i.from_user_id, i.to_user_id, i.status, i.created_at, i.updated_at
                FROM interests i
                LEFT JOIN matches m
                  ON m.id = LEAST(i.from_user_id, i.to_user_id)::TEXT || '_' ||
                            GREATEST(i.from_user_id, i.to_user_id)::TEXT
                WHERE i.status = 'accepted' AND m.id IS NULL
                ORDER BY i.updated_at ASC
                LIMIT $1
                "#,
                &[&(limit as i64)],
            )
            .await?;
        rows.iter().map(interest_from_row).collect()
    }

    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let client = self.client().await?;
        let expired = client
            .execute(
                r#"
                UPDATE interests
                SET status = 'expired', updated_at = $2
                WHERE status = 'pending' AND created_at < $1
                "#,
                &[&cutoff, &at],
            )
            .await?;
        Ok(expired)
    }
}
