use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{advisory_lock, PgStore};
use crate::models::{QuotaFeature, UsageEvent};
use crate::repository::{DailyAdmission, MonthlyAdmission, StoreResult, UsageStore};

#[async_trait]
impl UsageStore for PgStore {
    async fn try_increment_monthly(
        &self,
        event: &UsageEvent,
        month: &str,
        limit: i64,
    ) -> StoreResult<MonthlyAdmission> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        let feature = event.feature.as_str();

        // The conflict branch only fires while the counter is below the limit,
        // so concurrent callers can never push it past `limit`.
        let admitted = tx
            .query_opt(
                r#"
                INSERT INTO monthly_usage_counters (user_id, feature, month, count)
                SELECT $1::UUID, $2::TEXT, $3::TEXT, 1
                WHERE $4::BIGINT > 0
                ON CONFLICT (user_id, feature, month)
                DO UPDATE SET count = monthly_usage_counters.count + 1
                WHERE monthly_usage_counters.count < $4::BIGINT
                RETURNING count
                "#,
                &[&event.user_id, &feature, &month, &limit],
            )
            .await?;

        let outcome = match admitted {
            Some(row) => {
                tx.execute(
                    "INSERT INTO usage_events (user_id, feature, occurred_at) VALUES ($1, $2, $3)",
                    &[&event.user_id, &feature, &event.timestamp],
                )
                .await?;
                MonthlyAdmission::Admitted {
                    count: row.get("count"),
                }
            }
            None => {
                let count = tx
                    .query_opt(
                        "SELECT count FROM monthly_usage_counters WHERE user_id = $1 AND feature = $2 AND month = $3",
                        &[&event.user_id, &feature, &month],
                    )
                    .await?
                    .map(|row| row.get::<_, i64>("count"))
                    .unwrap_or(0);
                MonthlyAdmission::AtLimit { count }
            }
        };

        tx.commit().await?;
        Ok(outcome)
    }

    async fn monthly_count(
        &self,
        user_id: Uuid,
        feature: QuotaFeature,
        month: &str,
    ) -> StoreResult<i64> {
        let client = self.client().await?;
        let row = client
            .query_opt(
                "SELECT count FROM monthly_usage_counters WHERE user_id = $1 AND feature = $2 AND month = $3",
                &[&user_id, &feature.as_str(), &month],
            )
            .await?;
        Ok(row.map(|r| r.get::<_, i64>("count")).unwrap_or(0))
    }

    async fn try_admit_daily(
        &self,
        event: &UsageEvent,
        window_start: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<DailyAdmission> {
        let mut client = self.client().await?;
        let tx = client.transaction().await?;
        let feature = event.feature.as_str();

        advisory_lock(&tx, &format!("usage:{}:{}", event.user_id, feature)).await?;

        let row = tx
            .query_one(
                r#"
                SELECT COUNT(*) AS count, MIN(occurred_at) AS oldest
                FROM usage_events
                WHERE user_id = $1 AND feature = $2 AND occurred_at >= $3
                "#,
                &[&event.user_id, &feature, &window_start],
            )
            .await?;
        let count: i64 = row.get("count");
        let oldest: Option<DateTime<Utc>> = row.get("oldest");

        if count >= limit {
            tx.commit().await?;
            return Ok(DailyAdmission::AtLimit { count, oldest });
        }

        tx.execute(
            "INSERT INTO usage_events (user_id, feature, occurred_at) VALUES ($1, $2, $3)",
            &[&event.user_id, &feature, &event.timestamp],
        )
        .await?;
        tx.commit().await?;

        Ok(DailyAdmission::Admitted {
            count: count + 1,
            oldest: oldest.map_or(event.timestamp, |o| o.min(event.timestamp)),
        })
    }

    async fn daily_usage(
        &self,
        user_id: Uuid,
        feature: QuotaFeature,
        window_start: DateTime<Utc>,
    ) -> StoreResult<(i64, Option<DateTime<Utc>>)> {
        let client = self.client().await?;
        let row = client
            .query_one(
                r#"
                SELECT COUNT(*) AS count, MIN(occurred_at) AS oldest
                FROM usage_events
                WHERE user_id = $1 AND feature = $2 AND occurred_at >= $3
                "#,
                &[&user_id, &feature.as_str(), &window_start],
            )
            .await?;
        Ok((row.get("count"), row.get("oldest")))
    }
}
