use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{DeliveryReceipt, ReceiptStatus};
use crate::repository::{ReceiptStore, StoreError, StoreResult};

#[async_trait]
impl ReceiptStore for PgStore {
    async fn upsert_receipt(&self, receipt: &DeliveryReceipt) -> StoreResult<()> {
        let client = self.client().await?;
        client
            .execute(
                r#"
                INSERT INTO message_receipts (id, message_id, user_id, status, recorded_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE
                SET status = EXCLUDED.status, recorded_at = EXCLUDED.recorded_at
                WHERE message_receipts.recorded_at <= EXCLUDED.recorded_at
                "#,
                &[
                    &receipt.id,
                    &receipt.message_id,
                    &receipt.user_id,
                    &receipt.status.as_str(),
                    &receipt.timestamp,
                ],
            )
            .await?;
        Ok(())
    }

    async fn receipts_for_message(&self, message_id: Uuid) -> StoreResult<Vec<DeliveryReceipt>> {
        let client = self.client().await?;
        let rows = client
            .query(
                r#"
                SELECT id, message_id, user_id, status, recorded_at
                FROM message_receipts
                WHERE message_id = $1
                ORDER BY recorded_at ASC
                "#,
                &[&message_id],
            )
            .await?;

        rows.iter()
            .map(|row| {
                let status: String = row.get("status");
                let status = ReceiptStatus::parse(&status)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown receipt status '{status}'")))?;
                Ok(DeliveryReceipt {
                    id: row.get("id"),
                    message_id: row.get("message_id"),
                    user_id: row.get("user_id"),
                    status,
                    timestamp: row.get("recorded_at"),
                })
            })
            .collect()
    }
}
