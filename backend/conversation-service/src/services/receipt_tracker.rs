use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::error::AppResult;
use crate::keys;
use crate::models::{DeliveryReceipt, ReceiptStatus};
use crate::repository::{MessageStore, ReceiptStore};

/// Latest delivery state per (message, user). Writes are last-write-wins.
pub struct ReceiptTracker {
    receipts: Arc<dyn ReceiptStore>,
    messages: Arc<dyn MessageStore>,
}

impl ReceiptTracker {
    pub fn new(receipts: Arc<dyn ReceiptStore>, messages: Arc<dyn MessageStore>) -> Self {
        Self { receipts, messages }
    }

    /// Upsert the receipt for `(message_id, user_id)`. Returns the receipt id.
    pub async fn record_receipt(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        status: ReceiptStatus,
    ) -> AppResult<String> {
        let receipt = DeliveryReceipt {
            id: keys::receipt_id(message_id, user_id),
            message_id,
            user_id,
            status,
            timestamp: Utc::now(),
        };
        self.receipts.upsert_receipt(&receipt).await?;
        tracing::debug!(
            receipt_id = %receipt.id,
            status = status.as_str(),
            "receipt recorded"
        );
        Ok(receipt.id)
    }

    /// Every receipt on every message in the conversation.
    pub async fn receipts_for_conversation(
        &self,
        conversation_id: Uuid,
    ) -> AppResult<Vec<DeliveryReceipt>> {
        let mut all = Vec::new();
        for message_id in self.messages.message_ids(conversation_id).await? {
            all.extend(self.receipts.receipts_for_message(message_id).await?);
        }
        Ok(all)
    }
}
