use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::keys;
use crate::models::{now_millis, Conversation};
use crate::repository::ConversationStore;

#[derive(Clone)]
pub struct ConversationService {
    store: Arc<dyn ConversationStore>,
}

impl ConversationService {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    /// Get or create the direct conversation between two users. The id is
    /// derived from the pair, so repeated and concurrent calls converge.
    pub async fn open_direct(&self, a: Uuid, b: Uuid) -> AppResult<Conversation> {
        if a == b {
            return Err(AppError::BadRequest(
                "a conversation needs two distinct participants".into(),
            ));
        }
        let (lo, hi) = keys::ordered_pair(a, b);
        let candidate = Conversation {
            id: keys::direct_conversation_id(lo, hi),
            participant_ids: [lo, hi],
            created_at: now_millis(),
        };
        Ok(self.store.upsert_conversation(&candidate).await?)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<Conversation> {
        self.store
            .get_conversation(id)
            .await?
            .ok_or(AppError::NotFound("conversation"))
    }

    /// Load the conversation and check that `user_id` takes part in it.
    pub async fn require_participant(
        &self,
        conversation_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Conversation> {
        let conversation = self.get(conversation_id).await?;
        if !conversation.is_participant(user_id) {
            tracing::warn!(
                security_event = "conversation_access_denied",
                user_id = %user_id,
                conversation_id = %conversation_id,
                "non-participant attempted conversation access"
            );
            return Err(AppError::Forbidden);
        }
        Ok(conversation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    #[tokio::test]
    async fn open_direct_converges_for_either_order() {
        let service = ConversationService::new(Arc::new(MemoryStore::new()));
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let first = service.open_direct(a, b).await.unwrap();
        let second = service.open_direct(b, a).await.unwrap();
        assert_eq!(first, second);
        assert!(first.participant_ids[0] < first.participant_ids[1]);
    }

    #[tokio::test]
    async fn outsiders_are_forbidden() {
        let service = ConversationService::new(Arc::new(MemoryStore::new()));
        let conversation = service
            .open_direct(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap();
        let err = service
            .require_participant(conversation.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden));

        let err = service
            .require_participant(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound("conversation")));
    }
}
