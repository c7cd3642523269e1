use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::keys;
use crate::models::reaction::MAX_EMOJI_BYTES;
use crate::models::{now_millis, EventKind, Reaction, ToggleOutcome};
use crate::repository::ReactionStore;
use crate::services::conversation_service::ConversationService;
use crate::services::event_log::EventLog;
use crate::services::message_service::MessageService;

pub struct ReactionTracker {
    store: Arc<dyn ReactionStore>,
    messages: Arc<MessageService>,
    conversations: ConversationService,
    events: Arc<EventLog>,
}

impl ReactionTracker {
    pub fn new(
        store: Arc<dyn ReactionStore>,
        messages: Arc<MessageService>,
        conversations: ConversationService,
        events: Arc<EventLog>,
    ) -> Self {
        Self {
            store,
            messages,
            conversations,
            events,
        }
    }

    /// Add the reaction if absent, remove it if present, then publish the
    /// matching event.
    pub async fn toggle(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        emoji: &str,
    ) -> AppResult<ToggleOutcome> {
        let emoji = emoji.trim();
        if emoji.is_empty() || emoji.len() > MAX_EMOJI_BYTES {
            return Err(AppError::BadRequest("Invalid emoji".into()));
        }

        let message = self.messages.get(message_id).await?;
        self.conversations
            .require_participant(message.conversation_id, user_id)
            .await?;

        let reaction = Reaction {
            id: keys::reaction_id(message_id, user_id, emoji),
            message_id,
            user_id,
            emoji: emoji.to_string(),
            created_at: now_millis(),
        };
        let outcome = self.store.toggle_reaction(&reaction).await?;

        let kind = match outcome {
            ToggleOutcome::On => EventKind::ReactionAdded {
                message_id,
                emoji: reaction.emoji,
            },
            ToggleOutcome::Off => EventKind::ReactionRemoved {
                message_id,
                emoji: reaction.emoji,
            },
        };
        self.events
            .append_best_effort(message.conversation_id, Some(user_id), kind)
            .await;

        Ok(outcome)
    }

    pub async fn reactions_for_message(
        &self,
        message_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Vec<Reaction>> {
        let message = self.messages.get(message_id).await?;
        self.conversations
            .require_participant(message.conversation_id, user_id)
            .await?;
        Ok(self.store.reactions_for_message(message_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MessageContent, NewMessage};
    use crate::realtime::EventNotifier;
    use crate::repository::memory::StoreTable;
    use crate::repository::{EventStore, MemoryStore};

    struct Fixture {
        store: Arc<MemoryStore>,
        tracker: ReactionTracker,
        conversation_id: Uuid,
        message_id: Uuid,
        alice: Uuid,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let conversations = ConversationService::new(store.clone());
        let messages = Arc::new(MessageService::new(store.clone()));
        let events = Arc::new(EventLog::new(store.clone(), EventNotifier::new(), 100));

        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let conversation = conversations.open_direct(alice, bob).await.unwrap();
        let message = messages
            .send(NewMessage {
                conversation_id: conversation.id,
                from_user_id: alice,
                to_user_id: bob,
                content: MessageContent::Text { text: "hi".into() },
            })
            .await
            .unwrap();

        Fixture {
            tracker: ReactionTracker::new(store.clone(), messages, conversations, events),
            store,
            conversation_id: conversation.id,
            message_id: message.id,
            alice,
        }
    }

    #[tokio::test]
    async fn double_toggle_leaves_no_reaction() {
        let f = fixture().await;
        assert_eq!(
            f.tracker.toggle(f.message_id, f.alice, "❤️").await.unwrap(),
            ToggleOutcome::On
        );
        assert_eq!(
            f.tracker.toggle(f.message_id, f.alice, "❤️").await.unwrap(),
            ToggleOutcome::Off
        );
        assert!(f
            .tracker
            .reactions_for_message(f.message_id, f.alice)
            .await
            .unwrap()
            .is_empty());

        let events = f
            .store
            .events_since(f.conversation_id, crate::models::from_millis(0).unwrap(), true, None, 10)
            .await
            .unwrap();
        let types: Vec<_> = events.iter().map(|e| e.kind.type_name()).collect();
        assert_eq!(types, vec!["reaction_added", "reaction_removed"]);
    }

    #[tokio::test]
    async fn missing_message_is_not_found_without_side_effects() {
        let f = fixture().await;
        let missing = Uuid::new_v4();
        assert!(matches!(
            f.tracker.toggle(missing, f.alice, "👍").await,
            Err(AppError::NotFound("message"))
        ));
        let events = f
            .store
            .events_since(f.conversation_id, crate::models::from_millis(0).unwrap(), true, None, 10)
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn outsiders_cannot_react() {
        let f = fixture().await;
        assert!(matches!(
            f.tracker.toggle(f.message_id, Uuid::new_v4(), "👍").await,
            Err(AppError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn blank_emoji_is_rejected() {
        let f = fixture().await;
        assert!(matches!(
            f.tracker.toggle(f.message_id, f.alice, "   ").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn event_failure_does_not_undo_toggle() {
        let f = fixture().await;
        f.store.set_unavailable(StoreTable::Events, true).await;
        assert_eq!(
            f.tracker.toggle(f.message_id, f.alice, "🔥").await.unwrap(),
            ToggleOutcome::On
        );
        f.store.set_unavailable(StoreTable::Events, false).await;
        assert_eq!(
            f.tracker
                .reactions_for_message(f.message_id, f.alice)
                .await
                .unwrap()
                .len(),
            1
        );
    }
}
