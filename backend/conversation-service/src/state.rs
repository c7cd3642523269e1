use std::sync::Arc;

use crate::config::Config;
use crate::realtime::EventNotifier;
use crate::repository::Stores;
use crate::services::{
    chat_service::ChatService,
    conversation_service::ConversationService,
    event_log::EventLog,
    interest_service::InterestService,
    match_engine::MatchEngine,
    message_service::MessageService,
    quota_ledger::QuotaLedger,
    reaction_tracker::ReactionTracker,
    receipt_dispatcher::{FailureSink, ReceiptDispatcher},
    receipt_tracker::ReceiptTracker,
    typing_throttle::TypingThrottle,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub chat: Arc<ChatService>,
    pub reactions: Arc<ReactionTracker>,
    pub interests: Arc<InterestService>,
    pub typing: Arc<TypingThrottle>,
}

impl AppState {
    /// Wire services over `stores`. Spawns the receipt worker, so this must
    /// run inside a Tokio runtime. The worker exits once every dispatcher
    /// clone is dropped.
    pub fn build(config: Arc<Config>, stores: Stores) -> Self {
        Self::build_with_receipt_sink(config, stores, None)
    }

    pub fn build_with_receipt_sink(
        config: Arc<Config>,
        stores: Stores,
        receipt_failures: Option<FailureSink>,
    ) -> Self {
        let notifier = EventNotifier::new();
        let events = Arc::new(EventLog::new(
            stores.events.clone(),
            notifier,
            config.events.max_batch,
        ));
        let conversations = ConversationService::new(stores.conversations.clone());
        let messages = Arc::new(MessageService::new(stores.messages.clone()));
        let quota = Arc::new(QuotaLedger::new(stores.usage.clone()));
        let receipts = Arc::new(ReceiptTracker::new(
            stores.receipts.clone(),
            stores.messages.clone(),
        ));
        let (dispatcher, _receipt_worker) = ReceiptDispatcher::spawn(
            receipts.clone(),
            config.receipt_queue_capacity,
            receipt_failures,
        );
        let typing = Arc::new(TypingThrottle::new(config.typing_events_per_minute));

        let chat = Arc::new(ChatService::new(
            conversations.clone(),
            messages.clone(),
            events.clone(),
            receipts,
            quota.clone(),
            stores.plans.clone(),
            dispatcher,
            typing.clone(),
        ));
        let reactions = Arc::new(ReactionTracker::new(
            stores.reactions.clone(),
            messages,
            conversations.clone(),
            events,
        ));
        let interests = Arc::new(InterestService::new(
            stores.interests.clone(),
            stores.plans.clone(),
            quota,
            MatchEngine::new(stores.matches.clone()),
            conversations,
        ));

        Self {
            config,
            stores,
            chat,
            reactions,
            interests,
            typing,
        }
    }
}
