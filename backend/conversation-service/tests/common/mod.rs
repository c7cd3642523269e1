#![allow(dead_code)]

use std::sync::Arc;

use chrono::Duration;
use conversation_service::{
    config::Config,
    middleware::auth::issue_token,
    models::{Conversation, MessageContent},
    repository::{MemoryStore, Stores},
    services::{chat_service::SendMessage, receipt_dispatcher::FailureSink},
    state::AppState,
};
use uuid::Uuid;

pub const JWT_SECRET: &str = "integration-test-secret-0123456789";

pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

/// In-memory service graph. Call from inside a Tokio runtime.
pub fn context() -> TestContext {
    context_with_receipt_sink(None)
}

pub fn context_with_receipt_sink(sink: Option<FailureSink>) -> TestContext {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::build_with_receipt_sink(
        Arc::new(Config::in_memory(JWT_SECRET)),
        Stores::from_memory(store.clone()),
        sink,
    );
    TestContext { store, state }
}

pub fn bearer(user_id: Uuid) -> (&'static str, String) {
    let token = issue_token(user_id, JWT_SECRET, Duration::hours(1)).expect("issue token");
    ("Authorization", format!("Bearer {token}"))
}

pub async fn open_conversation(state: &AppState, a: Uuid, b: Uuid) -> Conversation {
    state
        .chat
        .conversations
        .open_direct(a, b)
        .await
        .expect("open conversation")
}

pub fn text(conversation: &Conversation, from: Uuid, to: Uuid, body: &str) -> SendMessage {
    SendMessage {
        conversation_id: conversation.id,
        from_user_id: from,
        to_user_id: to,
        content: MessageContent::Text { text: body.into() },
    }
}
