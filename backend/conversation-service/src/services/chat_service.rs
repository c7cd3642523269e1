//! Request-level orchestration for conversations: participant checks,
//! quota, persistence, event publication, and receipt side effects.

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{
    from_millis, now_millis, ConversationEvent, DeliveryReceipt, EventCursor, EventKind,
    MarkReadOutcome, Message, MessageContent, NewMessage, QuotaDecision, ReceiptStatus,
};
use crate::repository::PlanDirectory;
use crate::services::conversation_service::ConversationService;
use crate::services::event_log::EventLog;
use crate::services::message_service::MessageService;
use crate::services::quota_ledger::QuotaLedger;
use crate::services::receipt_dispatcher::ReceiptDispatcher;
use crate::services::receipt_tracker::ReceiptTracker;
use crate::services::typing_throttle::TypingThrottle;

const MESSAGE_SENT: &str = "message_sent";

#[derive(Debug, Clone)]
pub struct SendMessage {
    pub conversation_id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingState {
    Start,
    Stop,
}

pub struct ChatService {
    pub conversations: ConversationService,
    pub messages: Arc<MessageService>,
    pub events: Arc<EventLog>,
    pub receipts: Arc<ReceiptTracker>,
    quota: Arc<QuotaLedger>,
    plans: Arc<dyn PlanDirectory>,
    dispatcher: ReceiptDispatcher,
    typing: Arc<TypingThrottle>,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        conversations: ConversationService,
        messages: Arc<MessageService>,
        events: Arc<EventLog>,
        receipts: Arc<ReceiptTracker>,
        quota: Arc<QuotaLedger>,
        plans: Arc<dyn PlanDirectory>,
        dispatcher: ReceiptDispatcher,
        typing: Arc<TypingThrottle>,
    ) -> Self {
        Self {
            conversations,
            messages,
            events,
            receipts,
            quota,
            plans,
            dispatcher,
            typing,
        }
    }

    /// Quota check, then store, then publish `message_sent`.
    pub async fn send_message(
        &self,
        caller: Uuid,
        req: SendMessage,
    ) -> AppResult<(Message, QuotaDecision)> {
        if req.from_user_id != caller {
            tracing::warn!(
                security_event = "sender_mismatch",
                user_id = %caller,
                claimed_sender = %req.from_user_id,
                "caller tried to send as another user"
            );
            return Err(AppError::Forbidden);
        }
        req.content.validate().map_err(AppError::BadRequest)?;

        let conversation = self
            .conversations
            .require_participant(req.conversation_id, caller)
            .await?;
        if conversation.peer_of(caller) != Some(req.to_user_id) {
            return Err(AppError::BadRequest(
                "to_user_id must be the other participant".into(),
            ));
        }

        let plan = self.plans.plan_for(caller).await?;
        let decision = self
            .quota
            .check_and_consume(caller, MESSAGE_SENT, plan.as_str())
            .await?;
        if !decision.allowed {
            return Err(AppError::QuotaExceeded {
                feature: MESSAGE_SENT.to_string(),
                decision,
            });
        }

        let message = self
            .messages
            .send(NewMessage {
                conversation_id: req.conversation_id,
                from_user_id: req.from_user_id,
                to_user_id: req.to_user_id,
                content: req.content,
            })
            .await?;
        metrics::record_message_sent(message.content.kind().as_str());

        self.events
            .append_best_effort(
                message.conversation_id,
                Some(caller),
                EventKind::MessageSent {
                    message: message.clone(),
                },
            )
            .await;

        Ok((message, decision))
    }

    /// Page of messages. Unread messages addressed to the caller get a
    /// `delivered` receipt in the background.
    pub async fn list_messages(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        limit: Option<usize>,
        before_ms: Option<i64>,
    ) -> AppResult<Vec<Message>> {
        self.conversations
            .require_participant(conversation_id, caller)
            .await?;
        let before = before_ms
            .map(|ms| {
                from_millis(ms).ok_or_else(|| AppError::BadRequest(format!("invalid cursor {ms}")))
            })
            .transpose()?;

        let messages = self.messages.list(conversation_id, limit, before).await?;
        for m in messages
            .iter()
            .filter(|m| m.to_user_id == caller && m.read_at.is_none())
        {
            self.dispatcher
                .dispatch(m.id, caller, ReceiptStatus::Delivered);
        }
        Ok(messages)
    }

    pub async fn mark_read(&self, caller: Uuid, conversation_id: Uuid) -> AppResult<MarkReadOutcome> {
        self.conversations
            .require_participant(conversation_id, caller)
            .await?;
        let outcome = self.messages.mark_read(conversation_id, caller).await?;

        if let Some(read_at) = outcome.read_at {
            self.events
                .append_best_effort(conversation_id, Some(caller), EventKind::MessageRead { read_at })
                .await;
            for message_id in &outcome.message_ids {
                self.dispatcher
                    .dispatch(*message_id, caller, ReceiptStatus::Read);
            }
        }
        Ok(outcome)
    }

    /// Client-reported receipt for a message in one of the caller's
    /// conversations. A `read` receipt also publishes `message_read`.
    pub async fn record_receipt(
        &self,
        caller: Uuid,
        message_id: Uuid,
        status: ReceiptStatus,
    ) -> AppResult<String> {
        let message = self.messages.get(message_id).await?;
        self.conversations
            .require_participant(message.conversation_id, caller)
            .await?;
        let receipt_id = self.receipts.record_receipt(message_id, caller, status).await?;

        if status == ReceiptStatus::Read {
            self.events
                .append_best_effort(
                    message.conversation_id,
                    Some(caller),
                    EventKind::MessageRead {
                        read_at: now_millis(),
                    },
                )
                .await;
        }
        Ok(receipt_id)
    }

    pub async fn conversation_receipts(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
    ) -> AppResult<Vec<DeliveryReceipt>> {
        self.conversations
            .require_participant(conversation_id, caller)
            .await?;
        self.receipts.receipts_for_conversation(conversation_id).await
    }

    /// Publish a typing event. Starts beyond the per-minute budget are
    /// dropped silently and return `None`.
    pub async fn typing(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        state: TypingState,
    ) -> AppResult<Option<ConversationEvent>> {
        self.conversations
            .require_participant(conversation_id, caller)
            .await?;
        if state == TypingState::Start && !self.typing.allow(caller, conversation_id) {
            tracing::debug!(user_id = %caller, conversation_id = %conversation_id, "typing event throttled");
            return Ok(None);
        }
        let at = now_millis();
        let kind = match state {
            TypingState::Start => EventKind::TypingStart { at },
            TypingState::Stop => EventKind::TypingStop { at },
        };
        Ok(Some(self.events.append(conversation_id, Some(caller), kind).await?))
    }

    pub async fn events_since(
        &self,
        caller: Uuid,
        conversation_id: Uuid,
        cursor: &EventCursor,
        limit: usize,
        wait: Duration,
    ) -> AppResult<Vec<ConversationEvent>> {
        self.conversations
            .require_participant(conversation_id, caller)
            .await?;
        self.events
            .fetch_or_wait(conversation_id, cursor, limit, wait)
            .await
    }

    pub async fn quota_status(&self, caller: Uuid, feature: &str) -> AppResult<QuotaDecision> {
        let plan = self.plans.plan_for(caller).await?;
        Ok(self.quota.peek(caller, feature, plan.as_str()).await?)
    }
}
