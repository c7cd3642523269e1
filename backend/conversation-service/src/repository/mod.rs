//! Persistence seams.
//!
//! Every store is a trait with a Postgres implementation ([`postgres::PgStore`])
//! and a process-local one ([`memory::MemoryStore`]). The atomic primitives the
//! services rely on (conditional increment, toggle, insert-if-absent,
//! compare-and-set) live behind these traits so both backends honour them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Conversation, ConversationEvent, DeliveryReceipt, EventId, Interest, InterestStatus, Match,
    Message, Plan, QuotaFeature, Reaction, ToggleOutcome, UsageEvent,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Connectivity or timeout failure. Safe to retry.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded.
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional monthly increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonthlyAdmission {
    Admitted { count: i64 },
    AtLimit { count: i64 },
}

/// Result of a serialized rolling-window admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DailyAdmission {
    /// `oldest` is the earliest event still inside the window, the new one included
    Admitted { count: i64, oldest: DateTime<Utc> },
    AtLimit { count: i64, oldest: Option<DateTime<Utc>> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterestInsert {
    Inserted,
    /// A pending interest already exists for the same direction
    DuplicatePending(Interest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InterestResolution {
    Resolved(Interest),
    /// Status was already terminal; carries the current record
    AlreadyResolved(Interest),
    Missing,
}

#[async_trait]
pub trait UsageStore: Send + Sync {
    /// Increment the month counter only while it is below `limit`, recording
    /// `event` in the same unit of work when admitted.
    async fn try_increment_monthly(
        &self,
        event: &UsageEvent,
        month: &str,
        limit: i64,
    ) -> StoreResult<MonthlyAdmission>;

    async fn monthly_count(&self, user_id: Uuid, feature: QuotaFeature, month: &str)
        -> StoreResult<i64>;

    /// Count events since `window_start` and insert `event` if the count is
    /// below `limit`, serialized per (user, feature).
    async fn try_admit_daily(
        &self,
        event: &UsageEvent,
        window_start: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<DailyAdmission>;

    /// Count and oldest timestamp of events since `window_start`.
    async fn daily_usage(
        &self,
        user_id: Uuid,
        feature: QuotaFeature,
        window_start: DateTime<Utc>,
    ) -> StoreResult<(i64, Option<DateTime<Utc>>)>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert_message(&self, message: &Message) -> StoreResult<()>;

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>>;

    /// Newest `limit` messages created before `before`, returned oldest first.
    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
        before: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Message>>;

    async fn message_ids(&self, conversation_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Stamp `read_at` on every unread message addressed to `reader_id`.
    /// Returns the ids actually updated.
    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>>;
}

#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Insert or overwrite by receipt id. An older timestamp never replaces a newer one.
    async fn upsert_receipt(&self, receipt: &DeliveryReceipt) -> StoreResult<()>;

    async fn receipts_for_message(&self, message_id: Uuid) -> StoreResult<Vec<DeliveryReceipt>>;
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    /// Delete the reaction if present, insert it otherwise, as one atomic step.
    async fn toggle_reaction(&self, reaction: &Reaction) -> StoreResult<ToggleOutcome>;

    async fn reactions_for_message(&self, message_id: Uuid) -> StoreResult<Vec<Reaction>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_event(&self, event: &ConversationEvent) -> StoreResult<()>;

    /// Events ordered by `(created_at, id)` ascending.
    ///
    /// With `after_id` the page starts strictly after the key
    /// `(since, after_id)` and `inclusive` is ignored. Without it the page
    /// starts strictly after `since`, or at it when `inclusive`.
    async fn events_since(
        &self,
        conversation_id: Uuid,
        since: DateTime<Utc>,
        inclusive: bool,
        after_id: Option<&EventId>,
        limit: usize,
    ) -> StoreResult<Vec<ConversationEvent>>;
}

#[async_trait]
pub trait InterestStore: Send + Sync {
    async fn insert_interest(&self, interest: &Interest) -> StoreResult<InterestInsert>;

    async fn get_interest(&self, id: Uuid) -> StoreResult<Option<Interest>>;

    async fn pending_between(&self, from_user_id: Uuid, to_user_id: Uuid)
        -> StoreResult<Option<Interest>>;

    /// Move a pending interest to `status`. Only the first resolution wins.
    async fn resolve_interest(
        &self,
        id: Uuid,
        status: InterestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<InterestResolution>;

    /// Accepted interests whose pair has no match record.
    async fn accepted_without_match(&self, limit: usize) -> StoreResult<Vec<Interest>>;

    /// Expire pending interests created before `cutoff`. Returns the count.
    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StoreResult<u64>;
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Insert unless a match with the same id exists. Returns the stored
    /// record and whether this call created it.
    async fn insert_match_if_absent(&self, m: &Match) -> StoreResult<(Match, bool)>;

    async fn get_match(&self, id: &str) -> StoreResult<Option<Match>>;

    async fn matches_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Match>>;
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Insert unless present; returns whichever record is stored.
    async fn upsert_conversation(&self, conversation: &Conversation) -> StoreResult<Conversation>;

    async fn get_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>>;
}

#[async_trait]
pub trait PlanDirectory: Send + Sync {
    /// Plan for a user; users with no record are on the free plan.
    async fn plan_for(&self, user_id: Uuid) -> StoreResult<Plan>;

    async fn set_plan(&self, user_id: Uuid, plan: Plan) -> StoreResult<()>;
}

/// One handle per store trait, shared across services.
#[derive(Clone)]
pub struct Stores {
    pub usage: Arc<dyn UsageStore>,
    pub messages: Arc<dyn MessageStore>,
    pub receipts: Arc<dyn ReceiptStore>,
    pub reactions: Arc<dyn ReactionStore>,
    pub events: Arc<dyn EventStore>,
    pub interests: Arc<dyn InterestStore>,
    pub matches: Arc<dyn MatchStore>,
    pub conversations: Arc<dyn ConversationStore>,
    pub plans: Arc<dyn PlanDirectory>,
}

impl Stores {
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            usage: store.clone(),
            messages: store.clone(),
            receipts: store.clone(),
            reactions: store.clone(),
            events: store.clone(),
            interests: store.clone(),
            matches: store.clone(),
            conversations: store.clone(),
            plans: store,
        }
    }

    pub fn from_postgres(store: Arc<PgStore>) -> Self {
        Self {
            usage: store.clone(),
            messages: store.clone(),
            receipts: store.clone(),
            reactions: store.clone(),
            events: store.clone(),
            interests: store.clone(),
            matches: store.clone(),
            conversations: store.clone(),
            plans: store,
        }
    }
}
