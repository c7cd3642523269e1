//! Process-local store backed by maps behind one async lock.
//!
//! Each trait method takes the lock once, so every compound operation
//! (conditional increment, toggle, compare-and-set) is atomic with respect to
//! every other call. Individual tables can be switched to fail with
//! [`StoreError::Unavailable`] to exercise error paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    ConversationStore, DailyAdmission, EventStore, InterestInsert, InterestResolution,
    InterestStore, MatchStore, MessageStore, MonthlyAdmission, PlanDirectory, ReactionStore,
    ReceiptStore, StoreError, StoreResult, UsageStore,
};
use crate::keys;
use crate::models::{
    Conversation, ConversationEvent, DeliveryReceipt, EventId, Interest, InterestStatus, Match,
    Message, Plan, QuotaFeature, Reaction, ToggleOutcome, UsageEvent,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTable {
    Usage,
    Messages,
    Receipts,
    Reactions,
    Events,
    Interests,
    Matches,
    Conversations,
    Plans,
}

#[derive(Default)]
struct MemoryState {
    usage_events: Vec<UsageEvent>,
    monthly: HashMap<(Uuid, QuotaFeature, String), i64>,
    messages: Vec<Message>,
    receipts: HashMap<String, DeliveryReceipt>,
    reactions: HashMap<String, Reaction>,
    events: HashMap<Uuid, Vec<ConversationEvent>>,
    interests: HashMap<Uuid, Interest>,
    matches: HashMap<String, Match>,
    conversations: HashMap<Uuid, Conversation>,
    plans: HashMap<Uuid, Plan>,
    unavailable: HashSet<StoreTable>,
}

impl MemoryState {
    fn check(&self, table: StoreTable) -> StoreResult<()> {
        if self.unavailable.contains(&table) {
            return Err(StoreError::Unavailable(format!("{table:?} store offline")));
        }
        Ok(())
    }

    fn daily_window(
        &self,
        user_id: Uuid,
        feature: QuotaFeature,
        window_start: DateTime<Utc>,
    ) -> (i64, Option<DateTime<Utc>>) {
        let in_window = self
            .usage_events
            .iter()
            .filter(|e| e.user_id == user_id && e.feature == feature && e.timestamp >= window_start);
        let mut count = 0;
        let mut oldest: Option<DateTime<Utc>> = None;
        for event in in_window {
            count += 1;
            oldest = Some(oldest.map_or(event.timestamp, |o| o.min(event.timestamp)));
        }
        (count, oldest)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call touching `table` fail until switched back.
    pub async fn set_unavailable(&self, table: StoreTable, unavailable: bool) {
        let mut state = self.state.lock().await;
        if unavailable {
            state.unavailable.insert(table);
        } else {
            state.unavailable.remove(&table);
        }
    }

    /// Number of recorded usage events for a user and feature.
    pub async fn usage_event_count(&self, user_id: Uuid, feature: QuotaFeature) -> usize {
        let state = self.state.lock().await;
        state
            .usage_events
            .iter()
            .filter(|e| e.user_id == user_id && e.feature == feature)
            .count()
    }
}

#[async_trait]
impl UsageStore for MemoryStore {
    async fn try_increment_monthly(
        &self,
        event: &UsageEvent,
        month: &str,
        limit: i64,
    ) -> StoreResult<MonthlyAdmission> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Usage)?;
        let key = (event.user_id, event.feature, month.to_string());
        let count = state.monthly.get(&key).copied().unwrap_or(0);
        if count >= limit {
            return Ok(MonthlyAdmission::AtLimit { count });
        }
        state.monthly.insert(key, count + 1);
        state.usage_events.push(event.clone());
        Ok(MonthlyAdmission::Admitted { count: count + 1 })
    }

    async fn monthly_count(
        &self,
        user_id: Uuid,
        feature: QuotaFeature,
        month: &str,
    ) -> StoreResult<i64> {
        let state = self.state.lock().await;
        state.check(StoreTable::Usage)?;
        Ok(state
            .monthly
            .get(&(user_id, feature, month.to_string()))
            .copied()
            .unwrap_or(0))
    }

    async fn try_admit_daily(
        &self,
        event: &UsageEvent,
        window_start: DateTime<Utc>,
        limit: i64,
    ) -> StoreResult<DailyAdmission> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Usage)?;
        let (count, oldest) = state.daily_window(event.user_id, event.feature, window_start);
        if count >= limit {
            return Ok(DailyAdmission::AtLimit { count, oldest });
        }
        state.usage_events.push(event.clone());
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
        let state = self.state.lock().await;
        state.check(StoreTable::Usage)?;
        Ok(state.daily_window(user_id, feature, window_start))
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn insert_message(&self, message: &Message) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Messages)?;
        state.messages.push(message.clone());
        Ok(())
    }

    async fn get_message(&self, id: Uuid) -> StoreResult<Option<Message>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Messages)?;
        Ok(state.messages.iter().find(|m| m.id == id).cloned())
    }

    async fn list_messages(
        &self,
        conversation_id: Uuid,
        limit: usize,
        before: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Message>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Messages)?;
        let mut matching: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .filter(|m| before.map_or(true, |b| m.created_at < b))
            .cloned()
            .collect();
        matching.sort_by_key(|m| m.created_at);
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.split_off(skip))
    }

    async fn message_ids(&self, conversation_id: Uuid) -> StoreResult<Vec<Uuid>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Messages)?;
        Ok(state
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .map(|m| m.id)
            .collect())
    }

    async fn mark_read(
        &self,
        conversation_id: Uuid,
        reader_id: Uuid,
        read_at: DateTime<Utc>,
    ) -> StoreResult<Vec<Uuid>> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Messages)?;
        let mut updated = Vec::new();
        for message in state.messages.iter_mut().filter(|m| {
            m.conversation_id == conversation_id && m.to_user_id == reader_id && m.read_at.is_none()
        }) {
            message.read_at = Some(read_at.max(message.created_at));
            updated.push(message.id);
        }
        Ok(updated)
    }
}

#[async_trait]
impl ReceiptStore for MemoryStore {
    async fn upsert_receipt(&self, receipt: &DeliveryReceipt) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Receipts)?;
        match state.receipts.get(&receipt.id) {
            Some(existing) if existing.timestamp > receipt.timestamp => {}
            _ => {
                state.receipts.insert(receipt.id.clone(), receipt.clone());
            }
        }
        Ok(())
    }

    async fn receipts_for_message(&self, message_id: Uuid) -> StoreResult<Vec<DeliveryReceipt>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Receipts)?;
        let mut receipts: Vec<DeliveryReceipt> = state
            .receipts
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect();
        receipts.sort_by_key(|r| r.timestamp);
        Ok(receipts)
    }
}

#[async_trait]
impl ReactionStore for MemoryStore {
    async fn toggle_reaction(&self, reaction: &Reaction) -> StoreResult<ToggleOutcome> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Reactions)?;
        if state.reactions.remove(&reaction.id).is_some() {
            return Ok(ToggleOutcome::Off);
        }
        state.reactions.insert(reaction.id.clone(), reaction.clone());
        Ok(ToggleOutcome::On)
    }

    async fn reactions_for_message(&self, message_id: Uuid) -> StoreResult<Vec<Reaction>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Reactions)?;
        let mut reactions: Vec<Reaction> = state
            .reactions
            .values()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect();
        reactions.sort_by_key(|r| r.created_at);
        Ok(reactions)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, event: &ConversationEvent) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Events)?;
        state
            .events
            .entry(event.conversation_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }

    async fn events_since(
        &self,
        conversation_id: Uuid,
        since: DateTime<Utc>,
        inclusive: bool,
        after_id: Option<&EventId>,
        limit: usize,
    ) -> StoreResult<Vec<ConversationEvent>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Events)?;
        let Some(log) = state.events.get(&conversation_id) else {
            return Ok(Vec::new());
        };
        let mut events: Vec<ConversationEvent> = log
            .iter()
            .filter(|e| match after_id {
                Some(after) => (e.created_at, &e.id) > (since, after),
                None if inclusive => e.created_at >= since,
                None => e.created_at > since,
            })
            .cloned()
            .collect();
        events.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        events.truncate(limit);
        Ok(events)
    }
}

#[async_trait]
impl InterestStore for MemoryStore {
    async fn insert_interest(&self, interest: &Interest) -> StoreResult<InterestInsert> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Interests)?;
        let duplicate = state.interests.values().find(|i| {
            i.status == InterestStatus::Pending
                && i.from_user_id == interest.from_user_id
                && i.to_user_id == interest.to_user_id
        });
        if let Some(existing) = duplicate {
            return Ok(InterestInsert::DuplicatePending(existing.clone()));
        }
        state.interests.insert(interest.id, interest.clone());
        Ok(InterestInsert::Inserted)
    }

    async fn get_interest(&self, id: Uuid) -> StoreResult<Option<Interest>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Interests)?;
        Ok(state.interests.get(&id).cloned())
    }

    async fn pending_between(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> StoreResult<Option<Interest>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Interests)?;
        Ok(state
            .interests
            .values()
            .find(|i| {
                i.status == InterestStatus::Pending
                    && i.from_user_id == from_user_id
                    && i.to_user_id == to_user_id
            })
            .cloned())
    }

    async fn resolve_interest(
        &self,
        id: Uuid,
        status: InterestStatus,
        at: DateTime<Utc>,
    ) -> StoreResult<InterestResolution> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Interests)?;
        let Some(interest) = state.interests.get_mut(&id) else {
            return Ok(InterestResolution::Missing);
        };
        if interest.status.is_terminal() {
            return Ok(InterestResolution::AlreadyResolved(interest.clone()));
        }
        interest.status = status;
        interest.updated_at = at;
        Ok(InterestResolution::Resolved(interest.clone()))
    }

    async fn accepted_without_match(&self, limit: usize) -> StoreResult<Vec<Interest>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Interests)?;
        let mut orphans: Vec<Interest> = state
            .interests
            .values()
            .filter(|i| i.status == InterestStatus::Accepted)
            .filter(|i| {
                !state
                    .matches
                    .contains_key(&keys::match_id(i.from_user_id, i.to_user_id))
            })
            .cloned()
            .collect();
        orphans.sort_by_key(|i| i.updated_at);
        orphans.truncate(limit);
        Ok(orphans)
    }

    async fn expire_pending_before(
        &self,
        cutoff: DateTime<Utc>,
        at: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Interests)?;
        let mut expired = 0;
        for interest in state
            .interests
            .values_mut()
            .filter(|i| i.status == InterestStatus::Pending && i.created_at < cutoff)
        {
            interest.status = InterestStatus::Expired;
            interest.updated_at = at;
            expired += 1;
        }
        Ok(expired)
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn insert_match_if_absent(&self, m: &Match) -> StoreResult<(Match, bool)> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Matches)?;
        if let Some(existing) = state.matches.get(&m.id) {
            return Ok((existing.clone(), false));
        }
        state.matches.insert(m.id.clone(), m.clone());
        Ok((m.clone(), true))
    }

    async fn get_match(&self, id: &str) -> StoreResult<Option<Match>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Matches)?;
        Ok(state.matches.get(id).cloned())
    }

    async fn matches_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Match>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Matches)?;
        let mut matches: Vec<Match> = state
            .matches
            .values()
            .filter(|m| m.user_ids.contains(&user_id))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn upsert_conversation(&self, conversation: &Conversation) -> StoreResult<Conversation> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Conversations)?;
        Ok(state
            .conversations
            .entry(conversation.id)
            .or_insert_with(|| conversation.clone())
            .clone())
    }

    async fn get_conversation(&self, id: Uuid) -> StoreResult<Option<Conversation>> {
        let state = self.state.lock().await;
        state.check(StoreTable::Conversations)?;
        Ok(state.conversations.get(&id).cloned())
    }
}

#[async_trait]
impl PlanDirectory for MemoryStore {
    async fn plan_for(&self, user_id: Uuid) -> StoreResult<Plan> {
        let state = self.state.lock().await;
        state.check(StoreTable::Plans)?;
        Ok(state.plans.get(&user_id).copied().unwrap_or(Plan::Free))
    }

    async fn set_plan(&self, user_id: Uuid, plan: Plan) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        state.check(StoreTable::Plans)?;
        state.plans.insert(user_id, plan);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn reaction(message_id: Uuid, user_id: Uuid, emoji: &str) -> Reaction {
        Reaction {
            id: keys::reaction_id(message_id, user_id, emoji),
            message_id,
            user_id,
            emoji: emoji.to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn toggle_flips_presence() {
        let store = MemoryStore::new();
        let r = reaction(Uuid::new_v4(), Uuid::new_v4(), "👍");
        assert_eq!(store.toggle_reaction(&r).await.unwrap(), ToggleOutcome::On);
        assert_eq!(store.reactions_for_message(r.message_id).await.unwrap().len(), 1);
        assert_eq!(store.toggle_reaction(&r).await.unwrap(), ToggleOutcome::Off);
        assert!(store.reactions_for_message(r.message_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn older_receipt_never_overwrites_newer() {
        let store = MemoryStore::new();
        let message_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let mut receipt = DeliveryReceipt {
            id: keys::receipt_id(message_id, user_id),
            message_id,
            user_id,
            status: crate::models::ReceiptStatus::Read,
            timestamp: now,
        };
        store.upsert_receipt(&receipt).await.unwrap();

        receipt.status = crate::models::ReceiptStatus::Delivered;
        receipt.timestamp = now - Duration::seconds(5);
        store.upsert_receipt(&receipt).await.unwrap();

        let stored = store.receipts_for_message(message_id).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].status, crate::models::ReceiptStatus::Read);
    }

    #[tokio::test]
    async fn monthly_increment_stops_at_limit() {
        let store = MemoryStore::new();
        let event = UsageEvent {
            user_id: Uuid::new_v4(),
            feature: QuotaFeature::MessageSent,
            timestamp: Utc::now(),
        };
        for expected in 1..=2 {
            assert_eq!(
                store.try_increment_monthly(&event, "2026-10", 2).await.unwrap(),
                MonthlyAdmission::Admitted { count: expected }
            );
        }
        assert_eq!(
            store.try_increment_monthly(&event, "2026-10", 2).await.unwrap(),
            MonthlyAdmission::AtLimit { count: 2 }
        );
        assert_eq!(store.usage_event_count(event.user_id, event.feature).await, 2);
    }

    #[tokio::test]
    async fn unavailable_table_fails_only_that_table() {
        let store = MemoryStore::new();
        store.set_unavailable(StoreTable::Receipts, true).await;
        assert!(store.receipts_for_message(Uuid::new_v4()).await.is_err());
        assert!(store.get_message(Uuid::new_v4()).await.is_ok());
        store.set_unavailable(StoreTable::Receipts, false).await;
        assert!(store.receipts_for_message(Uuid::new_v4()).await.is_ok());
    }
}
