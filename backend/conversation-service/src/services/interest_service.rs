use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{now_millis, Interest, InterestStatus, Match, QuotaDecision};
use crate::repository::{InterestInsert, InterestResolution, InterestStore, PlanDirectory};
use crate::services::conversation_service::ConversationService;
use crate::services::match_engine::MatchEngine;
use crate::services::quota_ledger::QuotaLedger;

const INTEREST_SENT: &str = "interest_sent";

/// Interest lifecycle: send, respond once, expire. Acceptance drives the
/// match engine.
pub struct InterestService {
    store: Arc<dyn InterestStore>,
    plans: Arc<dyn PlanDirectory>,
    quota: Arc<QuotaLedger>,
    matches: MatchEngine,
    conversations: ConversationService,
}

impl InterestService {
    pub fn new(
        store: Arc<dyn InterestStore>,
        plans: Arc<dyn PlanDirectory>,
        quota: Arc<QuotaLedger>,
        matches: MatchEngine,
        conversations: ConversationService,
    ) -> Self {
        Self {
            store,
            plans,
            quota,
            matches,
            conversations,
        }
    }

    pub fn matches(&self) -> &MatchEngine {
        &self.matches
    }

    pub async fn send_interest(
        &self,
        from_user_id: Uuid,
        to_user_id: Uuid,
    ) -> AppResult<(Interest, QuotaDecision)> {
        if from_user_id == to_user_id {
            return Err(AppError::BadRequest("cannot send interest to yourself".into()));
        }
        if self
            .store
            .pending_between(from_user_id, to_user_id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("interest already pending".into()));
        }

        let plan = self.plans.plan_for(from_user_id).await?;
        let decision = self
            .quota
            .check_and_consume(from_user_id, INTEREST_SENT, plan.as_str())
            .await?;
        if !decision.allowed {
            return Err(AppError::QuotaExceeded {
                feature: INTEREST_SENT.to_string(),
                decision,
            });
        }

        let interest = Interest::pending(from_user_id, to_user_id, now_millis());
        match self.store.insert_interest(&interest).await? {
            InterestInsert::Inserted => {
                tracing::info!(interest_id = %interest.id, "interest sent");
                Ok((interest, decision))
            }
            InterestInsert::DuplicatePending(existing) => Err(AppError::Conflict(format!(
                "interest {} already pending",
                existing.id
            ))),
        }
    }

    /// Visible to sender and recipient only.
    pub async fn get_interest(&self, caller: Uuid, id: Uuid) -> AppResult<Interest> {
        let interest = self
            .store
            .get_interest(id)
            .await?
            .ok_or(AppError::NotFound("interest"))?;
        if !interest.involves(caller) {
            return Err(AppError::Forbidden);
        }
        Ok(interest)
    }

    /// Accept or reject a pending interest. Only the recipient may respond,
    /// and only the first response takes effect; later ones are conflicts.
    ///
    /// A match failure after acceptance is logged and counted, never
    /// returned: the acceptance itself has already been recorded and the
    /// reconciliation job repairs the missing match.
    pub async fn respond(
        &self,
        caller: Uuid,
        interest_id: Uuid,
        status: &str,
    ) -> AppResult<Interest> {
        let status = match InterestStatus::parse(status) {
            Some(s @ (InterestStatus::Accepted | InterestStatus::Rejected)) => s,
            _ => {
                return Err(AppError::BadRequest(
                    "status must be 'accepted' or 'rejected'".into(),
                ))
            }
        };

        let interest = self
            .store
            .get_interest(interest_id)
            .await?
            .ok_or(AppError::NotFound("interest"))?;
        if interest.to_user_id != caller {
            tracing::warn!(
                security_event = "interest_respond_denied",
                user_id = %caller,
                interest_id = %interest_id,
                "only the recipient may respond to an interest"
            );
            return Err(AppError::Forbidden);
        }

        let resolved = match self
            .store
            .resolve_interest(interest_id, status, now_millis())
            .await?
        {
            InterestResolution::Resolved(i) => i,
            InterestResolution::AlreadyResolved(current) => {
                return Err(AppError::Conflict(format!(
                    "interest already {}",
                    current.status.as_str()
                )))
            }
            InterestResolution::Missing => return Err(AppError::NotFound("interest")),
        };
        tracing::info!(
            interest_id = %interest_id,
            status = resolved.status.as_str(),
            "interest resolved"
        );

        if resolved.status == InterestStatus::Accepted {
            self.complete_match(&resolved).await;
        }
        Ok(resolved)
    }

    /// Open the pair's conversation, then record the match. A match is only
    /// written once its conversation exists.
    async fn complete_match(&self, interest: &Interest) -> Option<Match> {
        if let Err(e) = self
            .conversations
            .open_direct(interest.from_user_id, interest.to_user_id)
            .await
        {
            metrics::record_match_inconsistency();
            tracing::error!(
                inconsistency = "accepted_interest_without_conversation",
                interest_id = %interest.id,
                error = %e,
                "interest accepted but conversation could not be opened"
            );
            return None;
        }

        match self
            .matches
            .on_interest_accepted(interest.from_user_id, interest.to_user_id)
            .await
        {
            Ok(m) => Some(m),
            Err(e) => {
                metrics::record_match_inconsistency();
                tracing::error!(
                    inconsistency = "accepted_interest_without_match",
                    interest_id = %interest.id,
                    error = %e,
                    "interest accepted but match creation failed"
                );
                None
            }
        }
    }

    /// Create matches, and their conversations, for accepted interests that
    /// lack a match.
    pub async fn reconcile_missing_matches(&self, batch: usize) -> AppResult<usize> {
        let orphans = self.store.accepted_without_match(batch).await?;
        let mut repaired = 0;
        for interest in &orphans {
            if self.complete_match(interest).await.is_some() {
                repaired += 1;
            }
        }
        if repaired > 0 {
            tracing::info!(repaired, "reconciled missing matches");
        }
        Ok(repaired)
    }

    /// Expire pending interests older than `ttl`.
    pub async fn expire_stale(&self, ttl: Duration) -> AppResult<u64> {
        let now = now_millis();
        Ok(self.store.expire_pending_before(now - ttl, now).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Plan;
    use crate::repository::memory::StoreTable;
    use crate::repository::{ConversationStore, MemoryStore};

    fn service(store: &Arc<MemoryStore>) -> InterestService {
        InterestService::new(
            store.clone(),
            store.clone(),
            Arc::new(QuotaLedger::new(store.clone())),
            MatchEngine::new(store.clone()),
            ConversationService::new(store.clone()),
        )
    }

    #[tokio::test]
    async fn accept_creates_match_and_conversation() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let (interest, quota) = svc.send_interest(a, b).await.unwrap();
        assert_eq!(quota.used, 1);
        let resolved = svc.respond(b, interest.id, "accepted").await.unwrap();
        assert_eq!(resolved.status, InterestStatus::Accepted);

        assert!(svc.matches().get(a, b).await.unwrap().is_some());
        let conversation_id = crate::keys::direct_conversation_id(a, b);
        assert!(store.get_conversation(conversation_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn second_response_conflicts_and_match_stays_single() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let (interest, _) = svc.send_interest(a, b).await.unwrap();
        svc.respond(b, interest.id, "accepted").await.unwrap();
        assert!(matches!(
            svc.respond(b, interest.id, "rejected").await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(svc.matches().matches_for_user(a).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn crossing_interests_accepted_concurrently_yield_one_match() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let (ab, _) = svc.send_interest(a, b).await.unwrap();
        let (ba, _) = svc.send_interest(b, a).await.unwrap();
        let (left, right) = tokio::join!(
            svc.respond(b, ab.id, "accepted"),
            svc.respond(a, ba.id, "accepted")
        );
        left.unwrap();
        right.unwrap();
        assert_eq!(svc.matches().matches_for_user(a).await.unwrap().len(), 1);
        assert_eq!(svc.matches().matches_for_user(b).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_recipient_may_respond() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (interest, _) = svc.send_interest(a, b).await.unwrap();

        assert!(matches!(
            svc.respond(a, interest.id, "accepted").await,
            Err(AppError::Forbidden)
        ));
        assert!(matches!(
            svc.respond(b, interest.id, "expired").await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_pending_is_conflict_without_consuming_quota() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        svc.send_interest(a, b).await.unwrap();
        assert!(matches!(
            svc.send_interest(a, b).await,
            Err(AppError::Conflict(_))
        ));
        assert_eq!(
            store
                .usage_event_count(a, crate::models::QuotaFeature::InterestSent)
                .await,
            1
        );
    }

    #[tokio::test]
    async fn free_plan_interest_quota_is_enforced() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let a = Uuid::new_v4();

        for _ in 0..5 {
            svc.send_interest(a, Uuid::new_v4()).await.unwrap();
        }
        match svc.send_interest(a, Uuid::new_v4()).await {
            Err(AppError::QuotaExceeded { feature, decision }) => {
                assert_eq!(feature, "interest_sent");
                assert_eq!((decision.used, decision.limit, decision.remaining), (5, 5, 0));
            }
            other => panic!("expected quota error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn premium_plus_interests_are_unlimited() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let a = Uuid::new_v4();
        store.set_plan(a, Plan::PremiumPlus).await.unwrap();

        let (_, quota) = svc.send_interest(a, Uuid::new_v4()).await.unwrap();
        assert_eq!(quota.limit, -1);
        assert_eq!(quota.remaining, -1);
    }

    #[tokio::test]
    async fn failed_match_write_is_repaired_by_reconciliation() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (interest, _) = svc.send_interest(a, b).await.unwrap();

        store.set_unavailable(StoreTable::Matches, true).await;
        let resolved = svc.respond(b, interest.id, "accepted").await.unwrap();
        assert_eq!(resolved.status, InterestStatus::Accepted);
        store.set_unavailable(StoreTable::Matches, false).await;
        assert!(svc.matches().get(a, b).await.unwrap().is_none());

        assert_eq!(svc.reconcile_missing_matches(10).await.unwrap(), 1);
        assert!(svc.matches().get(a, b).await.unwrap().is_some());
        assert_eq!(svc.reconcile_missing_matches(10).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failed_conversation_open_is_repaired_with_the_match() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let (interest, _) = svc.send_interest(a, b).await.unwrap();
        let conversation_id = crate::keys::direct_conversation_id(a, b);

        store.set_unavailable(StoreTable::Conversations, true).await;
        let resolved = svc.respond(b, interest.id, "accepted").await.unwrap();
        assert_eq!(resolved.status, InterestStatus::Accepted);
        store.set_unavailable(StoreTable::Conversations, false).await;
        assert!(svc.matches().get(a, b).await.unwrap().is_none());
        assert!(store.get_conversation(conversation_id).await.unwrap().is_none());

        assert_eq!(svc.reconcile_missing_matches(10).await.unwrap(), 1);
        assert!(svc.matches().get(a, b).await.unwrap().is_some());
        assert!(store.get_conversation(conversation_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn stale_pending_interests_expire() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(&store);
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());

        let old = Interest::pending(a, b, now_millis() - Duration::days(40));
        store.insert_interest(&old).await.unwrap();
        let (fresh, _) = svc.send_interest(b, a).await.unwrap();

        assert_eq!(svc.expire_stale(Duration::days(30)).await.unwrap(), 1);
        assert_eq!(
            svc.get_interest(a, old.id).await.unwrap().status,
            InterestStatus::Expired
        );
        assert_eq!(
            svc.get_interest(a, fresh.id).await.unwrap().status,
            InterestStatus::Pending
        );
    }
}
