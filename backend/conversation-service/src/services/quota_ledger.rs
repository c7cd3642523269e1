//! Per-user, per-feature usage limits.
//!
//! Monthly features are admitted by a conditional counter increment and
//! daily features by a serialized count-then-insert over a rolling 24 hour
//! window. Both are race-safe: concurrent callers sharing one remaining unit
//! see exactly one grant.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::metrics;
use crate::models::quota::{daily_window, month_key, next_month_start, UNLIMITED};
use crate::models::{Plan, QuotaDecision, QuotaFeature, QuotaWindow, UsageEvent};
use crate::repository::{DailyAdmission, MonthlyAdmission, StoreError, UsageStore};

/// A denial is a normal [`QuotaDecision`]; only store failures are errors.
#[derive(Debug, Error)]
pub enum QuotaError {
    #[error("quota store unavailable: {0}")]
    Unavailable(#[from] StoreError),
}

pub struct QuotaLedger {
    store: Arc<dyn UsageStore>,
}

impl QuotaLedger {
    pub fn new(store: Arc<dyn UsageStore>) -> Self {
        Self { store }
    }

    /// Admit one unit of `feature` for `user_id` if the plan allows it.
    pub async fn check_and_consume(
        &self,
        user_id: Uuid,
        feature: &str,
        plan: &str,
    ) -> Result<QuotaDecision, QuotaError> {
        self.check_and_consume_at(user_id, feature, plan, Utc::now())
            .await
    }

    pub async fn check_and_consume_at(
        &self,
        user_id: Uuid,
        feature: &str,
        plan: &str,
        now: DateTime<Utc>,
    ) -> Result<QuotaDecision, QuotaError> {
        let Some(parsed) = QuotaFeature::parse(feature) else {
            tracing::warn!(user_id = %user_id, feature = %feature, "quota check for unknown feature");
            metrics::record_quota_decision("unknown", false);
            return Ok(QuotaDecision::unknown_feature());
        };

        let limit = Plan::normalize(plan).limit(parsed);
        if limit == UNLIMITED {
            metrics::record_quota_decision(parsed.as_str(), true);
            return Ok(QuotaDecision::unlimited());
        }

        let event = UsageEvent {
            user_id,
            feature: parsed,
            timestamp: now,
        };

        let decision = match parsed.window() {
            QuotaWindow::CalendarMonth => {
                let reset_at = next_month_start(now);
                match self
                    .store
                    .try_increment_monthly(&event, &month_key(now), limit)
                    .await?
                {
                    MonthlyAdmission::Admitted { count } => {
                        QuotaDecision::new(true, count, limit, reset_at)
                    }
                    MonthlyAdmission::AtLimit { count } => {
                        QuotaDecision::new(false, count, limit, reset_at)
                    }
                }
            }
            QuotaWindow::RollingDay => {
                match self
                    .store
                    .try_admit_daily(&event, now - daily_window(), limit)
                    .await?
                {
                    DailyAdmission::Admitted { count, oldest } => {
                        QuotaDecision::new(true, count, limit, Some(oldest + daily_window()))
                    }
                    DailyAdmission::AtLimit { count, oldest } => QuotaDecision::new(
                        false,
                        count,
                        limit,
                        Some(oldest.unwrap_or(now) + daily_window()),
                    ),
                }
            }
        };

        metrics::record_quota_decision(parsed.as_str(), decision.allowed);
        if decision.allowed {
            tracing::debug!(
                user_id = %user_id,
                feature = parsed.as_str(),
                used = decision.used,
                limit = decision.limit,
                "quota granted"
            );
        } else {
            tracing::info!(
                user_id = %user_id,
                feature = parsed.as_str(),
                used = decision.used,
                limit = decision.limit,
                "quota denied"
            );
        }
        Ok(decision)
    }

    /// Current standing without consuming anything.
    pub async fn peek(
        &self,
        user_id: Uuid,
        feature: &str,
        plan: &str,
    ) -> Result<QuotaDecision, QuotaError> {
        let now = Utc::now();
        let Some(parsed) = QuotaFeature::parse(feature) else {
            return Ok(QuotaDecision::unknown_feature());
        };
        let limit = Plan::normalize(plan).limit(parsed);
        if limit == UNLIMITED {
            return Ok(QuotaDecision::unlimited());
        }

        let (used, reset_at) = match parsed.window() {
            QuotaWindow::CalendarMonth => {
                let used = self
                    .store
                    .monthly_count(user_id, parsed, &month_key(now))
                    .await?;
                (used, next_month_start(now))
            }
            QuotaWindow::RollingDay => {
                let (used, oldest) = self
                    .store
                    .daily_usage(user_id, parsed, now - daily_window())
                    .await?;
                (used, Some(oldest.unwrap_or(now) + daily_window()))
            }
        };
        Ok(QuotaDecision::new(used < limit, used, limit, reset_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::StoreTable;
    use crate::repository::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn ledger() -> (QuotaLedger, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (QuotaLedger::new(store.clone()), store)
    }

    #[tokio::test]
    async fn free_plan_sixth_message_is_denied() {
        let (ledger, _) = ledger();
        let user = Uuid::new_v4();
        for i in 1..=5 {
            let d = ledger.check_and_consume(user, "message_sent", "free").await.unwrap();
            assert!(d.allowed);
            assert_eq!(d.used, i);
            assert_eq!(d.remaining, 5 - i);
        }
        let denied = ledger.check_and_consume(user, "message_sent", "free").await.unwrap();
        assert!(!denied.allowed);
        assert_eq!((denied.used, denied.limit, denied.remaining), (5, 5, 0));
        assert!(denied.reset_at.is_some());
    }

    #[tokio::test]
    async fn unlimited_plan_never_touches_the_store() {
        let (ledger, store) = ledger();
        store.set_unavailable(StoreTable::Usage, true).await;
        let d = ledger
            .check_and_consume(Uuid::new_v4(), "message_sent", "premiumPlus")
            .await
            .unwrap();
        assert!(d.allowed);
        assert_eq!(d.limit, -1);
        assert_eq!(d.remaining, -1);
        assert_eq!(d.reset_at, None);
    }

    #[tokio::test]
    async fn unknown_feature_is_denied_with_zero_limit() {
        let (ledger, _) = ledger();
        let d = ledger
            .check_and_consume(Uuid::new_v4(), "super_like", "premium")
            .await
            .unwrap();
        assert!(!d.allowed);
        assert_eq!(d.limit, 0);
    }

    #[tokio::test]
    async fn unknown_plan_is_treated_as_free() {
        let (ledger, _) = ledger();
        let d = ledger
            .check_and_consume(Uuid::new_v4(), "profile_view", "platinum")
            .await
            .unwrap();
        assert_eq!(d.limit, 20);
    }

    #[tokio::test]
    async fn zero_limit_feature_is_denied_without_consuming() {
        let (ledger, store) = ledger();
        let user = Uuid::new_v4();
        let d = ledger.check_and_consume(user, "contact_view", "free").await.unwrap();
        assert!(!d.allowed);
        assert_eq!((d.used, d.limit, d.remaining), (0, 0, 0));
        assert_eq!(store.usage_event_count(user, QuotaFeature::ContactView).await, 0);
    }

    #[tokio::test]
    async fn daily_window_rolls_and_reports_reset_from_oldest_event() {
        let (ledger, _) = ledger();
        let user = Uuid::new_v4();
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap();

        for i in 0..5 {
            let at = start + Duration::minutes(i);
            let d = ledger
                .check_and_consume_at(user, "interest_sent", "free", at)
                .await
                .unwrap();
            assert!(d.allowed);
            assert_eq!(d.reset_at, Some(start + Duration::hours(24)));
        }

        let later = start + Duration::hours(3);
        let denied = ledger
            .check_and_consume_at(user, "interest_sent", "free", later)
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(denied.used, 5);
        assert_eq!(denied.reset_at, Some(start + Duration::hours(24)));

        // The first event has left the window a day later.
        let next_day = start + Duration::hours(24) + Duration::seconds(30);
        let admitted = ledger
            .check_and_consume_at(user, "interest_sent", "free", next_day)
            .await
            .unwrap();
        assert!(admitted.allowed);
        assert_eq!(admitted.used, 5);
    }

    #[tokio::test]
    async fn monthly_counter_resets_with_calendar_month() {
        let (ledger, _) = ledger();
        let user = Uuid::new_v4();
        let october = Utc.with_ymd_and_hms(2026, 10, 31, 23, 0, 0).unwrap();
        for _ in 0..5 {
            ledger
                .check_and_consume_at(user, "message_sent", "free", october)
                .await
                .unwrap();
        }
        let denied = ledger
            .check_and_consume_at(user, "message_sent", "free", october)
            .await
            .unwrap();
        assert!(!denied.allowed);
        assert_eq!(
            denied.reset_at,
            Some(Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap())
        );

        let november = Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 1).unwrap();
        let d = ledger
            .check_and_consume_at(user, "message_sent", "free", november)
            .await
            .unwrap();
        assert!(d.allowed);
        assert_eq!(d.used, 1);
    }

    #[tokio::test]
    async fn peek_does_not_consume() {
        let (ledger, _) = ledger();
        let user = Uuid::new_v4();
        ledger.check_and_consume(user, "message_sent", "free").await.unwrap();
        let first = ledger.peek(user, "message_sent", "free").await.unwrap();
        let second = ledger.peek(user, "message_sent", "free").await.unwrap();
        assert_eq!(first.used, 1);
        assert_eq!(second.used, 1);
        assert_eq!(second.remaining, 4);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_error() {
        let (ledger, store) = ledger();
        store.set_unavailable(StoreTable::Usage, true).await;
        let err = ledger
            .check_and_consume(Uuid::new_v4(), "message_sent", "free")
            .await
            .unwrap_err();
        assert!(matches!(err, QuotaError::Unavailable(_)));
    }
}
