use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Limit value meaning "no limit".
pub const UNLIMITED: i64 = -1;

/// Length of the rolling window used by daily features.
pub fn daily_window() -> Duration {
    Duration::hours(24)
}

/// A named action that counts against a plan limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaFeature {
    MessageSent,
    ContactView,
    InterestSent,
    ProfileView,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaWindow {
    /// Trailing 24 hours, counted from raw usage events
    RollingDay,
    /// Calendar month (UTC), counted by a per-month counter
    CalendarMonth,
}

impl QuotaFeature {
    pub const ALL: [QuotaFeature; 4] = [
        QuotaFeature::MessageSent,
        QuotaFeature::ContactView,
        QuotaFeature::InterestSent,
        QuotaFeature::ProfileView,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QuotaFeature::MessageSent => "message_sent",
            QuotaFeature::ContactView => "contact_view",
            QuotaFeature::InterestSent => "interest_sent",
            QuotaFeature::ProfileView => "profile_view",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == value)
    }

    pub fn window(&self) -> QuotaWindow {
        match self {
            QuotaFeature::MessageSent | QuotaFeature::ContactView => QuotaWindow::CalendarMonth,
            QuotaFeature::InterestSent | QuotaFeature::ProfileView => QuotaWindow::RollingDay,
        }
    }
}

/// Subscription plan tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "premium")]
    Premium,
    #[serde(rename = "premiumPlus")]
    PremiumPlus,
}

impl Plan {
    /// Resolve a raw plan tag. Unknown tags fall back to [`Plan::Free`].
    pub fn normalize(tag: &str) -> Plan {
        let folded: String = tag
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .flat_map(|c| c.to_lowercase())
            .collect();
        match folded.as_str() {
            "premium" => Plan::Premium,
            "premiumplus" => Plan::PremiumPlus,
            _ => Plan::Free,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Premium => "premium",
            Plan::PremiumPlus => "premiumPlus",
        }
    }

    /// Per-plan limit table. `-1` is unlimited.
    pub fn limit(&self, feature: QuotaFeature) -> i64 {
        use QuotaFeature::*;
        match (self, feature) {
            (Plan::Free, MessageSent) => 5,
            (Plan::Free, ContactView) => 0,
            (Plan::Free, InterestSent) => 5,
            (Plan::Free, ProfileView) => 20,

            (Plan::Premium, MessageSent) => 500,
            (Plan::Premium, ContactView) => 30,
            (Plan::Premium, InterestSent) => 50,
            (Plan::Premium, ProfileView) => 200,

            (Plan::PremiumPlus, ContactView) => 100,
            (Plan::PremiumPlus, _) => UNLIMITED,
        }
    }
}

/// One row per admitted quota-consuming action. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub user_id: Uuid,
    pub feature: QuotaFeature,
    pub timestamp: DateTime<Utc>,
}

/// Per (user, feature, month) counter for monthly features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyUsageCounter {
    pub user_id: Uuid,
    pub feature: QuotaFeature,
    pub month: String,
    pub count: i64,
}

/// Calendar month key, e.g. `2026-10`.
pub fn month_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// First instant of the calendar month following `at`.
pub fn next_month_start(at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (year, month) = if at.month() == 12 {
        (at.year() + 1, 1)
    } else {
        (at.year(), at.month() + 1)
    };
    let naive = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&naive))
}

/// Outcome of a quota check, returned on both grant and denial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuotaDecision {
    pub allowed: bool,
    pub used: i64,
    pub limit: i64,
    /// `-1` when unlimited, otherwise `max(0, limit - used)`
    pub remaining: i64,
    pub reset_at: Option<DateTime<Utc>>,
}

impl QuotaDecision {
    pub fn new(allowed: bool, used: i64, limit: i64, reset_at: Option<DateTime<Utc>>) -> Self {
        Self {
            allowed,
            used,
            limit,
            remaining: remaining_for(limit, used),
            reset_at,
        }
    }

    pub fn unlimited() -> Self {
        Self::new(true, 0, UNLIMITED, None)
    }

    /// Decision for a feature name that has no limit entry.
    pub fn unknown_feature() -> Self {
        Self::new(false, 0, 0, None)
    }
}

pub fn remaining_for(limit: i64, used: i64) -> i64 {
    if limit == UNLIMITED {
        UNLIMITED
    } else {
        (limit - used).max(0)
    }
}
