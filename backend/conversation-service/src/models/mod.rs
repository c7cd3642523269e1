pub mod conversation;
pub mod event;
pub mod interest;
pub mod message;
pub mod quota;
pub mod reaction;
pub mod receipt;

pub use conversation::Conversation;
pub use event::{ConversationEvent, EventCursor, EventId, EventKind};
pub use interest::{Interest, InterestStatus, Match};
pub use message::{MarkReadOutcome, Message, MessageContent, MessageKind, NewMessage};
pub use quota::{MonthlyUsageCounter, Plan, QuotaDecision, QuotaFeature, QuotaWindow, UsageEvent};
pub use reaction::{Reaction, ToggleOutcome};
pub use receipt::{DeliveryReceipt, ReceiptStatus};

use chrono::{DateTime, TimeZone, Timelike, Utc};

/// Current time truncated to whole milliseconds.
///
/// Cursors on the wire are epoch milliseconds, so stored timestamps must not
/// carry sub-millisecond precision or an exclusive cursor would replay them.
pub fn now_millis() -> DateTime<Utc> {
    truncate_to_millis(Utc::now())
}

pub fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = (at.nanosecond() / 1_000_000) * 1_000_000;
    at.with_nanosecond(nanos).unwrap_or(at)
}

pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
