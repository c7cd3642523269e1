use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{now_millis, Message};

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const TIME_PART_WIDTH: usize = 9;
const SEQ_PART_WIDTH: usize = 6;
const RANDOM_PART_LEN: usize = 4;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Event identifier: zero-padded base36 milliseconds, `_`, a base36
/// per-process sequence, then a random suffix.
///
/// Ids sort lexicographically in creation order across milliseconds. Within
/// one millisecond they sort in append order for events created by the same
/// process, and the id is the tie-break the event cursor pages on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn generate(at: DateTime<Utc>) -> Self {
        let millis = at.timestamp_millis().max(0) as u64;
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RANDOM_PART_LEN)
            .map(|b| (b as char).to_ascii_lowercase())
            .collect();
        let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 36u64.pow(SEQ_PART_WIDTH as u32);
        Self(format!(
            "{}_{}{}",
            to_base36(millis, TIME_PART_WIDTH),
            to_base36(seq, SEQ_PART_WIDTH),
            suffix
        ))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn to_base36(mut value: u64, width: usize) -> String {
    let mut digits = Vec::with_capacity(width);
    while value > 0 {
        digits.push(BASE36[(value % 36) as usize]);
        value /= 36;
    }
    while digits.len() < width {
        digits.push(b'0');
    }
    digits.reverse();
    digits.into_iter().map(char::from).collect()
}

/// What happened in a conversation, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    MessageSent { message: Message },
    MessageRead { read_at: DateTime<Utc> },
    TypingStart { at: DateTime<Utc> },
    TypingStop { at: DateTime<Utc> },
    ReactionAdded { message_id: Uuid, emoji: String },
    ReactionRemoved { message_id: Uuid, emoji: String },
}

impl EventKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            EventKind::MessageSent { .. } => "message_sent",
            EventKind::MessageRead { .. } => "message_read",
            EventKind::TypingStart { .. } => "typing_start",
            EventKind::TypingStop { .. } => "typing_stop",
            EventKind::ReactionAdded { .. } => "reaction_added",
            EventKind::ReactionRemoved { .. } => "reaction_removed",
        }
    }
}

/// Append-only conversation event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub id: EventId,
    pub conversation_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ConversationEvent {
    pub fn new(conversation_id: Uuid, user_id: Option<Uuid>, kind: EventKind) -> Self {
        Self::at(conversation_id, user_id, kind, now_millis())
    }

    pub fn at(
        conversation_id: Uuid,
        user_id: Option<Uuid>,
        kind: EventKind,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::generate(created_at),
            conversation_id,
            created_at,
            user_id,
            kind,
        }
    }

    pub fn created_at_ms(&self) -> i64 {
        self.created_at.timestamp_millis()
    }
}

/// Caller-held position in a conversation's event log.
///
/// `after_id` pins the cursor to a delivered event so a page that ends inside
/// a millisecond resumes with the rest of that millisecond.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCursor {
    pub since_ms: i64,
    pub inclusive: bool,
    pub after_id: Option<EventId>,
}

impl EventCursor {
    pub fn at(since_ms: i64, inclusive: bool) -> Self {
        Self {
            since_ms,
            inclusive,
            after_id: None,
        }
    }

    /// Positioned just past `event`.
    pub fn after(event: &ConversationEvent) -> Self {
        Self {
            since_ms: event.created_at_ms(),
            inclusive: false,
            after_id: Some(event.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn ids_sort_by_time_then_suffix() {
        let early = EventId::generate(Utc.timestamp_millis_opt(1_000).unwrap());
        let late = EventId::generate(Utc.timestamp_millis_opt(1_001).unwrap());
        assert!(early < late);
        assert_eq!(
            early.as_str().len(),
            TIME_PART_WIDTH + 1 + SEQ_PART_WIDTH + RANDOM_PART_LEN
        );
    }

    #[test]
    fn same_millisecond_ids_sort_in_creation_order() {
        let at = Utc.timestamp_millis_opt(5_000).unwrap();
        let ids: Vec<EventId> = (0..50).map(|_| EventId::generate(at)).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(sorted, ids);
    }

    #[test]
    fn base36_encoding() {
        assert_eq!(to_base36(0, 3), "000");
        assert_eq!(to_base36(35, 1), "z");
        assert_eq!(to_base36(36, 2), "10");
    }

    #[test]
    fn event_wire_shape_is_flat() {
        let conversation_id = Uuid::new_v4();
        let message_id = Uuid::new_v4();
        let event = ConversationEvent::new(
            conversation_id,
            None,
            EventKind::ReactionAdded {
                message_id,
                emoji: "❤️".into(),
            },
        );
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], json!("reaction_added"));
        assert_eq!(value["emoji"], json!("❤️"));
        assert!(value.get("user_id").is_none());

        let back: ConversationEvent = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }
}
