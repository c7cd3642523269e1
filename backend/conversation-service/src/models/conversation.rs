use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Two-party conversation. Participants are stored sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_ids: [Uuid; 2],
    pub created_at: DateTime<Utc>,
}

impl Conversation {
    pub fn is_participant(&self, user_id: Uuid) -> bool {
        self.participant_ids.contains(&user_id)
    }

    /// The other participant, if `user_id` is one of the two.
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        match self.participant_ids {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }
}
