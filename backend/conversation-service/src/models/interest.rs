use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestStatus {
    Pending,
    Accepted,
    Rejected,
    Expired,
}

impl InterestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterestStatus::Pending => "pending",
            InterestStatus::Accepted => "accepted",
            InterestStatus::Rejected => "rejected",
            InterestStatus::Expired => "expired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(InterestStatus::Pending),
            "accepted" => Some(InterestStatus::Accepted),
            "rejected" => Some(InterestStatus::Rejected),
            "expired" => Some(InterestStatus::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InterestStatus::Pending)
    }
}

/// A directed expression of interest. Only the recipient may resolve it,
/// and only once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub id: Uuid,
    pub from_user_id: Uuid,
    pub to_user_id: Uuid,
    pub status: InterestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Interest {
    pub fn pending(from_user_id: Uuid, to_user_id: Uuid, at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            from_user_id,
            to_user_id,
            status: InterestStatus::Pending,
            created_at: at,
            updated_at: at,
        }
    }

    pub fn involves(&self, user_id: Uuid) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }
}

/// Mutual match between two users. At most one exists per unordered pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// `{lower_id}_{higher_id}`
    pub id: String,
    /// Sorted ascending
    pub user_ids: [Uuid; 2],
    pub created_at: DateTime<Utc>,
}
