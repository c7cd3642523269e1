use std::sync::Arc;

use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::keys;
use crate::metrics;
use crate::models::{now_millis, Match};
use crate::repository::MatchStore;

/// Creates at most one match per unordered user pair.
///
/// The match id is derived from the sorted pair, so two accepts racing in
/// opposite directions both land on the same key and only one insert wins.
#[derive(Clone)]
pub struct MatchEngine {
    store: Arc<dyn MatchStore>,
}

impl MatchEngine {
    pub fn new(store: Arc<dyn MatchStore>) -> Self {
        Self { store }
    }

    pub async fn on_interest_accepted(&self, from_user_id: Uuid, to_user_id: Uuid) -> AppResult<Match> {
        if from_user_id == to_user_id {
            return Err(AppError::BadRequest("cannot match a user with themselves".into()));
        }
        let (lo, hi) = keys::ordered_pair(from_user_id, to_user_id);
        let candidate = Match {
            id: keys::match_id(lo, hi),
            user_ids: [lo, hi],
            created_at: now_millis(),
        };

        let (stored, created) = self.store.insert_match_if_absent(&candidate).await?;
        if created {
            metrics::record_match_created();
            tracing::info!(match_id = %stored.id, "match created");
        } else {
            tracing::debug!(match_id = %stored.id, "match already existed");
        }
        Ok(stored)
    }

    pub async fn get(&self, a: Uuid, b: Uuid) -> AppResult<Option<Match>> {
        Ok(self.store.get_match(&keys::match_id(a, b)).await?)
    }

    pub async fn matches_for_user(&self, user_id: Uuid) -> AppResult<Vec<Match>> {
        Ok(self.store.matches_for_user(user_id).await?)
    }
}
