use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::MaintenanceJob;
use crate::services::interest_service::InterestService;

/// Creates matches for accepted interests whose match write failed.
pub struct MatchReconcilerJob {
    interests: Arc<InterestService>,
    every: Duration,
    batch: usize,
}

impl MatchReconcilerJob {
    pub fn new(interests: Arc<InterestService>, every: Duration, batch: usize) -> Self {
        Self {
            interests,
            every,
            batch,
        }
    }
}

#[async_trait]
impl MaintenanceJob for MatchReconcilerJob {
    fn name(&self) -> &'static str {
        "match_reconciler"
    }

    fn interval(&self) -> Duration {
        self.every
    }

    async fn run_once(&self) -> Result<u64> {
        let repaired = self.interests.reconcile_missing_matches(self.batch).await?;
        Ok(repaired as u64)
    }
}
