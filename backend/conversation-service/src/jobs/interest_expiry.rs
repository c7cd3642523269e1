use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::MaintenanceJob;
use crate::services::interest_service::InterestService;

pub struct InterestExpiryJob {
    interests: Arc<InterestService>,
    every: Duration,
    ttl: chrono::Duration,
}

impl InterestExpiryJob {
    pub fn new(interests: Arc<InterestService>, every: Duration, ttl_days: i64) -> Self {
        Self {
            interests,
            every,
            ttl: chrono::Duration::days(ttl_days),
        }
    }
}

#[async_trait]
impl MaintenanceJob for InterestExpiryJob {
    fn name(&self) -> &'static str {
        "interest_expiry"
    }

    fn interval(&self) -> Duration {
        self.every
    }

    async fn run_once(&self) -> Result<u64> {
        Ok(self.interests.expire_stale(self.ttl).await?)
    }
}
