use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use super::MaintenanceJob;
use crate::realtime::EventNotifier;
use crate::services::typing_throttle::TypingThrottle;

/// Evicts process-local realtime state nobody is using any more: typing
/// limiter keys for quiet (user, conversation) pairs and notifier entries
/// whose waiters have all disconnected.
pub struct IdleEvictionJob {
    throttle: Arc<TypingThrottle>,
    notifier: EventNotifier,
    every: Duration,
}

impl IdleEvictionJob {
    pub fn new(throttle: Arc<TypingThrottle>, notifier: EventNotifier, every: Duration) -> Self {
        Self {
            throttle,
            notifier,
            every,
        }
    }
}

#[async_trait]
impl MaintenanceJob for IdleEvictionJob {
    fn name(&self) -> &'static str {
        "idle_eviction"
    }

    fn interval(&self) -> Duration {
        self.every
    }

    async fn run_once(&self) -> Result<u64> {
        let typing_keys = self.throttle.evict_idle();
        let pruned = self.notifier.prune_idle().await;
        tracing::debug!(typing_keys, pruned, "idle realtime state evicted");
        Ok(pruned as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn sweep_drops_notifier_entries_without_waiters() {
        let notifier = EventNotifier::new();
        let live = Uuid::new_v4();
        let _rx = notifier.subscribe(live).await;
        drop(notifier.subscribe(Uuid::new_v4()).await);

        let job = IdleEvictionJob::new(
            Arc::new(TypingThrottle::new(30)),
            notifier.clone(),
            Duration::from_secs(60),
        );
        assert_eq!(job.run_once().await.unwrap(), 1);
        assert_eq!(notifier.tracked().await, 1);
        assert_eq!(notifier.watcher_count(live).await, 1);
    }
}
