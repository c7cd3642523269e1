//! Periodic maintenance tasks.
//!
//! Each job does one idempotent sweep per tick. Failures are logged and the
//! loop keeps running; repeated failures back off exponentially.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{error, info};
use uuid::Uuid;

pub mod idle_eviction;
pub mod interest_expiry;
pub mod match_reconciler;

pub use idle_eviction::IdleEvictionJob;
pub use interest_expiry::InterestExpiryJob;
pub use match_reconciler::MatchReconcilerJob;

#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    fn name(&self) -> &'static str;

    fn interval(&self) -> Duration;

    /// One sweep. Returns how many items were touched.
    async fn run_once(&self) -> Result<u64>;
}

const MIN_INTERVAL: Duration = Duration::from_millis(10);

/// Run `job` on its interval until `shutdown` fires. Periods shorter than
/// 10ms are raised to 10ms.
pub async fn run_job_loop(job: Arc<dyn MaintenanceJob>, mut shutdown: broadcast::Receiver<()>) {
    let period = job.interval().max(MIN_INTERVAL);
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    info!(
        job_name = job.name(),
        interval_ms = period.as_millis() as u64,
        "Starting job loop"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let run_id = Uuid::new_v4();
                let start = Instant::now();
                match job.run_once().await {
                    Ok(touched) => {
                        if consecutive_failures > 0 {
                            info!(
                                job_name = job.name(),
                                recovered_after = consecutive_failures,
                                "Job recovered after failures"
                            );
                            consecutive_failures = 0;
                        }
                        if touched > 0 {
                            info!(
                                job_name = job.name(),
                                run_id = %run_id,
                                touched,
                                elapsed_ms = start.elapsed().as_millis() as u64,
                                "Job run completed"
                            );
                        }
                    }
                    Err(e) => {
                        consecutive_failures += 1;
                        error!(
                            job_name = job.name(),
                            run_id = %run_id,
                            error = %e,
                            consecutive_failures,
                            "Job run failed, will retry on next interval"
                        );
                        if consecutive_failures >= 3 {
                            let backoff = Duration::from_secs(2u64.pow(consecutive_failures.min(5)));
                            tokio::select! {
                                _ = tokio::time::sleep(backoff) => {}
                                _ = shutdown.recv() => {
                                    info!(job_name = job.name(), "Received shutdown signal during backoff");
                                    break;
                                }
                            }
                        }
                    }
                }
            }
            _ = shutdown.recv() => {
                info!(job_name = job.name(), "Received shutdown signal, stopping job loop");
                break;
            }
        }
    }
}

pub fn spawn_jobs(
    jobs: Vec<Arc<dyn MaintenanceJob>>,
    shutdown: &broadcast::Sender<()>,
) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|job| tokio::spawn(run_job_loop(job, shutdown.subscribe())))
        .collect()
}
