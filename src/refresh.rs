//! Background timer refresh
//!
//! Periodically asks the registry to reconcile against the backend clients.
//! Uses tokio-cron-scheduler for the repeated job; each tick goes through
//! `TimerRegistry::trigger_update`, so overlapping passes are impossible and
//! an on-demand update simply replaces the in-flight one.

use std::sync::Arc;
use std::time::Duration;

use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::registry::TimerRegistry;

/// Poll interval in seconds
const POLL_INTERVAL_SECONDS: u64 = 300;

/// Drives periodic reconciliation of a [`TimerRegistry`].
pub struct RefreshTask {
    registry: Arc<TimerRegistry>,
    scheduler: Option<JobScheduler>,
    poll_interval: Duration,
    is_running: bool,
}

impl RefreshTask {
    /// Create a refresh task with the default poll interval.
    pub fn new(registry: Arc<TimerRegistry>) -> Self {
        Self::with_interval(registry, Duration::from_secs(POLL_INTERVAL_SECONDS))
    }

    pub fn with_interval(registry: Arc<TimerRegistry>, poll_interval: Duration) -> Self {
        Self {
            registry,
            scheduler: None,
            poll_interval,
            is_running: false,
        }
    }

    /// Start the periodic refresh, running one pass immediately.
    pub async fn start(&mut self) -> anyhow::Result<()> {
        if self.is_running {
            warn!("timer refresh already running");
            return Ok(());
        }

        info!(
            "starting timer refresh (polling every {} seconds)",
            self.poll_interval.as_secs()
        );

        let sched = JobScheduler::new().await?;

        let registry = self.registry.clone();
        let job = Job::new_repeated_async(self.poll_interval, move |_uuid, _l| {
            let registry = registry.clone();
            Box::pin(async move {
                registry.trigger_update(true);
            })
        })?;
        sched.add(job).await?;

        // initial pass so callers see a populated registry right away
        let registry = self.registry.clone();
        if tokio::task::spawn_blocking(move || registry.trigger_update(false))
            .await
            .is_err()
        {
            error!("initial timer refresh panicked");
        }

        sched.start().await?;

        self.scheduler = Some(sched);
        self.is_running = true;

        info!("timer refresh started");
        Ok(())
    }

    /// Stop the periodic refresh.
    pub async fn stop(&mut self) {
        if !self.is_running {
            return;
        }

        info!("stopping timer refresh");

        if let Some(mut sched) = self.scheduler.take() {
            if let Err(e) = sched.shutdown().await {
                error!("error shutting down timer refresh: {}", e);
            }
        }

        self.is_running = false;
        info!("timer refresh stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{harness, tag, wait_until};

    #[tokio::test]
    async fn start_runs_an_initial_pass_and_stop_is_idempotent() {
        let h = harness();
        h.clients.remote.lock().push(tag(1, 1, 10));

        let mut task = RefreshTask::with_interval(h.registry.clone(), Duration::from_secs(60));
        task.start().await.unwrap();

        let registry = h.registry.clone();
        wait_until(move || registry.timer_count() == 1).await;

        // second start is a warning, not an error
        task.start().await.unwrap();

        task.stop().await;
        task.stop().await;
    }

    #[tokio::test]
    async fn periodic_job_picks_up_backend_changes() {
        let h = harness();
        let mut task = RefreshTask::with_interval(h.registry.clone(), Duration::from_millis(50));
        task.start().await.unwrap();

        h.clients.remote.lock().push(tag(1, 1, 10));

        let registry = h.registry.clone();
        wait_until(move || registry.timer_count() == 1).await;

        task.stop().await;
    }
}
