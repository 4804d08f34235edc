use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::SchedulerConfig;
use crate::utils::error::{AppError, Result};
use crate::watcher::PriceWatcher;

/// Fires [`PriceWatcher::run_cycle`] on a cron schedule. Ticks that land
/// while a cycle is still running are skipped.
pub struct CycleScheduler {
    scheduler: JobScheduler,
    watcher: Arc<PriceWatcher>,
    config: SchedulerConfig,
}

impl CycleScheduler {
    pub async fn new(watcher: Arc<PriceWatcher>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler,
            watcher,
            config,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let watcher = Arc::clone(&self.watcher);
        let job = Job::new_async(self.config.cron.as_str(), move |_uuid, _lock| {
            let watcher = Arc::clone(&watcher);
            Box::pin(async move {
                run_scheduled_cycle(&watcher).await;
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        tracing::info!(cron = %self.config.cron, "cycle scheduler started");
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("cycle scheduler shutdown");
        Ok(())
    }
}

async fn run_scheduled_cycle(watcher: &PriceWatcher) {
    tracing::debug!("scheduled cycle triggered");
    match watcher.run_cycle(None).await {
        Ok(report) => {
            tracing::info!(status = ?report.status(), drops = report.drops, "scheduled cycle finished")
        }
        Err(AppError::CycleInProgress) => {
            tracing::warn!("previous cycle still running, skipping this tick")
        }
        Err(e) => tracing::error!("scheduled cycle failed: {}", e),
    }
}
