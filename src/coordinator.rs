use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::ScraperConfig;
use crate::extractor::ProductExtractor;
use crate::models::{FailureKind, Identifier, ScrapedRecord};
use crate::scraper::{BrowserLauncher, PageFetcher};
use crate::utils::error::{AppError, Result};
use crate::worker::{PageFailure, ScrapeWorker};

/// Merged output of every worker in one run. Identifiers that failed are
/// simply absent from `records`.
#[derive(Debug, Default)]
pub struct RunResult {
    pub records: HashMap<Identifier, ScrapedRecord>,
    pub failures: Vec<PageFailure>,
    pub workers_without_browser: usize,
    pub cancelled: bool,
}

/// Split `identifiers` into exactly `workers` contiguous shards.
///
/// Every shard but the last holds `ceil(len / workers)` identifiers; the last
/// holds the remainder. Trailing shards are empty when there are fewer
/// identifiers than workers.
pub fn partition(identifiers: &[Identifier], workers: usize) -> Vec<Vec<Identifier>> {
    let workers = workers.max(1);
    let size = identifiers.len().div_ceil(workers).max(1);

    let mut shards: Vec<Vec<Identifier>> = identifiers.chunks(size).map(|c| c.to_vec()).collect();
    shards.resize_with(workers, Vec::new);
    shards
}

pub struct ScrapeCoordinator {
    launcher: Arc<dyn BrowserLauncher>,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<ProductExtractor>,
    default_concurrency: usize,
}

impl ScrapeCoordinator {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        fetcher: PageFetcher,
        extractor: ProductExtractor,
        default_concurrency: usize,
    ) -> Self {
        Self {
            launcher,
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            default_concurrency: default_concurrency.max(1),
        }
    }

    pub fn from_config(launcher: Arc<dyn BrowserLauncher>, config: &ScraperConfig) -> Result<Self> {
        Ok(Self::new(
            launcher,
            PageFetcher::from_config(config),
            ProductExtractor::new(&config.selectors)?,
            config.concurrency,
        ))
    }

    /// Scrape every identifier with `concurrency` workers (the configured
    /// default when `None`).
    ///
    /// Each worker fills its own map on its own blocking thread; the maps are
    /// merged only after every worker has been joined. Fails with
    /// [`AppError::NoBrowserCapacity`] when not a single worker with work to
    /// do could start a browser.
    pub async fn run(
        &self,
        identifiers: &[Identifier],
        concurrency: Option<usize>,
        cancel: &CancellationToken,
    ) -> Result<RunResult> {
        let workers = concurrency.unwrap_or(self.default_concurrency).max(1);
        let shards = partition(identifiers, workers);
        let busy_shards = shards.iter().filter(|s| !s.is_empty()).count();

        tracing::info!(identifiers = identifiers.len(), workers, "starting scrape");

        let handles = shards.into_iter().enumerate().map(|(id, shard)| {
            let worker = ScrapeWorker::new(
                id,
                Arc::clone(&self.fetcher),
                Arc::clone(&self.extractor),
                cancel.clone(),
            );
            let launcher = Arc::clone(&self.launcher);
            let shard_ids = shard.clone();
            let handle = tokio::task::spawn_blocking(move || worker.run(launcher.as_ref(), shard));
            (shard_ids, handle)
        });
        let (shard_ids, handles): (Vec<_>, Vec<_>) = handles.unzip();

        // Barrier: nothing is merged until every worker has terminated.
        let outcomes = join_all(handles).await;

        let mut merged = RunResult::default();
        for (shard, outcome) in shard_ids.into_iter().zip(outcomes) {
            match outcome {
                Ok(Ok(result)) => {
                    merged.cancelled |= result.cancelled;
                    merged.failures.extend(result.failures);
                    merged.records.extend(result.records);
                }
                Ok(Err(err)) => {
                    tracing::error!(identifiers = shard.len(), "worker could not start: {}", err);
                    merged.workers_without_browser += 1;
                }
                Err(join_err) => {
                    tracing::error!(identifiers = shard.len(), "worker terminated abnormally: {}", join_err);
                    merged.failures.extend(shard.into_iter().map(|identifier| PageFailure {
                        identifier,
                        kind: FailureKind::WorkerLost,
                        message: join_err.to_string(),
                    }));
                }
            }
        }

        if busy_shards > 0 && merged.workers_without_browser == busy_shards {
            return Err(AppError::NoBrowserCapacity {
                attempted: busy_shards,
            });
        }

        tracing::info!(
            scraped = merged.records.len(),
            failed = merged.failures.len(),
            "scrape finished"
        );
        Ok(merged)
    }
}
