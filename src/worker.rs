use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::extractor::ProductExtractor;
use crate::models::{FailureKind, Identifier, ScrapedRecord};
use crate::scraper::{BrowserLease, BrowserLauncher, PageFetcher};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct PageFailure {
    pub identifier: Identifier,
    pub kind: FailureKind,
    pub message: String,
}

/// What one worker produced for its shard. Only successfully extracted
/// identifiers appear in `records`.
#[derive(Debug, Default)]
pub struct ShardResult {
    pub worker: usize,
    pub records: HashMap<Identifier, ScrapedRecord>,
    pub failures: Vec<PageFailure>,
    pub cancelled: bool,
}

/// Scrapes one shard with a single browser session it owns for its lifetime.
pub struct ScrapeWorker {
    id: usize,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<ProductExtractor>,
    cancel: CancellationToken,
}

impl ScrapeWorker {
    pub fn new(
        id: usize,
        fetcher: Arc<PageFetcher>,
        extractor: Arc<ProductExtractor>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            id,
            fetcher,
            extractor,
            cancel,
        }
    }

    /// Blocking; run it on a blocking thread.
    ///
    /// Fails only when no browser session could be acquired. An empty shard
    /// never launches a browser.
    pub fn run(self, launcher: &dyn BrowserLauncher, shard: Vec<Identifier>) -> Result<ShardResult> {
        let mut result = ShardResult {
            worker: self.id,
            ..Default::default()
        };
        if shard.is_empty() {
            return Ok(result);
        }

        let mut lease = BrowserLease::acquire(launcher, self.id)?;
        tracing::info!(worker = self.id, identifiers = shard.len(), "worker started");

        for identifier in shard {
            let outcome = if self.cancel.is_cancelled() {
                if !result.cancelled {
                    tracing::info!(worker = self.id, "cancellation requested, skipping rest of shard");
                    result.cancelled = true;
                }
                Err(AppError::Cancelled)
            } else {
                lease
                    .session()
                    .and_then(|session| self.scrape_one(session, &identifier))
            };

            match outcome {
                Ok(record) => {
                    metrics::counter!("pricewatch_pages_total", "outcome" => "ok").increment(1);
                    tracing::debug!(worker = self.id, identifier = %identifier, price = %record.price, "page scraped");
                    result.records.insert(identifier, record);
                }
                Err(err) => {
                    let kind = classify(&err);
                    metrics::counter!("pricewatch_pages_total", "outcome" => kind_label(kind)).increment(1);
                    match kind {
                        FailureKind::Timeout => {
                            tracing::warn!(worker = self.id, identifier = %identifier, "content marker never appeared: {}", err)
                        }
                        FailureKind::Navigation => {
                            tracing::warn!(worker = self.id, identifier = %identifier, "page could not be loaded: {}", err)
                        }
                        FailureKind::Extraction => {
                            tracing::warn!(worker = self.id, identifier = %identifier, "unexpected page structure: {}", err)
                        }
                        FailureKind::Cancelled => {
                            tracing::debug!(worker = self.id, identifier = %identifier, "not scraped this run")
                        }
                        FailureKind::WorkerLost => {
                            tracing::error!(worker = self.id, identifier = %identifier, "skipping identifier: {}", err)
                        }
                    }
                    result.failures.push(PageFailure {
                        identifier,
                        kind,
                        message: err.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            worker = self.id,
            scraped = result.records.len(),
            failed = result.failures.len(),
            "worker finished"
        );
        Ok(result)
    }

    fn scrape_one(
        &self,
        session: &mut dyn crate::scraper::BrowserSession,
        identifier: &str,
    ) -> Result<ScrapedRecord> {
        let page = self.fetcher.fetch(session, identifier)?;
        self.extractor.extract(identifier, &page.html, &page.url)
    }
}

fn classify(err: &AppError) -> FailureKind {
    match err {
        AppError::Timeout { .. } => FailureKind::Timeout,
        AppError::Navigation { .. } => FailureKind::Navigation,
        AppError::Cancelled => FailureKind::Cancelled,
        err if err.is_page_failure() => FailureKind::Extraction,
        _ => FailureKind::WorkerLost,
    }
}

fn kind_label(kind: FailureKind) -> &'static str {
    match kind {
        FailureKind::Navigation => "navigation",
        FailureKind::Timeout => "timeout",
        FailureKind::Extraction => "extraction",
        FailureKind::Cancelled => "cancelled",
        FailureKind::WorkerLost => "worker_lost",
    }
}
