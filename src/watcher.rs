use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::coordinator::ScrapeCoordinator;
use crate::models::{ProductState, Recipient, RunReport};
use crate::notifiers::{build_transport, EmailTransport, NotificationComposer, Notifier};
use crate::reconciler::PriceReconciler;
use crate::scraper::{BrowserLauncher, TargetSite};
use crate::store::Repository;
use crate::utils::error::{AppError, Result};

/// One scrape, diff and notify cycle over every tracked identifier.
///
/// Only one cycle runs at a time; a second trigger while a cycle is in
/// flight fails fast with [`AppError::CycleInProgress`].
pub struct PriceWatcher {
    store: Arc<dyn Repository>,
    coordinator: ScrapeCoordinator,
    reconciler: PriceReconciler,
    composer: NotificationComposer,
    notifier: Notifier,
    run_lock: Mutex<()>,
    cancel: CancellationToken,
}

impl PriceWatcher {
    pub fn new(
        store: Arc<dyn Repository>,
        coordinator: ScrapeCoordinator,
        reconciler: PriceReconciler,
        composer: NotificationComposer,
        notifier: Notifier,
    ) -> Self {
        Self {
            store,
            coordinator,
            reconciler,
            composer,
            notifier,
            run_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn Repository>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Result<Self> {
        let transport = build_transport(&config.notifications)?;
        Self::with_transport(config, store, launcher, transport)
    }

    pub fn with_transport(
        config: &AppConfig,
        store: Arc<dyn Repository>,
        launcher: Arc<dyn BrowserLauncher>,
        transport: Arc<dyn EmailTransport>,
    ) -> Result<Self> {
        let coordinator = ScrapeCoordinator::from_config(launcher, &config.scraper)?;
        let reconciler = PriceReconciler::new(TargetSite::new(&config.scraper.base_url), config.reconcile.policy);
        let composer = NotificationComposer::new(config.notifications.currency_symbol.clone());
        let notifier = Notifier::new(transport, config.notifications.subject.clone());

        Ok(Self::new(store, coordinator, reconciler, composer, notifier))
    }

    pub fn store(&self) -> &Arc<dyn Repository> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Stop the cycle in flight at the next identifier boundary. Later
    /// cycles are cancelled immediately.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    pub async fn list_products(&self) -> Result<Vec<ProductState>> {
        self.store.list_all().await
    }

    /// Run one full cycle.
    ///
    /// Errors only when the cycle could not meaningfully run: another cycle
    /// holds the lock, the identifier set is unreadable, or no worker got a
    /// browser. Everything else is counted in the returned report.
    pub async fn run_cycle(&self, concurrency: Option<usize>) -> Result<RunReport> {
        let _guard = self.run_lock.try_lock().map_err(|_| AppError::CycleInProgress)?;
        let started = Instant::now();

        let result = self.execute(concurrency).await;

        let outcome = match &result {
            Ok(report) => match report.status() {
                crate::models::RunStatus::Completed => "completed",
                _ => "completed_with_failures",
            },
            Err(_) => "failed",
        };
        metrics::counter!("pricewatch_cycles_total", "outcome" => outcome).increment(1);
        metrics::histogram!("pricewatch_cycle_duration_seconds").record(started.elapsed().as_secs_f64());

        result
    }

    async fn execute(&self, concurrency: Option<usize>) -> Result<RunReport> {
        let mut report = RunReport {
            started_at: Some(Utc::now()),
            ..Default::default()
        };

        let identifiers = self
            .store
            .identifiers()
            .await
            .map_err(|e| AppError::IdentifierSource(e.to_string()))?;
        report.identifiers = identifiers.len();

        tracing::info!(identifiers = identifiers.len(), "price cycle started");

        let scraped = self.coordinator.run(&identifiers, concurrency, &self.cancel).await?;
        report.scraped = scraped.records.len();
        report.workers_without_browser = scraped.workers_without_browser;
        report.cancelled = scraped.cancelled;
        for failure in &scraped.failures {
            *report.page_failures.entry(failure.kind).or_default() += 1;
        }

        let reconciled = self.reconciler.reconcile(self.store.as_ref(), scraped.records).await;
        report.reconciled = reconciled.touched.len();
        report.created = reconciled.created;
        report.persistence_failures = reconciled.failed;

        let products = match self.store.list_all().await {
            Ok(products) => products,
            Err(e) => {
                tracing::error!("failed to list products, skipping notifications: {}", e);
                report.persistence_failures += 1;
                report.finished_at = Some(Utc::now());
                return Ok(report);
            }
        };

        let summary = self.composer.compose(&products);
        report.drops = summary.drops.len();
        metrics::counter!("pricewatch_drops_total").increment(summary.drops.len() as u64);

        if summary.has_drops() {
            let recipients: Vec<Recipient> = match self.store.recipients().await {
                Ok(recipients) => recipients,
                Err(e) => {
                    tracing::error!("failed to load recipients: {}", e);
                    report.persistence_failures += 1;
                    Vec::new()
                }
            };
            let delivery = self.notifier.notify(&recipients, &summary).await;
            report.emails_sent = delivery.sent;
            report.emails_failed = delivery.failed;
        } else {
            tracing::info!("no price drops, nothing to send");
        }

        report.finished_at = Some(Utc::now());
        tracing::info!(
            scraped = report.scraped,
            failed = report.failed_pages(),
            reconciled = report.reconciled,
            drops = report.drops,
            emails_sent = report.emails_sent,
            "price cycle finished"
        );

        Ok(report)
    }
}
