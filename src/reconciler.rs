use std::collections::{BTreeSet, HashMap};

use crate::models::{Identifier, ProductState, ReconcilePolicy, ScrapedRecord};
use crate::scraper::TargetSite;
use crate::store::ProductStore;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// Identifiers whose stored state was written this run.
    pub touched: BTreeSet<Identifier>,
    pub created: usize,
    pub failed: usize,
}

/// Folds one run's scrape results into the persisted price state.
///
/// Runs strictly sequentially against the store; a failed read or write for
/// one identifier is logged and the rest still get reconciled.
pub struct PriceReconciler {
    site: TargetSite,
    policy: ReconcilePolicy,
}

impl PriceReconciler {
    pub fn new(site: TargetSite, policy: ReconcilePolicy) -> Self {
        Self { site, policy }
    }

    pub async fn reconcile<S>(&self, store: &S, records: HashMap<Identifier, ScrapedRecord>) -> ReconcileOutcome
    where
        S: ProductStore + ?Sized,
    {
        let mut outcome = ReconcileOutcome::default();

        // Sorted so runs are reproducible regardless of which worker finished first.
        let mut records: Vec<(Identifier, ScrapedRecord)> = records.into_iter().collect();
        records.sort_by(|a, b| a.0.cmp(&b.0));

        for (identifier, record) in records {
            let url = self.site.url_for(&identifier);

            let existing = match store.get(&identifier).await {
                Ok(existing) => existing,
                Err(e) => {
                    tracing::error!(identifier = %identifier, "failed to load product state: {}", e);
                    metrics::counter!("pricewatch_reconcile_total", "outcome" => "failed").increment(1);
                    outcome.failed += 1;
                    continue;
                }
            };

            let (state, created) = match existing {
                Some(mut state) => {
                    state.observe(record, url, self.policy);
                    (state, false)
                }
                None => (ProductState::first_observation(record, url), true),
            };

            match store.upsert(&state).await {
                Ok(()) => {
                    tracing::debug!(
                        identifier = %identifier,
                        current = %state.current_price,
                        previous = ?state.previous_price,
                        created,
                        "product reconciled"
                    );
                    metrics::counter!("pricewatch_reconcile_total", "outcome" => "ok").increment(1);
                    if created {
                        outcome.created += 1;
                    }
                    outcome.touched.insert(identifier);
                }
                Err(e) => {
                    tracing::error!(identifier = %identifier, "failed to save product state: {}", e);
                    metrics::counter!("pricewatch_reconcile_total", "outcome" => "failed").increment(1);
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}
