use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
    Failed,
}

/// Why an identifier was skipped for a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Navigation,
    Timeout,
    Extraction,
    Cancelled,
    WorkerLost,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub identifiers: usize,
    pub scraped: usize,
    pub page_failures: BTreeMap<FailureKind, usize>,
    pub workers_without_browser: usize,
    pub reconciled: usize,
    pub created: usize,
    pub persistence_failures: usize,
    pub drops: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub cancelled: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    pub fn failed_pages(&self) -> usize {
        self.page_failures.values().sum()
    }

    pub fn status(&self) -> RunStatus {
        let clean = self.failed_pages() == 0
            && self.workers_without_browser == 0
            && self.persistence_failures == 0
            && self.emails_failed == 0
            && !self.cancelled;

        if clean {
            RunStatus::Completed
        } else {
            RunStatus::CompletedWithFailures
        }
    }
}
