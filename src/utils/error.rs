use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Navigation error: {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Timeout error: '{marker}' did not appear on {url} within {timeout_secs}s")]
    Timeout {
        url: String,
        marker: String,
        timeout_secs: u64,
    },

    #[error("Extraction error: {message}")]
    Extraction { message: String },

    #[error("Element not found: {selector}")]
    ElementNotFound { selector: String },

    #[error("Persistence error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("Delivery error: {recipient}: {message}")]
    Delivery { recipient: String, message: String },

    #[error("Browser launch failed: {0}")]
    BrowserLaunch(String),

    #[error("No browser session could be acquired ({attempted} attempted)")]
    NoBrowserCapacity { attempted: usize },

    #[error("Identifier source unavailable: {0}")]
    IdentifierSource(String),

    #[error("A scrape cycle is already running")]
    CycleInProgress,

    #[error("Cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] tokio_cron_scheduler::JobSchedulerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Errors that only cost the current identifier its place in this run.
    pub fn is_page_failure(&self) -> bool {
        matches!(
            self,
            AppError::Navigation { .. }
                | AppError::Timeout { .. }
                | AppError::Extraction { .. }
                | AppError::ElementNotFound { .. }
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(format!("{}", err))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
