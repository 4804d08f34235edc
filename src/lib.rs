pub mod config;
pub mod coordinator;
pub mod extractor;
pub mod models;
pub mod notifiers;
pub mod reconciler;
pub mod scheduler;
pub mod scraper;
pub mod store;
pub mod telemetry;
pub mod utils;
pub mod watcher;
pub mod web;
pub mod worker;

// Re-export commonly used types
pub use config::AppConfig;
pub use coordinator::{ScrapeCoordinator, partition};
pub use models::{Identifier, ProductState, Recipient, RunReport, RunStatus, ScrapedRecord};
pub use utils::error::{AppError, Result};
pub use watcher::PriceWatcher;
