use serde::{Deserialize, Serialize};

pub mod product;
pub mod recipient;
pub mod run_report;

// Re-exports for convenience
pub use product::*;
pub use recipient::*;
pub use run_report::*;

/// Opaque product key; substituted verbatim into the product page path.
pub type Identifier = String;

/// How `previous_price` moves when a product is scraped again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReconcilePolicy {
    /// previous <- old current on every successful reconciliation
    #[default]
    Always,
    /// previous only moves when the scraped price differs from the stored one
    OnChange,
}
