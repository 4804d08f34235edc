use async_trait::async_trait;

use crate::models::{Identifier, ProductState, Recipient};
use crate::utils::error::Result;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persisted price state, keyed by identifier.
///
/// `list_all` returns products in the store's natural (insertion) order.
#[async_trait]
pub trait ProductStore: Send + Sync {
    async fn get(&self, identifier: &str) -> Result<Option<ProductState>>;
    async fn upsert(&self, product: &ProductState) -> Result<()>;
    async fn list_all(&self) -> Result<Vec<ProductState>>;
}

#[async_trait]
pub trait IdentifierSource: Send + Sync {
    async fn identifiers(&self) -> Result<Vec<Identifier>>;

    /// Returns false if the identifier was already tracked.
    async fn track(&self, identifier: &str) -> Result<bool>;
}

#[async_trait]
pub trait RecipientSource: Send + Sync {
    async fn recipients(&self) -> Result<Vec<Recipient>>;

    /// Inserts or renames a recipient.
    async fn add_recipient(&self, recipient: &Recipient) -> Result<()>;
}

/// Everything the watcher reads and writes.
pub trait Repository: ProductStore + IdentifierSource + RecipientSource {}

impl<T> Repository for T where T: ProductStore + IdentifierSource + RecipientSource {}
