use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{IdentifierSource, ProductStore, RecipientSource};
use crate::models::{Identifier, ProductState, Recipient};
use crate::utils::error::Result;

/// Insertion-ordered in-process store, used for dry runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    products: RwLock<Vec<ProductState>>,
    identifiers: RwLock<Vec<Identifier>>,
    recipients: RwLock<Vec<Recipient>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identifiers<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Identifier>,
    {
        Self {
            identifiers: RwLock::new(identifiers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl ProductStore for MemoryStore {
    async fn get(&self, identifier: &str) -> Result<Option<ProductState>> {
        let products = self.products.read().await;
        Ok(products.iter().find(|p| p.identifier == identifier).cloned())
    }

    async fn upsert(&self, product: &ProductState) -> Result<()> {
        let mut products = self.products.write().await;
        match products.iter_mut().find(|p| p.identifier == product.identifier) {
            Some(existing) => *existing = product.clone(),
            None => products.push(product.clone()),
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ProductState>> {
        Ok(self.products.read().await.clone())
    }
}

#[async_trait]
impl IdentifierSource for MemoryStore {
    async fn identifiers(&self) -> Result<Vec<Identifier>> {
        Ok(self.identifiers.read().await.clone())
    }

    async fn track(&self, identifier: &str) -> Result<bool> {
        let mut identifiers = self.identifiers.write().await;
        if identifiers.iter().any(|i| i == identifier) {
            return Ok(false);
        }
        identifiers.push(identifier.to_string());
        Ok(true)
    }
}

#[async_trait]
impl RecipientSource for MemoryStore {
    async fn recipients(&self) -> Result<Vec<Recipient>> {
        Ok(self.recipients.read().await.clone())
    }

    async fn add_recipient(&self, recipient: &Recipient) -> Result<()> {
        let mut recipients = self.recipients.write().await;
        match recipients.iter_mut().find(|r| r.email == recipient.email) {
            Some(existing) => existing.name = recipient.name.clone(),
            None => recipients.push(recipient.clone()),
        }
        Ok(())
    }
}
