use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{Identifier, ReconcilePolicy};

/// One product as read off a rendered page. Lives for a single run only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScrapedRecord {
    pub identifier: Identifier,
    pub name: String,
    pub price: Decimal,
    pub image_url: String,
}

/// Persisted price state for one tracked identifier.
///
/// `previous_price` is `None` until the identifier has been reconciled twice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductState {
    pub identifier: Identifier,
    pub name: String,
    pub image_url: String,
    pub url: String,
    pub current_price: Decimal,
    pub previous_price: Option<Decimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductState {
    pub fn first_observation(record: ScrapedRecord, url: String) -> Self {
        let now = Utc::now();
        Self {
            identifier: record.identifier,
            name: record.name,
            image_url: record.image_url,
            url,
            current_price: record.price,
            previous_price: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Shift the stored current price into `previous_price` and take the new scrape.
    pub fn observe(&mut self, record: ScrapedRecord, url: String, policy: ReconcilePolicy) {
        let shift = match policy {
            ReconcilePolicy::Always => true,
            ReconcilePolicy::OnChange => record.price != self.current_price,
        };
        if shift {
            self.previous_price = Some(self.current_price);
        }

        self.current_price = record.price;
        self.name = record.name;
        self.image_url = record.image_url;
        self.url = url;
        self.updated_at = Utc::now();
    }

    /// Amount the price fell by since the previous observation, if it fell at all.
    pub fn price_drop(&self) -> Option<Decimal> {
        match self.previous_price {
            Some(previous) if self.current_price < previous => Some(previous - self.current_price),
            _ => None,
        }
    }
}
