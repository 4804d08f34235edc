use html_escape::{encode_double_quoted_attribute, encode_text};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

use crate::models::{Identifier, ProductState};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceDrop {
    pub identifier: Identifier,
    pub name: String,
    pub image_url: String,
    pub url: String,
    pub previous_price: Decimal,
    pub current_price: Decimal,
    pub delta: Decimal,
}

/// Rendered email body for every product that got cheaper. Empty when
/// nothing dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DropSummary {
    pub drops: Vec<PriceDrop>,
    pub html: String,
}

impl DropSummary {
    pub fn has_drops(&self) -> bool {
        !self.drops.is_empty()
    }
}

pub struct NotificationComposer {
    currency_symbol: String,
}

impl NotificationComposer {
    pub fn new(currency_symbol: impl Into<String>) -> Self {
        Self {
            currency_symbol: currency_symbol.into(),
        }
    }

    /// Select products whose current price is below a known previous price,
    /// keeping the store's order.
    pub fn compose(&self, products: &[ProductState]) -> DropSummary {
        let drops: Vec<PriceDrop> = products
            .iter()
            .filter_map(|product| {
                let delta = product.price_drop()?;
                Some(PriceDrop {
                    identifier: product.identifier.clone(),
                    name: product.name.clone(),
                    image_url: product.image_url.clone(),
                    url: product.url.clone(),
                    previous_price: product.previous_price?,
                    current_price: product.current_price,
                    delta,
                })
            })
            .collect();

        let mut html = String::new();
        for drop in &drops {
            self.render_block(&mut html, drop);
        }

        DropSummary { drops, html }
    }

    fn render_block(&self, html: &mut String, drop: &PriceDrop) {
        let symbol = encode_text(&self.currency_symbol);
        // Writing into a String cannot fail.
        let _ = write!(
            html,
            r#"
<h3><a href="{url}">{name}</a></h3>
<img src="{image}" width="200px" alt="">
<br>
<b>Old Price: {symbol}{old}</b> <br>
<b>New Price: {symbol}{new}</b>
<br>
<b>Price dropped by {symbol}{delta}</b>
<hr>
"#,
            url = encode_double_quoted_attribute(&drop.url),
            name = encode_text(&drop.name),
            image = encode_double_quoted_attribute(&drop.image_url),
            symbol = symbol,
            old = drop.previous_price,
            new = drop.current_price,
            delta = drop.delta,
        );
    }
}
