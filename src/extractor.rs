use regex::Regex;
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use url::Url;

use crate::config::SelectorConfig;
use crate::models::ScrapedRecord;
use crate::utils::error::{AppError, Result};

/// An optional label or currency prefix, one amount, then anything without
/// further digits. A sign directly before the amount is captured so it can
/// be refused rather than dropped.
const PRICE_PATTERN: &str =
    r"^[^\d\-]*?(?P<sign>-)?\s*[\$£€¥₹]?\s*(?P<amount>\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)[^\d]*$";

/// Reads name, price and image off a rendered product page.
///
/// Extraction is pure: the same markup always yields the same record or the
/// same error.
pub struct ProductExtractor {
    price_regex: Regex,
    price: Field,
    name: Field,
    image: Field,
}

struct Field {
    source: String,
    selector: Selector,
}

impl Field {
    fn parse(source: &str) -> Result<Self> {
        let selector = Selector::parse(source).map_err(|e| {
            AppError::Validation(format!("Invalid CSS selector '{}': {:?}", source, e))
        })?;
        Ok(Self {
            source: source.to_string(),
            selector,
        })
    }

    fn first_in<'a>(&self, document: &'a Html) -> Result<ElementRef<'a>> {
        document
            .select(&self.selector)
            .next()
            .ok_or_else(|| AppError::ElementNotFound {
                selector: self.source.clone(),
            })
    }
}

impl ProductExtractor {
    pub fn new(selectors: &SelectorConfig) -> Result<Self> {
        let price_regex = Regex::new(PRICE_PATTERN)
            .map_err(|e| AppError::Internal(format!("price pattern: {}", e)))?;
        Ok(Self {
            price_regex,
            price: Field::parse(&selectors.price)?,
            name: Field::parse(&selectors.name)?,
            image: Field::parse(&selectors.image)?,
        })
    }

    /// `page_url` is only used to resolve a relative image `src`.
    pub fn extract(&self, identifier: &str, html: &str, page_url: &str) -> Result<ScrapedRecord> {
        let document = Html::parse_document(html);

        let price_text = element_text(self.price.first_in(&document)?);
        let price = self.parse_price(&price_text)?;

        let name = element_text(self.name.first_in(&document)?);
        if name.is_empty() {
            return Err(AppError::Extraction {
                message: format!("empty product name for {}", identifier),
            });
        }

        let image = self.image.first_in(&document)?;
        let src = image
            .value()
            .attr("src")
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .ok_or_else(|| AppError::Extraction {
                message: format!("image element has no src for {}", identifier),
            })?;

        Ok(ScrapedRecord {
            identifier: identifier.to_string(),
            name,
            price,
            image_url: resolve_image(page_url, src),
        })
    }

    /// Parse a displayed price such as `$1,299.00`, `12.50 €` or `Rs. 499`.
    pub fn parse_price(&self, text: &str) -> Result<Decimal> {
        let not_numeric = || AppError::Extraction {
            message: format!("price '{}' is not numeric", text.trim()),
        };

        let captures = self.price_regex.captures(text.trim()).ok_or_else(not_numeric)?;
        if captures.name("sign").is_some() {
            return Err(AppError::Extraction {
                message: format!("price '{}' is negative", text.trim()),
            });
        }

        let amount = captures.name("amount").ok_or_else(not_numeric)?;
        Decimal::from_str(&amount.as_str().replace(',', "")).map_err(|_| not_numeric())
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve_image(page_url: &str, src: &str) -> String {
    match Url::parse(page_url).and_then(|base| base.join(src)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => src.to_string(),
    }
}
