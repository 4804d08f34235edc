// Shared fixtures for the integration tests: a fake shop served through the
// browser traits and an email transport that records what it was asked to send.

pub mod api_tests;
pub mod pipeline_tests;
pub mod store_tests;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, Response},
    Router,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use price_drop_watcher::{
    notifiers::EmailTransport,
    scraper::{BrowserLauncher, BrowserSession},
    store::Repository,
    AppConfig, AppError, PriceWatcher, Result,
};

pub const BASE_URL: &str = "https://shop.test/products";

#[derive(Default)]
struct ShopState {
    prices: HashMap<String, String>,
    slow: Vec<String>,
    visits: Vec<String>,
}

/// Product pages keyed by identifier. Unknown or "slow" identifiers never
/// show the content marker and time out.
#[derive(Clone, Default)]
pub struct FakeShop {
    state: Arc<Mutex<ShopState>>,
    launches: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    max_browsers: Option<usize>,
}

impl FakeShop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the first `max` launches succeed.
    pub fn with_browser_limit(max: usize) -> Self {
        Self {
            max_browsers: Some(max),
            ..Self::default()
        }
    }

    pub fn price(&self, identifier: &str, price: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .prices
            .insert(identifier.to_string(), price.to_string());
        self
    }

    pub fn make_slow(&self, identifier: &str) -> &Self {
        self.state.lock().unwrap().slow.push(identifier.to_string());
        self
    }

    pub fn visits(&self) -> Vec<String> {
        self.state.lock().unwrap().visits.clone()
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

struct FakeShopSession {
    shop: FakeShop,
}

impl BrowserSession for FakeShopSession {
    fn render(&mut self, url: &str, marker: &str, timeout: Duration) -> Result<String> {
        let identifier = url.rsplit('/').next().unwrap_or_default().to_string();
        let mut state = self.shop.state.lock().unwrap();
        state.visits.push(identifier.clone());

        let price = state.prices.get(&identifier).cloned();
        match price {
            Some(price) if !state.slow.contains(&identifier) => Ok(format!(
                r#"<html><body>
                    <div class="product-dec-right"><img src="/media/{identifier}.jpg"></div>
                    <div class="product-details-content">
                        <h2>{identifier} deluxe</h2>
                        <h3>${price}</h3>
                    </div>
                </body></html>"#
            )),
            _ => Err(AppError::Timeout {
                url: url.to_string(),
                marker: marker.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }

    fn close(&mut self) {
        self.shop.closes.fetch_add(1, Ordering::SeqCst);
    }
}

impl BrowserLauncher for FakeShop {
    fn launch(&self) -> Result<Box<dyn BrowserSession>> {
        let launched = self.launches.fetch_add(1, Ordering::SeqCst);
        if self.max_browsers.is_some_and(|max| launched >= max) {
            return Err(AppError::BrowserLaunch("no more browsers".into()));
        }
        Ok(Box::new(FakeShopSession { shop: self.clone() }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub to_email: String,
    pub to_name: String,
    pub subject: String,
    pub html_body: String,
}

/// Records every message; addresses listed in `reject` fail delivery.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    reject: Arc<Mutex<Vec<String>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, email: &str) {
        self.reject.lock().unwrap().push(email.to_string());
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send(&self, to_email: &str, to_name: &str, subject: &str, html_body: &str) -> Result<()> {
        if self.reject.lock().unwrap().iter().any(|r| r == to_email) {
            return Err(AppError::Delivery {
                recipient: to_email.to_string(),
                message: "550 mailbox unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(SentEmail {
            to_email: to_email.to_string(),
            to_name: to_name.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
        });
        Ok(())
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scraper.base_url = BASE_URL.to_string();
    config.scraper.concurrency = 2;
    config.scraper.timeout_secs = 1;
    config
}

pub fn build_watcher(
    store: Arc<dyn Repository>,
    shop: &FakeShop,
    transport: &RecordingTransport,
) -> Arc<PriceWatcher> {
    let watcher = PriceWatcher::with_transport(
        &test_config(),
        store,
        Arc::new(shop.clone()),
        Arc::new(transport.clone()),
    )
    .unwrap();
    Arc::new(watcher)
}

pub async fn make_request(app: Router, method: Method, uri: &str) -> anyhow::Result<Response<Body>> {
    let request = Request::builder().method(method).uri(uri).body(Body::empty())?;
    Ok(app.oneshot(request).await?)
}

pub async fn body_json(response: Response<Body>) -> anyhow::Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}
