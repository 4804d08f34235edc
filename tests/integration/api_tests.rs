use super::*;
use axum::http::StatusCode;
use price_drop_watcher::{
    store::{MemoryStore, RecipientSource},
    web::{create_router, AppState},
    Recipient,
};

async fn app(shop: &FakeShop, identifiers: &[&str]) -> (Router, Arc<PriceWatcher>) {
    let store = Arc::new(MemoryStore::with_identifiers(identifiers.iter().copied()));
    store
        .add_recipient(&Recipient::new("alice@example.com", "Alice"))
        .await
        .unwrap();
    let watcher = build_watcher(store, shop, &RecordingTransport::new());
    (create_router(AppState::new(Arc::clone(&watcher))), watcher)
}

#[tokio::test]
async fn test_health_check() -> anyhow::Result<()> {
    let (app, _) = app(&FakeShop::new(), &[]).await;

    let response = make_request(app, Method::GET, "/health").await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["cycle_running"], false);
    Ok(())
}

#[tokio::test]
async fn test_trigger_scrape_completed() -> anyhow::Result<()> {
    let shop = FakeShop::new();
    shop.price("lamp", "10.00");
    let (app, _) = app(&shop, &["lamp"]).await;

    let response = make_request(app, Method::POST, "/api/scrape?concurrency=1").await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["report"]["scraped"], 1);
    assert_eq!(body["report"]["created"], 1);
    Ok(())
}

#[tokio::test]
async fn test_trigger_scrape_with_failures() -> anyhow::Result<()> {
    let shop = FakeShop::new();
    shop.price("lamp", "10.00");
    let (app, _) = app(&shop, &["lamp", "missing"]).await;

    let response = make_request(app, Method::POST, "/api/scrape").await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "completed_with_failures");
    assert_eq!(body["report"]["page_failures"]["timeout"], 1);
    Ok(())
}

#[tokio::test]
async fn test_trigger_scrape_without_browsers() -> anyhow::Result<()> {
    let shop = FakeShop::with_browser_limit(0);
    let (app, _) = app(&shop, &["lamp"]).await;

    let response = make_request(app, Method::POST, "/api/scrape").await?;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await?;
    assert_eq!(body["status"], "failed");
    assert!(body["report"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_zero_concurrency_rejected() -> anyhow::Result<()> {
    let (app, _) = app(&FakeShop::new(), &["lamp"]).await;

    let response = make_request(app, Method::POST, "/api/scrape?concurrency=0").await?;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await?;
    assert_eq!(body["code"], "BAD_REQUEST");
    assert_eq!(body["message"], "concurrency must be at least 1");
    Ok(())
}

#[tokio::test]
async fn test_list_products_after_scrape() -> anyhow::Result<()> {
    let shop = FakeShop::new();
    shop.price("lamp", "10.00").price("desk", "99.50");
    let (app, watcher) = app(&shop, &["lamp", "desk"]).await;

    watcher.run_cycle(None).await?;
    let response = make_request(app, Method::GET, "/api/products").await?;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    let products = body.as_array().expect("array of products");
    assert_eq!(products.len(), 2);
    assert_eq!(products[0]["identifier"], "desk");
    assert_eq!(products[0]["name"], "desk deluxe");
    assert_eq!(products[1]["url"], "https://shop.test/products/lamp");
    assert!(products[1]["previous_price"].is_null());
    Ok(())
}

#[tokio::test]
async fn test_scrape_is_post_only() -> anyhow::Result<()> {
    let (app, _) = app(&FakeShop::new(), &[]).await;

    let response = make_request(app, Method::GET, "/api/scrape").await?;

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}
