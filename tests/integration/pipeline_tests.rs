use super::*;
use price_drop_watcher::{
    models::FailureKind,
    store::{MemoryStore, ProductStore, RecipientSource},
    ProductState, Recipient, RunStatus,
};
use rust_decimal::Decimal;
use std::str::FromStr;

fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

async fn store(identifiers: &[&str], recipients: &[(&str, &str)]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::with_identifiers(identifiers.iter().copied()));
    for (email, name) in recipients {
        store.add_recipient(&Recipient::new(*email, *name)).await.unwrap();
    }
    store
}

async fn product(store: &MemoryStore, identifier: &str) -> ProductState {
    store.get(identifier).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_every_identifier_scraped_exactly_once() {
    let ids = ["a", "b", "c", "d", "e", "f", "g"];
    let shop = FakeShop::new();
    for id in ids {
        shop.price(id, "1.00");
    }
    let store = store(&ids, &[]).await;
    let watcher = build_watcher(store.clone(), &shop, &RecordingTransport::new());

    let report = watcher.run_cycle(Some(3)).await.unwrap();

    let mut visits = shop.visits();
    visits.sort();
    assert_eq!(visits, ids.to_vec());
    assert_eq!(report.scraped, 7);
    assert_eq!(shop.launches(), 3);
    assert_eq!(shop.closes(), 3);
}

#[tokio::test]
async fn test_timeout_skips_only_that_identifier() {
    let shop = FakeShop::new();
    shop.price("lamp", "10.00").price("chair", "20.00").price("desk", "30.00");
    shop.make_slow("chair");
    let store = store(&["lamp", "chair", "desk"], &[]).await;
    let watcher = build_watcher(store.clone(), &shop, &RecordingTransport::new());

    // One worker so all three share a shard.
    let report = watcher.run_cycle(Some(1)).await.unwrap();

    assert_eq!(report.scraped, 2);
    assert_eq!(report.page_failures.get(&FailureKind::Timeout), Some(&1));
    assert_eq!(report.status(), RunStatus::CompletedWithFailures);
    assert!(store.get("chair").await.unwrap().is_none());
    assert_eq!(product(&store, "desk").await.current_price, dec("30.00"));
}

#[tokio::test]
async fn test_price_history_across_runs() {
    let shop = FakeShop::new();
    shop.price("lamp", "10");
    let store = store(&["lamp"], &[]).await;
    let watcher = build_watcher(store.clone(), &shop, &RecordingTransport::new());

    watcher.run_cycle(None).await.unwrap();
    let first = product(&store, "lamp").await;
    assert_eq!(first.current_price, dec("10"));
    assert_eq!(first.previous_price, None);

    shop.price("lamp", "8");
    watcher.run_cycle(None).await.unwrap();
    let second = product(&store, "lamp").await;
    assert_eq!(second.current_price, dec("8"));
    assert_eq!(second.previous_price, Some(dec("10")));

    shop.price("lamp", "9");
    watcher.run_cycle(None).await.unwrap();
    let third = product(&store, "lamp").await;
    assert_eq!(third.current_price, dec("9"));
    assert_eq!(third.previous_price, Some(dec("8")));
}

#[tokio::test]
async fn test_only_real_drops_are_emailed() {
    let shop = FakeShop::new();
    shop.price("same", "10").price("rise", "10").price("fall", "10");
    let transport = RecordingTransport::new();
    let store = store(&["same", "rise", "fall"], &[("alice@example.com", "Alice")]).await;
    let watcher = build_watcher(store.clone(), &shop, &transport);

    watcher.run_cycle(None).await.unwrap();
    shop.price("rise", "12").price("fall", "8");
    let report = watcher.run_cycle(None).await.unwrap();

    assert_eq!(report.drops, 1);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    let body = &sent[0].html_body;
    assert!(body.contains("fall deluxe"));
    assert!(body.contains("Price dropped by $2"));
    assert!(!body.contains("rise deluxe"));
    assert!(!body.contains("same deluxe"));
    assert!(body.contains("https://shop.test/media/fall.jpg"));
    assert!(body.contains("https://shop.test/products/fall"));
}

#[tokio::test]
async fn test_no_drops_sends_nothing() {
    let shop = FakeShop::new();
    shop.price("lamp", "10");
    let transport = RecordingTransport::new();
    let store = store(&["lamp"], &[("alice@example.com", "Alice")]).await;
    let watcher = build_watcher(store.clone(), &shop, &transport);

    watcher.run_cycle(None).await.unwrap();
    shop.price("lamp", "11");
    let report = watcher.run_cycle(None).await.unwrap();

    assert_eq!(report.drops, 0);
    assert_eq!(report.emails_sent, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_unchanged_rerun_collapses_history() {
    let shop = FakeShop::new();
    shop.price("lamp", "10");
    let store = store(&["lamp"], &[("alice@example.com", "Alice")]).await;
    let transport = RecordingTransport::new();
    let watcher = build_watcher(store.clone(), &shop, &transport);

    watcher.run_cycle(None).await.unwrap();
    watcher.run_cycle(None).await.unwrap();

    let state = product(&store, "lamp").await;
    assert_eq!(state.current_price, dec("10"));
    assert_eq!(state.previous_price, Some(dec("10")));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_first_observation_never_notifies() {
    let shop = FakeShop::new();
    shop.price("lamp", "0.01");
    let transport = RecordingTransport::new();
    let store = store(&["lamp"], &[("alice@example.com", "Alice")]).await;
    let watcher = build_watcher(store.clone(), &shop, &transport);

    let report = watcher.run_cycle(None).await.unwrap();

    assert_eq!(report.created, 1);
    assert_eq!(report.drops, 0);
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_one_message_per_recipient_and_failures_isolated() {
    let shop = FakeShop::new();
    shop.price("lamp", "10");
    let transport = RecordingTransport::new();
    transport.reject("bob@example.com");
    let store = store(
        &["lamp"],
        &[
            ("alice@example.com", "Alice"),
            ("bob@example.com", "Bob"),
            ("carol@example.com", "Carol"),
        ],
    )
    .await;
    let watcher = build_watcher(store.clone(), &shop, &transport);

    watcher.run_cycle(None).await.unwrap();
    shop.price("lamp", "7.50");
    let report = watcher.run_cycle(None).await.unwrap();

    assert_eq!(report.emails_sent, 2);
    assert_eq!(report.emails_failed, 1);
    assert_eq!(report.status(), RunStatus::CompletedWithFailures);

    let sent = transport.sent();
    let mut to: Vec<_> = sent.iter().map(|m| (m.to_email.as_str(), m.to_name.as_str())).collect();
    to.sort();
    assert_eq!(to, vec![("alice@example.com", "Alice"), ("carol@example.com", "Carol")]);
    assert!(sent.iter().all(|m| m.subject == "Important: Current prices"));
}

#[tokio::test]
async fn test_missing_browser_for_one_worker_is_partial() {
    let shop = FakeShop::with_browser_limit(1);
    shop.price("a", "1").price("b", "2").price("c", "3").price("d", "4");
    let store = store(&["a", "b", "c", "d"], &[]).await;
    let watcher = build_watcher(store.clone(), &shop, &RecordingTransport::new());

    let report = watcher.run_cycle(Some(2)).await.unwrap();

    assert_eq!(report.workers_without_browser, 1);
    assert_eq!(report.scraped, 2);
    assert_eq!(report.status(), RunStatus::CompletedWithFailures);
}

#[tokio::test]
async fn test_no_browser_at_all_is_fatal() {
    let shop = FakeShop::with_browser_limit(0);
    shop.price("a", "1");
    let store = store(&["a"], &[]).await;
    let watcher = build_watcher(store.clone(), &shop, &RecordingTransport::new());

    let err = watcher.run_cycle(None).await.unwrap_err();

    assert!(matches!(err, AppError::NoBrowserCapacity { .. }));
    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_more_workers_than_identifiers() {
    let shop = FakeShop::new();
    shop.price("only", "5");
    let store = store(&["only"], &[]).await;
    let watcher = build_watcher(store.clone(), &shop, &RecordingTransport::new());

    let report = watcher.run_cycle(Some(4)).await.unwrap();

    assert_eq!(report.scraped, 1);
    assert_eq!(shop.launches(), 1);
    assert_eq!(report.status(), RunStatus::Completed);
}
