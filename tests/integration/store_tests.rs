use super::*;
use price_drop_watcher::{
    config::DatabaseConfig,
    store::{IdentifierSource, ProductStore, RecipientSource, SqliteStore},
    Recipient,
};
use rust_decimal::Decimal;

async fn sqlite(dir: &tempfile::TempDir) -> Arc<SqliteStore> {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("watcher.db").display()),
        max_connections: 2,
    };
    Arc::new(SqliteStore::connect(&config).await.unwrap())
}

#[tokio::test]
async fn test_drop_detected_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let shop = FakeShop::new();
    shop.price("lamp", "10.00").price("desk", "99.00");
    let transport = RecordingTransport::new();

    {
        let store = sqlite(&dir).await;
        store.track("lamp").await.unwrap();
        store.track("desk").await.unwrap();
        store
            .add_recipient(&Recipient::new("alice@example.com", "Alice"))
            .await
            .unwrap();

        let report = build_watcher(store.clone(), &shop, &transport)
            .run_cycle(None)
            .await
            .unwrap();
        assert_eq!(report.created, 2);
        store.close().await;
    }

    shop.price("lamp", "8.00");
    let store = sqlite(&dir).await;
    let report = build_watcher(store.clone(), &shop, &transport)
        .run_cycle(None)
        .await
        .unwrap();

    assert_eq!(report.created, 0);
    assert_eq!(report.drops, 1);
    assert_eq!(transport.sent().len(), 1);

    let lamp = store.get("lamp").await.unwrap().unwrap();
    assert_eq!(lamp.current_price, Decimal::new(800, 2));
    assert_eq!(lamp.previous_price, Some(Decimal::new(1000, 2)));

    let order: Vec<String> = store
        .list_all()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.identifier)
        .collect();
    assert_eq!(order, vec!["desk", "lamp"]);
}
