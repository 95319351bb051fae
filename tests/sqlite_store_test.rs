use food_recalls::config::{StorageBackend, StorageSettings};
use food_recalls::domain::{Category, NormalizedRecall, Retailer, RiskLevel, SortField, SortOrder};
use food_recalls::error::RecallError;
use food_recalls::normalize::normalize;
use food_recalls::persister::Persister;
use food_recalls::storage::{open_store, FindOptions, RecallFilter, RecallStore, SqliteStore, UpsertOutcome};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

fn recall(id: &str, product: &str, date: &str, reason: &str) -> NormalizedRecall {
    normalize(&json!({
        "recallId": id,
        "product": product,
        "brand": "Acme Foods",
        "reason": reason,
        "recallDate": date,
    }))
    .unwrap()
}

#[tokio::test]
async fn upsert_find_and_count() {
    let dir = tempdir().unwrap();
    let store = SqliteStore::open(dir.path().join("nested").join("recalls.db")).unwrap();

    let hummus = recall("F-1", "Organic Hummus", "2025-09-01", "Listeria monocytogenes");
    assert_eq!(store.upsert(&hummus).await.unwrap(), UpsertOutcome::Created);
    assert_eq!(store.upsert(&hummus).await.unwrap(), UpsertOutcome::Updated);
    store
        .upsert(&recall("F-2", "Frozen Shrimp", "2025-09-03", "Undeclared soy"))
        .await
        .unwrap();
    store
        .upsert(&recall("F-3", "Shrimp Dumplings", "2025-09-02", "Foreign material"))
        .await
        .unwrap();

    assert_eq!(store.count(&RecallFilter::default()).await.unwrap(), 3);

    let newest_first = store
        .find(&RecallFilter::default(), &FindOptions::page(SortField::RecallDate, SortOrder::Desc, 1, 2))
        .await
        .unwrap();
    let ids: Vec<&str> = newest_first.iter().map(|r| r.recall_id.as_str()).collect();
    assert_eq!(ids, vec!["F-2", "F-3"]);

    let high = RecallFilter {
        risk_level: Some(RiskLevel::High),
        ..RecallFilter::default()
    };
    assert_eq!(store.count(&high).await.unwrap(), 1);

    let seafood = RecallFilter {
        category: Some(Category::Seafood),
        search: Some("dumpling".into()),
        ..RecallFilter::default()
    };
    let found = store.find(&seafood, &FindOptions::default()).await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].recall_id, "F-3");

    let stored = store.find_one("F-1").await.unwrap().unwrap();
    assert_eq!(stored, hummus);
    assert!(store.find_one("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn active_and_retailer_filters_narrow_in_sql() {
    let store = SqliteStore::open_in_memory().unwrap();
    let mut closed = recall("A", "Salsa", "2025-01-01", "Undeclared milk");
    closed.is_active = false;
    let mut walmart = recall("B", "Salsa Verde", "2025-01-02", "Undeclared milk");
    walmart.retailer = Retailer::Walmart;
    store.upsert(&closed).await.unwrap();
    store.upsert(&walmart).await.unwrap();

    assert_eq!(store.count(&RecallFilter::active()).await.unwrap(), 1);
    let at_walmart = RecallFilter {
        retailer: Some(Retailer::Walmart),
        ..RecallFilter::default()
    };
    assert_eq!(store.count(&at_walmart).await.unwrap(), 1);

    let removed = store.delete_many(&RecallFilter { active_only: false, ..at_walmart }).await.unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn persisting_twice_converges_on_the_latest_input() {
    let dir = tempdir().unwrap();
    let settings = StorageSettings {
        backend: StorageBackend::Sqlite,
        sqlite_path: dir.path().join("recalls.db"),
    };
    let store = open_store(&settings).unwrap();
    let persister = Persister::new(store.clone());

    let first = recall("F-1", "Organic Hummus", "2025-09-01", "Undeclared sesame");
    let second = recall("F-1", "Organic Hummus", "2025-09-01", "Listeria monocytogenes");

    assert_eq!(persister.persist(&[first.clone(), second.clone()]).await.unwrap(), 1);
    assert_eq!(persister.persist(&[second.clone()]).await.unwrap(), 0);

    assert_eq!(store.count(&RecallFilter::default()).await.unwrap(), 1);
    let stored = store.find_one("F-1").await.unwrap().unwrap();
    assert_eq!(stored.reason, "Listeria monocytogenes");
    assert_eq!(stored.risk_level, RiskLevel::High);
    assert_eq!(stored, second);
}

#[tokio::test]
async fn concurrent_persists_leave_one_row() {
    let store: Arc<dyn RecallStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let persister = Persister::new(store.clone());
    let record = recall("F-7", "Granola", "2025-05-05", "Undeclared almonds");

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let persister = persister.clone();
            let record = record.clone();
            tokio::spawn(async move { persister.persist(&[record]).await })
        })
        .collect();
    let mut created = 0;
    for handle in handles {
        created += handle.await.unwrap().unwrap();
    }

    assert_eq!(created, 1);
    assert_eq!(store.count(&RecallFilter::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn renormalize_rewrites_rows_in_place() {
    let store = Arc::new(SqliteStore::open_in_memory().unwrap());
    let mut stale = recall("F-1", "Frozen Shrimp", "2025-02-02", "Undeclared soy");
    stale.category = Category::Other;
    stale.tags.clear();
    store.upsert(&stale).await.unwrap();

    let persister = Persister::new(store.clone());
    let report = persister.renormalize_all().await.unwrap();
    assert_eq!((report.processed, report.updated, report.failed), (1, 1, 0));

    let fixed = store.find_one("F-1").await.unwrap().unwrap();
    assert_eq!(fixed.category, Category::Seafood);
    assert!(fixed.tags.contains("seafood"));
}

#[test]
fn unopenable_path_is_store_unavailable() {
    let dir = tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "plain file").unwrap();

    let err = SqliteStore::open(blocker.join("recalls.db")).err().unwrap();
    assert!(matches!(err, RecallError::StoreUnavailable(_)), "{err:?}");
}
