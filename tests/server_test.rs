use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use food_recalls::aggregator::Aggregator;
use food_recalls::config::AggregationSettings;
use food_recalls::domain::{Agency, NormalizedRecall};
use food_recalls::error::{RecallError, Result};
use food_recalls::normalize::normalize;
use food_recalls::persister::{PersistQueue, Persister};
use food_recalls::server::{create_server, AppState};
use food_recalls::storage::{FindOptions, InMemoryStore, RecallFilter, RecallStore, StoredDocument, UpsertOutcome};
use food_recalls::types::{ProviderQuery, ProviderRecall, RawProviderRecord, RecallProvider};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// A feed that is reachable but has nothing to report
struct QuietProvider;

#[async_trait]
impl RecallProvider for QuietProvider {
    fn provider_name(&self) -> &'static str {
        "quiet"
    }

    fn agency(&self) -> Agency {
        Agency::Fsis
    }

    async fn fetch_raw(&self, _query: &ProviderQuery) -> Result<Vec<RawProviderRecord>> {
        Ok(Vec::new())
    }

    fn transform(&self, _records: &[RawProviderRecord]) -> Vec<ProviderRecall> {
        Vec::new()
    }
}

struct DownStore;

#[async_trait]
impl RecallStore for DownStore {
    async fn find(&self, _: &RecallFilter, _: &FindOptions) -> Result<Vec<NormalizedRecall>> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
    async fn find_one(&self, _: &str) -> Result<Option<NormalizedRecall>> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
    async fn upsert(&self, _: &NormalizedRecall) -> Result<UpsertOutcome> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
    async fn count(&self, _: &RecallFilter) -> Result<usize> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
    async fn delete_many(&self, _: &RecallFilter) -> Result<usize> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
    async fn remove(&self, _: &str) -> Result<bool> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
    async fn all(&self) -> Result<Vec<StoredDocument>> {
        Err(RecallError::StoreUnavailable("disk detached".into()))
    }
}

fn app(store: Arc<dyn RecallStore>) -> axum::Router {
    let persister = Persister::new(store);
    let (queue, _worker) = PersistQueue::start(persister.clone(), 4);
    let settings = AggregationSettings {
        live_timeout_ms: 500,
        ..AggregationSettings::default()
    };
    let providers: Vec<Arc<dyn RecallProvider>> = vec![Arc::new(QuietProvider)];
    let aggregator = Aggregator::new(providers, persister.clone(), queue, settings);
    create_server(Arc::new(AppState { aggregator, persister }))
}

async fn call(app: axum::Router, method: &str, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn health_reports_version() {
    let (status, body) = call(app(Arc::new(InMemoryStore::new())), "GET", "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn list_serves_stored_recalls_as_camel_case() {
    let store = Arc::new(InMemoryStore::new());
    let recall = normalize(&json!({"recallId": "S-1", "product": "Frozen Shrimp", "recallDate": "2025-07-04"})).unwrap();
    store.upsert(&recall).await.unwrap();

    let (status, body) = call(app(store), "GET", "/recalls?category=seafood&page=1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["totalPages"], 1);
    assert_eq!(body["source"], "store");
    assert_eq!(body["records"][0]["recallId"], "S-1");
    assert_eq!(body["records"][0]["riskLevel"], "medium");
}

#[tokio::test]
async fn bad_parameters_are_400() {
    let (status, body) = call(app(Arc::new(InMemoryStore::new())), "GET", "/recalls?page=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unreachable_store_is_503() {
    let (status, _) = call(app(Arc::new(DownStore)), "GET", "/recalls").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let (status, _) = call(app(Arc::new(DownStore)), "POST", "/admin/renormalize").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn unknown_recall_is_404() {
    let (status, body) = call(app(Arc::new(InMemoryStore::new())), "GET", "/recalls/F-0000-2025").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("F-0000-2025"));
}

#[tokio::test]
async fn admin_sync_reports_counts() {
    let (status, body) = call(app(Arc::new(InMemoryStore::new())), "POST", "/admin/sync").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"fetched": 0, "saved": 0}));
}
