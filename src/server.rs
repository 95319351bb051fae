use crate::aggregator::{Aggregator, ListParams, ListRequest};
use crate::error::RecallError;
use crate::persister::Persister;
use axum::{
    extract::{Path, Query},
    http::{Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use hyper::Server;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const DEFAULT_NEWS_LIMIT: usize = 20;

/// Everything the handlers need, shared behind one `Arc`
pub struct AppState {
    pub aggregator: Aggregator,
    pub persister: Persister,
}

impl IntoResponse for RecallError {
    fn into_response(self) -> Response {
        let status = match &self {
            RecallError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            RecallError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, "Rejected request");
        }
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "food-recalls",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn list_recalls(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Response, RecallError> {
    let request = ListRequest::from_params(&params)?;
    let response = state.aggregator.list(&request).await?;
    Ok(Json(response).into_response())
}

async fn get_recall(
    Extension(state): Extension<Arc<AppState>>,
    Path(recall_id): Path<String>,
) -> Result<Response, RecallError> {
    match state.aggregator.lookup(&recall_id).await? {
        Some(recall) => Ok(Json(recall).into_response()),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "success": false,
                "error": format!("recall '{recall_id}' not found"),
            })),
        )
            .into_response()),
    }
}

#[derive(Debug, Deserialize)]
struct NewsParams {
    limit: Option<usize>,
}

async fn news(Extension(state): Extension<Arc<AppState>>, Query(params): Query<NewsParams>) -> impl IntoResponse {
    let results = state
        .aggregator
        .recent_news(params.limit.unwrap_or(DEFAULT_NEWS_LIMIT))
        .await;
    Json(serde_json::json!({ "success": true, "results": results }))
}

async fn providers_health(Extension(state): Extension<Arc<AppState>>) -> impl IntoResponse {
    Json(state.aggregator.provider_health().await)
}

async fn sync(Extension(state): Extension<Arc<AppState>>) -> Result<Response, RecallError> {
    let report = state.aggregator.sync().await?;
    Ok(Json(report).into_response())
}

async fn renormalize(Extension(state): Extension<Arc<AppState>>) -> Result<Response, RecallError> {
    let report = state.persister.renormalize_all().await?;
    Ok(Json(report).into_response())
}

/// Build the router with every route and CORS
pub fn create_server(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/recalls", get(list_recalls))
        .route("/recalls/:recall_id", get(get_recall))
        .route("/news", get(news))
        .route("/providers/health", get(providers_health))
        // Admin/task endpoints
        .route("/admin/sync", post(sync))
        .route("/admin/renormalize", post(renormalize))
        .layer(Extension(state))
        .layer(ServiceBuilder::new().layer(cors))
}

/// Serve on `0.0.0.0:port` until the process exits
pub async fn start_server(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = create_server(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{port}");
    info!("Health check: http://localhost:{port}/health");

    Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
