use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use imgsearch_core::{IndexStore, ScoredResult, Searcher, DEFAULT_LIMIT};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Upper bound on `limit` accepted from clients.
pub const MAX_LIMIT: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}
fn default_limit() -> usize { DEFAULT_LIMIT }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub count: usize,
    pub took_s: f64,
    pub results: Vec<ScoredResult>,
}

pub struct AppState<S> {
    pub searcher: Searcher<S>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self { Self { searcher: self.searcher.clone() } }
}

pub fn build_app<S>(store: Arc<S>) -> Router
where
    S: IndexStore + 'static,
{
    let app_state = AppState { searcher: Searcher::new(store) };

    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(|| async { "ok" }))
        .route("/search/images", get(search_handler::<S>))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Image search API. Use /search/images?q=your+query" }))
}

pub async fn search_handler<S>(
    State(state): State<AppState<S>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)>
where
    S: IndexStore + 'static,
{
    let start = std::time::Instant::now();
    let limit = params.limit.min(MAX_LIMIT);
    let results = state.searcher.search(&params.q, limit).map_err(|e| {
        tracing::error!(error = %e, query = %params.q, "search failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "search failed".to_string())
    })?;
    let elapsed = start.elapsed();
    Ok(Json(SearchResponse { query: params.q, count: results.len(), took_s: elapsed.as_secs_f64(), results }))
}
