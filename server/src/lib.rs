use anyhow::Result;
use axum::{extract::{Query, State}, http::StatusCode, routing::get, Json, Router};
use index_core::persist::IndexPaths;
use index_core::{Pipeline, QueryEngine, ScoredDoc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer, AllowOrigin};
use tower_http::trace::TraceLayer;

pub const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub total_hits: usize,
    pub bytes_read: u64,
    pub results: Vec<ScoredDoc>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    pub max_k: usize,
}

/// Open the merged index under `index_dir` with the pipeline it was built with.
pub fn load_engine<P: AsRef<Path>>(index_dir: P) -> Result<QueryEngine> {
    let index_paths = IndexPaths::new(index_dir);
    let pipeline = Pipeline::for_index(&index_paths)?;
    Ok(QueryEngine::open(&index_paths, pipeline)?)
}

/// Load the merged index under `index_dir` and build the router. Fails if the
/// index has not been built and merged.
pub fn build_app<P: AsRef<Path>>(index_dir: P) -> Result<Router> {
    Ok(router(load_engine(index_dir)?, MAX_K))
}

/// Router over an opened engine; `k` is clamped to `1..=max_k`.
pub fn router(engine: QueryEngine, max_k: usize) -> Router {
    let app_state = AppState { engine: Arc::new(engine), max_k: max_k.max(1) };

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
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let k = params.k.clamp(1, state.max_k);
    let engine = state.engine.clone();
    let q = params.q.clone();
    // postings reads are blocking file I/O
    let outcome = tokio::task::spawn_blocking(move || engine.query(&q, k))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(|e| {
            tracing::error!(error = %e, "query failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(SearchResponse {
        query: params.q,
        took_s: outcome.elapsed_s,
        total_hits: outcome.candidates,
        bytes_read: outcome.bytes_read,
        results: outcome.results,
    }))
}
