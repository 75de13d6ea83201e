use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use parking_lot::RwLock;
use recommender_core::persist::ArtifactState;
use recommender_core::{BundleStore, ItemId, QueryEngine, QueryResult, RecommendError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const MAX_K: usize = 100;

#[derive(Deserialize)]
pub struct SimilarParams {
    pub k: Option<usize>,
}

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct RecommendResponse {
    pub dataset_id: String,
    pub version: String,
    pub took_s: f64,
    pub results: Vec<Hit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub struct Hit {
    pub item_id: ItemId,
    pub title: String,
    pub score: f32,
    pub matched_terms: Vec<String>,
}

#[derive(Serialize)]
pub struct DatasetInfo {
    pub dataset_id: String,
    pub version: String,
}

/// Loaded engines keyed by dataset id. Each engine is immutable once loaded;
/// the lock only guards the map itself.
#[derive(Clone)]
pub struct AppState {
    pub store: BundleStore,
    pub engines: Arc<RwLock<HashMap<String, Arc<QueryEngine>>>>,
    pub default_k: usize,
}

impl AppState {
    pub fn new(store: BundleStore, default_k: usize) -> Self {
        Self { store, engines: Arc::new(RwLock::new(HashMap::new())), default_k }
    }

    /// Return the engine for the dataset's current bundle, loading it on
    /// first use or when the bundle on disk has been rebuilt.
    pub fn engine(&self, dataset_id: &str) -> Result<Arc<QueryEngine>, RecommendError> {
        let version = match self.store.status(dataset_id)? {
            ArtifactState::Ready { version } => version,
            ArtifactState::Unbuilt => return Err(RecommendError::BundleNotFound(dataset_id.to_string())),
        };
        if let Some(engine) = self.engines.read().get(dataset_id) {
            if engine.version() == version {
                return Ok(engine.clone());
            }
        }
        let engine = Arc::new(QueryEngine::open(&self.store, dataset_id, Some(&version))?);
        self.engines.write().insert(dataset_id.to_string(), engine.clone());
        Ok(engine)
    }

    fn k(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_k).min(MAX_K)
    }
}

pub struct ApiError(RecommendError);

impl From<RecommendError> for ApiError {
    fn from(e: RecommendError) -> Self { Self(e) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            RecommendError::ItemNotFound(_) | RecommendError::BundleNotFound(_) => StatusCode::NOT_FOUND,
            RecommendError::InvalidArgument(_) | RecommendError::EmptyQuery => StatusCode::BAD_REQUEST,
            RecommendError::StaleBundle { .. } => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub fn build_app(artifacts_dir: String, default_k: usize) -> Result<Router> {
    let store = BundleStore::new(&artifacts_dir);
    let ready = store.list()?;
    tracing::info!(artifacts = %artifacts_dir, datasets = ready.len(), "artifact store opened");
    let app_state = AppState::new(store, default_k.clamp(1, MAX_K));

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

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/datasets", get(datasets_handler))
        .route("/datasets/:dataset_id/items/:item_id/similar", get(similar_handler))
        .route("/datasets/:dataset_id/search", get(search_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn datasets_handler(State(state): State<AppState>) -> Result<Json<Vec<DatasetInfo>>, ApiError> {
    let mut out = Vec::new();
    for dataset_id in state.store.list()? {
        if let ArtifactState::Ready { version } = state.store.status(&dataset_id)? {
            out.push(DatasetInfo { dataset_id, version });
        }
    }
    Ok(Json(out))
}

pub async fn similar_handler(
    State(state): State<AppState>,
    Path((dataset_id, item_id)): Path<(String, ItemId)>,
    Query(params): Query<SimilarParams>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let start = Instant::now();
    let engine = state.engine(&dataset_id)?;
    let results = engine.recommend_by_item(item_id, state.k(params.k))?;
    Ok(Json(respond(&engine, results, None, start)))
}

pub async fn search_handler(
    State(state): State<AppState>,
    Path(dataset_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let start = Instant::now();
    let engine = state.engine(&dataset_id)?;
    match engine.recommend_by_text(&params.q, state.k(params.k)) {
        Ok(results) => Ok(Json(respond(&engine, results, None, start))),
        // no overlap with the vocabulary is an answer, not a failure
        Err(RecommendError::EmptyQuery) => Ok(Json(respond(
            &engine,
            Vec::new(),
            Some(RecommendError::EmptyQuery.to_string()),
            start,
        ))),
        Err(e) => Err(e.into()),
    }
}

fn respond(engine: &QueryEngine, results: QueryResult, message: Option<String>, start: Instant) -> RecommendResponse {
    let results = results
        .into_iter()
        .map(|r| Hit {
            title: engine.item(r.item_id).map(|i| i.title.clone()).unwrap_or_default(),
            item_id: r.item_id,
            score: r.score,
            matched_terms: r.matched_terms,
        })
        .collect();
    RecommendResponse {
        dataset_id: engine.dataset_id().to_string(),
        version: engine.version().to_string(),
        took_s: start.elapsed().as_secs_f64(),
        results,
        message,
    }
}
