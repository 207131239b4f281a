pub mod tools;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use docsift_core::{Document, DocId, IndexHandle, IndexStats};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tools::{excerpt, ToolError, ToolGateway, ToolSpec};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Re-reads the document source for `POST /admin/reload`.
pub type Reloader = Arc<dyn Fn() -> anyhow::Result<Vec<Document>> + Send + Sync>;

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<IndexHandle>,
    pub gateway: Arc<ToolGateway>,
    pub reload: Option<Reloader>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub score: f64,
    pub id: Option<String>,
    pub excerpt: Option<String>,
}

impl IntoResponse for ToolError {
    fn into_response(self) -> Response {
        let status = match &self {
            ToolError::UnknownTool(_) => StatusCode::NOT_FOUND,
            ToolError::Validation(_) => StatusCode::BAD_REQUEST,
            ToolError::Fetch(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": { "kind": self.kind(), "message": self.to_string() } }))).into_response()
    }
}

/// CORS for a comma-separated origin list; any origin when unset or unparsable.
pub fn cors_layer(allowed: Option<&str>) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(std::env::var("CORS_ALLOW_ORIGIN").ok().as_deref());

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/tools", get(list_tools))
        .route("/tools/:name", post(invoke_tool))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .route("/stats", get(stats_handler))
        .route("/admin/reload", post(reload_handler))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn list_tools(State(state): State<AppState>) -> Json<Vec<ToolSpec>> {
    Json(state.gateway.specs().to_vec())
}

async fn invoke_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(args): Json<Value>,
) -> Result<Json<Value>, ToolError> {
    let output = state.gateway.invoke(&name, &args).await?;
    Ok(Json(json!({ "tool": name, "output": output })))
}

/// `q` is the query text, `k` the result count; every other parameter is a keyword filter.
pub async fn search_handler(
    State(state): State<AppState>,
    Query(mut params): Query<HashMap<String, String>>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let start = std::time::Instant::now();
    let text = params.remove("q").unwrap_or_default();
    let cfg = state.gateway.config();
    let k = match params.remove("k") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| (StatusCode::BAD_REQUEST, format!("k must be a non-negative integer, got `{raw}`")))?,
        None => 10,
    };
    let k = k.max(1).min(cfg.max_limit);

    let mut query = docsift_core::Query::new(text.clone()).limit(k);
    for (field, value) in params {
        query = query.filter(field, value);
    }
    let index = state.index.current();
    let results = index
        .search(&query)
        .into_iter()
        .map(|hit| {
            let doc = index.document(hit.doc_id);
            SearchHit {
                doc_id: hit.doc_id,
                score: hit.score,
                id: doc.and_then(|d| d.get(&cfg.id_field)).map(str::to_string),
                excerpt: doc.and_then(|d| d.get(&cfg.excerpt_field)).map(|t| excerpt(t, cfg.excerpt_chars)),
            }
        })
        .collect();

    Ok(Json(SearchResponse { query: text, took_s: start.elapsed().as_secs_f64(), results }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<DocId>) -> Result<Json<Document>, StatusCode> {
    state.index.current().document(doc_id).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn stats_handler(State(state): State<AppState>) -> Json<IndexStats> {
    Json(state.index.current().stats())
}

async fn reload_handler(State(state): State<AppState>) -> Result<Json<Value>, (StatusCode, String)> {
    let Some(reload) = state.reload.clone() else {
        return Err((StatusCode::NOT_IMPLEMENTED, "no reloadable document source configured".into()));
    };
    let index = state.index.clone();
    let rebuilt = tokio::task::spawn_blocking(move || -> anyhow::Result<u32> {
        let docs = reload()?;
        Ok(index.rebuild(&docs)?.num_docs())
    })
    .await
    .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    match rebuilt {
        Ok(num_docs) => Ok(Json(json!({ "num_docs": num_docs }))),
        Err(e) => {
            tracing::error!(error = %e, "reload failed; keeping current index");
            Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))
        }
    }
}
