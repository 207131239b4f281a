use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use docsift_core::{Document, IndexConfig, IndexHandle};
use fetcher::{ContentFetcher, FetchError};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use server::tools::{GatewayConfig, ToolGateway};
use axum::routing::get as get_route;
use server::{build_app, cors_layer, AppState, Reloader};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

struct StaticFetcher;

#[async_trait]
impl ContentFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if url.contains("unreachable") {
            Err(FetchError::Request { url: url.to_string(), reason: "connection refused".into() })
        } else {
            Ok(format!("# page at {url}"))
        }
    }
}

fn tiny_docs() -> Vec<Document> {
    vec![
        Document::new().with("filename", "a.md").with("content", "getting started guide"),
        Document::new().with("filename", "b.md").with("content", "advanced configuration"),
    ]
}

fn app_with(reload: Option<Reloader>) -> (Router, Arc<IndexHandle>) {
    let index = Arc::new(IndexHandle::new(&tiny_docs(), IndexConfig::default()).unwrap());
    let gateway = Arc::new(ToolGateway::new(index.clone(), Arc::new(StaticFetcher), GatewayConfig::default()));
    (build_app(AppState { index: index.clone(), gateway, reload }), index)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned()));
    (status, json)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn call_tool(app: Router, name: &str, args: Value) -> (StatusCode, Value) {
    let req = Request::post(format!("/tools/{name}"))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(args.to_string()))
        .unwrap();
    send(app, req).await
}

#[tokio::test]
async fn search_returns_ranked_results() {
    let (app, _) = app_with(None);
    let (status, json) = get(app, "/search?q=getting%20started&k=2").await;
    assert_eq!(status, StatusCode::OK);
    let arr = json["results"].as_array().unwrap();
    assert_eq!(arr[0]["id"], "a.md");
    assert_eq!(arr[0]["doc_id"], 0);
    assert!(arr[0]["score"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn extra_search_params_filter_by_keyword() {
    let (app, _) = app_with(None);
    let (status, json) = get(app, "/search?q=guide&filename=b.md").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["results"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn search_tool_formats_hits() {
    let (app, _) = app_with(None);
    let (status, json) = call_tool(app, "search", json!({"query": "guide", "limit": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["tool"], "search");
    assert_eq!(
        json["output"],
        "Top 1 relevant documents:\n\n1. **a.md**\ngetting started guide\n---\n"
    );
}

#[tokio::test]
async fn search_tool_reports_no_results_as_success() {
    let (app, _) = app_with(None);
    let (status, json) = call_tool(app, "search", json!({"query": "nonexistent"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["output"], "No relevant documents found.");
}

#[tokio::test]
async fn invalid_arguments_are_rejected_before_dispatch() {
    let (app, _) = app_with(None);
    let (status, json) = call_tool(app.clone(), "search", json!({"limit": 2})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["kind"], "validation");

    let (status, json) = call_tool(app.clone(), "search", json!({"query": "guide", "limit": 0})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["kind"], "validation");

    let (status, json) = call_tool(app, "fetch", json!({"url": 7})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"]["message"], "argument `url` must be a string");
}

#[tokio::test]
async fn unknown_tool_is_not_found() {
    let (app, _) = app_with(None);
    let (status, json) = call_tool(app, "delete_everything", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"]["kind"], "unknown_tool");
}

#[tokio::test]
async fn fetch_failure_leaves_search_untouched() {
    let (app, index) = app_with(None);
    let before = index.current();
    let (status, json) = call_tool(app.clone(), "fetch", json!({"url": "http://unreachable.invalid/"})).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(json["error"]["kind"], "fetch");
    assert!(Arc::ptr_eq(&before, &index.current()));

    let (status, json) = call_tool(app, "search", json!({"query": "guide", "limit": 1})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["output"].as_str().unwrap().contains("**a.md**"));
}

#[tokio::test]
async fn fetch_and_add_tools() {
    let (app, _) = app_with(None);
    let (status, json) = call_tool(app.clone(), "fetch", json!({"url": "https://datatalks.club/"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["output"], "# page at https://datatalks.club/");

    let (status, json) = call_tool(app, "add", json!({"a": 2, "b": 40})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["output"], json!({"result": 42}));
}

#[tokio::test]
async fn tool_schemas_are_published() {
    let (app, _) = app_with(None);
    let (status, json) = get(app, "/tools").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = json.as_array().unwrap().iter().map(|t| t["name"].as_str().unwrap().to_string()).collect();
    assert_eq!(names, vec!["search", "fetch", "add"]);
    assert_eq!(json[1]["args"][0]["required"], true);
}

#[tokio::test]
async fn doc_and_stats_endpoints() {
    let (app, _) = app_with(None);
    let (status, json) = get(app.clone(), "/doc/1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["filename"], "b.md");
    let (status, _) = get(app.clone(), "/doc/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = get(app, "/stats").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 2);
    assert_eq!(json["fields"][0]["name"], "content");
    assert_eq!(json["fields"][1]["kind"], "keyword");
}

#[tokio::test]
async fn reload_swaps_in_the_new_corpus() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("fresh.md"), "brand new deployment notes").unwrap();
    let root = dir.path().to_path_buf();
    let reload: Reloader = Arc::new(move || {
        indexer::load_documents(&indexer::DocumentSource::Directory { path: root.clone() }, &Default::default())
    });
    let (app, index) = app_with(Some(reload));

    let req = Request::post("/admin/reload").body(Body::empty()).unwrap();
    let (status, json) = send(app.clone(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 1);
    assert_eq!(index.current().num_docs(), 1);

    let (_, json) = call_tool(app, "search", json!({"query": "deployment"})).await;
    assert!(json["output"].as_str().unwrap().contains("**fresh.md**"));
}

#[tokio::test]
async fn reload_without_source_is_not_implemented() {
    let (app, _) = app_with(None);
    let (status, _) = send(app, Request::post("/admin/reload").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
}

#[tokio::test]
async fn search_tool_caps_limit_at_max() {
    let docs: Vec<Document> = (0..150)
        .map(|i| Document::new().with("filename", format!("{i}.md")).with("content", "guide"))
        .collect();
    let index = Arc::new(IndexHandle::new(&docs, IndexConfig::default()).unwrap());
    let gateway = ToolGateway::new(index, Arc::new(StaticFetcher), GatewayConfig::default());

    let output = gateway.invoke("search", &json!({"query": "guide", "limit": 1000})).await.unwrap();
    let server::tools::ToolOutput::Text(text) = output else { panic!("search returns text") };
    assert!(text.starts_with("Top 100 relevant documents:\n"));
    assert!(text.contains("\n100. **99.md**\n"));
    assert!(!text.contains("**100.md**"));
}

async fn allow_origin_for(layer: tower_http::cors::CorsLayer, origin: &str) -> Option<String> {
    let app = Router::new().route("/health", get_route(|| async { "ok" })).layer(layer);
    let req = Request::get("/health").header(header::ORIGIN, origin).body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    resp.headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .map(|v| v.to_str().unwrap().to_string())
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    assert_eq!(allow_origin_for(cors_layer(None), "https://a.example").await.as_deref(), Some("*"));
    assert_eq!(allow_origin_for(cors_layer(Some(" , ")), "https://a.example").await.as_deref(), Some("*"));
}

#[tokio::test]
async fn cors_restricts_to_listed_origins() {
    let listed = || cors_layer(Some("https://a.example, https://b.example"));
    assert_eq!(allow_origin_for(listed(), "https://b.example").await.as_deref(), Some("https://b.example"));
    assert_eq!(allow_origin_for(listed(), "https://evil.example").await, None);
}
