//! Tool gateway: a fixed set of named operations, each with a declared
//! argument schema that is checked before anything is dispatched.

use docsift_core::{Index, IndexHandle, Query, ScoredResult};
use fetcher::{ContentFetcher, FetchError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub const NO_RESULTS: &str = "No relevant documents found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Integer,
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgType::String => f.write_str("a string"),
            ArgType::Integer => f.write_str("an integer"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ArgSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ArgType,
    pub required: bool,
    pub description: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    Text,
    Record,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Search,
    Fetch,
    Add,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub args: Vec<ArgSpec>,
    pub returns: ReturnKind,
    #[serde(skip)]
    op: Operation,
}

fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "search",
            description: "Search the indexed documentation and return the most relevant files with excerpts.",
            args: vec![
                ArgSpec { name: "query", ty: ArgType::String, required: true, description: "Free-text search query" },
                ArgSpec { name: "limit", ty: ArgType::Integer, required: false, description: "Maximum number of documents to return" },
            ],
            returns: ReturnKind::Text,
            op: Operation::Search,
        },
        ToolSpec {
            name: "fetch",
            description: "Fetch a web page and return its content as text.",
            args: vec![ArgSpec { name: "url", ty: ArgType::String, required: true, description: "URL of the page to fetch" }],
            returns: ReturnKind::Text,
            op: Operation::Fetch,
        },
        ToolSpec {
            name: "add",
            description: "Add two integers.",
            args: vec![
                ArgSpec { name: "a", ty: ArgType::Integer, required: true, description: "First addend" },
                ArgSpec { name: "b", ty: ArgType::Integer, required: true, description: "Second addend" },
            ],
            returns: ReturnKind::Record,
            op: Operation::Add,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("arguments must be a JSON object")]
    NotAnObject,
    #[error("missing required argument `{0}`")]
    Missing(String),
    #[error("argument `{name}` must be {expected}")]
    WrongType { name: String, expected: ArgType },
    #[error("unexpected argument `{0}`")]
    Unexpected(String),
    #[error("argument `{name}` {reason}")]
    OutOfRange { name: String, reason: String },
}

/// Arguments that passed [`validate`]; accessors only return declared, well-typed values.
#[derive(Debug, Default)]
pub struct ValidatedArgs {
    values: Map<String, Value>,
}

impl ValidatedArgs {
    pub fn str(&self, name: &str) -> Option<&str> {
        self.values.get(name).and_then(Value::as_str)
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        self.values.get(name).and_then(as_integer)
    }
}

fn as_integer(v: &Value) -> Option<i64> {
    if let Some(i) = v.as_i64() {
        return Some(i);
    }
    // 3.0 is accepted, 3.5 is not
    v.as_f64().filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64).map(|f| f as i64)
}

/// Check `args` against the tool's declared schema. A missing argument and an
/// explicit `null` are treated the same.
pub fn validate(spec: &ToolSpec, args: &Value) -> Result<ValidatedArgs, ValidationError> {
    let obj = match args {
        Value::Object(obj) => obj,
        Value::Null => return validate(spec, &Value::Object(Map::new())),
        _ => return Err(ValidationError::NotAnObject),
    };
    if let Some(extra) = obj.keys().find(|k| !spec.args.iter().any(|a| a.name == k.as_str())) {
        return Err(ValidationError::Unexpected(extra.clone()));
    }
    let mut values = Map::new();
    for arg in &spec.args {
        match obj.get(arg.name) {
            None | Some(Value::Null) => {
                if arg.required {
                    return Err(ValidationError::Missing(arg.name.to_string()));
                }
            }
            Some(v) => {
                let ok = match arg.ty {
                    ArgType::String => v.is_string(),
                    ArgType::Integer => as_integer(v).is_some(),
                };
                if !ok {
                    return Err(ValidationError::WrongType { name: arg.name.to_string(), expected: arg.ty });
                }
                values.insert(arg.name.to_string(), v.clone());
            }
        }
    }
    Ok(ValidatedArgs { values })
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Record(Value),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::Validation(_) => "validation",
            ToolError::Fetch(_) => "fetch",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Keyword field shown as the result heading.
    pub id_field: String,
    /// Text field the excerpt is cut from.
    pub excerpt_field: String,
    pub excerpt_chars: usize,
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            id_field: "filename".to_string(),
            excerpt_field: "content".to_string(),
            excerpt_chars: 500,
            default_limit: docsift_core::DEFAULT_LIMIT,
            max_limit: 100,
        }
    }
}

pub struct ToolGateway {
    index: Arc<IndexHandle>,
    fetcher: Arc<dyn ContentFetcher>,
    config: GatewayConfig,
    specs: Vec<ToolSpec>,
}

impl ToolGateway {
    pub fn new(index: Arc<IndexHandle>, fetcher: Arc<dyn ContentFetcher>, config: GatewayConfig) -> Self {
        Self { index, fetcher, config, specs: builtin_specs() }
    }

    pub fn specs(&self) -> &[ToolSpec] { &self.specs }

    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    pub fn config(&self) -> &GatewayConfig { &self.config }

    /// Validate `args` for tool `name` and run it.
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<ToolOutput, ToolError> {
        let spec = self.spec(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        let args = validate(spec, args).inspect_err(|e| tracing::info!(tool = name, error = %e, "rejected tool call"))?;
        tracing::info!(tool = name, "invoking tool");

        match spec.op {
            Operation::Search => {
                let query = args.str("query").unwrap_or_default();
                let limit = match args.int("limit") {
                    Some(n) if n < 1 => {
                        return Err(ValidationError::OutOfRange { name: "limit".into(), reason: "must be at least 1".into() }.into())
                    }
                    Some(n) => usize::try_from(n).unwrap_or(usize::MAX).min(self.config.max_limit),
                    None => self.config.default_limit,
                };
                Ok(ToolOutput::Text(self.search_text(query, limit)))
            }
            Operation::Fetch => {
                let url = args.str("url").unwrap_or_default();
                let text = self.fetcher.fetch(url).await.inspect_err(|e| tracing::warn!(url, error = %e, "fetch failed"))?;
                Ok(ToolOutput::Text(text))
            }
            Operation::Add => {
                let (a, b) = (args.int("a").unwrap_or_default(), args.int("b").unwrap_or_default());
                let sum = a
                    .checked_add(b)
                    .ok_or_else(|| ValidationError::OutOfRange { name: "b".into(), reason: "makes the sum overflow".into() })?;
                Ok(ToolOutput::Record(json!({ "result": sum })))
            }
        }
    }

    /// Run `query` and render the hits the way the `search` tool returns them.
    pub fn search_text(&self, query: &str, limit: usize) -> String {
        let index = self.index.current();
        let hits = index.search(&Query::new(query).limit(limit));
        format_results(&index, &hits, &self.config)
    }
}

pub fn format_results(index: &Index, hits: &[ScoredResult], config: &GatewayConfig) -> String {
    if hits.is_empty() {
        return NO_RESULTS.to_string();
    }
    let mut response = format!("Top {} relevant documents:\n", hits.len());
    for (i, hit) in hits.iter().enumerate() {
        let doc = index.document(hit.doc_id);
        let id = doc.and_then(|d| d.get(&config.id_field)).unwrap_or("(untitled)");
        let body = doc.and_then(|d| d.get(&config.excerpt_field)).unwrap_or_default();
        response.push_str(&format!("\n{}. **{}**\n{}\n---\n", i + 1, id, excerpt(body, config.excerpt_chars)));
    }
    response
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
