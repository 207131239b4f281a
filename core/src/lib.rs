//! In-memory document index: tokenized text fields scored with TF-IDF,
//! exact-match keyword fields for filtering, and a swappable handle for
//! rebuilding while queries are served.

pub mod config;
pub mod document;
pub mod error;
pub mod handle;
pub mod index;
pub mod search;
pub mod tokenizer;

/// Stable ordinal of a document within the store it was indexed from.
pub type DocId = u32;

pub use config::IndexConfig;
pub use document::Document;
pub use error::ConfigurationError;
pub use handle::IndexHandle;
pub use index::{build, FieldKind, FieldStats, Index, IndexStats};
pub use search::{Query, ScoredResult, DEFAULT_LIMIT};
pub use tokenizer::{Analyzer, AnalyzerConfig};
