use thiserror::Error;

/// Raised while validating an [`IndexConfig`](crate::IndexConfig) or building an index from it.
/// A failed build never publishes a partial index.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("no text or keyword fields configured")]
    NoFields,
    #[error("field names must not be empty")]
    EmptyFieldName,
    #[error("field `{0}` is configured more than once")]
    DuplicateField(String),
    #[error("boost given for `{0}`, which is not a configured text field")]
    UnknownBoostField(String),
    #[error("boost for `{field}` must be a finite, non-negative number (got {weight})")]
    InvalidBoost { field: String, weight: f64 },
}
