use crate::error::ConfigurationError;
use crate::tokenizer::AnalyzerConfig;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Which document fields are tokenized and scored, which are matched exactly,
/// and how scoring is weighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub text_fields: Vec<String>,
    pub keyword_fields: Vec<String>,
    /// Per text field score multiplier; fields not listed use 1.0.
    pub boosts: BTreeMap<String, f64>,
    pub analyzer: AnalyzerConfig,
    /// Use `ln(1 + N / (1 + df))` rather than `ln(N / (1 + df))`.
    pub smoothed_idf: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            text_fields: vec!["content".to_string()],
            keyword_fields: vec!["filename".to_string()],
            boosts: BTreeMap::new(),
            analyzer: AnalyzerConfig::default(),
            smoothed_idf: true,
        }
    }
}

impl IndexConfig {
    pub fn new<T, K>(text_fields: T, keyword_fields: K) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        K: IntoIterator,
        K::Item: Into<String>,
    {
        Self {
            text_fields: text_fields.into_iter().map(Into::into).collect(),
            keyword_fields: keyword_fields.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_boost(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.boosts.insert(field.into(), weight);
        self
    }

    pub fn with_analyzer(mut self, analyzer: AnalyzerConfig) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn with_smoothed_idf(mut self, smoothed: bool) -> Self {
        self.smoothed_idf = smoothed;
        self
    }

    pub fn boost(&self, field: &str) -> f64 {
        self.boosts.get(field).copied().unwrap_or(1.0)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.text_fields.is_empty() && self.keyword_fields.is_empty() {
            return Err(ConfigurationError::NoFields);
        }
        let mut seen: HashSet<&str> = HashSet::new();
        for name in self.text_fields.iter().chain(self.keyword_fields.iter()) {
            if name.is_empty() {
                return Err(ConfigurationError::EmptyFieldName);
            }
            if !seen.insert(name) {
                return Err(ConfigurationError::DuplicateField(name.clone()));
            }
        }
        for (field, &weight) in &self.boosts {
            if !self.text_fields.iter().any(|f| f == field) {
                return Err(ConfigurationError::UnknownBoostField(field.clone()));
            }
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigurationError::InvalidBoost { field: field.clone(), weight });
            }
        }
        Ok(())
    }
}
