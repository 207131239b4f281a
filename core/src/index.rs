use crate::config::IndexConfig;
use crate::error::ConfigurationError;
use crate::tokenizer::Analyzer;
use crate::{DocId, Document};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Postings and statistics for one tokenized field.
#[derive(Debug, Default)]
pub struct TextFieldIndex {
    /// token -> (doc ordinal -> term frequency)
    pub postings: HashMap<String, BTreeMap<DocId, u32>>,
    /// token -> number of documents containing it at least once
    pub df: HashMap<String, u32>,
    /// token count of this field per document, indexed by ordinal
    pub lengths: Vec<u32>,
}

impl TextFieldIndex {
    pub fn tf(&self, token: &str, doc_id: DocId) -> u32 {
        self.postings.get(token).and_then(|p| p.get(&doc_id)).copied().unwrap_or(0)
    }

    pub fn df(&self, token: &str) -> u32 {
        self.df.get(token).copied().unwrap_or(0)
    }
}

/// Exact value -> ordinals (ascending) for one keyword field.
#[derive(Debug, Default)]
pub struct KeywordFieldIndex {
    pub values: HashMap<String, Vec<DocId>>,
}

impl KeywordFieldIndex {
    pub fn lookup(&self, value: &str) -> &[DocId] {
        self.values.get(value).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    Keyword,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldStats {
    pub name: String,
    pub kind: FieldKind,
    /// Distinct tokens for text fields, distinct values for keyword fields.
    pub distinct_terms: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub num_docs: u32,
    pub built_at: String,
    pub fields: Vec<FieldStats>,
}

/// Read-only searchable index. Built once; a reload builds a fresh one.
#[derive(Debug)]
pub struct Index {
    pub(crate) config: IndexConfig,
    pub(crate) analyzer: Analyzer,
    pub(crate) docs: Vec<Document>,
    pub(crate) text: Vec<(String, TextFieldIndex)>,
    pub(crate) keyword: Vec<(String, KeywordFieldIndex)>,
    built_at: OffsetDateTime,
}

impl Index {
    /// Build an index over `documents`. Ordinals follow slice order.
    pub fn build(documents: &[Document], config: &IndexConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let analyzer = Analyzer::new(config.analyzer);

        let mut text: Vec<(String, TextFieldIndex)> = config
            .text_fields
            .iter()
            .map(|f| (f.clone(), TextFieldIndex { lengths: Vec::with_capacity(documents.len()), ..Default::default() }))
            .collect();
        let mut keyword: Vec<(String, KeywordFieldIndex)> =
            config.keyword_fields.iter().map(|f| (f.clone(), KeywordFieldIndex::default())).collect();

        for (ord, doc) in documents.iter().enumerate() {
            let doc_id = ord as DocId;
            for (field, fidx) in text.iter_mut() {
                let tokens = doc.get(field.as_str()).map(|t| analyzer.tokenize(t)).unwrap_or_default();
                fidx.lengths.push(tokens.len() as u32);
                let mut seen_in_doc: HashSet<&str> = HashSet::new();
                for token in &tokens {
                    *fidx.postings.entry(token.clone()).or_default().entry(doc_id).or_insert(0) += 1;
                    if seen_in_doc.insert(token) {
                        *fidx.df.entry(token.clone()).or_insert(0) += 1;
                    }
                }
            }
            for (field, kidx) in keyword.iter_mut() {
                if let Some(value) = doc.get(field.as_str()) {
                    kidx.values.entry(value.to_string()).or_default().push(doc_id);
                }
            }
        }

        let index = Self {
            config: config.clone(),
            analyzer,
            docs: documents.to_vec(),
            text,
            keyword,
            built_at: OffsetDateTime::now_utc(),
        };
        if index.is_empty() {
            tracing::warn!("index built with zero documents");
        }
        tracing::info!(
            num_docs = index.num_docs(),
            num_terms = index.text.iter().map(|(_, f)| f.df.len()).sum::<usize>(),
            "index built"
        );
        Ok(index)
    }

    pub fn num_docs(&self) -> u32 { self.docs.len() as u32 }

    pub fn is_empty(&self) -> bool { self.docs.is_empty() }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn analyzer(&self) -> &Analyzer { &self.analyzer }

    pub fn document(&self, doc_id: DocId) -> Option<&Document> { self.docs.get(doc_id as usize) }

    pub fn documents(&self) -> &[Document] { &self.docs }

    pub fn text_field(&self, name: &str) -> Option<&TextFieldIndex> {
        self.text.iter().find(|(f, _)| f == name).map(|(_, idx)| idx)
    }

    pub fn keyword_field(&self, name: &str) -> Option<&KeywordFieldIndex> {
        self.keyword.iter().find(|(f, _)| f == name).map(|(_, idx)| idx)
    }

    /// Token count of `field` in `doc_id`; 0 when the document lacks the field.
    pub fn field_length(&self, field: &str, doc_id: DocId) -> u32 {
        self.text_field(field).and_then(|f| f.lengths.get(doc_id as usize)).copied().unwrap_or(0)
    }

    pub(crate) fn idf(&self, df: u32) -> f64 {
        let n = self.num_docs() as f64;
        let ratio = n / (1.0 + df as f64);
        if self.config.smoothed_idf { (1.0 + ratio).ln() } else { ratio.ln().max(0.0) }
    }

    pub fn stats(&self) -> IndexStats {
        let mut fields: Vec<FieldStats> = self
            .text
            .iter()
            .map(|(name, f)| FieldStats { name: name.clone(), kind: FieldKind::Text, distinct_terms: f.df.len() })
            .collect();
        fields.extend(self.keyword.iter().map(|(name, k)| FieldStats {
            name: name.clone(),
            kind: FieldKind::Keyword,
            distinct_terms: k.values.len(),
        }));
        IndexStats {
            num_docs: self.num_docs(),
            built_at: self.built_at.format(&Rfc3339).unwrap_or_default(),
            fields,
        }
    }
}

/// Build with default analysis and scoring for the given field kinds.
pub fn build<T, K>(documents: &[Document], text_fields: T, keyword_fields: K) -> Result<Index, ConfigurationError>
where
    T: IntoIterator,
    T::Item: Into<String>,
    K: IntoIterator,
    K::Item: Into<String>,
{
    Index::build(documents, &IndexConfig::new(text_fields, keyword_fields))
}
