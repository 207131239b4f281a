use crate::index::Index;
use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const DEFAULT_LIMIT: usize = 5;

fn default_limit() -> usize { DEFAULT_LIMIT }

/// Free-text query with optional boosts, exact-match filters and a result cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    /// Overrides the configured boost of a text field for this query.
    #[serde(default)]
    pub boosts: BTreeMap<String, f64>,
    /// keyword field -> required exact value; all must hold.
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for Query {
    fn default() -> Self {
        Self { text: String::new(), boosts: BTreeMap::new(), filters: BTreeMap::new(), limit: DEFAULT_LIMIT }
    }
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), ..Self::default() }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }

    pub fn boost(mut self, field: impl Into<String>, weight: f64) -> Self {
        self.boosts.insert(field.into(), weight);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoredResult {
    pub doc_id: DocId,
    pub score: f64,
}

impl Index {
    /// Rank documents against `query`, best first, at most `query.limit` of them.
    ///
    /// Never fails: unknown filter fields, unmatched values and queries
    /// without any known token all yield an empty (or unranked) result.
    pub fn search(&self, query: &Query) -> Vec<ScoredResult> {
        if query.limit == 0 || self.is_empty() {
            return Vec::new();
        }

        let candidates = if query.filters.is_empty() {
            None
        } else {
            match self.filter_candidates(&query.filters) {
                Some(c) if !c.is_empty() => Some(c),
                _ => return Vec::new(),
            }
        };

        let tokens = self.analyzer.tokenize(&query.text);
        if tokens.is_empty() {
            // Nothing to rank by: hand back candidates in ingestion order.
            return match candidates {
                Some(c) => c.into_iter().take(query.limit).map(|doc_id| ScoredResult { doc_id, score: 0.0 }).collect(),
                None => (0..self.num_docs()).take(query.limit).map(|doc_id| ScoredResult { doc_id, score: 0.0 }).collect(),
            };
        }

        let mut scores: HashMap<DocId, f64> = HashMap::new();
        for token in &tokens {
            for (field, fidx) in &self.text {
                let boost = query.boosts.get(field).copied().unwrap_or_else(|| self.config.boost(field));
                if boost <= 0.0 { continue; }
                let Some(postings) = fidx.postings.get(token) else { continue };
                let idf = self.idf(fidx.df(token));
                for (&doc_id, &tf) in postings {
                    *scores.entry(doc_id).or_insert(0.0) += tf as f64 * idf * boost;
                }
            }
        }

        let mut scored: Vec<ScoredResult> = scores
            .into_iter()
            .filter(|&(doc_id, score)| {
                score > 0.0 && candidates.as_ref().map_or(true, |c| c.binary_search(&doc_id).is_ok())
            })
            .map(|(doc_id, score)| ScoredResult { doc_id, score })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.doc_id.cmp(&b.doc_id)));
        let total_hits = scored.len();
        scored.truncate(query.limit);
        tracing::debug!(query = %query.text, total_hits, returned = scored.len(), "search");
        scored
    }

    /// Intersection of the ordinals matching every filter, ascending.
    /// `None` when some filter field is not a keyword field.
    fn filter_candidates(&self, filters: &BTreeMap<String, String>) -> Option<Vec<DocId>> {
        let mut acc: Option<Vec<DocId>> = None;
        for (field, value) in filters {
            let matching = self.keyword_field(field)?.lookup(value);
            acc = Some(match acc {
                None => matching.to_vec(),
                Some(prev) => prev.into_iter().filter(|d| matching.binary_search(d).is_ok()).collect(),
            });
            if acc.as_ref().is_some_and(Vec::is_empty) { break; }
        }
        acc
    }
}
