use crate::config::IndexConfig;
use crate::error::ConfigurationError;
use crate::index::Index;
use crate::search::{Query, ScoredResult};
use crate::Document;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Owner of the live index.
///
/// Readers take an `Arc` snapshot and search it without holding any lock.
/// [`IndexHandle::rebuild`] builds the replacement off to the side and then
/// swaps the pointer, so a query always sees one complete index.
pub struct IndexHandle {
    current: RwLock<Arc<Index>>,
    rebuilding: Mutex<()>,
}

impl IndexHandle {
    pub fn new(documents: &[Document], config: IndexConfig) -> Result<Self, ConfigurationError> {
        let index = Index::build(documents, &config)?;
        Ok(Self { current: RwLock::new(Arc::new(index)), rebuilding: Mutex::new(()) })
    }

    pub fn config(&self) -> IndexConfig { self.current().config().clone() }

    pub fn current(&self) -> Arc<Index> {
        self.current.read().clone()
    }

    /// Replace the live index with one built from `documents` under the current config.
    pub fn rebuild(&self, documents: &[Document]) -> Result<Arc<Index>, ConfigurationError> {
        let _serial = self.rebuilding.lock();
        let config = self.config();
        Ok(self.install(Index::build(documents, &config)?))
    }

    /// Replace the live index with one built from `documents` and `config`.
    /// On error the previous index keeps serving.
    pub fn reconfigure(&self, documents: &[Document], config: &IndexConfig) -> Result<Arc<Index>, ConfigurationError> {
        let _serial = self.rebuilding.lock();
        Ok(self.install(Index::build(documents, config)?))
    }

    fn install(&self, index: Index) -> Arc<Index> {
        let fresh = Arc::new(index);
        *self.current.write() = fresh.clone();
        tracing::info!(num_docs = fresh.num_docs(), "index swapped");
        fresh
    }

    pub fn search(&self, query: &Query) -> Vec<ScoredResult> {
        self.current().search(query)
    }
}
