//! Query execution against a document collection, memoized through a cache.
//!
//! A [`RetrievalBackend`] turns a [`Query`] into a ranked [`ResultSet`]. The
//! [`Retriever`] puts a [`ResultCache`] in front of a backend so that every
//! distinct query is executed at most once per cache.

pub mod cache;
pub mod collection;
pub mod pooled;

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::error::Result;
use crate::query::Query;

pub use cache::{CacheKey, CacheStats, ResultCache, SessionCache, SharedCache};
pub use collection::{CollectionBackend, Document, DocumentCollection};
pub use pooled::PooledBackend;

/// A retrieved document and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    /// The document ID.
    pub doc_id: String,
    /// The retrieval score. Higher ranks first.
    pub score: f64,
}

/// Ranked documents retrieved for one query.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultSet {
    /// Documents in rank order.
    pub documents: Vec<ScoredDocument>,
}

impl ResultSet {
    pub fn new(documents: Vec<ScoredDocument>) -> Self {
        ResultSet { documents }
    }

    /// Documents with unit scores, in the given order.
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ResultSet {
            documents: ids
                .into_iter()
                .map(|id| ScoredDocument {
                    doc_id: id.into(),
                    score: 1.0,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn doc_ids(&self) -> impl Iterator<Item = &str> {
        self.documents.iter().map(|d| d.doc_id.as_str())
    }
}

/// Executes queries.
pub trait RetrievalBackend: Send + Sync + Debug {
    /// Identifies the document universe this backend searches. Results of
    /// two backends with equal namespaces are interchangeable.
    fn namespace(&self) -> String;

    /// Run `query` and return ranked results.
    fn retrieve(&self, query: &Query) -> Result<ResultSet>;
}

/// A backend behind a cache.
#[derive(Debug, Clone)]
pub struct Retriever {
    backend: Arc<dyn RetrievalBackend>,
    cache: Arc<dyn ResultCache>,
    namespace: String,
}

impl Retriever {
    pub fn new(backend: Arc<dyn RetrievalBackend>, cache: Arc<dyn ResultCache>) -> Self {
        let namespace = backend.namespace();
        Retriever {
            backend,
            cache,
            namespace,
        }
    }

    /// Results for `query`, executing the backend only on a cache miss.
    pub fn retrieve(&self, query: &Query) -> Result<Arc<ResultSet>> {
        let key = CacheKey::new(query.fingerprint(), self.namespace.clone());
        let backend = &self.backend;
        let results = self
            .cache
            .get_or_compute(&key, &mut || backend.retrieve(query))?;
        trace!(fingerprint = %key.fingerprint, num_ret = results.len(), "retrieved");
        Ok(results)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::query::{Field, Keyword};

    #[derive(Debug, Default)]
    struct CountingBackend {
        calls: AtomicUsize,
    }

    impl RetrievalBackend for CountingBackend {
        fn namespace(&self) -> String {
            "counting".to_string()
        }

        fn retrieve(&self, _query: &Query) -> Result<ResultSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ResultSet::from_ids(["doc1", "doc2"]))
        }
    }

    #[test]
    fn test_retriever_memoizes() {
        let backend = Arc::new(CountingBackend::default());
        let retriever = Retriever::new(backend.clone(), Arc::new(SessionCache::new()));
        let query: Query = Keyword::new("insulin", [Field::Title]).into();

        let first = retriever.retrieve(&query).unwrap();
        let second = retriever.retrieve(&query).unwrap();
        assert_eq!(first, second);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

        let stats = retriever.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn test_result_set_ids() {
        let results = ResultSet::from_ids(["a", "b"]);
        assert_eq!(results.len(), 2);
        assert_eq!(results.doc_ids().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(ResultSet::default().is_empty());
    }
}
