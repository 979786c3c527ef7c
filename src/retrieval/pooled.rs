//! Retrieval restricted to a fixed pool of documents.

use std::sync::Arc;

use ahash::AHashSet;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::query::Query;
use crate::retrieval::{ResultSet, RetrievalBackend};

/// Filters another backend's results down to a document pool, typically the
/// judged documents of a session.
#[derive(Debug, Clone)]
pub struct PooledBackend {
    inner: Arc<dyn RetrievalBackend>,
    pool: AHashSet<String>,
    namespace: String,
}

impl PooledBackend {
    pub fn new<I, S>(inner: Arc<dyn RetrievalBackend>, pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool: AHashSet<String> = pool.into_iter().map(Into::into).collect();

        let mut ids: Vec<&str> = pool.iter().map(String::as_str).collect();
        ids.sort_unstable();
        let mut hasher = Sha256::new();
        for id in ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\n");
        }
        let digest: String = hasher.finalize()[..8]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        let namespace = format!("{}/pool:{digest}", inner.namespace());

        PooledBackend {
            inner,
            pool,
            namespace,
        }
    }

    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }
}

impl RetrievalBackend for PooledBackend {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    fn retrieve(&self, query: &Query) -> Result<ResultSet> {
        let mut results = self.inner.retrieve(query)?;
        results.documents.retain(|d| self.pool.contains(&d.doc_id));
        Ok(results)
    }
}
