//! Memoization of retrieval results.
//!
//! [`SessionCache`] lives in memory for one connection. [`SharedCache`] is
//! process-wide and durable: each entry is also written to its own JSON file
//! so results survive restarts. Failed computations are never stored.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{QueryLensError, Result};
use crate::retrieval::ResultSet;

/// Identity of a cached result: the query fingerprint within a backend
/// namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub fingerprint: String,
    pub namespace: String,
}

impl CacheKey {
    pub fn new<S: Into<String>>(fingerprint: S, namespace: S) -> Self {
        CacheKey {
            fingerprint: fingerprint.into(),
            namespace: namespace.into(),
        }
    }

    /// Hex SHA-256 of the key, used as the durable file name.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(self.fingerprint.as_bytes());
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// A store of retrieval results keyed by [`CacheKey`].
pub trait ResultCache: Send + Sync + std::fmt::Debug {
    /// The cached result for `key`, or the result of `compute`, which is then
    /// stored. Errors from `compute` are returned and nothing is stored.
    fn get_or_compute(
        &self,
        key: &CacheKey,
        compute: &mut dyn FnMut() -> Result<ResultSet>,
    ) -> Result<Arc<ResultSet>>;

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl Counters {
    fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self, entries: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
        }
    }
}

/// In-memory cache private to one session.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: Mutex<AHashMap<CacheKey, Arc<ResultSet>>>,
    counters: Counters,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ResultCache for SessionCache {
    fn get_or_compute(
        &self,
        key: &CacheKey,
        compute: &mut dyn FnMut() -> Result<ResultSet>,
    ) -> Result<Arc<ResultSet>> {
        if let Some(results) = self.entries.lock().get(key) {
            self.counters.hit();
            return Ok(Arc::clone(results));
        }
        self.counters.miss();
        let results = Arc::new(compute()?);
        self.entries.lock().insert(key.clone(), Arc::clone(&results));
        Ok(results)
    }

    fn stats(&self) -> CacheStats {
        self.counters.snapshot(self.entries.lock().len())
    }
}

/// On-disk form of one entry.
#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: CacheKey,
    created_at: DateTime<Utc>,
    results: ResultSet,
}

/// Durable cache shared by every session of the process.
///
/// The map holds one [`OnceCell`] per key, so concurrent sessions asking for
/// the same key compute it once while different keys proceed in parallel.
/// Entries read back from disk count as hits.
#[derive(Debug)]
pub struct SharedCache {
    dir: PathBuf,
    entries: RwLock<AHashMap<CacheKey, Arc<OnceCell<Arc<ResultSet>>>>>,
    counters: Counters,
}

impl SharedCache {
    /// Open (creating if needed) a cache rooted at `dir`.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| {
            QueryLensError::retrieval(format!("cannot create cache dir {}: {e}", dir.display()))
        })?;
        Ok(SharedCache {
            dir,
            entries: RwLock::new(AHashMap::new()),
            counters: Counters::default(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn cell(&self, key: &CacheKey) -> Arc<OnceCell<Arc<ResultSet>>> {
        if let Some(cell) = self.entries.read().get(key) {
            return Arc::clone(cell);
        }
        let mut entries = self.entries.write();
        Arc::clone(entries.entry(key.clone()).or_default())
    }

    fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.digest()))
    }

    /// Read a durable entry. Unreadable or mismatched files count as absent.
    fn read_entry(&self, key: &CacheKey) -> Option<ResultSet> {
        let path = self.path_for(key);
        let content = fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<StoredEntry>(&content) {
            Ok(entry) if entry.key == *key => Some(entry.results),
            Ok(_) => {
                warn!(path = %path.display(), "cache entry key mismatch, recomputing");
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "corrupt cache entry, recomputing");
                None
            }
        }
    }

    fn write_entry(&self, key: &CacheKey, results: &ResultSet) -> Result<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        let entry = StoredEntry {
            key: key.clone(),
            created_at: Utc::now(),
            results: results.clone(),
        };
        fs::write(&tmp, serde_json::to_vec(&entry)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl ResultCache for SharedCache {
    fn get_or_compute(
        &self,
        key: &CacheKey,
        compute: &mut dyn FnMut() -> Result<ResultSet>,
    ) -> Result<Arc<ResultSet>> {
        let cell = self.cell(key);
        let mut computed = false;
        let results = cell.get_or_try_init(|| {
            if let Some(results) = self.read_entry(key) {
                debug!(fingerprint = %key.fingerprint, "loaded cache entry from disk");
                return Ok::<_, QueryLensError>(Arc::new(results));
            }
            computed = true;
            self.counters.miss();
            let results = compute()?;
            if let Err(e) = self.write_entry(key, &results) {
                warn!(error = %e, "failed to persist cache entry");
            }
            Ok(Arc::new(results))
        })?;
        if !computed {
            self.counters.hit();
        }
        Ok(Arc::clone(results))
    }

    fn stats(&self) -> CacheStats {
        let entries = self
            .entries
            .read()
            .values()
            .filter(|cell| cell.get().is_some())
            .count();
        self.counters.snapshot(entries)
    }
}
