//! Refinement sessions and the engine that creates them.
//!
//! The [`LensEngine`] holds everything shared between connections: loaded
//! resources, dialects, the variation generator and, when configured, the
//! shared result cache. Each connection gets its own [`Session`] with its
//! own judgments and retrieval backend.

pub mod channel;
pub mod orchestrator;
pub mod protocol;

use std::sync::Arc;

use tracing::info;

use crate::config::{CacheScope, EvaluationMode, LensConfig};
use crate::dialect::DialectRegistry;
use crate::error::Result;
use crate::eval::{Evaluator, JudgmentSet};
use crate::resources::Resources;
use crate::retrieval::{
    CollectionBackend, PooledBackend, ResultCache, RetrievalBackend, Retriever, SessionCache,
    SharedCache,
};
use crate::select::LearnedSelector;
use crate::transform::VariationGenerator;

pub use channel::{MemoryChannel, MemoryClient, MessageChannel};
pub use orchestrator::{Session, Stage};
pub use protocol::{LensRequest, LensResponse, QueryVariation, Shape};

/// Process-wide state shared by all sessions.
#[derive(Debug)]
pub struct LensEngine {
    config: LensConfig,
    resources: Arc<Resources>,
    dialects: Arc<DialectRegistry>,
    generator: Arc<VariationGenerator>,
    shared_cache: Option<Arc<SharedCache>>,
}

impl LensEngine {
    /// Build an engine over already loaded resources.
    pub fn new(config: LensConfig, resources: Arc<Resources>) -> Result<Self> {
        config.validate()?;

        let mut dialects = DialectRegistry::with_defaults();
        dialects.set_default(&config.dialect.default)?;

        let shared_cache = match (config.evaluation.cache_scope, &config.evaluation.cache_dir) {
            (CacheScope::Shared, Some(dir)) => {
                info!(dir = %dir.display(), "using shared result cache");
                Some(Arc::new(SharedCache::open(dir)?))
            }
            _ => None,
        };

        let generator = VariationGenerator::new(&resources);
        Ok(LensEngine {
            config,
            resources,
            dialects: Arc::new(dialects),
            generator: Arc::new(generator),
            shared_cache,
        })
    }

    /// Build an engine, loading resources into the process-wide cell on
    /// first use.
    pub fn from_config(config: LensConfig) -> Result<Self> {
        let resources = Resources::global(&config.resources)?;
        info!(summary = ?resources.summary(), "resources ready");
        Self::new(config, resources)
    }

    pub fn config(&self) -> &LensConfig {
        &self.config
    }

    pub fn resources(&self) -> &Arc<Resources> {
        &self.resources
    }

    pub fn dialects(&self) -> &Arc<DialectRegistry> {
        &self.dialects
    }

    /// A new session judging `relevant` documents as relevant.
    pub fn open_session<I, S>(&self, relevant: I) -> Session
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let judgments = Arc::new(JudgmentSet::from_relevant(relevant));

        let collection: Arc<dyn RetrievalBackend> = Arc::new(CollectionBackend::new(
            Arc::clone(&self.resources.collection),
            Arc::clone(&self.resources.ontology),
        ));
        let backend: Arc<dyn RetrievalBackend> = match self.config.evaluation.mode {
            EvaluationMode::Collection => collection,
            EvaluationMode::JudgedPool => {
                Arc::new(PooledBackend::new(collection, judgments.judged_ids()))
            }
        };

        let cache: Arc<dyn ResultCache> = match &self.shared_cache {
            Some(shared) => Arc::clone(shared) as Arc<dyn ResultCache>,
            None => Arc::new(SessionCache::new()),
        };

        let retriever = Arc::new(Retriever::new(backend, cache));
        let selector = LearnedSelector::new(self.resources.model.clone(), Arc::clone(&retriever));
        Session::new(
            Arc::clone(&self.dialects),
            Arc::clone(&self.generator),
            Evaluator::new(retriever, judgments),
            Box::new(selector),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_engine_defaults() {
        let engine = LensEngine::new(LensConfig::default(), Arc::new(Resources::default())).unwrap();
        assert_eq!(engine.dialects().default_tag(), "medline");
        assert!(engine.shared_cache.is_none());
    }

    #[test]
    fn test_engine_rejects_unknown_default_dialect() {
        let mut config = LensConfig::default();
        config.dialect.default = "cochrane".to_string();
        assert!(LensEngine::new(config, Arc::new(Resources::default())).is_err());
    }

    #[test]
    fn test_shared_cache_is_shared_between_sessions() {
        let dir = TempDir::new().unwrap();
        let mut config = LensConfig::default();
        config.evaluation.cache_scope = CacheScope::Shared;
        config.evaluation.cache_dir = Some(dir.path().to_path_buf());
        let engine = LensEngine::new(config, Arc::new(Resources::default())).unwrap();

        let query = crate::query::Keyword::new("a", [crate::query::Field::Title]).into();
        let first = engine.open_session(["d1"]);
        let second = engine.open_session(["d1"]);
        first.evaluator().evaluate(&query).unwrap();
        second.evaluator().evaluate(&query).unwrap();

        let stats = second.evaluator().retriever().cache_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }

    #[test]
    fn test_session_caches_are_private() {
        let engine = LensEngine::new(LensConfig::default(), Arc::new(Resources::default())).unwrap();
        let query = crate::query::Keyword::new("a", [crate::query::Field::Title]).into();
        let first = engine.open_session(["d1"]);
        let second = engine.open_session(["d1"]);
        first.evaluator().evaluate(&query).unwrap();
        second.evaluator().evaluate(&query).unwrap();

        assert_eq!(first.evaluator().retriever().cache_stats().misses, 1);
        assert_eq!(second.evaluator().retriever().cache_stats().misses, 1);
        assert_eq!(second.evaluator().retriever().cache_stats().hits, 0);
    }
}
