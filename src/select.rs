//! Choosing the most promising candidate without evaluating it.

pub mod features;
pub mod model;

use std::sync::Arc;

use tracing::debug;

use crate::error::{QueryLensError, Result};
use crate::retrieval::Retriever;
use crate::transform::Candidate;

pub use features::CandidateFeatures;
pub use model::TreeEnsemble;

/// Search depth supported by [`LearnedSelector`].
pub const SUPPORTED_DEPTH: usize = 1;

/// Picks one candidate out of a pool.
pub trait CandidateSelector: Send + Sync {
    /// The best candidate among `pool`, exploring `max_depth` levels of
    /// transformations from `seed`. With an empty pool the seed is returned.
    fn select_best(&self, seed: &Candidate, pool: &[Candidate], max_depth: usize)
    -> Result<Candidate>;
}

/// Scores candidates with a tree-ensemble model over [`CandidateFeatures`].
///
/// Retrieval counts used as features go through the session's cache, so the
/// later evaluation of the same queries does not retrieve again.
#[derive(Debug, Clone)]
pub struct LearnedSelector {
    model: Option<Arc<TreeEnsemble>>,
    retriever: Arc<Retriever>,
}

impl LearnedSelector {
    pub fn new(model: Option<Arc<TreeEnsemble>>, retriever: Arc<Retriever>) -> Self {
        LearnedSelector { model, retriever }
    }
}

impl CandidateSelector for LearnedSelector {
    fn select_best(
        &self,
        seed: &Candidate,
        pool: &[Candidate],
        max_depth: usize,
    ) -> Result<Candidate> {
        if max_depth != SUPPORTED_DEPTH {
            return Err(QueryLensError::selection(format!(
                "unsupported depth {max_depth}, only {SUPPORTED_DEPTH} is supported"
            )));
        }
        if pool.is_empty() {
            return Ok(seed.clone());
        }
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| QueryLensError::selection("ranking model is not loaded"))?;

        let seed_retrieved = self.retriever.retrieve(seed.query())?.len();

        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in pool.iter().enumerate() {
            let retrieved = self.retriever.retrieve(candidate.query())?.len();
            let features = CandidateFeatures::extract(candidate, retrieved, seed_retrieved);
            let score = model.predict(features.as_slice());
            debug!(candidate = i, score, "scored candidate");
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((i, score));
            }
        }

        let index = best.map_or(0, |(i, _)| i);
        Ok(pool[index].clone())
    }
}
