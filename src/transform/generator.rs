//! Ordered, de-duplicated variation generation.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tracing::debug;

use crate::error::{QueryLensError, Result};
use crate::resources::Resources;
use crate::transform::clause_removal::ClauseRemovalTransformer;
use crate::transform::concept_expansion::ConceptExpansionTransformer;
use crate::transform::field_restrictions::FieldRestrictionsTransformer;
use crate::transform::logical_operator::LogicalOperatorTransformer;
use crate::transform::mesh_explosion::MeshExplosionTransformer;
use crate::transform::mesh_parent::MeshParentTransformer;
use crate::transform::{Candidate, TransformationKind, Transformer};

/// Runs registered transformers over a seed candidate.
pub struct VariationGenerator {
    transformers: AHashMap<TransformationKind, Arc<dyn Transformer>>,
}

impl std::fmt::Debug for VariationGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<_> = self.transformers.keys().collect();
        kinds.sort();
        f.debug_struct("VariationGenerator")
            .field("transformers", &kinds)
            .finish()
    }
}

impl VariationGenerator {
    /// A generator with no transformers.
    pub fn empty() -> Self {
        VariationGenerator {
            transformers: AHashMap::new(),
        }
    }

    /// A generator with all six operators wired to `resources`.
    pub fn new(resources: &Resources) -> Self {
        let mut generator = Self::empty();
        generator.register(Arc::new(MeshExplosionTransformer::new()));
        generator.register(Arc::new(LogicalOperatorTransformer::new()));
        generator.register(Arc::new(FieldRestrictionsTransformer::new()));
        generator.register(Arc::new(MeshParentTransformer::new(Arc::clone(
            &resources.ontology,
        ))));
        generator.register(Arc::new(ClauseRemovalTransformer::new()));
        generator.register(Arc::new(ConceptExpansionTransformer::new(Arc::clone(
            &resources.concepts,
        ))));
        generator
    }

    /// Add or replace the transformer for its kind.
    pub fn register(&mut self, transformer: Arc<dyn Transformer>) {
        self.transformers.insert(transformer.kind(), transformer);
    }

    /// Apply `operators` in order to `seed`.
    ///
    /// Variations equal to the seed or to an earlier variation (by
    /// fingerprint) are dropped. Fails if an operator is not registered or a
    /// transformer fails.
    pub fn generate(
        &self,
        seed: &Candidate,
        operators: &[TransformationKind],
    ) -> Result<Vec<Candidate>> {
        let mut seen = AHashSet::new();
        seen.insert(seed.fingerprint());

        let mut candidates = Vec::new();
        for kind in operators {
            let transformer = self.transformers.get(kind).ok_or_else(|| {
                QueryLensError::transform(format!("operator '{kind}' is not registered"))
            })?;
            let variations = transformer.apply(seed.query())?;
            let produced = variations.len();
            let before = candidates.len();
            for query in variations {
                if seen.insert(query.fingerprint()) {
                    candidates.push(seed.derive(query, *kind));
                }
            }
            debug!(
                operator = %kind,
                produced,
                kept = candidates.len() - before,
                "applied transformation"
            );
        }
        Ok(candidates)
    }
}
