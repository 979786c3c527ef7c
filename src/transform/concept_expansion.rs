//! Expand free-text keywords with their nearest concept in embedding space.

use std::sync::Arc;

use crate::error::Result;
use crate::query::Query;
use crate::resources::ConceptEmbeddings;
use crate::transform::{TransformationKind, Transformer, rewrite_keywords};

/// For every free-text keyword whose text maps to a concept, one variation
/// replacing the keyword with `keyword OR neighbour`, where `neighbour` is the
/// preferred term of the nearest concept, searched in the same fields.
#[derive(Debug, Clone)]
pub struct ConceptExpansionTransformer {
    concepts: Arc<ConceptEmbeddings>,
}

impl ConceptExpansionTransformer {
    pub fn new(concepts: Arc<ConceptEmbeddings>) -> Self {
        ConceptExpansionTransformer { concepts }
    }
}

impl Transformer for ConceptExpansionTransformer {
    fn kind(&self) -> TransformationKind {
        TransformationKind::ConceptExpansion
    }

    fn apply(&self, query: &Query) -> Result<Vec<Query>> {
        if self.concepts.is_empty() {
            return Ok(Vec::new());
        }
        Ok(rewrite_keywords(query, |keyword| {
            if keyword.is_mesh() || keyword.truncated() {
                return Vec::new();
            }
            let Some(term) = self.concepts.expand_term(keyword.text()) else {
                return Vec::new();
            };
            if term.eq_ignore_ascii_case(keyword.text()) {
                return Vec::new();
            }
            let expansion = keyword.clone().with_text(term);
            Query::or(vec![keyword.clone().into(), expansion.into()])
                .into_iter()
                .collect()
        }))
    }
}
