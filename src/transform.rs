//! Query transformations and variation generation.
//!
//! A [`Transformer`] rewrites a query into zero or more alternative queries.
//! The [`VariationGenerator`] runs an ordered list of transformers over a
//! seed [`Candidate`] and tags every variation with the operator that
//! produced it.

pub mod candidate;
pub mod clause_removal;
pub mod concept_expansion;
pub mod field_restrictions;
pub mod generator;
pub mod logical_operator;
pub mod mesh_explosion;
pub mod mesh_parent;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::Query;

pub use candidate::{Candidate, Lineage};
pub use generator::VariationGenerator;

/// Identity of a transformation operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationKind {
    MeshExplosion,
    LogicalOperator,
    FieldRestrictions,
    MeshParent,
    ClauseRemoval,
    ConceptExpansion,
}

impl TransformationKind {
    /// Every operator, in the order the pipeline requests them.
    pub const ALL: [TransformationKind; 6] = [
        TransformationKind::MeshExplosion,
        TransformationKind::LogicalOperator,
        TransformationKind::FieldRestrictions,
        TransformationKind::MeshParent,
        TransformationKind::ClauseRemoval,
        TransformationKind::ConceptExpansion,
    ];

    /// Name shown to users next to each variation.
    pub fn display_name(&self) -> &'static str {
        match self {
            TransformationKind::MeshExplosion => "MeSH Explosion",
            TransformationKind::LogicalOperator => "Logical Operator Replacement",
            TransformationKind::FieldRestrictions => "Field Restrictions",
            TransformationKind::MeshParent => "MeSH Parent",
            TransformationKind::ClauseRemoval => "Clause Removal",
            TransformationKind::ConceptExpansion => "cui2vec Expansion",
        }
    }

    /// Stable position of this operator in [`TransformationKind::ALL`].
    pub fn index(&self) -> usize {
        match self {
            TransformationKind::MeshExplosion => 0,
            TransformationKind::LogicalOperator => 1,
            TransformationKind::FieldRestrictions => 2,
            TransformationKind::MeshParent => 3,
            TransformationKind::ClauseRemoval => 4,
            TransformationKind::ConceptExpansion => 5,
        }
    }
}

impl fmt::Display for TransformationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A rule rewriting a query into alternative queries.
///
/// Implementations must be deterministic: the same query always yields the
/// same variations in the same order.
pub trait Transformer: Send + Sync {
    /// Which operator this is.
    fn kind(&self) -> TransformationKind;

    /// Produce the variations of `query`. May be empty.
    fn apply(&self, query: &Query) -> Result<Vec<Query>>;
}

/// Apply `rewrite` to every keyword of `query` and collect one variation per
/// replacement it returns, in pre-order.
pub(crate) fn rewrite_keywords<F>(query: &Query, mut rewrite: F) -> Vec<Query>
where
    F: FnMut(&crate::query::Keyword) -> Vec<Query>,
{
    let mut variations = Vec::new();
    for index in 0..query.node_count() {
        let Some(Query::Keyword(keyword)) = query.node_at(index) else {
            continue;
        };
        for replacement in rewrite(keyword) {
            if let Some(variation) = query.replace_at(index, replacement) {
                variations.push(variation);
            }
        }
    }
    variations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_all_order() {
        for (position, kind) in TransformationKind::ALL.iter().enumerate() {
            assert_eq!(kind.index(), position);
        }
    }

    #[test]
    fn test_display_names_are_unique() {
        let mut names: Vec<&str> = TransformationKind::ALL
            .iter()
            .map(|k| k.display_name())
            .collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), TransformationKind::ALL.len());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransformationKind::ClauseRemoval.to_string(), "Clause Removal");
    }
}
