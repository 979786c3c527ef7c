//! Queries annotated with the transformation lineage that produced them.

use std::sync::Arc;

use crate::query::Query;
use crate::transform::TransformationKind;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lineage {
    /// The user's own query.
    Original,
    /// Produced by one application of an operator.
    Transformation(TransformationKind),
}

impl Lineage {
    pub fn display_name(&self) -> &'static str {
        match self {
            Lineage::Original => "Original",
            Lineage::Transformation(kind) => kind.display_name(),
        }
    }
}

/// A query plus its lineage. Immutable once created; cloning shares the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    query: Arc<Query>,
    lineage: Lineage,
    num_transformations: usize,
}

impl Candidate {
    /// The seed candidate for a user query.
    pub fn original(query: Query) -> Self {
        Candidate {
            query: Arc::new(query),
            lineage: Lineage::Original,
            num_transformations: 0,
        }
    }

    /// A variation of `self` produced by `kind`.
    pub fn derive(&self, query: Query, kind: TransformationKind) -> Self {
        Candidate {
            query: Arc::new(query),
            lineage: Lineage::Transformation(kind),
            num_transformations: self.num_transformations + 1,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn lineage(&self) -> Lineage {
        self.lineage
    }

    /// The producing operator, `None` for the original query.
    pub fn transformation(&self) -> Option<TransformationKind> {
        match self.lineage {
            Lineage::Original => None,
            Lineage::Transformation(kind) => Some(kind),
        }
    }

    /// Number of transformations applied since the original query.
    pub fn num_transformations(&self) -> usize {
        self.num_transformations
    }

    pub fn fingerprint(&self) -> String {
        self.query.fingerprint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Field, Keyword};

    #[test]
    fn test_lineage() {
        let seed = Candidate::original(Keyword::new("a", [Field::Title]).into());
        assert_eq!(seed.lineage(), Lineage::Original);
        assert_eq!(seed.transformation(), None);
        assert_eq!(seed.num_transformations(), 0);
        assert_eq!(seed.lineage().display_name(), "Original");

        let child = seed.derive(
            Keyword::new("a", [Field::Abstract]).into(),
            TransformationKind::FieldRestrictions,
        );
        assert_eq!(child.transformation(), Some(TransformationKind::FieldRestrictions));
        assert_eq!(child.num_transformations(), 1);
        assert_eq!(child.lineage().display_name(), "Field Restrictions");
    }
}
