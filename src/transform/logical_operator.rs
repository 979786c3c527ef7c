//! Swap conjunctions and disjunctions.

use crate::error::Result;
use crate::query::{Operator, Query};
use crate::transform::{TransformationKind, Transformer};

/// For every `AND` or `OR` node, one variation with the operator swapped.
/// `NOT` nodes are left alone.
#[derive(Debug, Clone, Default)]
pub struct LogicalOperatorTransformer;

impl LogicalOperatorTransformer {
    pub fn new() -> Self {
        LogicalOperatorTransformer
    }
}

impl Transformer for LogicalOperatorTransformer {
    fn kind(&self) -> TransformationKind {
        TransformationKind::LogicalOperator
    }

    fn apply(&self, query: &Query) -> Result<Vec<Query>> {
        let mut variations = Vec::new();
        for index in 0..query.node_count() {
            let Some(Query::Boolean(boolean)) = query.node_at(index) else {
                continue;
            };
            let swapped = match boolean.operator() {
                Operator::And => Operator::Or,
                Operator::Or => Operator::And,
                Operator::Not => continue,
            };
            let replacement = Query::boolean(swapped, boolean.children().to_vec());
            if let Some(variation) = replacement.and_then(|r| query.replace_at(index, r)) {
                variations.push(variation);
            }
        }
        Ok(variations)
    }
}
