//! Move free-text keywords between title and abstract fields.

use crate::error::Result;
use crate::query::{Field, Query};
use crate::transform::{TransformationKind, Transformer, rewrite_keywords};

const RESTRICTIONS: [&[Field]; 3] = [
    &[Field::Title],
    &[Field::Abstract],
    &[Field::Title, Field::Abstract],
];

/// For every keyword searching title and/or abstract, one variation per
/// other restriction among title, abstract and title+abstract.
#[derive(Debug, Clone, Default)]
pub struct FieldRestrictionsTransformer;

impl FieldRestrictionsTransformer {
    pub fn new() -> Self {
        FieldRestrictionsTransformer
    }
}

impl Transformer for FieldRestrictionsTransformer {
    fn kind(&self) -> TransformationKind {
        TransformationKind::FieldRestrictions
    }

    fn apply(&self, query: &Query) -> Result<Vec<Query>> {
        Ok(rewrite_keywords(query, |keyword| {
            if !keyword.is_title_abstract() {
                return Vec::new();
            }
            RESTRICTIONS
                .iter()
                .filter(|fields| **fields != keyword.fields())
                .map(|fields| keyword.clone().with_fields(fields.iter().copied()).into())
                .collect()
        }))
    }
}
