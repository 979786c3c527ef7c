//! Generalize MeSH headings to their parent heading.

use std::sync::Arc;

use crate::error::Result;
use crate::query::Query;
use crate::resources::Ontology;
use crate::transform::{TransformationKind, Transformer, rewrite_keywords};

/// For every MeSH heading with a parent in the ontology, one variation with
/// the heading replaced by its parent. Explosion is preserved.
#[derive(Debug, Clone)]
pub struct MeshParentTransformer {
    ontology: Arc<Ontology>,
}

impl MeshParentTransformer {
    pub fn new(ontology: Arc<Ontology>) -> Self {
        MeshParentTransformer { ontology }
    }
}

impl Transformer for MeshParentTransformer {
    fn kind(&self) -> TransformationKind {
        TransformationKind::MeshParent
    }

    fn apply(&self, query: &Query) -> Result<Vec<Query>> {
        Ok(rewrite_keywords(query, |keyword| {
            if !keyword.is_mesh() {
                return Vec::new();
            }
            match self.ontology.parent(keyword.text()) {
                Some(parent) => vec![keyword.clone().with_text(parent).into()],
                None => Vec::new(),
            }
        }))
    }
}
