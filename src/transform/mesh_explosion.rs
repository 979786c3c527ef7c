//! Toggle explosion of MeSH headings.

use crate::error::Result;
use crate::query::Query;
use crate::transform::{TransformationKind, Transformer, rewrite_keywords};

/// For every MeSH heading, one variation with its explosion flag flipped.
#[derive(Debug, Clone, Default)]
pub struct MeshExplosionTransformer;

impl MeshExplosionTransformer {
    pub fn new() -> Self {
        MeshExplosionTransformer
    }
}

impl Transformer for MeshExplosionTransformer {
    fn kind(&self) -> TransformationKind {
        TransformationKind::MeshExplosion
    }

    fn apply(&self, query: &Query) -> Result<Vec<Query>> {
        Ok(rewrite_keywords(query, |keyword| {
            if keyword.is_mesh() {
                let exploded = !keyword.exploded();
                vec![keyword.clone().with_exploded(exploded).into()]
            } else {
                Vec::new()
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Field, Keyword};

    #[test]
    fn test_toggles_each_heading() {
        let query = Query::and(vec![
            Keyword::mesh("Diabetes Mellitus", true).into(),
            Keyword::new("insulin", [Field::Title]).into(),
            Keyword::mesh("Insulin", false).into(),
        ])
        .unwrap();

        let variations = MeshExplosionTransformer.apply(&query).unwrap();
        assert_eq!(variations.len(), 2);
        assert!(!variations[0].keywords()[0].exploded());
        assert!(!variations[0].keywords()[2].exploded());
        assert!(variations[1].keywords()[2].exploded());
    }

    #[test]
    fn test_no_headings() {
        let query: Query = Keyword::new("insulin", [Field::Title]).into();
        assert!(MeshExplosionTransformer.apply(&query).unwrap().is_empty());
    }
}
