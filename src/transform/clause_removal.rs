//! Drop one clause from a boolean node.

use crate::error::Result;
use crate::query::{Operator, Query};
use crate::transform::{TransformationKind, Transformer};

/// For every boolean node, one variation per removable child. The first
/// child of a `NOT` node is never removed, since the node would then negate
/// nothing.
#[derive(Debug, Clone, Default)]
pub struct ClauseRemovalTransformer;

impl ClauseRemovalTransformer {
    pub fn new() -> Self {
        ClauseRemovalTransformer
    }
}

impl Transformer for ClauseRemovalTransformer {
    fn kind(&self) -> TransformationKind {
        TransformationKind::ClauseRemoval
    }

    fn apply(&self, query: &Query) -> Result<Vec<Query>> {
        let mut variations = Vec::new();
        for index in 0..query.node_count() {
            let Some(Query::Boolean(boolean)) = query.node_at(index) else {
                continue;
            };
            let first_removable = usize::from(boolean.operator() == Operator::Not);
            for removed in first_removable..boolean.children().len() {
                let children: Vec<Query> = boolean
                    .children()
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != removed)
                    .map(|(_, child)| child.clone())
                    .collect();
                let replacement = Query::boolean(boolean.operator(), children);
                if let Some(variation) = replacement.and_then(|r| query.replace_at(index, r)) {
                    variations.push(variation);
                }
            }
        }
        Ok(variations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Field, Keyword};

    fn kw(text: &str) -> Query {
        Keyword::new(text, [Field::Title]).into()
    }

    fn texts(query: &Query) -> Vec<&str> {
        query.keywords().iter().map(|k| k.text()).collect()
    }

    #[test]
    fn test_removes_each_child() {
        let query = Query::and(vec![kw("a"), kw("b"), kw("c")]).unwrap();
        let variations = ClauseRemovalTransformer.apply(&query).unwrap();
        let removed: Vec<Vec<&str>> = variations.iter().map(texts).collect();
        assert_eq!(removed, vec![vec!["b", "c"], vec!["a", "c"], vec!["a", "b"]]);
    }

    #[test]
    fn test_two_children_collapse_to_keyword() {
        let query = Query::and(vec![kw("a"), kw("b")]).unwrap();
        let variations = ClauseRemovalTransformer.apply(&query).unwrap();
        assert_eq!(variations.len(), 2);
        assert!(variations.iter().all(|v| v.as_keyword().is_some()));
    }

    #[test]
    fn test_not_keeps_first_child() {
        let query = Query::boolean(Operator::Not, vec![kw("a"), kw("b"), kw("c")]).unwrap();
        let variations = ClauseRemovalTransformer.apply(&query).unwrap();
        let removed: Vec<Vec<&str>> = variations.iter().map(texts).collect();
        assert_eq!(removed, vec![vec!["a", "c"], vec!["a", "b"]]);
    }

    #[test]
    fn test_nested_nodes() {
        let query = Query::and(vec![kw("a"), Query::or(vec![kw("b"), kw("c")]).unwrap()]).unwrap();
        let variations = ClauseRemovalTransformer.apply(&query).unwrap();
        // Two from the root, two from the nested disjunction.
        assert_eq!(variations.len(), 4);
    }

    #[test]
    fn test_single_keyword() {
        assert!(ClauseRemovalTransformer.apply(&kw("a")).unwrap().is_empty());
    }
}
