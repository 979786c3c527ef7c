//! Feature vectors describing candidate queries.

use crate::query::{Operator, Query};
use crate::transform::{Candidate, TransformationKind};

/// Names of the features, in vector order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "keyword_count",
    "boolean_count",
    "depth",
    "mesh_count",
    "exploded_count",
    "or_ratio",
    "truncated_count",
    "num_transformations",
    "op_mesh_explosion",
    "op_logical_operator",
    "op_field_restrictions",
    "op_mesh_parent",
    "op_clause_removal",
    "op_concept_expansion",
    "log_retrieved",
    "retrieved_ratio",
];

pub const FEATURE_COUNT: usize = 16;

const OPERATOR_OFFSET: usize = 8;

/// Features of one candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateFeatures {
    values: Vec<f64>,
}

impl CandidateFeatures {
    /// Describe `candidate`, which retrieved `retrieved` documents against
    /// `seed_retrieved` for the original query.
    pub fn extract(candidate: &Candidate, retrieved: usize, seed_retrieved: usize) -> Self {
        let query = candidate.query();
        let keywords = query.keywords();

        let mut values = vec![0.0; FEATURE_COUNT];
        values[0] = keywords.len() as f64;
        values[1] = query.boolean_count() as f64;
        values[2] = query.depth() as f64;
        values[3] = keywords.iter().filter(|k| k.is_mesh()).count() as f64;
        values[4] = keywords.iter().filter(|k| k.exploded()).count() as f64;
        values[5] = or_ratio(query);
        values[6] = keywords.iter().filter(|k| k.truncated()).count() as f64;
        values[7] = candidate.num_transformations() as f64;
        if let Some(kind) = candidate.transformation() {
            values[OPERATOR_OFFSET + kind.index()] = 1.0;
        }
        values[14] = (1.0 + retrieved as f64).ln();
        // Smoothed so an empty seed result does not divide by zero.
        values[15] = (retrieved as f64 + 1.0) / (seed_retrieved as f64 + 1.0);

        CandidateFeatures { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Value of a named feature.
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// One-hot slot of `kind`.
    pub fn operator_slot(kind: TransformationKind) -> usize {
        OPERATOR_OFFSET + kind.index()
    }
}

fn or_ratio(query: &Query) -> f64 {
    let mut booleans = 0usize;
    let mut ors = 0usize;
    query.walk(&mut |node| {
        if let Query::Boolean(boolean) = node {
            booleans += 1;
            if boolean.operator() == Operator::Or {
                ors += 1;
            }
        }
    });
    if booleans == 0 {
        0.0
    } else {
        ors as f64 / booleans as f64
    }
}
