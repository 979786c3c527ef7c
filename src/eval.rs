//! Set-based effectiveness metrics against relevance judgments.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::query::Query;
use crate::retrieval::{ResultSet, Retriever};

/// Topic id used for the single topic of an interactive session.
pub const SESSION_TOPIC: &str = "0";

/// Graded relevance judgments for one topic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JudgmentSet {
    pub topic: String,
    grades: AHashMap<String, u32>,
    /// Grades above this value are relevant.
    pub threshold: u32,
}

impl JudgmentSet {
    pub fn new<S: Into<String>>(topic: S) -> Self {
        JudgmentSet {
            topic: topic.into(),
            grades: AHashMap::new(),
            threshold: 0,
        }
    }

    /// Judgments marking each of `ids` relevant with grade 1.
    pub fn from_relevant<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut judgments = JudgmentSet::new(SESSION_TOPIC);
        for id in ids {
            judgments.judge(id, 1);
        }
        judgments
    }

    pub fn judge<S: Into<String>>(&mut self, doc_id: S, grade: u32) {
        self.grades.insert(doc_id.into(), grade);
    }

    pub fn grade(&self, doc_id: &str) -> Option<u32> {
        self.grades.get(doc_id).copied()
    }

    pub fn is_relevant(&self, doc_id: &str) -> bool {
        self.grade(doc_id).is_some_and(|g| g > self.threshold)
    }

    pub fn relevant_count(&self) -> usize {
        self.grades.values().filter(|&&g| g > self.threshold).count()
    }

    /// Every judged document, relevant or not, sorted.
    pub fn judged_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.grades.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn is_empty(&self) -> bool {
        self.grades.is_empty()
    }
}

/// Effectiveness of one result set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub num_ret: usize,
}

/// Precision, recall and F1 of `results`. Repeated document ids count once.
pub fn score(results: &ResultSet, judgments: &JudgmentSet) -> MetricReport {
    let retrieved: AHashSet<&str> = results.doc_ids().collect();
    let num_ret = retrieved.len();
    let hits = retrieved
        .iter()
        .filter(|id| judgments.is_relevant(id))
        .count();
    let relevant = judgments.relevant_count();

    let precision = if num_ret == 0 {
        0.0
    } else {
        hits as f64 / num_ret as f64
    };
    let recall = if relevant == 0 {
        0.0
    } else {
        hits as f64 / relevant as f64
    };
    let f1 = if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    };

    MetricReport {
        precision,
        recall,
        f1,
        num_ret,
    }
}

/// Retrieves and scores queries for one session.
#[derive(Debug, Clone)]
pub struct Evaluator {
    retriever: Arc<Retriever>,
    judgments: Arc<JudgmentSet>,
}

impl Evaluator {
    pub fn new(retriever: Arc<Retriever>, judgments: Arc<JudgmentSet>) -> Self {
        Evaluator {
            retriever,
            judgments,
        }
    }

    pub fn retriever(&self) -> &Arc<Retriever> {
        &self.retriever
    }

    pub fn judgments(&self) -> &JudgmentSet {
        &self.judgments
    }

    pub fn evaluate(&self, query: &Query) -> Result<MetricReport> {
        let results = self.retriever.retrieve(query)?;
        Ok(score(&results, &self.judgments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_score() {
        let judgments = JudgmentSet::from_relevant(["d1", "d2", "d3", "d4"]);
        let results = ResultSet::from_ids(["d1", "d2", "x1", "x2", "x3"]);
        let report = score(&results, &judgments);
        assert!(approx(report.precision, 0.4));
        assert!(approx(report.recall, 0.5));
        assert!(approx(report.f1, 2.0 * 0.4 * 0.5 / 0.9));
        assert_eq!(report.num_ret, 5);
    }

    #[test]
    fn test_empty_results() {
        let judgments = JudgmentSet::from_relevant(["d1"]);
        let report = score(&ResultSet::default(), &judgments);
        assert_eq!(report, MetricReport::default());
    }

    #[test]
    fn test_no_relevant_documents() {
        let report = score(&ResultSet::from_ids(["d1"]), &JudgmentSet::new("t"));
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1, 0.0);
        assert_eq!(report.num_ret, 1);
    }

    #[test]
    fn test_duplicates_count_once() {
        let judgments = JudgmentSet::from_relevant(["d1"]);
        let report = score(&ResultSet::from_ids(["d1", "d1", "d2"]), &judgments);
        assert_eq!(report.num_ret, 2);
        assert!(approx(report.precision, 0.5));
        assert!(approx(report.recall, 1.0));
    }

    #[test]
    fn test_metrics_are_bounded() {
        let judgments = JudgmentSet::from_relevant(["a", "b", "c"]);
        let cases = [
            vec![],
            vec!["a"],
            vec!["z"],
            vec!["a", "b", "c"],
            vec!["a", "z", "y", "b"],
        ];
        for ids in cases {
            let report = score(&ResultSet::from_ids(ids), &judgments);
            for value in [report.precision, report.recall, report.f1] {
                assert!((0.0..=1.0).contains(&value));
            }
            if report.precision + report.recall > 0.0 {
                let expected = 2.0 * report.precision * report.recall
                    / (report.precision + report.recall);
                assert!(approx(report.f1, expected));
            } else {
                assert_eq!(report.f1, 0.0);
            }
        }
    }

    #[test]
    fn test_grade_threshold() {
        let mut judgments = JudgmentSet::new("t");
        judgments.judge("d1", 0);
        judgments.judge("d2", 2);
        assert!(!judgments.is_relevant("d1"));
        assert!(judgments.is_relevant("d2"));
        assert!(!judgments.is_relevant("d3"));
        assert_eq!(judgments.relevant_count(), 1);
        assert_eq!(judgments.judged_ids(), vec!["d1", "d2"]);
    }
}
