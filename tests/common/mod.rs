#![allow(dead_code)]

use std::sync::Arc;

use querylens::config::{EvaluationMode, LensConfig};
use querylens::resources::Resources;
use querylens::retrieval::DocumentCollection;
use querylens::select::model::{DecisionTree, TreeEnsemble, TreeNode};
use querylens::select::features::FEATURE_NAMES;
use querylens::session::{LensEngine, LensRequest, LensResponse, MemoryChannel, Session};

pub const DOCS: &str = r#"
{"id": "doc1", "title": "Insulin therapy for type 2 diabetes", "abstract": "A trial of basal insulin.", "mesh_headings": ["Diabetes Mellitus, Type 2", "Insulin"]}
{"id": "doc2", "title": "Diabetes prevalence in adults", "abstract": "A cross sectional survey."}
{"id": "doc3", "title": "Insulin pump design", "abstract": "Engineering of delivery devices."}
{"id": "doc4", "title": "Hypertension in older adults"}
"#;

/// A model that prefers clause removal over every other operator.
pub fn clause_removal_model() -> TreeEnsemble {
    let feature = FEATURE_NAMES
        .iter()
        .position(|name| *name == "op_clause_removal")
        .unwrap();
    TreeEnsemble::new(1.0, 0.0).with_tree(DecisionTree::new(TreeNode::split(
        feature,
        0.5,
        TreeNode::leaf(0.0),
        TreeNode::leaf(1.0),
    )))
}

pub fn resources() -> Arc<Resources> {
    resources_with(DOCS)
}

pub fn resources_with(docs: &str) -> Arc<Resources> {
    Arc::new(Resources {
        collection: Arc::new(DocumentCollection::parse_jsonl(docs).unwrap()),
        model: Some(Arc::new(clause_removal_model())),
        ..Resources::default()
    })
}

pub fn collection_config() -> LensConfig {
    let mut config = LensConfig::default();
    config.evaluation.mode = EvaluationMode::Collection;
    config
}

pub fn engine(config: LensConfig) -> LensEngine {
    LensEngine::new(config, resources()).unwrap()
}

/// Run `requests` through a fresh session and collect every response.
pub async fn run_session(session: Session, requests: &[LensRequest]) -> Vec<LensResponse> {
    let (channel, mut client) = MemoryChannel::pair();
    for request in requests {
        client.send(request).unwrap();
    }
    client.close();

    let handle = tokio::spawn(async move {
        let mut channel = channel;
        session.run(&mut channel).await
    });
    let responses = client.drain().await.unwrap();
    handle.await.unwrap().unwrap();
    responses
}
