//! Chain discovery over existing links, and bounded cross-project
//! inference, driven through the engine rather than the bare `Reasoner`.

use sirc_core::prelude::*;
use sirc_e2e_tests::harness::TestEngineManager;

fn link(engine: &SircEngine, source: &str, target: &str, confidence: f64) {
    engine
        .create_link(CreateLinkFields {
            project_id: "p1".to_string(),
            source: source.to_string(),
            target: target.to_string(),
            relation_type: "supports".to_string(),
            confidence,
            weight: None,
            method: "test".to_string(),
            ai_confidence: None,
            note: None,
        })
        .unwrap();
}

#[test]
fn find_chains_decays_confidence_along_a_two_hop_path() {
    let mgr = TestEngineManager::new_temp();
    link(&mgr.engine, "a", "b", 0.8);
    link(&mgr.engine, "b", "c", 0.5);

    let chains = mgr.engine.find_chains("a", "c", 5, 10, Some("p1")).unwrap();
    assert_eq!(chains.len(), 1);
    assert!((chains[0].1 - 0.4).abs() < 1e-9);

    let transcript = Reasoner::chain_transcript(&chains);
    assert!(transcript.contains("a --[supports"));
}

#[test]
fn find_chains_is_empty_when_no_path_connects_the_nodes() {
    let mgr = TestEngineManager::new_temp();
    link(&mgr.engine, "a", "b", 0.8);

    let chains = mgr.engine.find_chains("a", "z", 5, 10, Some("p1")).unwrap();
    assert!(chains.is_empty());
}

#[test]
fn infer_relations_never_exceeds_the_requested_top_k() {
    let mgr = TestEngineManager::new_temp();
    for i in 0..6 {
        mgr.engine
            .ingest_node(IngestFields {
                project_id: "p1".to_string(),
                title: format!("n{i}"),
                text: format!("shared vocabulary about knowledge systems number {i}"),
                summary: None,
                parent: None,
                author: None,
                source_url: None,
            })
            .unwrap();
    }
    let start = mgr
        .engine
        .ingest_node(IngestFields {
            project_id: "p1".to_string(),
            title: "start".to_string(),
            text: "shared vocabulary about knowledge systems as a starting point".to_string(),
            summary: None,
            parent: None,
            author: None,
            source_url: None,
        })
        .unwrap();

    let opts = InferOptions {
        start_node_id: start.id,
        projects: vec!["p1".to_string()],
        depth: 2,
        top_k: 3,
        mode: AiMode::Mock,
        threshold: 0.0,
        context_history: Vec::new(),
    };
    let relations = mgr.engine.infer_relations(&opts, &CancelSignal::new()).unwrap();
    assert!(relations.len() <= 3);
}
