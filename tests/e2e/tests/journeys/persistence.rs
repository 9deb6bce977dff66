//! Nodes and links survive an engine restart because they live in the
//! SQLite-backed Index Store; the Federated Cache and CRDT documents do
//! not, because they are in-memory engine state.

use sirc_core::prelude::*;
use sirc_core::store::{LinkFilter, LinkSort};
use sirc_e2e_tests::harness::TestEngineManager;

#[test]
fn nodes_and_links_survive_a_restart() {
    let mgr = TestEngineManager::new_temp();
    let ids = mgr.seed_nodes("p1", 3);
    mgr.engine
        .create_link(CreateLinkFields {
            project_id: "p1".to_string(),
            source: ids[0].clone(),
            target: ids[1].clone(),
            relation_type: "supports".to_string(),
            confidence: 0.8,
            weight: None,
            method: "test".to_string(),
            ai_confidence: None,
            note: None,
        })
        .unwrap();

    let mgr = mgr.reopen();
    for id in &ids {
        assert!(mgr.engine.get_node(id).unwrap().is_some());
    }
    let filter = LinkFilter { project_id: Some("p1".to_string()), source: Some(ids[0].clone()), ..Default::default() };
    let links = mgr.engine.query_links(&filter, 10, LinkSort::CreatedAtDesc).unwrap();
    assert_eq!(links.len(), 1);
}

#[test]
fn crdt_documents_do_not_survive_a_restart() {
    let mgr = TestEngineManager::new_temp();
    mgr.engine.apply_local_change(
        "p1",
        "u1",
        OperationKind::CreateNode { data: serde_json::json!({"id": "n1", "title": "A"}) },
    );
    assert!(mgr.engine.crdt_snapshot("p1").is_some());

    let mgr = mgr.reopen();
    assert!(mgr.engine.crdt_snapshot("p1").is_none());
}

#[test]
fn the_federated_cache_is_empty_immediately_after_a_restart() {
    let mgr = TestEngineManager::new_temp();
    mgr.seed_nodes("p1", 2);
    mgr.engine.warmup_cache(&["p1"]).unwrap();

    let mgr = mgr.reopen();
    // A fresh engine still answers federated queries correctly; it just
    // has to rebuild the cache from the store rather than serving it warm.
    let hits = mgr.engine.search_across_projects("test content", &["p1"], 5).unwrap();
    assert!(!hits.is_empty());
}
