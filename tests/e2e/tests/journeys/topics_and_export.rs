//! Topic clustering over an ingested corpus, then an export/import round
//! trip that moves a project's nodes, links, and CRDT history to a fresh
//! engine (spec.md §8 round-trip property).

use chrono::Utc;

use sirc_core::export::{export_fmind, import_fmind, ProjectBundle, ProjectStats};
use sirc_core::prelude::*;
use sirc_core::store::{LinkFilter, LinkSort};
use sirc_e2e_tests::harness::TestEngineManager;
use sirc_e2e_tests::mocks::TestDataFactory;

#[test]
fn topic_model_clusters_a_categorised_corpus() {
    let mgr = TestEngineManager::new_temp();
    let corpus = TestDataFactory::seed_categorised_corpus(&mgr.engine, "p1");

    let mut all_ids = corpus.programming.clone();
    all_ids.extend(corpus.science.clone());
    all_ids.extend(corpus.cooking.clone());

    let mut modeller = mgr.engine.new_topic_modeller();
    mgr.engine.update_topics(&mut modeller, &all_ids, &CancelSignal::new()).unwrap();

    let topics = modeller.get_topics(None, None);
    assert!(!topics.is_empty());
    assert!(topics.iter().map(|t| t.node_ids.len()).sum::<usize>() >= 1);
}

#[test]
fn export_then_import_reproduces_nodes_and_links() {
    let source = TestEngineManager::new_temp();
    let corpus = TestDataFactory::seed_categorised_corpus(&source.engine, "p1");

    source
        .engine
        .create_link(CreateLinkFields {
            project_id: "p1".to_string(),
            source: corpus.programming[0].clone(),
            target: corpus.programming[1].clone(),
            relation_type: "supports".to_string(),
            confidence: 0.9,
            weight: None,
            method: "test".to_string(),
            ai_confidence: None,
            note: None,
        })
        .unwrap();

    source.engine.apply_local_change(
        "p1",
        "u1",
        OperationKind::CreateNode { data: serde_json::json!({"id": "crdt-n", "title": "A"}) },
    );

    let (nodes, links) = source.engine.project_bundle_parts("p1", &[]).unwrap();
    let node_count = nodes.len();
    let link_count = links.len();
    let crdt_history = source.engine.crdt_history_json("p1");
    let crdt_op_count = crdt_history.as_ref().map(|h| h.len()).unwrap_or(0);

    let bundle = ProjectBundle {
        project_id: "p1".to_string(),
        exported_at: Utc::now(),
        status: "ok".to_string(),
        stats: ProjectStats { node_count, link_count, topic_count: 0 },
        nodes,
        links,
        topics: Vec::new(),
        crdt_history,
    };
    let native = export_fmind(vec![bundle.clone()], serde_json::Value::Null);
    let json = serde_json::to_string(&native).unwrap();
    let reparsed: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(reparsed["projects"][0]["projectId"], "p1");

    let target = TestEngineManager::new_temp();
    let replayed = target.engine.import_bundle(&bundle).unwrap();
    assert_eq!(replayed, crdt_op_count);

    let (imported_nodes, imported_links) = target.engine.project_bundle_parts("p1", &[]).unwrap();
    assert_eq!(imported_nodes.len(), node_count);
    assert_eq!(imported_links.len(), link_count);

    let snapshot = target.engine.crdt_snapshot("p1").unwrap();
    assert_eq!(snapshot.nodes["crdt-n"]["title"], serde_json::json!("A"));
}

#[test]
fn import_fmind_restores_every_project_in_a_native_bundle() {
    let source = TestEngineManager::new_temp();
    TestDataFactory::seed_categorised_corpus(&source.engine, "p1");
    let (nodes, links) = source.engine.project_bundle_parts("p1", &[]).unwrap();

    let bundle = ProjectBundle {
        project_id: "p1".to_string(),
        exported_at: Utc::now(),
        status: "ok".to_string(),
        stats: ProjectStats { node_count: nodes.len(), link_count: links.len(), topic_count: 0 },
        nodes,
        links,
        topics: Vec::new(),
        crdt_history: None,
    };
    let native = export_fmind(vec![bundle], serde_json::Value::Null);

    let target_store = sirc_core::store::InMemoryIndexStore::new();
    let stats = import_fmind(&target_store, &native).unwrap();
    assert_eq!(stats.node_count, 8);

    let filter = LinkFilter { project_id: Some("p1".to_string()), ..Default::default() };
    let _ = target_store.query_links(&filter, 10, LinkSort::CreatedAtDesc).unwrap();
}
