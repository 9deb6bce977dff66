//! Cross-project search federation: two projects, one federated query.

use sirc_core::prelude::*;
use sirc_e2e_tests::harness::TestEngineManager;

#[test]
fn search_across_projects_finds_hits_in_both_projects() {
    let mgr = TestEngineManager::new_temp();

    mgr.engine
        .ingest_node(IngestFields {
            project_id: "alpha".to_string(),
            title: "alpha note".to_string(),
            text: "quarterly revenue report for the alpha team".to_string(),
            summary: None,
            parent: None,
            author: None,
            source_url: None,
        })
        .unwrap();
    mgr.engine
        .ingest_node(IngestFields {
            project_id: "beta".to_string(),
            title: "beta note".to_string(),
            text: "quarterly revenue report for the beta team".to_string(),
            summary: None,
            parent: None,
            author: None,
            source_url: None,
        })
        .unwrap();

    mgr.engine.warmup_cache(&["alpha", "beta"]).unwrap();
    let hits = mgr.engine.search_across_projects("quarterly revenue report", &["alpha", "beta"], 5).unwrap();

    let projects_seen: std::collections::HashSet<&str> = hits.iter().map(|h| h.project_id.as_str()).collect();
    assert!(projects_seen.contains("alpha"));
    assert!(projects_seen.contains("beta"));
}

#[test]
fn warmup_cache_is_idempotent_for_an_already_cached_project() {
    let mgr = TestEngineManager::new_temp();
    mgr.engine
        .ingest_node(IngestFields {
            project_id: "alpha".to_string(),
            title: "t".to_string(),
            text: "a single alpha note".to_string(),
            summary: None,
            parent: None,
            author: None,
            source_url: None,
        })
        .unwrap();

    mgr.engine.warmup_cache(&["alpha"]).unwrap();
    mgr.engine.warmup_cache(&["alpha"]).unwrap();

    let hits = mgr.engine.search_across_projects("alpha note", &["alpha"], 5).unwrap();
    assert_eq!(hits.len(), 1);
}
