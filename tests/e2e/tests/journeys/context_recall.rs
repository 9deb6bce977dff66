//! Interaction logging and the decay-weighted contextual recommender,
//! driven through the engine (spec.md §8 concrete scenario 6).

use sirc_core::prelude::*;
use sirc_e2e_tests::harness::TestEngineManager;

#[test]
fn suggest_from_context_ranks_the_closer_embedding_first() {
    let mgr = TestEngineManager::new_temp();
    let query = vec![1.0f32, 0.0, 0.0, 0.0];

    mgr.engine
        .record_interaction(RecordInteractionFields {
            node_id: Some("close".to_string()),
            action_type: "view".to_string(),
            embedding: Some(vec![0.9, 0.1, 0.0, 0.0]),
            meta: serde_json::Value::Null,
        })
        .unwrap();
    mgr.engine
        .record_interaction(RecordInteractionFields {
            node_id: Some("far".to_string()),
            action_type: "view".to_string(),
            embedding: Some(vec![0.0, 0.0, 0.0, 1.0]),
            meta: serde_json::Value::Null,
        })
        .unwrap();

    let opts = InteractionSuggestOptions { query_embedding: query, top_n: 2, half_life_hours: 72.0, alpha: 0.7, beta: 0.3, max_interactions: 100 };
    let suggestions = mgr.engine.suggest_from_context(&opts).unwrap();
    assert_eq!(suggestions[0].node_id, "close");
}

#[test]
fn recording_an_unknown_action_type_is_rejected() {
    let mgr = TestEngineManager::new_temp();
    let result = mgr.engine.record_interaction(RecordInteractionFields {
        node_id: None,
        action_type: "teleport".to_string(),
        embedding: None,
        meta: serde_json::Value::Null,
    });
    assert!(result.is_err());
}

#[test]
fn interactions_without_an_embedding_still_record_but_rank_last() {
    let mgr = TestEngineManager::new_temp();
    mgr.engine
        .record_interaction(RecordInteractionFields {
            node_id: Some("silent".to_string()),
            action_type: "export".to_string(),
            embedding: None,
            meta: serde_json::Value::Null,
        })
        .unwrap();
    mgr.engine
        .record_interaction(RecordInteractionFields {
            node_id: Some("matching".to_string()),
            action_type: "view".to_string(),
            embedding: Some(vec![1.0, 0.0]),
            meta: serde_json::Value::Null,
        })
        .unwrap();

    let opts = InteractionSuggestOptions { query_embedding: vec![1.0, 0.0], top_n: 2, half_life_hours: 72.0, alpha: 0.7, beta: 0.3, max_interactions: 100 };
    let suggestions = mgr.engine.suggest_from_context(&opts).unwrap();
    assert_eq!(suggestions[0].node_id, "matching");
}
