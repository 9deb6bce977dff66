//! Memory & Context Manager (C9): append-only interaction log plus a
//! decay-weighted contextual recommender.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::embeddings::{cosine_similarity, decode_embedding, encode_embedding};
use crate::error::{Result, SircError};
use crate::model::ActionType;
use crate::store::{IndexStore, InteractionFilter, InteractionRow};

#[derive(Debug, Clone)]
pub struct RecordInteractionFields {
    pub node_id: Option<String>,
    pub action_type: String,
    pub embedding: Option<Vec<f32>>,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct SuggestOptions {
    pub query_embedding: Vec<f32>,
    pub top_n: usize,
    pub half_life_hours: f64,
    pub alpha: f64,
    pub beta: f64,
    pub max_interactions: usize,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self { query_embedding: Vec::new(), top_n: 10, half_life_hours: 72.0, alpha: 0.7, beta: 0.3, max_interactions: 500 }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextSuggestion {
    pub node_id: String,
    pub score: f64,
    pub reason: String,
    pub title: String,
    pub interaction_count: usize,
    pub avg_sim: f64,
    pub recent_action: String,
}

pub struct MemoryManager<'a> {
    store: &'a dyn IndexStore,
}

impl<'a> MemoryManager<'a> {
    pub fn new(store: &'a dyn IndexStore) -> Self {
        Self { store }
    }

    pub fn record_interaction(&self, fields: RecordInteractionFields) -> Result<String> {
        let action = ActionType::parse(&fields.action_type).ok_or_else(|| SircError::InvalidInput {
            field: "action_type".to_string(),
            reason: format!("'{}' is not in the closed action-type set", fields.action_type),
        })?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let embedding_b64 = fields.embedding.as_deref().map(encode_embedding);

        let row = InteractionRow {
            id: id.clone(),
            node_id: fields.node_id,
            action_type: action.as_str().to_string(),
            at: now,
            embedding_b64,
            meta: fields.meta,
        };
        self.store.save_interaction(&row)?;
        Ok(id)
    }

    pub fn get_recent_interactions(&self, limit: usize, filter: &InteractionFilter) -> Result<Vec<DecodedInteraction>> {
        let rows = self.store.get_recent_interactions(limit, filter)?;
        Ok(rows.into_iter().map(DecodedInteraction::from_row).collect())
    }

    pub fn purge(&self, older_than_ms: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::milliseconds(older_than_ms);
        self.store.purge_interactions(cutoff)
    }

    /// Decay-weighted contextual recommendation (spec.md §4.9).
    pub fn suggest(&self, opts: &SuggestOptions) -> Result<Vec<ContextSuggestion>> {
        let rows = self.store.get_recent_interactions(opts.max_interactions, &InteractionFilter::default())?;
        let now = Utc::now();

        use std::collections::HashMap;
        struct Agg {
            best_score: f64,
            sims: Vec<f64>,
            count: usize,
            most_recent_action: String,
            most_recent_at: DateTime<Utc>,
        }
        let mut per_node: HashMap<String, Agg> = HashMap::new();

        for row in &rows {
            let Some(node_id) = &row.node_id else { continue };
            let embedding = row.embedding_b64.as_deref().and_then(decode_embedding);
            let sim = embedding
                .as_ref()
                .map(|e| cosine_similarity(&opts.query_embedding, e) as f64)
                .unwrap_or(0.0);
            let hours = (now - row.at).num_seconds() as f64 / 3600.0;
            let recency = (-std::f64::consts::LN_2 * hours / opts.half_life_hours.max(1e-9)).exp();
            let score = opts.alpha * sim + opts.beta * recency;

            let entry = per_node.entry(node_id.clone()).or_insert_with(|| Agg {
                best_score: f64::MIN,
                sims: Vec::new(),
                count: 0,
                most_recent_action: row.action_type.clone(),
                most_recent_at: row.at,
            });
            entry.sims.push(sim);
            entry.count += 1;
            if row.at > entry.most_recent_at {
                entry.most_recent_at = row.at;
                entry.most_recent_action = row.action_type.clone();
            }
            entry.best_score = entry.best_score.max(score);
        }

        let mut suggestions: Vec<ContextSuggestion> = Vec::with_capacity(per_node.len());
        for (node_id, agg) in per_node {
            let avg_sim = agg.sims.iter().sum::<f64>() / agg.sims.len().max(1) as f64;
            let reason = reason_string(&agg.most_recent_action, now - agg.most_recent_at, avg_sim, agg.count);
            let title = self.store.get_node(&node_id)?.map(|node| node.title).unwrap_or_default();
            suggestions.push(ContextSuggestion {
                node_id,
                score: agg.best_score,
                reason,
                title,
                interaction_count: agg.count,
                avg_sim,
                recent_action: agg.most_recent_action,
            });
        }

        suggestions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.node_id.cmp(&b.node_id)));
        suggestions.truncate(opts.top_n);
        Ok(suggestions)
    }
}

#[derive(Debug, Clone)]
pub struct DecodedInteraction {
    pub id: String,
    pub node_id: Option<String>,
    pub action_type: String,
    pub at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
    pub meta: serde_json::Value,
}

impl DecodedInteraction {
    fn from_row(row: InteractionRow) -> Self {
        Self {
            id: row.id,
            node_id: row.node_id,
            action_type: row.action_type,
            at: row.at,
            embedding: row.embedding_b64.as_deref().and_then(decode_embedding),
            meta: row.meta,
        }
    }
}

fn reason_string(action: &str, ago: Duration, avg_sim: f64, count: usize) -> String {
    let hours = ago.num_seconds() as f64 / 3600.0;
    let base = if hours < 1.0 {
        format!("Recent {action} (<1h ago)")
    } else if hours < 24.0 {
        format!("{action} {}h ago", hours.round() as i64)
    } else {
        format!("{action} {}d ago", (hours / 24.0).round() as i64)
    };
    format!("{base} (sim {avg_sim:.2}, {count} interaction{})", if count == 1 { "" } else { "s" })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryIndexStore;

    #[test]
    fn record_interaction_rejects_unknown_action_type() {
        let store = InMemoryIndexStore::new();
        let manager = MemoryManager::new(&store);
        let fields = RecordInteractionFields { node_id: None, action_type: "frobnicate".to_string(), embedding: None, meta: serde_json::Value::Null };
        assert!(manager.record_interaction(fields).is_err());
    }

    #[test]
    fn recorded_embedding_round_trips_through_recent_interactions() {
        let store = InMemoryIndexStore::new();
        let manager = MemoryManager::new(&store);
        let embedding = vec![0.1f32, 0.2, 0.3];
        manager
            .record_interaction(RecordInteractionFields {
                node_id: Some("n1".to_string()),
                action_type: "view".to_string(),
                embedding: Some(embedding.clone()),
                meta: serde_json::Value::Null,
            })
            .unwrap();

        let recent = manager.get_recent_interactions(1, &InteractionFilter::default()).unwrap();
        assert_eq!(recent.len(), 1);
        let decoded = recent[0].embedding.as_ref().unwrap();
        for (a, b) in embedding.iter().zip(decoded.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn suggest_prefers_recent_interaction_over_stale_one() {
        let store = InMemoryIndexStore::new();
        let query = vec![1.0f32, 0.0];

        let recent_row = InteractionRow {
            id: "i1".to_string(),
            node_id: Some("x".to_string()),
            action_type: "view".to_string(),
            at: Utc::now() - Duration::hours(1),
            embedding_b64: Some(encode_embedding(&query)),
            meta: serde_json::Value::Null,
        };
        let stale_row = InteractionRow {
            id: "i2".to_string(),
            node_id: Some("y".to_string()),
            action_type: "view".to_string(),
            at: Utc::now() - Duration::hours(48),
            embedding_b64: Some(encode_embedding(&query)),
            meta: serde_json::Value::Null,
        };
        store.save_interaction(&recent_row).unwrap();
        store.save_interaction(&stale_row).unwrap();

        let manager = MemoryManager::new(&store);
        let opts = SuggestOptions { query_embedding: query, top_n: 2, half_life_hours: 72.0, alpha: 0.7, beta: 0.3, max_interactions: 100 };
        let suggestions = manager.suggest(&opts).unwrap();
        assert_eq!(suggestions[0].node_id, "x");
    }

    #[test]
    fn suggest_looks_up_the_node_title() {
        use crate::model::{Node, NodeMeta};

        let store = InMemoryIndexStore::new();
        let query = vec![1.0f32, 0.0];
        store
            .save_node(&Node {
                id: "x".to_string(),
                project_id: "p1".to_string(),
                title: "Onboarding notes".to_string(),
                text: "text".to_string(),
                summary: None,
                embedding: Some(query.clone()),
                morton_key: None,
                parent: None,
                children: vec![],
                meta: NodeMeta::default(),
            })
            .unwrap();
        store
            .save_interaction(&InteractionRow {
                id: "i1".to_string(),
                node_id: Some("x".to_string()),
                action_type: "view".to_string(),
                at: Utc::now(),
                embedding_b64: Some(encode_embedding(&query)),
                meta: serde_json::Value::Null,
            })
            .unwrap();

        let manager = MemoryManager::new(&store);
        let opts = SuggestOptions { query_embedding: query, top_n: 1, half_life_hours: 72.0, alpha: 0.7, beta: 0.3, max_interactions: 100 };
        let suggestions = manager.suggest(&opts).unwrap();
        assert_eq!(suggestions[0].title, "Onboarding notes");
    }

    #[test]
    fn purge_removes_interactions_older_than_cutoff() {
        let store = InMemoryIndexStore::new();
        let old_row = InteractionRow {
            id: "i1".to_string(),
            node_id: None,
            action_type: "view".to_string(),
            at: Utc::now() - Duration::days(10),
            embedding_b64: None,
            meta: serde_json::Value::Null,
        };
        store.save_interaction(&old_row).unwrap();
        let manager = MemoryManager::new(&store);
        let removed = manager.purge(Duration::days(1).num_milliseconds()).unwrap();
        assert_eq!(removed, 1);
    }
}
