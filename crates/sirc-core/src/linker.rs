//! Linker (C5): CRUD over semantic links, multi-signal confidence blending,
//! and cycle detection.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::Utc;
use uuid::Uuid;

use crate::config::ConfidenceWeights;
use crate::error::{Result, SircError};
use crate::lexical::trigram_jaccard;
use crate::model::{Link, LinkHistoryEntry, Provenance, RelationType};
use crate::store::{IndexStore, LinkFilter, LinkSort};

/// Fields accepted by [`Linker::create_link`].
#[derive(Debug, Clone)]
pub struct CreateLinkFields {
    pub project_id: String,
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub confidence: f64,
    pub weight: Option<f64>,
    pub method: String,
    pub ai_confidence: Option<f64>,
    pub note: Option<String>,
}

/// Either end of an upsert lookup key.
pub enum LinkKey<'a> {
    Id(&'a str),
    Triple { source: &'a str, target: &'a str, relation_type: &'a str },
}

#[derive(Debug, Clone, Default)]
pub struct LinkUpdate {
    pub confidence: Option<f64>,
    pub weight: Option<f64>,
    pub active: Option<bool>,
    pub relation_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LinkStatistics {
    pub count: usize,
    pub mean_confidence: f64,
    pub mean_weight: f64,
}

pub struct Linker<'a> {
    store: &'a dyn IndexStore,
}

impl<'a> Linker<'a> {
    pub fn new(store: &'a dyn IndexStore) -> Self {
        Self { store }
    }

    pub fn create_link(&self, fields: CreateLinkFields) -> Result<Link> {
        if fields.source == fields.target {
            return Err(SircError::InvalidInput {
                field: "target".to_string(),
                reason: "self-links are not allowed".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&fields.confidence) {
            return Err(SircError::InvalidInput {
                field: "confidence".to_string(),
                reason: "must be in [0, 1]".to_string(),
            });
        }
        let relation = RelationType::parse(&fields.relation_type);
        if !relation.is_known() {
            tracing::warn!(relation_type = %fields.relation_type, "relation type outside the closed taxonomy");
        }

        let now = Utc::now();
        let link_id = format!(
            "link_{}_{}_{}_{}_{}",
            fields.project_id,
            fields.source,
            fields.target,
            now.timestamp_millis(),
            &Uuid::new_v4().simple().to_string()[..8],
        );

        let link = Link {
            link_id,
            project_id: fields.project_id,
            source: fields.source,
            target: fields.target,
            relation_type: fields.relation_type,
            confidence: fields.confidence,
            weight: fields.weight.unwrap_or(1.0),
            active: true,
            provenance: Provenance {
                method: fields.method,
                ai_confidence: fields.ai_confidence,
                timestamp: now,
                note: fields.note,
            },
            history: vec![LinkHistoryEntry { timestamp: now, action: "created".to_string(), changes: None }],
            created_at: now,
            updated_at: now,
        };
        self.store.save_link(&link)?;
        Ok(link)
    }

    pub fn upsert_link(&self, key: LinkKey<'_>, updates: LinkUpdate) -> Result<Link> {
        let mut link = self.find_link(key)?;
        let mut changed = Vec::new();

        if let Some(c) = updates.confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(SircError::InvalidInput { field: "confidence".to_string(), reason: "must be in [0, 1]".to_string() });
            }
            link.confidence = c;
            changed.push("confidence");
        }
        if let Some(w) = updates.weight {
            link.weight = w;
            changed.push("weight");
        }
        if let Some(a) = updates.active {
            link.active = a;
            changed.push("active");
        }
        if let Some(rt) = updates.relation_type {
            link.relation_type = rt;
            changed.push("relationType");
        }

        link.updated_at = Utc::now();
        link.history.push(LinkHistoryEntry {
            timestamp: link.updated_at,
            action: "updated".to_string(),
            changes: Some(serde_json::json!(changed)),
        });
        self.store.save_link(&link)?;
        Ok(link)
    }

    fn find_link(&self, key: LinkKey<'_>) -> Result<Link> {
        match key {
            LinkKey::Id(id) => self.store.get_link(id)?.ok_or_else(|| SircError::NotFound(format!("link {id}"))),
            LinkKey::Triple { source, target, relation_type } => {
                let filter = LinkFilter {
                    source: Some(source.to_string()),
                    target: Some(target.to_string()),
                    relation_type: Some(relation_type.to_string()),
                    active: Some(true),
                    ..Default::default()
                };
                self.store
                    .query_links(&filter, 1, LinkSort::CreatedAtDesc)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| SircError::NotFound(format!("link {source}->{target} ({relation_type})")))
            }
        }
    }

    pub fn query_links(&self, filter: &LinkFilter, limit: usize, sort_by: LinkSort) -> Result<Vec<Link>> {
        self.store.query_links(filter, limit, sort_by)
    }

    pub fn remove_link(&self, link_id: &str) -> Result<()> {
        self.store.delete_link(link_id)
    }

    /// BFS from `target` over live outgoing links; true iff `source` is reached.
    pub fn would_create_cycle(&self, source: &str, target: &str, project_id: &str) -> Result<bool> {
        if source == target {
            return Ok(true);
        }
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(target.to_string());
        visited.insert(target.to_string());

        while let Some(current) = queue.pop_front() {
            if current == source {
                return Ok(true);
            }
            let filter = LinkFilter {
                project_id: Some(project_id.to_string()),
                source: Some(current.clone()),
                active: Some(true),
                ..Default::default()
            };
            for link in self.store.query_links(&filter, 10_000, LinkSort::CreatedAtDesc)? {
                if visited.insert(link.target.clone()) {
                    queue.push_back(link.target);
                }
            }
        }
        Ok(false)
    }

    /// Best-effort bulk rewrite: failures are isolated per item.
    pub fn batch_update_confidences(&self, updates: &[(String, f64)]) -> HashMap<String, Result<()>> {
        let mut outcomes = HashMap::new();
        for (link_id, confidence) in updates {
            let result = self
                .upsert_link(LinkKey::Id(link_id), LinkUpdate { confidence: Some(*confidence), ..Default::default() })
                .map(|_| ());
            if let Err(e) = &result {
                tracing::warn!(link_id = %link_id, error = %e, "batch confidence update failed for item");
            }
            outcomes.insert(link_id.clone(), result);
        }
        outcomes
    }

    pub fn link_statistics(&self, project_id: &str) -> Result<LinkStatistics> {
        let filter = LinkFilter { project_id: Some(project_id.to_string()), active: Some(true), ..Default::default() };
        let links = self.store.query_links(&filter, 1_000_000, LinkSort::CreatedAtDesc)?;
        if links.is_empty() {
            return Ok(LinkStatistics::default());
        }
        let count = links.len();
        let mean_confidence = links.iter().map(|l| l.confidence).sum::<f64>() / count as f64;
        let mean_weight = links.iter().map(|l| l.weight).sum::<f64>() / count as f64;
        Ok(LinkStatistics { count, mean_confidence, mean_weight })
    }
}

/// The multi-signal confidence blend (spec.md §4.5), shared by the Linker,
/// the Contextualizer, and the Reasoner.
pub fn blend_confidence(weights: &ConfidenceWeights, semantic: f64, ai: f64, lexical: f64, contextual: f64) -> f64 {
    weights.blend(semantic, ai, lexical, contextual)
}

/// Lexical signal helper, exposed so callers don't need to reach into
/// [`crate::lexical`] directly.
pub fn lexical_similarity(a: &str, b: &str) -> f64 {
    trigram_jaccard(a, b)
}
