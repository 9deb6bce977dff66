//! Contextualizer (C6): link suggestions for a single node via Morton
//! prefilter, multi-signal scoring, and relation-label generation.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::{AiMode, SircConfig};
use crate::embeddings::cosine_similarity;
use crate::error::{Result, SircError};
use crate::lexical::trigram_jaccard;
use crate::linker::blend_confidence;
use crate::model::{ActionType, RelationType, RELATION_TAXONOMY};
use crate::store::{IndexStore, Radius};

/// One past interaction used to compute the contextual-bias signal.
#[derive(Debug, Clone)]
pub struct ContextEvent {
    pub node_id: String,
    pub action_type: ActionType,
    /// Position in the recency-ordered history, 0 = most recent.
    pub position: u32,
}

#[derive(Debug, Clone)]
pub struct SuggestOptions {
    pub top_k: usize,
    pub include_context_bias: bool,
    pub context_history: Vec<ContextEvent>,
    pub mode: AiMode,
    pub project_id: Option<String>,
    pub radius_power: u32,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LinkSuggestion {
    pub candidate_id: String,
    pub relation_type: String,
    pub confidence: f64,
    pub semantic: f64,
    pub lexical: f64,
    pub contextual: f64,
}

pub struct Contextualizer<'a> {
    store: &'a dyn IndexStore,
    config: &'a SircConfig,
}

impl<'a> Contextualizer<'a> {
    pub fn new(store: &'a dyn IndexStore, config: &'a SircConfig) -> Self {
        Self { store, config }
    }

    pub fn suggest_links(&self, node_id: &str, opts: &SuggestOptions) -> Result<Vec<LinkSuggestion>> {
        let source = self
            .store
            .get_node(node_id)?
            .ok_or_else(|| SircError::NotFound(format!("node {node_id}")))?;
        let Some(source_key) = &source.morton_key else {
            return Err(SircError::Degraded(format!("node {node_id} has no morton key")));
        };
        let Some(source_embedding) = &source.embedding else {
            return Err(SircError::Degraded(format!("node {node_id} has no embedding")));
        };

        let radius = 1u128 << opts.radius_power.min(127);
        let limit = 3 * opts.top_k;
        let candidate_ids = self.store.range_scan(source_key, Radius::Range(radius), limit)?;

        let threshold = self.config.link_sim_threshold;
        let mut scored = Vec::new();

        for candidate_id in candidate_ids {
            if candidate_id == node_id {
                continue;
            }
            let Some(candidate) = self.store.get_node(&candidate_id)? else { continue };
            if let Some(project_id) = &opts.project_id {
                if &candidate.project_id != project_id {
                    continue;
                }
            }
            let Some(candidate_embedding) = &candidate.embedding else { continue };

            let semantic = cosine_similarity(source_embedding, candidate_embedding) as f64;
            let lexical = trigram_jaccard(&source.text, &candidate.text);
            let contextual = if opts.include_context_bias {
                contextual_bias(&candidate_id, &opts.context_history, self.config.context_half_life_hours)
            } else {
                0.0
            };

            let preliminary = 0.6 * semantic + 0.2 * lexical + 0.2 * contextual;
            if semantic < threshold && preliminary < threshold {
                continue;
            }
            scored.push((candidate_id, semantic, lexical, contextual, preliminary));
        }

        scored.sort_by(|a, b| b.4.partial_cmp(&a.4).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(2 * opts.top_k);

        let mut suggestions = Vec::new();
        for (candidate_id, semantic, lexical, contextual, _) in scored {
            let (relation_type, ai_confidence) = self.generate_relation(node_id, &candidate_id, semantic, opts.mode);
            let confidence = blend_confidence(&self.config.confidence_weights, semantic, ai_confidence, lexical, contextual);
            suggestions.push(LinkSuggestion { candidate_id, relation_type, confidence, semantic, lexical, contextual });
        }

        suggestions.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        suggestions.truncate(opts.top_k);
        Ok(suggestions)
    }

    /// Deterministic mock path when `mode == AiMode::Mock`; a live delegate
    /// is treated as an external collaborator and is not modelled here.
    fn generate_relation(&self, source_id: &str, candidate_id: &str, semantic: f64, mode: AiMode) -> (String, f64) {
        match mode {
            AiMode::Mock => (mock_relation_label(source_id, candidate_id), semantic),
            AiMode::Live => (mock_relation_label(source_id, candidate_id), semantic),
        }
    }
}

/// `relation_taxonomy[hash(source_id + candidate_id) mod |taxonomy|]` (spec.md §9).
pub fn mock_relation_label(source_id: &str, candidate_id: &str) -> String {
    let mut hasher = DefaultHasher::new();
    format!("{source_id}{candidate_id}").hash(&mut hasher);
    let idx = (hasher.finish() as usize) % RELATION_TAXONOMY.len();
    RelationType::as_str(&RELATION_TAXONOMY[idx]).to_string()
}

/// `recency_bias + action_bias`, clamped to `[0, 1]` (spec.md §4.6).
pub fn contextual_bias(candidate_id: &str, history: &[ContextEvent], half_life_hours: f64) -> f64 {
    let Some(event) = history.iter().find(|e| e.node_id == candidate_id) else {
        return 0.0;
    };
    let recency = 0.5 * 0.5f64.powf(event.position as f64 / half_life_hours.max(1e-9));

    let recent_actions: std::collections::HashSet<ActionType> =
        history.iter().take(3).map(|e| e.action_type).collect();
    let overlap = if recent_actions.contains(&event.action_type) { 1 } else { 0 };
    let action_bias = 0.3 * (overlap as f64 / 3.0);

    (recency + action_bias).clamp(0.0, 1.0)
}
