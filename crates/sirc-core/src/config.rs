//! Explicit configuration surface.
//!
//! Per the "no ambient state" design note: there is no process-wide
//! singleton of tunables. Every knob spec.md §6 names lives on `SircConfig`,
//! constructed once and threaded through `SircEngine::new`.

use serde::{Deserialize, Serialize};

/// Multi-signal confidence blend weights (spec.md §4.5, §6).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub semantic: f64,
    pub ai: f64,
    pub lexical: f64,
    pub contextual: f64,
}

impl ConfidenceWeights {
    /// Spec default: 0.5 / 0.3 / 0.1 / 0.1.
    pub const DEFAULT: Self = Self {
        semantic: 0.5,
        ai: 0.3,
        lexical: 0.1,
        contextual: 0.1,
    };

    /// The "Phase-7" profile used by the Reasoner: 0.4 / 0.3 / 0.15 / 0.15.
    pub const PHASE_7: Self = Self {
        semantic: 0.4,
        ai: 0.3,
        lexical: 0.15,
        contextual: 0.15,
    };

    pub fn blend(&self, semantic: f64, ai: f64, lexical: f64, contextual: f64) -> f64 {
        let raw = self.semantic * semantic
            + self.ai * ai
            + self.lexical * lexical
            + self.contextual * contextual;
        raw.clamp(0.0, 1.0)
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// AI/relation-extractor execution mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AiMode {
    /// Call the live, injected AI collaborator.
    Live,
    /// Deterministic mock path: `relation_taxonomy[hash(a+b) % len]`.
    #[default]
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SircConfig {
    pub embed_dim: usize,
    pub morton_reduced_dims: usize,
    pub morton_bits_per_dim: u32,

    pub search_top_k: usize,
    pub search_prefilter_multiplier: usize,
    pub search_radius_power: u32,
    pub search_max_wideners: u32,

    pub context_suggest_topk: usize,
    pub link_sim_threshold: f64,
    pub context_half_life_hours: f64,
    pub link_max_batch: usize,

    pub confidence_weights: ConfidenceWeights,
    pub reasoner_confidence_weights: ConfidenceWeights,

    pub topic_similarity_threshold: f64,
    pub topic_max_topics: usize,
    pub topic_window_minutes: i64,
    pub topic_max_keywords: usize,
    pub topic_min_nodes: usize,
    /// Half-life, in minutes, used by the exponential topic-weight decay.
    pub topic_decay_window_minutes: i64,

    pub federation_max_cache_nodes: usize,
    pub reasoner_max_batch: usize,

    pub ai_timeout_ms: u64,
    pub ai_mode: AiMode,
}

impl Default for SircConfig {
    fn default() -> Self {
        let reasoner_max_batch = 256;
        Self {
            embed_dim: 512,
            morton_reduced_dims: 8,
            morton_bits_per_dim: 16,

            search_top_k: 10,
            search_prefilter_multiplier: 3,
            search_radius_power: 12,
            search_max_wideners: 3,

            context_suggest_topk: 8,
            link_sim_threshold: 0.78,
            context_half_life_hours: 72.0,
            link_max_batch: 2000,

            confidence_weights: ConfidenceWeights::DEFAULT,
            reasoner_confidence_weights: ConfidenceWeights::PHASE_7,

            topic_similarity_threshold: 0.75,
            topic_max_topics: 64,
            topic_window_minutes: 60,
            topic_max_keywords: 10,
            topic_min_nodes: 2,
            topic_decay_window_minutes: 24 * 60,

            federation_max_cache_nodes: reasoner_max_batch * 2,
            reasoner_max_batch,

            ai_timeout_ms: 30_000,
            ai_mode: AiMode::Mock,
        }
    }
}
