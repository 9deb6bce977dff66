//! Searcher (C3): Morton prefilter + cosine re-rank over a single project's
//! persisted nodes.

use crate::cancel::CancelSignal;
use crate::config::SircConfig;
use crate::embeddings::{cosine_similarity, EmbeddingProvider};
use crate::error::{Result, SircError};
use crate::model::{Node, QuantParams, Reduction};
use crate::quantizer::{compute_quant_params, morton_key};
use crate::store::{IndexStore, Radius};

/// A single ranked search hit.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub node_id: String,
    pub score: f32,
    pub title: String,
    pub snippet: String,
    pub morton_key: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    pub project_id: Option<String>,
    pub top_k: Option<usize>,
    pub radius_power: Option<u32>,
    pub quant_params: Option<QuantParams>,
    pub max_wideners: Option<u32>,
    pub subtree_root: Option<String>,
}

pub struct Searcher<'a> {
    store: &'a dyn IndexStore,
    embedder: &'a dyn EmbeddingProvider,
    config: &'a SircConfig,
}

impl<'a> Searcher<'a> {
    pub fn new(store: &'a dyn IndexStore, embedder: &'a dyn EmbeddingProvider, config: &'a SircConfig) -> Self {
        Self { store, embedder, config }
    }

    /// Returns stored quant params for `project_id`, or computes fresh ones
    /// from `samples` using spec defaults (`D=8, B=16, first`), or `None`.
    pub fn get_or_create_quant_params(&self, project_id: &str, samples: Option<&[Vec<f32>]>) -> Result<Option<QuantParams>> {
        if let Some(existing) = self.store.get_quant_params(project_id)? {
            return Ok(Some(existing));
        }
        if let Some(samples) = samples {
            if !samples.is_empty() {
                let params = compute_quant_params(
                    samples,
                    self.config.morton_reduced_dims,
                    self.config.morton_bits_per_dim,
                    Reduction::First,
                );
                self.store.save_quant_params(project_id, &params)?;
                return Ok(Some(params));
            }
        }
        Ok(None)
    }

    /// Turn a query string into a ranked list of hits (spec.md §4.3).
    /// Checks `cancel` between radius widenings and between candidate
    /// fetches, per spec.md §5.
    pub fn semantic_search(&self, query_text: &str, opts: &SearchOptions, cancel: &CancelSignal) -> Result<Vec<SearchHit>> {
        if query_text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let top_k = opts.top_k.unwrap_or(self.config.search_top_k);
        let radius_power = opts.radius_power.unwrap_or(self.config.search_radius_power);
        let max_wideners = opts.max_wideners.unwrap_or(self.config.search_max_wideners);

        let query_embedding = match self.embedder.embed(query_text) {
            Ok(e) => e,
            Err(_) => return Ok(self.substring_fallback(query_text, opts, top_k)),
        };

        let quant_params = match &opts.quant_params {
            Some(p) => p.clone(),
            None => {
                let project_id = opts.project_id.as_deref().unwrap_or("default");
                match self.get_or_create_quant_params(project_id, None)? {
                    Some(p) => p,
                    None => return Ok(self.linear_scan(&query_embedding, opts, top_k)),
                }
            }
        };

        let query_key = morton_key(&query_embedding, &quant_params);
        let mut radius: u128 = 1u128 << radius_power.min(127);
        let mut widen = 0u32;
        let limit = 5 * top_k;

        let candidate_ids = loop {
            if cancel.is_cancelled() {
                return Err(SircError::Cancelled);
            }
            let ids = self.store.range_scan(&query_key, Radius::Range(radius), limit)?;
            if !ids.is_empty() {
                break ids;
            }
            if widen >= max_wideners {
                return Ok(Vec::new());
            }
            radius = radius.saturating_mul(4);
            widen += 1;
        };

        let mut hits = Vec::new();
        for id in candidate_ids {
            if cancel.is_cancelled() {
                return Err(SircError::Cancelled);
            }
            let Some(node) = self.store.get_node(&id)? else { continue };
            if !self.passes_filters(&node, opts) {
                continue;
            }
            let Some(embedding) = &node.embedding else { continue };
            let score = cosine_similarity(&query_embedding, embedding);
            hits.push(self.to_hit(node, score));
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(a.node_id.cmp(&b.node_id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// Best-effort batch: a failing (or cancelled) query yields an empty
    /// list, never aborts the batch.
    pub fn semantic_search_batch(&self, queries: &[&str], opts: &SearchOptions, cancel: &CancelSignal) -> Vec<Vec<SearchHit>> {
        queries
            .iter()
            .map(|q| self.semantic_search(q, opts, cancel).unwrap_or_default())
            .collect()
    }

    fn passes_filters(&self, node: &Node, opts: &SearchOptions) -> bool {
        if let Some(project_id) = &opts.project_id {
            if &node.project_id != project_id {
                return false;
            }
        }
        if let Some(root) = &opts.subtree_root {
            if node.id != *root && node.parent.as_deref() != Some(root.as_str()) {
                // Shallow check; a full subtree containment walk is the
                // caller's responsibility for deep trees.
                return node_in_subtree(self.store, &node.id, root);
            }
        }
        true
    }

    fn to_hit(&self, node: Node, score: f32) -> SearchHit {
        let snippet = snippet_of(&node.text);
        SearchHit {
            node_id: node.id,
            score,
            title: node.title,
            snippet,
            morton_key: node.morton_key,
            text: node.text,
        }
    }

    /// No-embedding, no-quant-params degrade path: substring containment ranked by length.
    fn substring_fallback(&self, query_text: &str, opts: &SearchOptions, top_k: usize) -> Vec<SearchHit> {
        let needle = query_text.to_lowercase();
        let nodes = self.store.get_all_nodes(10_000).unwrap_or_default();
        let mut hits: Vec<SearchHit> = nodes
            .into_iter()
            .filter(|n| self.passes_filters(n, opts))
            .filter(|n| n.text.to_lowercase().contains(&needle) || n.title.to_lowercase().contains(&needle))
            .map(|n| self.to_hit(n, 0.0))
            .collect();
        hits.truncate(top_k);
        hits
    }

    /// No-quant-params degrade path: cosine over every stored node.
    fn linear_scan(&self, query_embedding: &[f32], opts: &SearchOptions, top_k: usize) -> Vec<SearchHit> {
        let nodes = self.store.get_all_nodes(10_000).unwrap_or_default();
        let mut hits: Vec<SearchHit> = nodes
            .into_iter()
            .filter(|n| self.passes_filters(n, opts))
            .filter_map(|n| {
                let score = cosine_similarity(query_embedding, n.embedding.as_ref()?);
                Some(self.to_hit(n, score))
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }
}

fn node_in_subtree(store: &dyn IndexStore, node_id: &str, root_id: &str) -> bool {
    let mut current = node_id.to_string();
    for _ in 0..64 {
        if current == root_id {
            return true;
        }
        match store.get_node(&current) {
            Ok(Some(node)) => match node.parent {
                Some(parent) => current = parent,
                None => return false,
            },
            _ => return false,
        }
    }
    false
}

/// First 140 characters, trailing whitespace trimmed, ellipsis if truncated.
pub fn snippet_of(text: &str) -> String {
    const MAX_LEN: usize = 140;
    if text.chars().count() <= MAX_LEN {
        return text.trim_end().to_string();
    }
    let truncated: String = text.chars().take(MAX_LEN).collect();
    format!("{}...", truncated.trim_end())
}
