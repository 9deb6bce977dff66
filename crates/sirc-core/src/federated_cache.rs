//! Federated Cache (C4): per-project in-memory mirror of the Index Store,
//! with a global Morton-prefix index and LRU eviction across projects.
//!
//! Persistence (the [`crate::store::IndexStore`]) is always authoritative;
//! this cache is a derived, transient view that may be dropped and rebuilt
//! at any time (spec.md §3 "Ownership and lifecycle").

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use lru::LruCache;
use std::num::NonZeroUsize;

use crate::embeddings::cosine_similarity;
use crate::error::Result;
use crate::model::Node;
use crate::store::IndexStore;

const MORTON_PREFIX_LEN: usize = 8;

#[derive(Debug, Clone)]
struct CachedNode {
    embedding: Vec<f32>,
    morton_key: Option<String>,
    title: String,
    text: String,
    cached_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CrossProjectHit {
    pub node_id: String,
    pub project_id: String,
    pub similarity: f32,
    pub title: String,
}

/// Per-project weighting applied during ranking fusion (spec.md §4.4).
#[derive(Debug, Clone)]
pub struct ProjectWeight {
    pub project_id: String,
    pub weight: f64,
    pub last_accessed: DateTime<Utc>,
}

pub struct FederatedCache {
    store: Arc<dyn IndexStore>,
    capacity: usize,
    projects: HashMap<String, HashMap<String, CachedNode>>,
    project_prefix_index: HashMap<String, HashMap<String, HashSet<String>>>,
    global_prefix_index: BTreeMap<String, HashSet<(String, String)>>,
    access_log: LruCache<(String, String), ()>,
}

impl FederatedCache {
    pub fn new(store: Arc<dyn IndexStore>, capacity: usize) -> Self {
        Self {
            store,
            capacity,
            projects: HashMap::new(),
            project_prefix_index: HashMap::new(),
            global_prefix_index: BTreeMap::new(),
            access_log: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
        }
    }

    /// Clears any existing cache for `project_id`, then bulk-ingests `nodes`.
    /// Nodes missing an embedding or Morton key are skipped with a warning.
    pub fn add_project(&mut self, project_id: &str, nodes: &[Node]) {
        self.evict_project(project_id);
        let mut by_id = HashMap::new();
        let mut prefix_index: HashMap<String, HashSet<String>> = HashMap::new();

        for node in nodes {
            let (Some(embedding), Some(morton_key)) = (&node.embedding, &node.morton_key) else {
                tracing::warn!(node_id = %node.id, "skipping cache entry without embedding or morton key");
                continue;
            };
            let cached = CachedNode {
                embedding: embedding.clone(),
                morton_key: Some(morton_key.clone()),
                title: node.title.clone(),
                text: node.text.clone(),
                cached_at: Utc::now(),
            };
            let prefix = prefix_of(morton_key);
            prefix_index.entry(prefix.clone()).or_default().insert(node.id.clone());
            self.global_prefix_index
                .entry(prefix)
                .or_default()
                .insert((project_id.to_string(), node.id.clone()));
            self.touch(project_id, &node.id);
            by_id.insert(node.id.clone(), cached);
        }

        self.projects.insert(project_id.to_string(), by_id);
        self.project_prefix_index.insert(project_id.to_string(), prefix_index);
        self.enforce_capacity();
    }

    /// Cache-first lookup; on a miss, falls back to persistence and
    /// opportunistically caches the fetched record.
    pub fn get_embedding(&mut self, node_id: &str, project_id: Option<&str>) -> Result<Option<Vec<f32>>> {
        if let Some(project_id) = project_id {
            if let Some(nodes) = self.projects.get(project_id) {
                if let Some(cached) = nodes.get(node_id) {
                    self.touch(project_id, node_id);
                    return Ok(Some(cached.embedding.clone()));
                }
            }
        } else {
            for (project_id, nodes) in &self.projects {
                if let Some(cached) = nodes.get(node_id) {
                    let embedding = cached.embedding.clone();
                    let pid = project_id.clone();
                    self.touch(&pid, node_id);
                    return Ok(Some(embedding));
                }
            }
        }

        let Some(node) = self.store.get_node(node_id)? else {
            return Ok(None);
        };
        if let (Some(embedding), Some(pid)) = (&node.embedding, project_id.map(str::to_string).or_else(|| Some(node.project_id.clone()))) {
            self.add_project_node(&pid, &node);
            Ok(Some(embedding.clone()))
        } else {
            Ok(node.embedding)
        }
    }

    fn add_project_node(&mut self, project_id: &str, node: &Node) {
        let (Some(embedding), Some(morton_key)) = (&node.embedding, &node.morton_key) else {
            return;
        };
        let cached = CachedNode {
            embedding: embedding.clone(),
            morton_key: Some(morton_key.clone()),
            title: node.title.clone(),
            text: node.text.clone(),
            cached_at: Utc::now(),
        };
        let prefix = prefix_of(morton_key);
        self.project_prefix_index
            .entry(project_id.to_string())
            .or_default()
            .entry(prefix.clone())
            .or_default()
            .insert(node.id.clone());
        self.global_prefix_index
            .entry(prefix)
            .or_default()
            .insert((project_id.to_string(), node.id.clone()));
        self.projects.entry(project_id.to_string()).or_default().insert(node.id.clone(), cached);
        self.touch(project_id, &node.id);
        self.enforce_capacity();
    }

    /// Bulk load from persistence for projects not already cached.
    pub fn warmup_cache(&mut self, project_ids: &[&str]) -> Result<()> {
        for project_id in project_ids {
            if self.projects.contains_key(*project_id) {
                continue;
            }
            let all = self.store.get_all_nodes(100_000)?;
            let nodes: Vec<Node> = all.into_iter().filter(|n| &n.project_id == project_id).collect();
            self.add_project(project_id, &nodes);
        }
        Ok(())
    }

    pub fn clear_cache(&mut self) {
        self.projects.clear();
        self.project_prefix_index.clear();
        self.global_prefix_index.clear();
        self.access_log.clear();
    }

    /// Cross-project similarity search (spec.md §4.4).
    pub fn search_across_projects(
        &mut self,
        query_embedding: &[f32],
        projects: &[&str],
        top_k: usize,
        prefilter_multiplier: usize,
        query_morton_key: Option<&str>,
    ) -> Result<Vec<CrossProjectHit>> {
        let candidates = self.collect_candidates(projects, top_k, prefilter_multiplier, query_morton_key)?;

        let mut hits: Vec<CrossProjectHit> = candidates
            .into_iter()
            .filter_map(|(project_id, node_id)| {
                let cached = self.projects.get(&project_id)?.get(&node_id)?;
                let similarity = cosine_similarity(query_embedding, &cached.embedding);
                Some(CrossProjectHit { node_id, project_id, similarity, title: cached.title.clone() })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal).then(a.node_id.cmp(&b.node_id)));
        hits.truncate(top_k);
        Ok(hits)
    }

    fn collect_candidates(
        &mut self,
        projects: &[&str],
        top_k: usize,
        prefilter_multiplier: usize,
        query_morton_key: Option<&str>,
    ) -> Result<Vec<(String, String)>> {
        let wanted: HashSet<&str> = projects.iter().copied().collect();

        if let Some(center) = query_morton_key {
            let target = top_k * prefilter_multiplier * projects.len().max(1);
            let mut out = Vec::new();
            let Some(center_val) = u128::from_str_radix(center, 16).ok() else {
                return Ok(Vec::new());
            };
            let width = center.len();
            let step: u128 = 16;
            let radius: u128 = 256;
            let mut offset: u128 = 0;
            while offset <= radius && out.len() < target {
                for sign in [1i128, -1] {
                    let candidate = if sign >= 0 {
                        center_val.saturating_add(offset)
                    } else {
                        center_val.saturating_sub(offset)
                    };
                    let prefix = format!("{:0width$x}", candidate, width = width);
                    let prefix: String = prefix.chars().take(MORTON_PREFIX_LEN).collect();
                    if let Some(pairs) = self.global_prefix_index.get(&prefix) {
                        for (pid, nid) in pairs {
                            if wanted.contains(pid.as_str()) {
                                out.push((pid.clone(), nid.clone()));
                            }
                        }
                    }
                    if out.len() >= target {
                        break;
                    }
                }
                offset += step;
            }
            out.truncate(target);
            Ok(out)
        } else {
            let mut out = Vec::new();
            for project_id in projects {
                if !self.projects.contains_key(*project_id) {
                    self.warmup_cache(&[project_id])?;
                }
                if let Some(nodes) = self.projects.get(*project_id) {
                    out.extend(nodes.keys().map(|nid| (project_id.to_string(), nid.clone())));
                }
            }
            Ok(out)
        }
    }

    /// Per-project normalised, weighted, freshness-boosted ranking fusion
    /// (spec.md §4.4's "higher-level cross-project Searcher variant").
    pub fn search_across_projects_fused(
        &mut self,
        query_embedding: &[f32],
        project_weights: &[ProjectWeight],
        top_k: usize,
        prefilter_multiplier: usize,
        query_morton_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<(CrossProjectHit, f64)>> {
        let project_ids: Vec<&str> = project_weights.iter().map(|p| p.project_id.as_str()).collect();
        let raw_hits = self.search_across_projects(query_embedding, &project_ids, top_k * 4, prefilter_multiplier, query_morton_key)?;

        let mut by_project: HashMap<&str, Vec<&CrossProjectHit>> = HashMap::new();
        for hit in &raw_hits {
            by_project.entry(hit.project_id.as_str()).or_default().push(hit);
        }

        let mut fused = Vec::new();
        for pw in project_weights {
            let Some(project_hits) = by_project.get(pw.project_id.as_str()) else { continue };
            if project_hits.is_empty() {
                continue;
            }
            let min = project_hits.iter().map(|h| h.similarity).fold(f32::INFINITY, f32::min);
            let max = project_hits.iter().map(|h| h.similarity).fold(f32::NEG_INFINITY, f32::max);
            let span = (max - min).max(f32::EPSILON);
            let days_since_access = (now - pw.last_accessed).num_seconds() as f64 / 86400.0;
            let freshness = 1.0 + 0.2 * (-days_since_access / 30.0).exp();

            for hit in project_hits {
                let normalized = if (max - min).abs() < f32::EPSILON { 1.0 } else { (hit.similarity - min) / span };
                let fused_score = normalized as f64 * pw.weight * freshness;
                fused.push(((*hit).clone(), fused_score));
            }
        }

        fused.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        fused.truncate(top_k);
        Ok(fused)
    }

    fn touch(&mut self, project_id: &str, node_id: &str) {
        self.access_log.put((project_id.to_string(), node_id.to_string()), ());
    }

    fn evict_project(&mut self, project_id: &str) {
        if let Some(nodes) = self.projects.remove(project_id) {
            for node_id in nodes.keys() {
                self.access_log.pop(&(project_id.to_string(), node_id.clone()));
            }
        }
        if let Some(prefixes) = self.project_prefix_index.remove(project_id) {
            for prefix in prefixes.keys() {
                if let Some(set) = self.global_prefix_index.get_mut(prefix) {
                    set.retain(|(pid, _)| pid != project_id);
                    if set.is_empty() {
                        self.global_prefix_index.remove(prefix);
                    }
                }
            }
        }
    }

    fn total_cached_nodes(&self) -> usize {
        self.projects.values().map(|m| m.len()).sum()
    }

    fn enforce_capacity(&mut self) {
        while self.total_cached_nodes() > self.capacity {
            let Some(((project_id, node_id), _)) = self.access_log.pop_lru() else { break };
            if let Some(nodes) = self.projects.get_mut(&project_id) {
                if let Some(cached) = nodes.remove(&node_id) {
                    if let Some(key) = &cached.morton_key {
                        let prefix = prefix_of(key);
                        if let Some(idx) = self.project_prefix_index.get_mut(&project_id) {
                            if let Some(set) = idx.get_mut(&prefix) {
                                set.remove(&node_id);
                            }
                        }
                        if let Some(set) = self.global_prefix_index.get_mut(&prefix) {
                            set.remove(&(project_id.clone(), node_id.clone()));
                        }
                    }
                }
                if nodes.is_empty() {
                    self.projects.remove(&project_id);
                    self.project_prefix_index.remove(&project_id);
                }
            }
        }
    }
}

fn prefix_of(morton_hex: &str) -> String {
    morton_hex.chars().take(MORTON_PREFIX_LEN).collect()
}
