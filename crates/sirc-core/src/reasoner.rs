//! Reasoner (C7): bounded cross-project relation inference and reasoning
//! chain discovery over existing links.

use std::collections::{HashSet, VecDeque};

use crate::cancel::CancelSignal;
use crate::config::{AiMode, SircConfig};
use crate::contextualizer::{contextual_bias, mock_relation_label, ContextEvent};
use crate::embeddings::cosine_similarity;
use crate::error::{Result, SircError};
use crate::federated_cache::FederatedCache;
use crate::lexical::trigram_jaccard;
use crate::linker::blend_confidence;
use crate::model::Link;
use crate::store::{IndexStore, LinkFilter, LinkSort};

#[derive(Debug, Clone)]
pub struct InferOptions {
    pub start_node_id: String,
    pub projects: Vec<String>,
    pub depth: u32,
    pub top_k: usize,
    pub mode: AiMode,
    pub threshold: f64,
    pub context_history: Vec<ContextEvent>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct InferredRelation {
    pub from: String,
    pub to: String,
    pub relation_type: String,
    pub confidence: f64,
    pub chain: Vec<ChainHop>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ChainHop {
    pub from: String,
    pub to: String,
    pub relation_type: String,
    pub confidence: f64,
}

pub struct Reasoner<'a> {
    store: &'a dyn IndexStore,
    config: &'a SircConfig,
}

impl<'a> Reasoner<'a> {
    pub fn new(store: &'a dyn IndexStore, config: &'a SircConfig) -> Self {
        Self { store, config }
    }

    /// Bounded BFS over the combined semantic + link graph (spec.md §4.7).
    /// Checks `cancel` between BFS expansions, per spec.md §5.
    pub fn infer_relations(&self, opts: &InferOptions, cache: &mut FederatedCache, cancel: &CancelSignal) -> Result<Vec<InferredRelation>> {
        let mut visited: HashSet<String> = HashSet::new();
        visited.insert(opts.start_node_id.clone());
        let mut queue: VecDeque<(String, u32, Vec<ChainHop>)> = VecDeque::new();
        queue.push_back((opts.start_node_id.clone(), 0, Vec::new()));

        let mut emitted = Vec::new();
        let mut iterations = 0usize;
        let project_refs: Vec<&str> = opts.projects.iter().map(String::as_str).collect();

        while let Some((current_id, depth, chain)) = queue.pop_front() {
            if cancel.is_cancelled() {
                return Err(SircError::Cancelled);
            }
            if iterations >= self.config.reasoner_max_batch {
                break;
            }
            iterations += 1;
            if depth >= opts.depth {
                continue;
            }

            let Some(current) = self.store.get_node(&current_id)? else { continue };
            let Some(current_embedding) = &current.embedding else { continue };

            let top_k_prime = 2 * opts.top_k;
            let candidates = cache.search_across_projects(
                current_embedding,
                &project_refs,
                top_k_prime,
                self.config.search_prefilter_multiplier,
                current.morton_key.as_deref(),
            )?;

            for candidate in candidates {
                if candidate.node_id == current_id || visited.contains(&candidate.node_id) {
                    continue;
                }
                let Some(candidate_node) = self.store.get_node(&candidate.node_id)? else { continue };
                let Some(candidate_embedding) = &candidate_node.embedding else { continue };

                let semantic = cosine_similarity(current_embedding, candidate_embedding) as f64;
                let lexical = trigram_jaccard(&current.text, &candidate_node.text);
                let contextual = contextual_bias(&candidate.node_id, &opts.context_history, self.config.context_half_life_hours);
                let (relation_type, ai_confidence) = match opts.mode {
                    AiMode::Mock => (mock_relation_label(&current_id, &candidate.node_id), semantic),
                    AiMode::Live => (mock_relation_label(&current_id, &candidate.node_id), semantic),
                };
                let confidence = blend_confidence(&self.config.reasoner_confidence_weights, semantic, ai_confidence, lexical, contextual);

                if confidence < opts.threshold {
                    continue;
                }

                let hop = ChainHop { from: current_id.clone(), to: candidate.node_id.clone(), relation_type: relation_type.clone(), confidence };
                let mut new_chain = chain.clone();
                new_chain.push(hop);

                emitted.push(InferredRelation {
                    from: current_id.clone(),
                    to: candidate.node_id.clone(),
                    relation_type,
                    confidence,
                    chain: new_chain.clone(),
                });

                visited.insert(candidate.node_id.clone());
                if depth + 1 < opts.depth {
                    queue.push_back((candidate.node_id, depth + 1, new_chain));
                }
            }
        }

        emitted.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        emitted.truncate(opts.top_k);
        Ok(emitted)
    }

    /// BFS over existing live links with multiplicative confidence decay
    /// (spec.md §4.7).
    pub fn find_chains(
        &self,
        source_id: &str,
        target_id: &str,
        max_depth: u32,
        max_chains: usize,
        project_id: Option<&str>,
    ) -> Result<Vec<(Vec<ChainHop>, f64)>> {
        let mut results = Vec::new();
        let mut queue: VecDeque<(String, Vec<ChainHop>, f64, u32)> = VecDeque::new();
        queue.push_back((source_id.to_string(), Vec::new(), 1.0, 0));

        while let Some((current, path, combined, depth)) = queue.pop_front() {
            if results.len() >= max_chains {
                break;
            }
            if current == target_id && !path.is_empty() {
                results.push((path.clone(), combined));
                continue;
            }
            if depth >= max_depth {
                continue;
            }
            let filter = LinkFilter {
                project_id: project_id.map(str::to_string),
                source: Some(current.clone()),
                active: Some(true),
                ..Default::default()
            };
            let links: Vec<Link> = self.store.query_links(&filter, 10_000, LinkSort::ConfidenceDesc)?;
            for link in links {
                if path.iter().any(|h| h.to == link.target) {
                    continue; // avoid revisiting a node already on this path
                }
                let mut next_path = path.clone();
                next_path.push(ChainHop {
                    from: link.source.clone(),
                    to: link.target.clone(),
                    relation_type: link.relation_type.clone(),
                    confidence: link.confidence,
                });
                queue.push_back((link.target, next_path, combined * link.confidence, depth + 1));
            }
        }

        results.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(max_chains);
        Ok(results)
    }

    /// A human-readable transcript of a set of chains (spec.md §4.7).
    pub fn chain_transcript(chains: &[(Vec<ChainHop>, f64)]) -> String {
        let mut out = format!("{} chain(s) found\n", chains.len());
        for (path, confidence) in chains {
            let rendered: Vec<String> = path.iter().map(|h| format!("{} --[{} ({:.2})]--> {}", h.from, h.relation_type, h.confidence, h.to)).collect();
            out.push_str(&format!("- confidence {:.3}: {}\n", confidence, rendered.join(" ")));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::{CreateLinkFields, Linker};
    use crate::store::InMemoryIndexStore;

    fn fields(source: &str, target: &str, confidence: f64) -> CreateLinkFields {
        CreateLinkFields {
            project_id: "p1".to_string(),
            source: source.to_string(),
            target: target.to_string(),
            relation_type: "supports".to_string(),
            confidence,
            weight: None,
            method: "test".to_string(),
            ai_confidence: None,
            note: None,
        }
    }

    #[test]
    fn find_chains_decays_confidence_multiplicatively() {
        let store = InMemoryIndexStore::new();
        let linker = Linker::new(&store);
        linker.create_link(fields("a", "b", 0.8)).unwrap();
        linker.create_link(fields("b", "c", 0.5)).unwrap();

        let config = SircConfig::default();
        let reasoner = Reasoner::new(&store, &config);
        let chains = reasoner.find_chains("a", "c", 5, 10, Some("p1")).unwrap();
        assert_eq!(chains.len(), 1);
        assert!((chains[0].1 - 0.4).abs() < 1e-9);
    }

    #[test]
    fn find_chains_returns_empty_when_no_path_exists() {
        let store = InMemoryIndexStore::new();
        let linker = Linker::new(&store);
        linker.create_link(fields("a", "b", 0.8)).unwrap();
        let config = SircConfig::default();
        let reasoner = Reasoner::new(&store, &config);
        let chains = reasoner.find_chains("a", "z", 5, 10, Some("p1")).unwrap();
        assert!(chains.is_empty());
    }

    #[test]
    fn infer_relations_returns_cancelled_once_the_signal_fires() {
        use crate::model::{Node, NodeMeta};

        let store: std::sync::Arc<dyn IndexStore> = std::sync::Arc::new(InMemoryIndexStore::new());
        for (id, text) in [("start", "shared vocabulary about knowledge systems")] {
            store
                .save_node(&Node {
                    id: id.to_string(),
                    project_id: "p1".to_string(),
                    title: id.to_string(),
                    text: text.to_string(),
                    summary: None,
                    embedding: Some(vec![1.0, 0.0]),
                    morton_key: None,
                    parent: None,
                    children: vec![],
                    meta: NodeMeta::default(),
                })
                .unwrap();
        }
        let config = SircConfig::default();
        let reasoner = Reasoner::new(store.as_ref(), &config);
        let mut cache = FederatedCache::new(std::sync::Arc::clone(&store), config.federation_max_cache_nodes);

        let opts = InferOptions {
            start_node_id: "start".to_string(),
            projects: vec!["p1".to_string()],
            depth: 2,
            top_k: 5,
            mode: AiMode::Mock,
            threshold: 0.0,
            context_history: Vec::new(),
        };
        let cancel = CancelSignal::new();
        cancel.cancel();
        let result = reasoner.infer_relations(&opts, &mut cache, &cancel);
        assert!(matches!(result, Err(SircError::Cancelled)));
    }
}
