//! `SircEngine`: the composition root wiring the Index Store, the embedding
//! collaborator, and the ten components (C1–C10) into a single entry point
//! (spec.md §3 "Composition / data flow").
//!
//! The engine owns the Federated Cache, the Topic Modeller, and a
//! per-project CRDT document map as long-lived, stateful fields. Everything
//! else (`Searcher`, `Linker`, `Contextualizer`, `Reasoner`) is short-lived
//! and constructed fresh per call from borrows of `store`/`config`/
//! `embedder` — they hold no state of their own.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::config::SircConfig;
use crate::contextualizer::{Contextualizer, LinkSuggestion, SuggestOptions as ContextSuggestOptions};
use crate::crdt::{CrdtDocument, DocumentSnapshot, VectorClock};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SircError};
use crate::federated_cache::FederatedCache;
use crate::interactions::{ContextSuggestion, DecodedInteraction, MemoryManager, RecordInteractionFields, SuggestOptions as InteractionSuggestOptions};
use crate::linker::{CreateLinkFields, LinkKey, LinkStatistics, LinkUpdate, Linker};
use crate::model::{Node, NodeMeta, Operation, OperationKind, Topic};
use crate::quantizer::morton_key;
use crate::reasoner::{ChainHop, InferOptions, InferredRelation, Reasoner};
use crate::searcher::{SearchHit, SearchOptions, Searcher};
use crate::store::{IndexStore, InteractionFilter, LinkFilter, LinkSort};

/// Fields accepted by [`SircEngine::ingest_node`].
#[derive(Debug, Clone)]
pub struct IngestFields {
    pub project_id: String,
    pub title: String,
    pub text: String,
    pub summary: Option<String>,
    pub parent: Option<String>,
    pub author: Option<String>,
    pub source_url: Option<String>,
}

pub struct SircEngine {
    config: Arc<SircConfig>,
    store: Arc<dyn IndexStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    cache: Mutex<FederatedCache>,
    crdt_docs: Mutex<HashMap<String, CrdtDocument>>,
}

impl SircEngine {
    pub fn new(store: Arc<dyn IndexStore>, embedder: Arc<dyn EmbeddingProvider>, config: SircConfig) -> Self {
        let config = Arc::new(config);
        let cache = FederatedCache::new(Arc::clone(&store), config.federation_max_cache_nodes);
        Self {
            config,
            store,
            embedder,
            cache: Mutex::new(cache),
            crdt_docs: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &SircConfig {
        &self.config
    }

    fn searcher(&self) -> Searcher<'_> {
        Searcher::new(self.store.as_ref(), self.embedder.as_ref(), &self.config)
    }

    fn linker(&self) -> Linker<'_> {
        Linker::new(self.store.as_ref())
    }

    fn contextualizer(&self) -> Contextualizer<'_> {
        Contextualizer::new(self.store.as_ref(), &self.config)
    }

    fn reasoner(&self) -> Reasoner<'_> {
        Reasoner::new(self.store.as_ref(), &self.config)
    }

    fn memory(&self) -> MemoryManager<'_> {
        MemoryManager::new(self.store.as_ref())
    }

    // ---- C1/C2: ingestion ------------------------------------------------

    /// Embeds `fields.text`, quantizes it against the project's quant
    /// params (computing them from this sample if they don't yet exist),
    /// and persists the resulting node.
    pub fn ingest_node(&self, fields: IngestFields) -> Result<Node> {
        let embedding = self
            .embedder
            .embed(&fields.text)
            .map_err(|e| SircError::Degraded(format!("embedding failed: {e}")))?;

        let searcher = self.searcher();
        let quant_params = searcher.get_or_create_quant_params(&fields.project_id, Some(std::slice::from_ref(&embedding)))?;
        let morton = quant_params.as_ref().map(|p| morton_key(&embedding, p));

        let node = Node {
            id: Uuid::new_v4().to_string(),
            project_id: fields.project_id,
            title: fields.title,
            text: fields.text,
            summary: fields.summary,
            embedding: Some(embedding),
            morton_key: morton,
            parent: fields.parent,
            children: Vec::new(),
            meta: NodeMeta {
                created_at: Utc::now(),
                author: fields.author,
                depth: 0,
                source_url: fields.source_url,
                provenance_flags: Vec::new(),
            },
        };

        self.store.save_node(&node)?;
        if let Some(parent_id) = &node.parent {
            if let Some(mut parent) = self.store.get_node(parent_id)? {
                if !parent.children.contains(&node.id) {
                    parent.children.push(node.id.clone());
                    self.store.save_node(&parent)?;
                }
            }
        }
        self.cache.lock().unwrap().clear_cache();
        Ok(node)
    }

    pub fn get_node(&self, id: &str) -> Result<Option<Node>> {
        self.store.get_node(id)
    }

    pub fn delete_node(&self, id: &str) -> Result<()> {
        self.store.delete_node(id)?;
        self.cache.lock().unwrap().clear_cache();
        Ok(())
    }

    // ---- C3: search -------------------------------------------------------

    pub fn search(&self, query_text: &str, opts: &SearchOptions, cancel: &CancelSignal) -> Result<Vec<SearchHit>> {
        self.searcher().semantic_search(query_text, opts, cancel)
    }

    // ---- C4: federated cache / cross-project search -----------------------

    pub fn warmup_cache(&self, project_ids: &[&str]) -> Result<()> {
        self.cache.lock().unwrap().warmup_cache(project_ids)
    }

    pub fn search_across_projects(&self, query_text: &str, projects: &[&str], top_k: usize) -> Result<Vec<crate::federated_cache::CrossProjectHit>> {
        let query_embedding = self
            .embedder
            .embed(query_text)
            .map_err(|e| SircError::Degraded(format!("embedding failed: {e}")))?;
        let mut cache = self.cache.lock().unwrap();
        cache.warmup_cache(projects)?;
        cache.search_across_projects(&query_embedding, projects, top_k, self.config.search_prefilter_multiplier, None)
    }

    // ---- C5: links ----------------------------------------------------------

    pub fn create_link(&self, fields: CreateLinkFields) -> Result<crate::model::Link> {
        self.linker().create_link(fields)
    }

    pub fn upsert_link(&self, key: LinkKey<'_>, updates: LinkUpdate) -> Result<crate::model::Link> {
        self.linker().upsert_link(key, updates)
    }

    pub fn query_links(&self, filter: &LinkFilter, limit: usize, sort_by: LinkSort) -> Result<Vec<crate::model::Link>> {
        self.linker().query_links(filter, limit, sort_by)
    }

    pub fn remove_link(&self, link_id: &str) -> Result<()> {
        self.linker().remove_link(link_id)
    }

    pub fn would_create_cycle(&self, source: &str, target: &str, project_id: &str) -> Result<bool> {
        self.linker().would_create_cycle(source, target, project_id)
    }

    pub fn link_statistics(&self, project_id: &str) -> Result<LinkStatistics> {
        self.linker().link_statistics(project_id)
    }

    // ---- C6: link suggestions for a single node ------------------------------

    pub fn suggest_links(&self, node_id: &str, opts: &ContextSuggestOptions) -> Result<Vec<LinkSuggestion>> {
        self.contextualizer().suggest_links(node_id, opts)
    }

    // ---- C7: reasoning --------------------------------------------------------

    pub fn infer_relations(&self, opts: &InferOptions, cancel: &CancelSignal) -> Result<Vec<InferredRelation>> {
        let mut cache = self.cache.lock().unwrap();
        self.reasoner().infer_relations(opts, &mut cache, cancel)
    }

    pub fn find_chains(&self, source_id: &str, target_id: &str, max_depth: u32, max_chains: usize, project_id: Option<&str>) -> Result<Vec<(Vec<ChainHop>, f64)>> {
        self.reasoner().find_chains(source_id, target_id, max_depth, max_chains, project_id)
    }

    // ---- C8: topics -----------------------------------------------------------

    /// Builds a fresh [`crate::topic::TopicModeller`] from every persisted
    /// node, folds in `node_ids`, and returns the resulting topics.
    ///
    /// The topic model is process-local and rebuildable (spec.md §3), so it
    /// is not held as engine state; callers that want continuity across
    /// calls should keep their own `TopicModeller` and call
    /// [`crate::topic::TopicModeller::update_with_nodes`] directly.
    pub fn update_topics(&self, modeller: &mut crate::topic::TopicModeller, node_ids: &[String], cancel: &CancelSignal) -> Result<()> {
        modeller.update_with_nodes(node_ids, Utc::now(), cancel)
    }

    pub fn new_topic_modeller(&self) -> crate::topic::TopicModeller {
        crate::topic::TopicModeller::new(Arc::clone(&self.store), Arc::clone(&self.config))
    }

    // ---- C9: interactions and contextual recall -------------------------------

    pub fn record_interaction(&self, fields: RecordInteractionFields) -> Result<String> {
        self.memory().record_interaction(fields)
    }

    pub fn get_recent_interactions(&self, limit: usize, filter: &InteractionFilter) -> Result<Vec<DecodedInteraction>> {
        self.memory().get_recent_interactions(limit, filter)
    }

    pub fn suggest_from_context(&self, opts: &InteractionSuggestOptions) -> Result<Vec<ContextSuggestion>> {
        self.memory().suggest(opts)
    }

    pub fn purge_interactions(&self, older_than_ms: i64) -> Result<usize> {
        self.memory().purge(older_than_ms)
    }

    // ---- C10: CRDT bus ----------------------------------------------------------

    /// Applies a locally-originated change to `project_id`'s CRDT document,
    /// creating the document on first use, and returns the generated op.
    pub fn apply_local_change(&self, project_id: &str, actor_id: &str, kind: OperationKind) -> Operation {
        let mut docs = self.crdt_docs.lock().unwrap();
        let doc = docs.entry(project_id.to_string()).or_insert_with(|| CrdtDocument::new(project_id));
        doc.apply_local_change(actor_id, kind, Utc::now().timestamp_millis())
    }

    /// Merges a remotely-originated op into `project_id`'s document.
    /// Returns `false` if the op's `op_id` was already applied.
    pub fn merge_remote_change(&self, project_id: &str, op: Operation) -> bool {
        let mut docs = self.crdt_docs.lock().unwrap();
        let doc = docs.entry(project_id.to_string()).or_insert_with(|| CrdtDocument::new(project_id));
        doc.merge_remote_change(op)
    }

    pub fn crdt_snapshot(&self, project_id: &str) -> Option<DocumentSnapshot> {
        let docs = self.crdt_docs.lock().unwrap();
        docs.get(project_id).map(|d| d.snapshot())
    }

    pub fn crdt_operations_since(&self, project_id: &str, since: &VectorClock) -> Vec<Operation> {
        let docs = self.crdt_docs.lock().unwrap();
        docs.get(project_id).map(|d| d.get_operations_since(since)).unwrap_or_default()
    }

    /// The full operation log for `project_id`, as JSON values, suitable for
    /// `ProjectBundle::crdt_history` (spec.md §8 round-trip).
    pub fn crdt_history_json(&self, project_id: &str) -> Option<Vec<serde_json::Value>> {
        let docs = self.crdt_docs.lock().unwrap();
        let doc = docs.get(project_id)?;
        let ops = doc.get_operations_since(&VectorClock::new());
        Some(ops.iter().map(|op| serde_json::to_value(op).expect("Operation serializes")).collect())
    }

    // ---- Export -------------------------------------------------------------

    /// Live nodes, live links, and topics for `project_id`, ready to hand
    /// to [`crate::export::export_fmind`].
    pub fn project_bundle_parts(&self, project_id: &str, topics: &[Topic]) -> Result<(Vec<Node>, Vec<crate::model::Link>)> {
        let nodes: Vec<Node> = self.store.get_all_nodes(1_000_000)?.into_iter().filter(|n| n.project_id == project_id).collect();
        let filter = LinkFilter { project_id: Some(project_id.to_string()), active: Some(true), ..Default::default() };
        let links = self.store.query_links(&filter, 1_000_000, LinkSort::CreatedAtDesc)?;
        let _ = topics;
        Ok((nodes, links))
    }

    /// Restores one project bundle's nodes and links, and, if present,
    /// replays its CRDT history into this project's document so the
    /// operation count round-trips too (spec.md §8).
    pub fn import_bundle(&self, bundle: &crate::export::ProjectBundle) -> Result<usize> {
        for node in &bundle.nodes {
            self.store.save_node(node)?;
        }
        for link in &bundle.links {
            self.store.save_link(link)?;
        }
        self.cache.lock().unwrap().clear_cache();

        let mut replayed = 0;
        if let Some(history) = &bundle.crdt_history {
            let mut docs = self.crdt_docs.lock().unwrap();
            let doc = docs.entry(bundle.project_id.clone()).or_insert_with(|| CrdtDocument::new(&bundle.project_id));
            for raw in history {
                let op: Operation = serde_json::from_value(raw.clone())
                    .map_err(|e| SircError::Degraded(format!("invalid crdt op in bundle: {e}")))?;
                if doc.merge_remote_change(op) {
                    replayed += 1;
                }
            }
        }
        Ok(replayed)
    }
}
