//! # SIRC — Semantic Index and Reasoning Core
//!
//! A privacy-preserving, client-local knowledge engine: embeddings go in,
//! a searchable, linkable, topic-clustered knowledge graph comes out,
//! entirely on the caller's machine.
//!
//! Ten components compose into one engine (spec.md §3):
//!
//! - **C1** [`quantizer`] — dimensionality reduction + Morton/Z-order codec
//! - **C2** [`store`] — the durable Index Store (SQLite and in-memory backends)
//! - **C3** [`searcher`] — single-project Morton-prefilter + cosine re-rank
//! - **C4** [`federated_cache`] — cross-project in-memory mirror with LRU eviction
//! - **C5** [`linker`] — typed, confidence-scored edges between nodes
//! - **C6** [`contextualizer`] — link suggestions for a single node
//! - **C7** [`reasoner`] — bounded cross-project inference and chain discovery
//! - **C8** [`topic`] — streaming agglomerative topic clustering
//! - **C9** [`interactions`] — interaction log + decay-weighted recall
//! - **C10** [`crdt`] — operation-based CRDT bus for concurrent edits
//!
//! [`engine::SircEngine`] wires all ten together behind one entry point.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use sirc_core::prelude::*;
//!
//! let store: Arc<dyn IndexStore> = Arc::new(InMemoryIndexStore::new());
//! let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::default());
//! let engine = SircEngine::new(store, embedder, SircConfig::default());
//!
//! let node = engine.ingest_node(IngestFields {
//!     project_id: "demo".to_string(),
//!     title: "First note".to_string(),
//!     text: "The mitochondria is the powerhouse of the cell".to_string(),
//!     summary: None,
//!     parent: None,
//!     author: None,
//!     source_url: None,
//! })?;
//!
//! let hits = engine.search("cellular energy", &SearchOptions::default(), &CancelSignal::new())?;
//! # Ok::<(), sirc_core::SircError>(())
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod cancel;
pub mod config;
pub mod contextualizer;
pub mod crdt;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod export;
pub mod federated_cache;
pub mod interactions;
pub mod lexical;
pub mod linker;
pub mod model;
pub mod quantizer;
pub mod reasoner;
pub mod searcher;
pub mod store;
pub mod topic;

pub use config::{AiMode, ConfidenceWeights, SircConfig};
pub use engine::{IngestFields, SircEngine};
pub use error::{Result, SircError};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage.
pub mod prelude {
    pub use crate::cancel::CancelSignal;
    pub use crate::config::{AiMode, ConfidenceWeights, SircConfig};
    pub use crate::contextualizer::{Contextualizer, LinkSuggestion, SuggestOptions as LinkSuggestOptions};
    pub use crate::crdt::{CrdtDocument, DocumentSnapshot, VectorClock};
    pub use crate::embeddings::{cosine_similarity, EmbeddingProvider, MockEmbeddingProvider};
    pub use crate::engine::{IngestFields, SircEngine};
    pub use crate::error::{Result, SircError};
    pub use crate::federated_cache::{CrossProjectHit, FederatedCache, ProjectWeight};
    pub use crate::interactions::{ContextSuggestion, MemoryManager, RecordInteractionFields, SuggestOptions as InteractionSuggestOptions};
    pub use crate::linker::{CreateLinkFields, LinkKey, LinkUpdate, Linker};
    pub use crate::model::{ActionType, Link, Node, NodeMeta, Operation, OperationKind, RelationType, Topic};
    pub use crate::reasoner::{InferOptions, InferredRelation, Reasoner};
    pub use crate::searcher::{SearchHit, SearchOptions, Searcher};
    pub use crate::store::{IndexStore, InMemoryIndexStore, SqliteIndexStore};
    pub use crate::topic::TopicModeller;
}
