//! Test Engine Manager
//!
//! Provides isolated `SircEngine` instances for end-to-end tests: a fresh
//! SQLite file per test, automatically cleaned up, with seeding helpers for
//! common node/link shapes.

use std::path::PathBuf;
use std::sync::Arc;

use sirc_core::prelude::*;
use tempfile::TempDir;

/// Manager for test engines.
///
/// Creates an isolated `SircEngine` backed by a temp-dir SQLite database,
/// so tests never interfere with each other's persisted state.
pub struct TestEngineManager {
    pub engine: SircEngine,
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestEngineManager {
    /// A fresh engine over a temp-dir SQLite database and a deterministic
    /// mock embedder.
    pub fn new_temp() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db_path = temp_dir.path().join("test_sirc.sqlite");
        let store: Arc<dyn IndexStore> = Arc::new(SqliteIndexStore::open(&db_path).expect("failed to open test store"));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new(32));
        let engine = SircEngine::new(store, embedder, SircConfig::default());
        Self { engine, _temp_dir: temp_dir, db_path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Reopen a fresh `SircEngine` over the same database file, simulating
    /// a process restart that keeps the Index Store but drops every
    /// in-memory component (the Federated Cache, CRDT documents).
    pub fn reopen(self) -> Self {
        let store: Arc<dyn IndexStore> = Arc::new(SqliteIndexStore::open(&self.db_path).expect("failed to reopen test store"));
        let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::new(32));
        let engine = SircEngine::new(store, embedder, SircConfig::default());
        Self { engine, _temp_dir: self._temp_dir, db_path: self.db_path }
    }

    /// Ingest `count` plain nodes into `project_id`, returning their ids.
    pub fn seed_nodes(&self, project_id: &str, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                self.engine
                    .ingest_node(IngestFields {
                        project_id: project_id.to_string(),
                        title: format!("node {i}"),
                        text: format!("test content number {i} about topic {}", i % 3),
                        summary: None,
                        parent: None,
                        author: None,
                        source_url: None,
                    })
                    .expect("seed ingest should succeed")
                    .id
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_temp_engine_starts_empty() {
        let mgr = TestEngineManager::new_temp();
        assert!(mgr.engine.get_node("missing").unwrap().is_none());
        assert!(mgr.path().exists());
    }

    #[test]
    fn seed_nodes_creates_the_requested_count() {
        let mgr = TestEngineManager::new_temp();
        let ids = mgr.seed_nodes("p1", 5);
        assert_eq!(ids.len(), 5);
        for id in ids {
            assert!(mgr.engine.get_node(&id).unwrap().is_some());
        }
    }

    #[test]
    fn reopen_preserves_persisted_nodes() {
        let mgr = TestEngineManager::new_temp();
        let ids = mgr.seed_nodes("p1", 3);
        let mgr = mgr.reopen();
        for id in ids {
            assert!(mgr.engine.get_node(&id).unwrap().is_some());
        }
    }
}
