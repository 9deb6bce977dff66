//! Test Data Factory
//!
//! Generates realistic, categorised node content for search and federation
//! journeys: batches of nodes grouped by topic, so semantic search has
//! something non-trivial to rank.

use sirc_core::prelude::*;

pub struct TestDataFactory;

/// IDs grouped by the category they were ingested under.
#[derive(Debug, Default)]
pub struct CategorisedCorpus {
    pub programming: Vec<String>,
    pub science: Vec<String>,
    pub cooking: Vec<String>,
}

impl TestDataFactory {
    /// Ingest three small topical clusters into `project_id`: programming,
    /// science, and cooking. Useful for search-ranking and topic-clustering
    /// journeys that need content with real semantic structure.
    pub fn seed_categorised_corpus(engine: &SircEngine, project_id: &str) -> CategorisedCorpus {
        let mut corpus = CategorisedCorpus::default();

        for text in [
            "Rust programming language uses ownership for memory safety",
            "Python is great for data science and machine learning",
            "JavaScript runs in web browsers and in Node.js servers",
        ] {
            corpus.programming.push(Self::ingest(engine, project_id, text));
        }

        for text in [
            "Mitochondria is the powerhouse of the cell",
            "DNA contains the genetic information of an organism",
            "Gravity is the force of attraction between two masses",
        ] {
            corpus.science.push(Self::ingest(engine, project_id, text));
        }

        for text in [
            "To make pasta, boil water and add a generous pinch of salt",
            "Chocolate cake requires cocoa powder, butter, and eggs",
        ] {
            corpus.cooking.push(Self::ingest(engine, project_id, text));
        }

        corpus
    }

    fn ingest(engine: &SircEngine, project_id: &str, text: &str) -> String {
        engine
            .ingest_node(IngestFields {
                project_id: project_id.to_string(),
                title: text.split_whitespace().take(3).collect::<Vec<_>>().join(" "),
                text: text.to_string(),
                summary: None,
                parent: None,
                author: None,
                source_url: None,
            })
            .expect("fixture ingest should succeed")
            .id
    }

    /// A short, deterministic embedding-bearing text for a given seed, used
    /// when the exact wording doesn't matter but distinctness does.
    pub fn lorem_text(seed: usize) -> String {
        const WORDS: [&str; 12] = [
            "memory", "learning", "knowledge", "algorithm", "data", "system",
            "process", "function", "method", "pattern", "structure", "design",
        ];
        (0..6).map(|i| WORDS[(seed + i * 3) % WORDS.len()]).collect::<Vec<_>>().join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::TestEngineManager;

    #[test]
    fn seed_categorised_corpus_creates_eight_nodes() {
        let mgr = TestEngineManager::new_temp();
        let corpus = TestDataFactory::seed_categorised_corpus(&mgr.engine, "p1");
        assert_eq!(corpus.programming.len(), 3);
        assert_eq!(corpus.science.len(), 3);
        assert_eq!(corpus.cooking.len(), 2);
    }

    #[test]
    fn lorem_text_is_deterministic() {
        assert_eq!(TestDataFactory::lorem_text(1), TestDataFactory::lorem_text(1));
        assert_ne!(TestDataFactory::lorem_text(1), TestDataFactory::lorem_text(2));
    }
}
