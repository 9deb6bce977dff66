//! Topic Modeller (C8): streaming agglomerative clustering with TF-IDF
//! keyword labels and exponential decay pruning.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::cancel::CancelSignal;
use crate::config::SircConfig;
use crate::embeddings::cosine_similarity;
use crate::error::{Result, SircError};
use crate::model::{Keyword, Topic};
use crate::store::IndexStore;

pub struct TopicModeller {
    store: Arc<dyn IndexStore>,
    config: Arc<SircConfig>,
    topics: HashMap<String, Topic>,
    node_topic: HashMap<String, String>,
    next_topic_seq: u64,
}

impl TopicModeller {
    pub fn new(store: Arc<dyn IndexStore>, config: Arc<SircConfig>) -> Self {
        Self { store, config, topics: HashMap::new(), node_topic: HashMap::new(), next_topic_seq: 0 }
    }

    /// Processes `node_ids` one at a time: decay, best-match-or-create,
    /// then a TF-IDF keyword refresh and a decay-based pruning pass
    /// (spec.md §4.8). Checks `cancel` between nodes, per spec.md §5.
    pub fn update_with_nodes(&mut self, node_ids: &[String], now: DateTime<Utc>, cancel: &CancelSignal) -> Result<()> {
        let mut touched_topics: BTreeSet<String> = BTreeSet::new();

        for node_id in node_ids {
            if cancel.is_cancelled() {
                return Err(SircError::Cancelled);
            }
            self.decay_all(now);
            let Some(node) = self.store.get_node(node_id)? else { continue };
            let Some(embedding) = &node.embedding else { continue };

            let best = self
                .topics
                .values()
                .map(|t| (t.topic_id.clone(), cosine_similarity(embedding, &t.centroid)))
                .fold(None, |acc: Option<(String, f32)>, (id, score)| match acc {
                    Some((_, best_score)) if best_score >= score => acc,
                    _ => Some((id, score)),
                });

            let topic_id = match best {
                Some((id, score)) if score as f64 >= self.config.topic_similarity_threshold => id,
                Some((id, _)) if self.topics.len() >= self.config.topic_max_topics => id,
                _ if self.topics.len() >= self.config.topic_max_topics => {
                    // no topics at all but at cap is impossible; fall through defensively
                    self.create_topic(embedding.clone(), now)
                }
                _ => self.create_topic(embedding.clone(), now),
            };

            self.add_to_topic(&topic_id, node_id, &node.project_id, embedding, now);
            touched_topics.insert(topic_id);
        }

        for topic_id in &touched_topics {
            self.refresh_keywords(topic_id)?;
        }
        self.prune();
        Ok(())
    }

    fn create_topic(&mut self, centroid: Vec<f32>, now: DateTime<Utc>) -> String {
        self.next_topic_seq += 1;
        let topic_id = format!("topic_{}", self.next_topic_seq);
        self.topics.insert(
            topic_id.clone(),
            Topic {
                topic_id: topic_id.clone(),
                centroid,
                keywords: Vec::new(),
                node_ids: BTreeSet::new(),
                projects: BTreeSet::new(),
                weight: 1.0,
                created_at: now,
                last_updated: now,
            },
        );
        topic_id
    }

    fn add_to_topic(&mut self, topic_id: &str, node_id: &str, project_id: &str, embedding: &[f32], now: DateTime<Utc>) {
        if let Some(topic) = self.topics.get_mut(topic_id) {
            let n = topic.node_ids.len() as f32;
            if n > 0.0 {
                for (c, e) in topic.centroid.iter_mut().zip(embedding.iter()) {
                    *c = (*c * n + *e) / (n + 1.0);
                }
            } else {
                topic.centroid = embedding.to_vec();
            }
            topic.node_ids.insert(node_id.to_string());
            topic.projects.insert(project_id.to_string());
            topic.weight = (topic.weight + 0.1).min(1.0);
            topic.last_updated = now;
        }
        self.node_topic.insert(node_id.to_string(), topic_id.to_string());
    }

    /// `weight <- max(0.01, weight * 0.5^(delta_minutes / decay_window))`.
    fn decay_all(&mut self, now: DateTime<Utc>) {
        let window = self.config.topic_decay_window_minutes.max(1) as f64;
        for topic in self.topics.values_mut() {
            let delta_minutes = (now - topic.last_updated).num_seconds() as f64 / 60.0;
            topic.weight = (topic.weight * 0.5f64.powf(delta_minutes / window)).max(0.01);
        }
    }

    fn refresh_keywords(&mut self, topic_id: &str) -> Result<()> {
        let Some(topic) = self.topics.get(topic_id) else { return Ok(()) };
        let member_ids: Vec<String> = topic.node_ids.iter().cloned().collect();
        let mut docs = Vec::new();
        for id in &member_ids {
            if let Some(node) = self.store.get_node(id)? {
                docs.push(tokenize(&node.text));
            }
        }
        let keywords = tfidf_keywords(&docs, self.config.topic_max_keywords);
        if let Some(topic) = self.topics.get_mut(topic_id) {
            topic.keywords = keywords;
        }
        Ok(())
    }

    /// Prunes topics below the weight floor or member-count floor.
    fn prune(&mut self) {
        let to_remove: Vec<String> = self
            .topics
            .values()
            .filter(|t| t.weight < 0.05 || t.node_ids.len() < self.config.topic_min_nodes)
            .map(|t| t.topic_id.clone())
            .collect();
        for topic_id in to_remove {
            if let Some(topic) = self.topics.remove(&topic_id) {
                for node_id in topic.node_ids {
                    self.node_topic.remove(&node_id);
                }
            }
        }
    }

    pub fn get_topics(&self, project_ids: Option<&[String]>, since: Option<DateTime<Utc>>) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .topics
            .values()
            .filter(|t| project_ids.map_or(true, |ps| ps.iter().any(|p| t.projects.contains(p))))
            .filter(|t| since.map_or(true, |cutoff| t.last_updated >= cutoff))
            .cloned()
            .collect();
        topics.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
        topics
    }

    pub fn get_topic_for_node(&self, node_id: &str) -> Option<&Topic> {
        let topic_id = self.node_topic.get(node_id)?;
        self.topics.get(topic_id)
    }

    pub fn get_nodes_in_topic(&self, topic_id: &str) -> Vec<String> {
        self.topics.get(topic_id).map(|t| t.node_ids.iter().cloned().collect()).unwrap_or_default()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 3)
        .collect()
}

/// `tf * log(n_docs / df)`, top `max_keywords` by score.
fn tfidf_keywords(docs: &[Vec<String>], max_keywords: usize) -> Vec<Keyword> {
    let n_docs = docs.len().max(1) as f64;
    let mut doc_freq: HashMap<&str, usize> = HashMap::new();
    for doc in docs {
        let unique: BTreeSet<&str> = doc.iter().map(String::as_str).collect();
        for word in unique {
            *doc_freq.entry(word).or_insert(0) += 1;
        }
    }

    let mut term_freq: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        for word in doc {
            *term_freq.entry(word.clone()).or_insert(0) += 1;
        }
    }

    let mut scored: Vec<Keyword> = term_freq
        .into_iter()
        .map(|(word, tf)| {
            let df = *doc_freq.get(word.as_str()).unwrap_or(&1) as f64;
            let score = tf as f64 * (n_docs / df).ln().max(0.0);
            Keyword { word, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(max_keywords);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeMeta};
    use crate::store::InMemoryIndexStore;

    fn node(id: &str, embedding: Vec<f32>, text: &str) -> Node {
        Node {
            id: id.to_string(),
            project_id: "p1".to_string(),
            title: "t".to_string(),
            text: text.to_string(),
            summary: None,
            embedding: Some(embedding),
            morton_key: None,
            parent: None,
            children: vec![],
            meta: NodeMeta::default(),
        }
    }

    #[test]
    fn agglomeration_forms_two_clusters_and_prunes_the_singleton() {
        let store: std::sync::Arc<dyn IndexStore> = std::sync::Arc::new(InMemoryIndexStore::new());
        store.save_node(&node("a1", vec![1.0, 0.0, 0.0], "alpha beta gamma")).unwrap();
        store.save_node(&node("a2", vec![0.99, 0.01, 0.0], "alpha beta delta")).unwrap();
        store.save_node(&node("b1", vec![0.0, 1.0, 0.0], "omega sigma theta")).unwrap();
        store.save_node(&node("b2", vec![0.01, 0.99, 0.0], "omega sigma kappa")).unwrap();
        store.save_node(&node("c1", vec![0.0, 0.0, 1.0], "lonely isolated point")).unwrap();

        let config = std::sync::Arc::new(SircConfig::default());
        let mut modeller = TopicModeller::new(store, config);
        let now = Utc::now();
        let ids: Vec<String> = ["a1", "a2", "b1", "b2", "c1"].iter().map(|s| s.to_string()).collect();
        modeller.update_with_nodes(&ids, now, &CancelSignal::new()).unwrap();

        let topics = modeller.get_topics(None, None);
        assert_eq!(topics.len(), 2);
        for topic in &topics {
            assert_eq!(topic.node_ids.len(), 2);
        }
    }

    #[test]
    fn get_topics_filters_by_project_overlap() {
        let store: std::sync::Arc<dyn IndexStore> = std::sync::Arc::new(InMemoryIndexStore::new());
        let mut a1 = node("a1", vec![1.0, 0.0], "alpha beta gamma");
        a1.project_id = "p1".to_string();
        let mut a2 = node("a2", vec![0.99, 0.01], "alpha beta delta");
        a2.project_id = "p2".to_string();
        store.save_node(&a1).unwrap();
        store.save_node(&a2).unwrap();

        let mut config = SircConfig::default();
        config.topic_min_nodes = 1;
        let mut modeller = TopicModeller::new(store, std::sync::Arc::new(config));
        let now = Utc::now();
        modeller.update_with_nodes(&["a1".to_string(), "a2".to_string()], now, &CancelSignal::new()).unwrap();

        let all = modeller.get_topics(None, None);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].projects, BTreeSet::from(["p1".to_string(), "p2".to_string()]));

        let p1_only = modeller.get_topics(Some(&["p1".to_string()]), None);
        assert_eq!(p1_only.len(), 1);

        let p3_only = modeller.get_topics(Some(&["p3".to_string()]), None);
        assert!(p3_only.is_empty());
    }

    #[test]
    fn centroid_is_arithmetic_mean_of_members() {
        let store: std::sync::Arc<dyn IndexStore> = std::sync::Arc::new(InMemoryIndexStore::new());
        store.save_node(&node("a1", vec![1.0, 0.0], "word word word")).unwrap();
        store.save_node(&node("a2", vec![0.0, 1.0], "word word word")).unwrap();
        let mut config = SircConfig::default();
        config.topic_similarity_threshold = -1.0; // force both into one topic
        config.topic_min_nodes = 1;
        let mut modeller = TopicModeller::new(store, std::sync::Arc::new(config));
        let now = Utc::now();
        modeller.update_with_nodes(&["a1".to_string(), "a2".to_string()], now, &CancelSignal::new()).unwrap();
        let topics = modeller.get_topics(None, None);
        assert_eq!(topics.len(), 1);
        assert!((topics[0].centroid[0] - 0.5).abs() < 1e-6);
        assert!((topics[0].centroid[1] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn update_with_nodes_returns_cancelled_once_the_signal_fires() {
        let store: std::sync::Arc<dyn IndexStore> = std::sync::Arc::new(InMemoryIndexStore::new());
        store.save_node(&node("a1", vec![1.0, 0.0], "word word word")).unwrap();
        let config = SircConfig::default();
        let mut modeller = TopicModeller::new(store, std::sync::Arc::new(config));

        let cancel = CancelSignal::new();
        cancel.cancel();
        let result = modeller.update_with_nodes(&["a1".to_string()], Utc::now(), &cancel);
        assert!(matches!(result, Err(SircError::Cancelled)));
        assert!(modeller.get_topics(None, None).is_empty());
    }
}
