//! In-memory [`IndexStore`] used by tests and by the Federated Cache's
//! linear-scan degrade path when no durable backend is configured.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::model::{Link, Node, QuantParams};

use super::{range_bounds, parse_morton_hex, InteractionFilter, InteractionRow, IndexStore, LinkFilter, LinkSort, Radius};

#[derive(Default)]
struct Inner {
    nodes: BTreeMap<String, Node>,
    /// `morton_hex -> set of node ids`, mirrors the SQLite `morton_index` table.
    morton_index: BTreeMap<String, BTreeSet<String>>,
    links: BTreeMap<String, Link>,
    quant_params: BTreeMap<String, QuantParams>,
    interactions: Vec<InteractionRow>,
}

pub struct InMemoryIndexStore {
    inner: RwLock<Inner>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()) }
    }
}

impl Default for InMemoryIndexStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IndexStore for InMemoryIndexStore {
    fn save_node(&self, node: &Node) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(old) = inner.nodes.get(&node.id) {
            if let Some(old_key) = &old.morton_key {
                if let Some(set) = inner.morton_index.get_mut(old_key) {
                    set.remove(&node.id);
                }
            }
        }
        if let Some(key) = &node.morton_key {
            inner.morton_index.entry(key.clone()).or_default().insert(node.id.clone());
        }
        inner.nodes.insert(node.id.clone(), node.clone());
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.inner.read().unwrap().nodes.get(id).cloned())
    }

    fn delete_node(&self, id: &str) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(old) = inner.nodes.remove(id) {
            if let Some(old_key) = &old.morton_key {
                if let Some(set) = inner.morton_index.get_mut(old_key) {
                    set.remove(id);
                }
            }
        }
        Ok(())
    }

    fn get_all_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        Ok(self.inner.read().unwrap().nodes.values().take(limit).cloned().collect())
    }

    fn range_scan(&self, center_hex: &str, radius: Radius, limit: usize) -> Result<Vec<String>> {
        let inner = self.inner.read().unwrap();
        let mut out: BTreeSet<String> = BTreeSet::new();
        match radius {
            Radius::Exact => {
                if let Some(set) = inner.morton_index.get(center_hex) {
                    out.extend(set.iter().cloned());
                }
            }
            Radius::Range(r) => {
                let Some((lo, hi)) = range_bounds(center_hex, r) else {
                    return Ok(Vec::new());
                };
                let Some(center) = parse_morton_hex(center_hex) else {
                    return Ok(Vec::new());
                };
                let _ = center; // bounds already computed; iterate lexicographic range
                for (key, ids) in inner.morton_index.range(lo..=hi) {
                    let _ = key;
                    out.extend(ids.iter().cloned());
                }
            }
        }
        Ok(out.into_iter().take(limit).collect())
    }

    fn save_link(&self, link: &Link) -> Result<()> {
        self.inner.write().unwrap().links.insert(link.link_id.clone(), link.clone());
        Ok(())
    }

    fn get_link(&self, link_id: &str) -> Result<Option<Link>> {
        Ok(self.inner.read().unwrap().links.get(link_id).cloned())
    }

    fn query_links(&self, filter: &LinkFilter, limit: usize, sort_by: LinkSort) -> Result<Vec<Link>> {
        let inner = self.inner.read().unwrap();
        let mut matches: Vec<Link> = inner
            .links
            .values()
            .filter(|l| filter.project_id.as_deref().map_or(true, |p| p == l.project_id))
            .filter(|l| filter.source.as_deref().map_or(true, |s| s == l.source))
            .filter(|l| filter.target.as_deref().map_or(true, |t| t == l.target))
            .filter(|l| filter.relation_type.as_deref().map_or(true, |r| r == l.relation_type))
            .filter(|l| filter.active.map_or(true, |a| a == l.active))
            .cloned()
            .collect();

        match sort_by {
            LinkSort::ConfidenceDesc => {
                matches.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
            }
            LinkSort::CreatedAtDesc => {
                matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            }
        }
        matches.truncate(limit);
        Ok(matches)
    }

    fn delete_link(&self, link_id: &str) -> Result<()> {
        self.inner.write().unwrap().links.remove(link_id);
        Ok(())
    }

    fn save_quant_params(&self, project_id: &str, params: &QuantParams) -> Result<()> {
        self.inner.write().unwrap().quant_params.insert(project_id.to_string(), params.clone());
        Ok(())
    }

    fn get_quant_params(&self, project_id: &str) -> Result<Option<QuantParams>> {
        Ok(self.inner.read().unwrap().quant_params.get(project_id).cloned())
    }

    fn save_interaction(&self, row: &InteractionRow) -> Result<()> {
        self.inner.write().unwrap().interactions.push(row.clone());
        Ok(())
    }

    fn get_recent_interactions(&self, limit: usize, filter: &InteractionFilter) -> Result<Vec<InteractionRow>> {
        let inner = self.inner.read().unwrap();
        let mut matches: Vec<InteractionRow> = inner
            .interactions
            .iter()
            .filter(|i| filter.action_type.as_deref().map_or(true, |a| a == i.action_type))
            .filter(|i| filter.node_id.as_deref().map_or(true, |n| Some(n) == i.node_id.as_deref()))
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.at.cmp(&a.at));
        matches.truncate(limit);
        Ok(matches)
    }

    fn purge_interactions(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut inner = self.inner.write().unwrap();
        let before = inner.interactions.len();
        inner.interactions.retain(|i| i.at >= cutoff);
        Ok(before - inner.interactions.len())
    }
}
