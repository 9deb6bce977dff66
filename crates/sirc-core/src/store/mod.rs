//! Index Store (C2): persistence over `nodes`, the `morton_index` multiset,
//! `links`, and `interactions`.
//!
//! The store is the sole source of truth (spec.md §5); the Federated Cache
//! is a transient, derived view that may be rebuilt from it at any time.
//! Two implementations share one trait: [`SqliteIndexStore`] (the default,
//! durable backend) and [`InMemoryIndexStore`] (used by tests and by the
//! cache's linear-scan degrade path).

mod migrations;
mod sqlite;
mod memory;

pub use sqlite::SqliteIndexStore;
pub use memory::InMemoryIndexStore;

use crate::error::Result;
use crate::model::{Link, Node, QuantParams};

/// How a range scan's radius should be interpreted. `Exact` behaves as an
/// exact-key lookup; `Range` widens `[center-r, center+r]` as unsigned
/// 128-bit integers, saturating at the bounds (spec.md §4.2). Morton keys
/// wider than 128 bits are not supported — `D*B <= 128`.
#[derive(Debug, Clone, Copy)]
pub enum Radius {
    Exact,
    Range(u128),
}

/// Filters accepted by [`IndexStore::query_links`].
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    pub project_id: Option<String>,
    pub source: Option<String>,
    pub target: Option<String>,
    pub relation_type: Option<String>,
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSort {
    ConfidenceDesc,
    CreatedAtDesc,
}

/// A single row recorded by the Memory & Context Manager (C9).
#[derive(Debug, Clone)]
pub struct InteractionRow {
    pub id: String,
    pub node_id: Option<String>,
    pub action_type: String,
    pub at: chrono::DateTime<chrono::Utc>,
    /// Base64-encoded little-endian IEEE-754 bytes, per spec.md §6.
    pub embedding_b64: Option<String>,
    pub meta: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct InteractionFilter {
    pub action_type: Option<String>,
    pub node_id: Option<String>,
}

/// The Index Store contract (spec.md §4.2). A missing record is a
/// successful read returning `Ok(None)`, never an error.
pub trait IndexStore: Send + Sync {
    fn save_node(&self, node: &Node) -> Result<()>;
    fn get_node(&self, id: &str) -> Result<Option<Node>>;
    /// Deletes the node and scrubs every `morton_index` row referencing it.
    fn delete_node(&self, id: &str) -> Result<()>;
    fn get_all_nodes(&self, limit: usize) -> Result<Vec<Node>>;

    /// Returns node ids near `center_hex` per `radius`, deduplicated,
    /// capped at `limit`.
    fn range_scan(&self, center_hex: &str, radius: Radius, limit: usize) -> Result<Vec<String>>;

    fn save_link(&self, link: &Link) -> Result<()>;
    fn get_link(&self, link_id: &str) -> Result<Option<Link>>;
    fn query_links(&self, filter: &LinkFilter, limit: usize, sort_by: LinkSort) -> Result<Vec<Link>>;
    fn delete_link(&self, link_id: &str) -> Result<()>;

    fn save_quant_params(&self, project_id: &str, params: &QuantParams) -> Result<()>;
    fn get_quant_params(&self, project_id: &str) -> Result<Option<QuantParams>>;

    fn save_interaction(&self, row: &InteractionRow) -> Result<()>;
    fn get_recent_interactions(&self, limit: usize, filter: &InteractionFilter) -> Result<Vec<InteractionRow>>;
    /// Deletes interactions with `at < cutoff`, returns the count removed.
    fn purge_interactions(&self, cutoff: chrono::DateTime<chrono::Utc>) -> Result<usize>;
}

/// Parse a zero-padded hex Morton key into a `u128`. Keys wider than 128
/// bits are rejected with `None` rather than silently truncated.
pub fn parse_morton_hex(hex: &str) -> Option<u128> {
    if hex.len() > 32 {
        return None;
    }
    u128::from_str_radix(hex, 16).ok()
}

/// Render a `u128` as lowercase hex, zero-padded to `width` characters.
pub fn render_morton_hex(value: u128, width: usize) -> String {
    format!("{:0width$x}", value, width = width)
}

/// Compute the inclusive `[lo, hi]` hex bounds for a range scan, saturating
/// at `0`/`u128::MAX` and matching the canonical width of `center_hex`.
pub fn range_bounds(center_hex: &str, radius: u128) -> Option<(String, String)> {
    let width = center_hex.len();
    let center = parse_morton_hex(center_hex)?;
    let lo = center.saturating_sub(radius);
    let hi = center.saturating_add(radius);
    Some((render_morton_hex(lo, width), render_morton_hex(hi, width)))
}
