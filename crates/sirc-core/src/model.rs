//! Shared data model: nodes, links, interactions, topics, and CRDT operations.
//!
//! Entities reference each other only by id (see DESIGN.md "graph
//! ownership") — there are no owning references between nodes or links,
//! since the underlying graph is cyclic by nature.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reduction strategy used to project a full embedding down to `D` dims
/// before quantization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    /// Keep the first `D` values, dropping the rest.
    First,
    /// Average contiguous `ceil(Dfull/D)`-sized chunks (last chunk may be shorter).
    BlockAvg,
}

/// Per-project quantization parameters used to turn full embeddings into
/// Morton keys. Immutable for the lifetime of a project once computed,
/// unless a controlled re-index recomputes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantParams {
    /// Reduced dimensionality fed into the Morton interleave.
    pub d: usize,
    /// Bits per dimension.
    pub b: u32,
    /// Per-dim minimum observed (post-reduction) value.
    pub mins: Vec<f64>,
    /// Per-dim maximum observed (post-reduction) value.
    pub maxs: Vec<f64>,
    /// Reduction strategy applied before quantization.
    pub reduction: Reduction,
}

/// A knowledge node: a document chunk plus its embedding, Morton key, and
/// position in the optional parent/child outline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub project_id: String,
    pub title: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Full-length embedding, `None` for nodes awaiting embedding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Zero-padded hex Morton key, pure function of `(embedding, quant_params)`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub morton_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    pub meta: NodeMeta,
}

/// Free-form provenance and bookkeeping attached to a node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMeta {
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default)]
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default)]
    pub provenance_flags: Vec<String>,
}

impl Default for NodeMeta {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            author: None,
            depth: 0,
            source_url: None,
            provenance_flags: Vec::new(),
        }
    }
}

impl Node {
    /// True iff `children` has no duplicate entries, per the Node invariant.
    pub fn children_are_deduplicated(&self) -> bool {
        let set: BTreeSet<&String> = self.children.iter().collect();
        set.len() == self.children.len()
    }
}

/// The closed relation taxonomy (spec.md §6). Unknown identifiers supplied
/// by callers are warned and passed through as `RelationType::Other`.
///
/// Serializes/deserializes as a plain string (`as_str()` / `parse()`), since
/// the wire format has no way to distinguish a "known" tag from an "other"
/// passthrough — only the identifier itself matters.
#[derive(Debug, Clone)]
pub enum RelationType {
    Clarifies,
    Contradicts,
    Elaborates,
    Supports,
    Precedes,
    Follows,
    Generalizes,
    Specializes,
    /// An identifier outside the closed taxonomy. Passed through, not rejected.
    Other(String),
}

impl Serialize for RelationType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for RelationType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(RelationType::parse(&s))
    }
}

pub const RELATION_TAXONOMY: [RelationType; 8] = [
    RelationType::Clarifies,
    RelationType::Contradicts,
    RelationType::Elaborates,
    RelationType::Supports,
    RelationType::Precedes,
    RelationType::Follows,
    RelationType::Generalizes,
    RelationType::Specializes,
];

impl RelationType {
    pub fn as_str(&self) -> &str {
        match self {
            RelationType::Clarifies => "clarifies",
            RelationType::Contradicts => "contradicts",
            RelationType::Elaborates => "elaborates",
            RelationType::Supports => "supports",
            RelationType::Precedes => "precedes",
            RelationType::Follows => "follows",
            RelationType::Generalizes => "generalizes",
            RelationType::Specializes => "specializes",
            RelationType::Other(s) => s.as_str(),
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "clarifies" => RelationType::Clarifies,
            "contradicts" => RelationType::Contradicts,
            "elaborates" => RelationType::Elaborates,
            "supports" => RelationType::Supports,
            "precedes" => RelationType::Precedes,
            "follows" => RelationType::Follows,
            "generalizes" => RelationType::Generalizes,
            "specializes" => RelationType::Specializes,
            other => RelationType::Other(other.to_string()),
        }
    }

    /// Display label and short description, used by transcripts and exports.
    pub fn display(&self) -> (&str, &str) {
        match self {
            RelationType::Clarifies => ("Clarifies", "Makes the target's meaning more precise"),
            RelationType::Contradicts => ("Contradicts", "Asserts something incompatible with the target"),
            RelationType::Elaborates => ("Elaborates", "Expands on the target with more detail"),
            RelationType::Supports => ("Supports", "Provides evidence for the target"),
            RelationType::Precedes => ("Precedes", "Comes before the target in sequence"),
            RelationType::Follows => ("Follows", "Comes after the target in sequence"),
            RelationType::Generalizes => ("Generalizes", "States a broader version of the target"),
            RelationType::Specializes => ("Specializes", "States a narrower version of the target"),
            RelationType::Other(_) => ("Other", "Outside the closed relation taxonomy"),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, RelationType::Other(_))
    }
}

/// How a link's confidence/relation was produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ai_confidence: Option<f64>,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// A single append-only history entry on a link.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<serde_json::Value>,
}

/// A typed, directed, confidence-scored edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub link_id: String,
    pub project_id: String,
    pub source: String,
    pub target: String,
    pub relation_type: String,
    pub confidence: f64,
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub active: bool,
    pub provenance: Provenance,
    #[serde(default)]
    pub history: Vec<LinkHistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_weight() -> f64 {
    1.0
}

/// The closed action-type taxonomy (spec.md §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    View,
    Search,
    Expand,
    Rewrite,
    Edit,
    Export,
    Import,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::View => "view",
            ActionType::Search => "search",
            ActionType::Expand => "expand",
            ActionType::Rewrite => "rewrite",
            ActionType::Edit => "edit",
            ActionType::Export => "export",
            ActionType::Import => "import",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "view" => ActionType::View,
            "search" => ActionType::Search,
            "expand" => ActionType::Expand,
            "rewrite" => ActionType::Rewrite,
            "edit" => ActionType::Edit,
            "export" => ActionType::Export,
            "import" => ActionType::Import,
            _ => return None,
        })
    }
}

/// A single recorded user interaction (C9).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub action_type: String,
    pub at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// A TF-IDF keyword with its score, ordered descending by score within a topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keyword {
    pub word: String,
    pub score: f64,
}

/// A streaming topic cluster (C8).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub topic_id: String,
    pub centroid: Vec<f32>,
    pub keywords: Vec<Keyword>,
    pub node_ids: BTreeSet<String>,
    pub projects: BTreeSet<String>,
    pub weight: f64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

/// The closed set of CRDT operation shapes (spec.md §3, §9 — a tagged
/// variant, never open polymorphism).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OperationKind {
    CreateNode { data: serde_json::Value },
    UpdateNode { id: String, data: serde_json::Value },
    DeleteNode { id: String },
    CreateLink { data: serde_json::Value },
    DeleteLink { id: String },
    UpdateMetadata { updates: serde_json::Value },
}

/// An immutable CRDT operation, identified by `actor_id@sequence@timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub op_id: String,
    #[serde(flatten)]
    pub kind: OperationKind,
    pub actor_id: String,
    pub timestamp: i64,
    pub sequence: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
}

impl Operation {
    pub fn make_op_id(actor_id: &str, sequence: u64, timestamp: i64) -> String {
        format!("{actor_id}@{sequence}@{timestamp}")
    }
}
