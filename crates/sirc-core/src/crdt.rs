//! CRDT Bus (C10): per-project operation log, vector clock, and
//! last-write-wins conflict resolution over a tagged operation set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Operation, OperationKind};

/// Map from actor to last-applied sequence number.
pub type VectorClock = BTreeMap<String, u64>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct NodeEntity {
    data: serde_json::Value,
    created_by: String,
    created_at: i64,
    updated_at: i64,
    updated_by: Option<String>,
    deleted: bool,
    deleted_at: Option<i64>,
    deleted_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct LinkEntity {
    data: serde_json::Value,
    created_by: String,
    created_at: i64,
    updated_at: i64,
    deleted: bool,
    deleted_at: Option<i64>,
    deleted_by: Option<String>,
}

/// Materialised, replay-derived state for one project's CRDT document.
#[derive(Debug, Clone, Default)]
pub struct DocumentState {
    nodes: BTreeMap<String, NodeEntity>,
    links: BTreeMap<String, LinkEntity>,
    metadata: serde_json::Map<String, serde_json::Value>,
    updated_at: i64,
}

/// A snapshot suitable for export: only live entities, plus bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentSnapshot {
    pub nodes: BTreeMap<String, serde_json::Value>,
    pub links: BTreeMap<String, serde_json::Value>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub operation_count: usize,
    pub vector_clock: VectorClock,
    pub updated_at: i64,
}

/// One project's CRDT document: log, clock, and materialised state.
pub struct CrdtDocument {
    doc_id: String,
    log: Vec<Operation>,
    vector_clock: VectorClock,
    next_sequence: BTreeMap<String, u64>,
    state: DocumentState,
}

impl CrdtDocument {
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            log: Vec::new(),
            vector_clock: VectorClock::new(),
            next_sequence: BTreeMap::new(),
            state: DocumentState::default(),
        }
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Creates an op with the actor's next sequence, applies it, and logs it.
    pub fn apply_local_change(&mut self, actor_id: &str, kind: OperationKind, timestamp: i64) -> Operation {
        let sequence = *self.next_sequence.get(actor_id).unwrap_or(&0) + 1;
        self.next_sequence.insert(actor_id.to_string(), sequence);

        let op = Operation {
            op_id: Operation::make_op_id(actor_id, sequence, timestamp),
            kind,
            actor_id: actor_id.to_string(),
            timestamp,
            sequence,
            dependencies: Vec::new(),
        };

        self.log.push(op.clone());
        self.vector_clock.insert(actor_id.to_string(), sequence);
        self.apply_to_state(&op);
        op
    }

    /// Idempotent: returns `false` (a no-op) if `op.op_id` was already seen.
    pub fn merge_remote_change(&mut self, op: Operation) -> bool {
        if self.log.iter().any(|existing| existing.op_id == op.op_id) {
            return false;
        }

        let known_sequence = *self.vector_clock.get(&op.actor_id).unwrap_or(&0);
        if op.sequence <= known_sequence {
            tracing::warn!(actor_id = %op.actor_id, sequence = op.sequence, known_sequence, "clock skew on merge; applying anyway");
        }

        self.log.push(op.clone());
        self.vector_clock.insert(op.actor_id.clone(), known_sequence.max(op.sequence));
        self.apply_to_state(&op);
        true
    }

    fn apply_to_state(&mut self, op: &Operation) {
        match &op.kind {
            OperationKind::CreateNode { data } => {
                self.state.nodes.entry(extract_id(data)).or_insert_with(|| NodeEntity {
                    data: data.clone(),
                    created_by: op.actor_id.clone(),
                    created_at: op.timestamp,
                    updated_at: op.timestamp,
                    updated_by: None,
                    deleted: false,
                    deleted_at: None,
                    deleted_by: None,
                });
            }
            OperationKind::UpdateNode { id, data } => {
                if let Some(entity) = self.state.nodes.get_mut(id) {
                    let incoming = (op.timestamp, op.actor_id.as_str());
                    let current = (entity.updated_at, entity.updated_by.as_deref().unwrap_or(""));
                    if !entity.deleted && incoming > current {
                        merge_json(&mut entity.data, data);
                        entity.updated_at = op.timestamp;
                        entity.updated_by = Some(op.actor_id.clone());
                    }
                }
            }
            OperationKind::DeleteNode { id } => {
                if let Some(entity) = self.state.nodes.get_mut(id) {
                    entity.deleted = true;
                    entity.deleted_at = Some(op.timestamp);
                    entity.deleted_by = Some(op.actor_id.clone());
                }
            }
            OperationKind::CreateLink { data } => {
                self.state.links.entry(extract_id(data)).or_insert_with(|| LinkEntity {
                    data: data.clone(),
                    created_by: op.actor_id.clone(),
                    created_at: op.timestamp,
                    updated_at: op.timestamp,
                    deleted: false,
                    deleted_at: None,
                    deleted_by: None,
                });
            }
            OperationKind::DeleteLink { id } => {
                if let Some(entity) = self.state.links.get_mut(id) {
                    entity.deleted = true;
                    entity.deleted_at = Some(op.timestamp);
                    entity.deleted_by = Some(op.actor_id.clone());
                }
            }
            OperationKind::UpdateMetadata { updates } => {
                if let Some(obj) = updates.as_object() {
                    for (k, v) in obj {
                        self.state.metadata.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        self.state.updated_at = self.state.updated_at.max(op.timestamp);
    }

    /// Live nodes/links, metadata, and bookkeeping (spec.md §4.10).
    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            nodes: self.state.nodes.iter().filter(|(_, e)| !e.deleted).map(|(id, e)| (id.clone(), e.data.clone())).collect(),
            links: self.state.links.iter().filter(|(_, e)| !e.deleted).map(|(id, e)| (id.clone(), e.data.clone())).collect(),
            metadata: self.state.metadata.clone(),
            operation_count: self.log.len(),
            vector_clock: self.vector_clock.clone(),
            updated_at: self.state.updated_at,
        }
    }

    /// Every op whose sequence exceeds the value for its actor in `since`
    /// (missing actors treated as 0).
    pub fn get_operations_since(&self, since: &VectorClock) -> Vec<Operation> {
        self.log
            .iter()
            .filter(|op| op.sequence > *since.get(&op.actor_id).unwrap_or(&0))
            .cloned()
            .collect()
    }

    pub fn get_operation_history(&self, actor_id: Option<&str>, kind_filter: Option<&str>, limit: usize) -> Vec<Operation> {
        self.log
            .iter()
            .filter(|op| actor_id.map_or(true, |a| op.actor_id == a))
            .filter(|op| kind_filter.map_or(true, |k| operation_kind_name(&op.kind) == k))
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn vector_clock(&self) -> &VectorClock {
        &self.vector_clock
    }
}

fn extract_id(data: &serde_json::Value) -> String {
    data.get("id").and_then(|v| v.as_str()).map(str::to_string).unwrap_or_default()
}

/// Shallow object merge: `patch`'s keys overwrite `base`'s.
fn merge_json(base: &mut serde_json::Value, patch: &serde_json::Value) {
    let (Some(base_obj), Some(patch_obj)) = (base.as_object_mut(), patch.as_object()) else {
        *base = patch.clone();
        return;
    };
    for (k, v) in patch_obj {
        base_obj.insert(k.clone(), v.clone());
    }
}

fn operation_kind_name(kind: &OperationKind) -> &'static str {
    match kind {
        OperationKind::CreateNode { .. } => "createNode",
        OperationKind::UpdateNode { .. } => "updateNode",
        OperationKind::DeleteNode { .. } => "deleteNode",
        OperationKind::CreateLink { .. } => "createLink",
        OperationKind::DeleteLink { .. } => "deleteLink",
        OperationKind::UpdateMetadata { .. } => "updateMetadata",
    }
}
