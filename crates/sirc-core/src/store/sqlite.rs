//! SQLite-backed [`IndexStore`].

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, SircError};
use crate::model::{
    Link, LinkHistoryEntry, Node, NodeMeta, Provenance, QuantParams, Reduction,
};

use super::{
    migrations::MIGRATIONS, range_bounds, InteractionFilter, InteractionRow, IndexStore,
    LinkFilter, LinkSort, Radius,
};

pub struct SqliteIndexStore {
    conn: Mutex<Connection>,
}

impl SqliteIndexStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        for migration in MIGRATIONS {
            conn.execute_batch(migration.up)?;
        }
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn reduction_to_str(r: Reduction) -> &'static str {
    match r {
        Reduction::First => "first",
        Reduction::BlockAvg => "block_avg",
    }
}

fn reduction_from_str(s: &str) -> Reduction {
    match s {
        "block_avg" => Reduction::BlockAvg,
        _ => Reduction::First,
    }
}

fn row_to_node(row: &rusqlite::Row) -> rusqlite::Result<Node> {
    let embedding_json: Option<String> = row.get("embedding")?;
    let embedding = embedding_json.and_then(|s| serde_json::from_str::<Vec<f32>>(&s).ok());
    let children_json: String = row.get("children")?;
    let children: Vec<String> = serde_json::from_str(&children_json).unwrap_or_default();
    let meta_json: String = row.get("meta")?;
    let meta: NodeMeta = serde_json::from_str(&meta_json).unwrap_or_default();

    Ok(Node {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        title: row.get("title")?,
        text: row.get("text")?,
        summary: row.get("summary")?,
        embedding,
        morton_key: row.get("morton_key")?,
        parent: row.get("parent")?,
        children,
        meta,
    })
}

fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<Link> {
    let provenance_json: String = row.get("provenance")?;
    let provenance: Provenance =
        serde_json::from_str(&provenance_json).unwrap_or_else(|_| Provenance {
            method: "unknown".to_string(),
            ai_confidence: None,
            timestamp: Utc::now(),
            note: None,
        });
    let history_json: String = row.get("history")?;
    let history: Vec<LinkHistoryEntry> = serde_json::from_str(&history_json).unwrap_or_default();
    let active_int: i64 = row.get("active")?;

    Ok(Link {
        link_id: row.get("link_id")?,
        project_id: row.get("project_id")?,
        source: row.get("source")?,
        target: row.get("target")?,
        relation_type: row.get("relation_type")?,
        confidence: row.get("confidence")?,
        weight: row.get("weight")?,
        active: active_int != 0,
        provenance,
        history,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

impl IndexStore for SqliteIndexStore {
    fn save_node(&self, node: &Node) -> Result<()> {
        let conn = self.lock();
        let embedding_json = node
            .embedding
            .as_ref()
            .map(|e| serde_json::to_string(e).unwrap_or_default());
        let children_json = serde_json::to_string(&node.children).unwrap_or_default();
        let meta_json = serde_json::to_string(&node.meta).unwrap_or_default();

        conn.execute(
            "INSERT INTO nodes (id, project_id, title, text, summary, embedding, morton_key, parent, children, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                project_id = excluded.project_id,
                title = excluded.title,
                text = excluded.text,
                summary = excluded.summary,
                embedding = excluded.embedding,
                morton_key = excluded.morton_key,
                parent = excluded.parent,
                children = excluded.children,
                meta = excluded.meta",
            params![
                node.id,
                node.project_id,
                node.title,
                node.text,
                node.summary,
                embedding_json,
                node.morton_key,
                node.parent,
                children_json,
                meta_json,
            ],
        )?;

        // Multiset semantics: clear this node's prior morton rows, then
        // re-insert the current key (a node has exactly one live key).
        conn.execute("DELETE FROM morton_index WHERE node_id = ?1", params![node.id])?;
        if let Some(key) = &node.morton_key {
            conn.execute(
                "INSERT OR IGNORE INTO morton_index (morton_hex, node_id) VALUES (?1, ?2)",
                params![key, node.id],
            )?;
        }
        Ok(())
    }

    fn get_node(&self, id: &str) -> Result<Option<Node>> {
        let conn = self.lock();
        conn.query_row("SELECT * FROM nodes WHERE id = ?1", params![id], row_to_node)
            .optional()
            .map_err(SircError::from)
    }

    fn delete_node(&self, id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM nodes WHERE id = ?1", params![id])?;
        conn.execute("DELETE FROM morton_index WHERE node_id = ?1", params![id])?;
        Ok(())
    }

    fn get_all_nodes(&self, limit: usize) -> Result<Vec<Node>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT * FROM nodes LIMIT ?1")?;
        let rows = stmt.query_map(params![limit as i64], row_to_node)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SircError::from)
    }

    fn range_scan(&self, center_hex: &str, radius: Radius, limit: usize) -> Result<Vec<String>> {
        let conn = self.lock();
        let ids: Vec<String> = match radius {
            Radius::Exact => {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT node_id FROM morton_index WHERE morton_hex = ?1 LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![center_hex, limit as i64], |r| r.get(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
            Radius::Range(r) => {
                let (lo, hi) = range_bounds(center_hex, r)
                    .ok_or_else(|| SircError::InvalidInput {
                        field: "center_hex".to_string(),
                        reason: "not a valid hex Morton key".to_string(),
                    })?;
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT node_id FROM morton_index
                     WHERE morton_hex BETWEEN ?1 AND ?2 LIMIT ?3",
                )?;
                let rows = stmt.query_map(params![lo, hi, limit as i64], |r| r.get(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            }
        };
        Ok(ids)
    }

    fn save_link(&self, link: &Link) -> Result<()> {
        let conn = self.lock();
        let provenance_json = serde_json::to_string(&link.provenance).unwrap_or_default();
        let history_json = serde_json::to_string(&link.history).unwrap_or_default();
        conn.execute(
            "INSERT INTO links (link_id, project_id, source, target, relation_type, confidence,
                weight, active, provenance, history, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(link_id) DO UPDATE SET
                project_id = excluded.project_id,
                source = excluded.source,
                target = excluded.target,
                relation_type = excluded.relation_type,
                confidence = excluded.confidence,
                weight = excluded.weight,
                active = excluded.active,
                provenance = excluded.provenance,
                history = excluded.history,
                updated_at = excluded.updated_at",
            params![
                link.link_id,
                link.project_id,
                link.source,
                link.target,
                link.relation_type,
                link.confidence,
                link.weight,
                link.active as i64,
                provenance_json,
                history_json,
                link.created_at,
                link.updated_at,
            ],
        )?;
        Ok(())
    }

    fn get_link(&self, link_id: &str) -> Result<Option<Link>> {
        let conn = self.lock();
        conn.query_row("SELECT * FROM links WHERE link_id = ?1", params![link_id], row_to_link)
            .optional()
            .map_err(SircError::from)
    }

    fn query_links(&self, filter: &LinkFilter, limit: usize, sort_by: LinkSort) -> Result<Vec<Link>> {
        let conn = self.lock();
        let mut clauses = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(p) = &filter.project_id {
            clauses.push("project_id = ?".to_string());
            bound.push(Box::new(p.clone()));
        }
        if let Some(s) = &filter.source {
            clauses.push("source = ?".to_string());
            bound.push(Box::new(s.clone()));
        }
        if let Some(t) = &filter.target {
            clauses.push("target = ?".to_string());
            bound.push(Box::new(t.clone()));
        }
        if let Some(rt) = &filter.relation_type {
            clauses.push("relation_type = ?".to_string());
            bound.push(Box::new(rt.clone()));
        }
        if let Some(a) = filter.active {
            clauses.push("active = ?".to_string());
            bound.push(Box::new(a as i64));
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let order_clause = match sort_by {
            LinkSort::ConfidenceDesc => "ORDER BY confidence DESC",
            LinkSort::CreatedAtDesc => "ORDER BY created_at DESC",
        };
        let sql = format!("SELECT * FROM links {where_clause} {order_clause} LIMIT ?");
        bound.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_link)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SircError::from)
    }

    fn delete_link(&self, link_id: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM links WHERE link_id = ?1", params![link_id])?;
        Ok(())
    }

    fn save_quant_params(&self, project_id: &str, params_: &QuantParams) -> Result<()> {
        let conn = self.lock();
        let mins_json = serde_json::to_string(&params_.mins).unwrap_or_default();
        let maxs_json = serde_json::to_string(&params_.maxs).unwrap_or_default();
        conn.execute(
            "INSERT INTO quant_params (project_id, d, b, mins, maxs, reduction)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(project_id) DO UPDATE SET
                d = excluded.d, b = excluded.b, mins = excluded.mins,
                maxs = excluded.maxs, reduction = excluded.reduction",
            params![
                project_id,
                params_.d as i64,
                params_.b as i64,
                mins_json,
                maxs_json,
                reduction_to_str(params_.reduction),
            ],
        )?;
        Ok(())
    }

    fn get_quant_params(&self, project_id: &str) -> Result<Option<QuantParams>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT d, b, mins, maxs, reduction FROM quant_params WHERE project_id = ?1",
            params![project_id],
            |row| {
                let d: i64 = row.get(0)?;
                let b: i64 = row.get(1)?;
                let mins_json: String = row.get(2)?;
                let maxs_json: String = row.get(3)?;
                let reduction: String = row.get(4)?;
                Ok(QuantParams {
                    d: d as usize,
                    b: b as u32,
                    mins: serde_json::from_str(&mins_json).unwrap_or_default(),
                    maxs: serde_json::from_str(&maxs_json).unwrap_or_default(),
                    reduction: reduction_from_str(&reduction),
                })
            },
        )
        .optional()
        .map_err(SircError::from)
    }

    fn save_interaction(&self, row: &InteractionRow) -> Result<()> {
        let conn = self.lock();
        let meta_json = serde_json::to_string(&row.meta).unwrap_or_default();
        conn.execute(
            "INSERT INTO interactions (id, node_id, action_type, at, embedding, meta)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![row.id, row.node_id, row.action_type, row.at, row.embedding_b64, meta_json],
        )?;
        Ok(())
    }

    fn get_recent_interactions(&self, limit: usize, filter: &InteractionFilter) -> Result<Vec<InteractionRow>> {
        let conn = self.lock();
        let mut clauses = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(a) = &filter.action_type {
            clauses.push("action_type = ?".to_string());
            bound.push(Box::new(a.clone()));
        }
        if let Some(n) = &filter.node_id {
            clauses.push("node_id = ?".to_string());
            bound.push(Box::new(n.clone()));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!("SELECT * FROM interactions {where_clause} ORDER BY at DESC LIMIT ?");
        bound.push(Box::new(limit as i64));

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), |row| {
            let meta_json: String = row.get("meta")?;
            Ok(InteractionRow {
                id: row.get("id")?,
                node_id: row.get("node_id")?,
                action_type: row.get("action_type")?,
                at: row.get::<_, DateTime<Utc>>("at")?,
                embedding_b64: row.get("embedding")?,
                meta: serde_json::from_str(&meta_json).unwrap_or(serde_json::Value::Null),
            })
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(SircError::from)
    }

    fn purge_interactions(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock();
        let n = conn.execute("DELETE FROM interactions WHERE at < ?1", params![cutoff])?;
        Ok(n)
    }
}
