//! Schema migrations for the SQLite-backed Index Store.

pub const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "Initial schema: nodes, morton_index, links, quant_params, interactions",
    up: MIGRATION_V1_UP,
}];

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub up: &'static str,
}

const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS nodes (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    title TEXT NOT NULL,
    text TEXT NOT NULL,
    summary TEXT,
    embedding TEXT,
    morton_key TEXT,
    parent TEXT,
    children TEXT NOT NULL DEFAULT '[]',
    meta TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_nodes_project ON nodes(project_id);
CREATE INDEX IF NOT EXISTS idx_nodes_parent ON nodes(parent);

CREATE TABLE IF NOT EXISTS morton_index (
    morton_hex TEXT NOT NULL,
    node_id TEXT NOT NULL,
    PRIMARY KEY (morton_hex, node_id)
);

CREATE INDEX IF NOT EXISTS idx_morton_hex ON morton_index(morton_hex);
CREATE INDEX IF NOT EXISTS idx_morton_node ON morton_index(node_id);

CREATE TABLE IF NOT EXISTS links (
    link_id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    source TEXT NOT NULL,
    target TEXT NOT NULL,
    relation_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    weight REAL NOT NULL DEFAULT 1.0,
    active INTEGER NOT NULL DEFAULT 1,
    provenance TEXT NOT NULL DEFAULT '{}',
    history TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_links_project ON links(project_id);
CREATE INDEX IF NOT EXISTS idx_links_source ON links(source);
CREATE INDEX IF NOT EXISTS idx_links_target ON links(target);
CREATE INDEX IF NOT EXISTS idx_links_relation ON links(relation_type);
CREATE INDEX IF NOT EXISTS idx_links_active ON links(active);
CREATE INDEX IF NOT EXISTS idx_links_source_relation ON links(source, relation_type);
CREATE INDEX IF NOT EXISTS idx_links_target_relation ON links(target, relation_type);

CREATE TABLE IF NOT EXISTS quant_params (
    project_id TEXT PRIMARY KEY,
    d INTEGER NOT NULL,
    b INTEGER NOT NULL,
    mins TEXT NOT NULL,
    maxs TEXT NOT NULL,
    reduction TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS interactions (
    id TEXT PRIMARY KEY,
    node_id TEXT,
    action_type TEXT NOT NULL,
    at TEXT NOT NULL,
    embedding TEXT,
    meta TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_interactions_at ON interactions(at);
CREATE INDEX IF NOT EXISTS idx_interactions_node ON interactions(node_id);
CREATE INDEX IF NOT EXISTS idx_interactions_action ON interactions(action_type);
"#;
