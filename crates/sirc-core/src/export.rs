//! Bundle export formats (spec.md §6): the native bundle, a JSON-LD graph
//! export, and a flat CSV export.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{Link, Node, Topic};

#[derive(Debug, Clone, Serialize)]
pub struct ProjectStats {
    pub node_count: usize,
    pub link_count: usize,
    pub topic_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectBundle {
    pub project_id: String,
    pub exported_at: DateTime<Utc>,
    pub status: String,
    pub stats: ProjectStats,
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
    pub topics: Vec<Topic>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crdt_history: Option<Vec<serde_json::Value>>,
}

/// Native bundle export (the `.fmind`-equivalent format).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeBundle {
    pub format: String,
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub projects: Vec<ProjectBundle>,
    pub global_metadata: serde_json::Value,
}

pub fn export_fmind(projects: Vec<ProjectBundle>, global_metadata: serde_json::Value) -> NativeBundle {
    NativeBundle {
        format: "sirc-native".to_string(),
        version: "1".to_string(),
        exported_at: Utc::now(),
        projects,
        global_metadata,
    }
}

/// Restores the nodes and links of every project bundle into `store`
/// (spec.md §8 round-trip). CRDT history, if present, is not replayed here
/// — callers that need the operation log back need an actor to merge it
/// into, so that step lives on `SircEngine::import_bundle`.
pub fn import_fmind(store: &dyn crate::store::IndexStore, bundle: &NativeBundle) -> crate::error::Result<ProjectStats> {
    let mut node_count = 0;
    let mut link_count = 0;
    for project in &bundle.projects {
        for node in &project.nodes {
            store.save_node(node)?;
            node_count += 1;
        }
        for link in &project.links {
            store.save_link(link)?;
            link_count += 1;
        }
    }
    Ok(ProjectStats { node_count, link_count, topic_count: 0 })
}

/// JSON-LD graph export with semantic-web aliases for common fields.
pub fn export_graph_jsonld(nodes: &[Node], links: &[Link]) -> serde_json::Value {
    let context = serde_json::json!({
        "@vocab": "https://schema.org/",
        "Node": "CreativeWork",
        "Link": "Action",
        "title": "name",
        "text": "text",
        "createdAt": "dateCreated",
        "updatedAt": "dateModified",
    });

    let node_objs: Vec<serde_json::Value> = nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "@type": "Node",
                "@id": n.id,
                "title": n.title,
                "text": n.text,
                "createdAt": n.meta.created_at,
            })
        })
        .collect();

    let link_objs: Vec<serde_json::Value> = links
        .iter()
        .map(|l| {
            serde_json::json!({
                "@type": "Link",
                "@id": l.link_id,
                "source": l.source,
                "target": l.target,
                "relationType": l.relation_type,
                "createdAt": l.created_at,
                "updatedAt": l.updated_at,
                "provenance": {
                    "method": l.provenance.method,
                    "aiConfidence": l.provenance.ai_confidence,
                    "timestamp": l.provenance.timestamp,
                },
            })
        })
        .collect();

    serde_json::json!({
        "@context": context,
        "@graph": node_objs.into_iter().chain(link_objs).collect::<Vec<_>>(),
    })
}

/// CSV-escape a single field: quote on comma/quote/newline, double-quote escaping.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn node_field(node: &Node, field: &str) -> String {
    match field {
        "id" => node.id.clone(),
        "project_id" => node.project_id.clone(),
        "title" => node.title.clone(),
        "text" => node.text.clone(),
        "summary" => node.summary.clone().unwrap_or_default(),
        "morton_key" => node.morton_key.clone().unwrap_or_default(),
        "parent" => node.parent.clone().unwrap_or_default(),
        "created_at" => node.meta.created_at.to_rfc3339(),
        _ => String::new(),
    }
}

const LINK_COLUMNS: &[&str] = &["link_id", "source", "target", "relation_type", "confidence", "active"];

fn link_field(link: &Link, field: &str) -> String {
    match field {
        "link_id" => link.link_id.clone(),
        "source" => link.source.clone(),
        "target" => link.target.clone(),
        "relation_type" => link.relation_type.clone(),
        "confidence" => format!("{:.6}", link.confidence),
        "active" => link.active.to_string(),
        _ => String::new(),
    }
}

/// Flat CSV export: a caller-supplied node column list, with an optional
/// fixed-columnset "# Links" section appended.
pub fn export_csv(nodes: &[Node], fields: &[&str], links: Option<&[Link]>) -> String {
    let mut out = String::new();
    out.push_str(&fields.iter().map(|f| csv_escape(f)).collect::<Vec<_>>().join(","));
    out.push('\n');
    for node in nodes {
        let row: Vec<String> = fields.iter().map(|f| csv_escape(&node_field(node, f))).collect();
        out.push_str(&row.join(","));
        out.push('\n');
    }

    if let Some(links) = links {
        out.push_str("# Links\n");
        out.push_str(&LINK_COLUMNS.iter().map(|f| csv_escape(f)).collect::<Vec<_>>().join(","));
        out.push('\n');
        for link in links {
            let row: Vec<String> = LINK_COLUMNS.iter().map(|f| csv_escape(&link_field(link, f))).collect();
            out.push_str(&row.join(","));
            out.push('\n');
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeMeta;

    fn sample_node(id: &str, title: &str, text: &str) -> Node {
        Node {
            id: id.to_string(),
            project_id: "p1".to_string(),
            title: title.to_string(),
            text: text.to_string(),
            summary: None,
            embedding: None,
            morton_key: None,
            parent: None,
            children: vec![],
            meta: NodeMeta::default(),
        }
    }

    #[test]
    fn csv_escape_quotes_fields_with_commas() {
        let node = sample_node("n1", "hello, world", "plain text");
        let csv = export_csv(&[node], &["title", "text"], None);
        assert!(csv.contains("\"hello, world\""));
    }

    #[test]
    fn csv_escape_doubles_embedded_quotes() {
        let node = sample_node("n1", "say \"hi\"", "x");
        let csv = export_csv(&[node], &["title"], None);
        assert!(csv.contains("\"say \"\"hi\"\"\""));
    }

    #[test]
    fn csv_export_appends_links_section() {
        let node = sample_node("n1", "t", "x");
        let link = Link {
            link_id: "l1".to_string(),
            project_id: "p1".to_string(),
            source: "n1".to_string(),
            target: "n2".to_string(),
            relation_type: "supports".to_string(),
            confidence: 0.9,
            weight: 1.0,
            active: true,
            provenance: crate::model::Provenance { method: "test".to_string(), ai_confidence: None, timestamp: Utc::now(), note: None },
            history: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let csv = export_csv(&[node], &["title"], Some(&[link]));
        assert!(csv.contains("# Links"));
        assert!(csv.contains("l1"));
    }

    #[test]
    fn jsonld_graph_merges_nodes_and_links_into_one_array() {
        let node = sample_node("n1", "t", "x");
        let value = export_graph_jsonld(&[node], &[]);
        assert!(value["@graph"].is_array());
        assert_eq!(value["@graph"].as_array().unwrap().len(), 1);
    }
}
