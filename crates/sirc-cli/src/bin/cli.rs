//! SIRC CLI
//!
//! Command-line interface for ingesting, searching, linking, and reasoning
//! over a local SIRC knowledge graph.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use colored::Colorize;
use directories::ProjectDirs;

use sirc_core::export::{ProjectBundle, ProjectStats};
use sirc_core::prelude::*;
use sirc_core::store::{LinkFilter, LinkSort};

/// SIRC - Semantic Index and Reasoning Core CLI
#[derive(Parser)]
#[command(name = "sirc")]
#[command(author = "SIRC Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "CLI for the SIRC local-first knowledge engine")]
struct Cli {
    /// Path to the SQLite database. Defaults to the platform cache dir.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Project id to scope ingestion/search/link operations to.
    #[arg(long, global = true, default_value = "default")]
    project: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a piece of text as a new node
    Ingest {
        /// Text content of the node
        text: String,
        /// Title for the node
        #[arg(long, default_value = "untitled")]
        title: String,
        /// Parent node id, for hierarchical outlines
        #[arg(long)]
        parent: Option<String>,
    },

    /// Semantic search within the current project
    Search {
        /// Query text
        query: String,
        /// Number of hits to return
        #[arg(long, default_value = "10")]
        top_k: usize,
    },

    /// Create a typed link between two nodes
    Link {
        source: String,
        target: String,
        /// Relation type (clarifies, contradicts, elaborates, supports, precedes, follows, generalizes, specializes)
        #[arg(long, default_value = "supports")]
        relation: String,
        #[arg(long, default_value = "0.8")]
        confidence: f64,
    },

    /// List links for the current project
    Links {
        #[arg(long)]
        source: Option<String>,
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Suggest candidate links for a node
    Suggest {
        node_id: String,
        #[arg(long, default_value = "5")]
        top_k: usize,
    },

    /// Infer cross-project relations starting from a node
    Reason {
        node_id: String,
        #[arg(long, default_value = "2")]
        depth: u32,
        #[arg(long, default_value = "10")]
        top_k: usize,
    },

    /// Find reasoning chains between two nodes over existing links
    Chains {
        source: String,
        target: String,
        #[arg(long, default_value = "5")]
        max_depth: u32,
    },

    /// Build and print the current topic model for the project
    Topics,

    /// Export the project as a native bundle, JSON-LD graph, or CSV
    Export {
        output: PathBuf,
        #[arg(long, default_value = "native")]
        format: String,
    },

    /// Simulate a CRDT merge between two actors over a tiny op sequence
    CrdtSim,
}

fn default_db_path() -> PathBuf {
    ProjectDirs::from("com", "sirc", "core")
        .map(|dirs| dirs.data_dir().join("sirc.sqlite"))
        .unwrap_or_else(|| PathBuf::from("sirc.sqlite"))
}

fn build_engine(db: Option<PathBuf>) -> anyhow::Result<SircEngine> {
    let path = db.unwrap_or_else(default_db_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let store: Arc<dyn IndexStore> = Arc::new(SqliteIndexStore::open(&path)?);
    let embedder: Arc<dyn EmbeddingProvider> = Arc::new(MockEmbeddingProvider::default());
    Ok(SircEngine::new(store, embedder, SircConfig::default()))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let engine = build_engine(cli.db)?;

    match cli.command {
        Commands::Ingest { text, title, parent } => run_ingest(&engine, &cli.project, title, text, parent),
        Commands::Search { query, top_k } => run_search(&engine, &cli.project, &query, top_k),
        Commands::Link { source, target, relation, confidence } => run_link(&engine, &cli.project, source, target, relation, confidence),
        Commands::Links { source, limit } => run_links(&engine, &cli.project, source, limit),
        Commands::Suggest { node_id, top_k } => run_suggest(&engine, &cli.project, &node_id, top_k),
        Commands::Reason { node_id, depth, top_k } => run_reason(&engine, &cli.project, node_id, depth, top_k),
        Commands::Chains { source, target, max_depth } => run_chains(&engine, &cli.project, &source, &target, max_depth),
        Commands::Topics => run_topics(&engine, &cli.project),
        Commands::Export { output, format } => run_export(&engine, &cli.project, output, format),
        Commands::CrdtSim => run_crdt_sim(&engine),
    }
}

fn run_ingest(engine: &SircEngine, project: &str, title: String, text: String, parent: Option<String>) -> anyhow::Result<()> {
    let node = engine.ingest_node(IngestFields {
        project_id: project.to_string(),
        title,
        text,
        summary: None,
        parent,
        author: None,
        source_url: None,
    })?;
    println!("{} {}", "Ingested".green().bold(), node.id);
    Ok(())
}

fn run_search(engine: &SircEngine, project: &str, query: &str, top_k: usize) -> anyhow::Result<()> {
    let opts = SearchOptions { project_id: Some(project.to_string()), top_k: Some(top_k), ..Default::default() };
    let hits = engine.search(query, &opts, &CancelSignal::new())?;
    if hits.is_empty() {
        println!("{}", "No hits.".dimmed());
        return Ok(());
    }
    for hit in hits {
        println!("{:>6.3} {} {}", hit.score, hit.node_id.cyan(), hit.title.white().bold());
        println!("       {}", hit.snippet.dimmed());
    }
    Ok(())
}

fn run_link(engine: &SircEngine, project: &str, source: String, target: String, relation_type: String, confidence: f64) -> anyhow::Result<()> {
    let link = engine.create_link(CreateLinkFields {
        project_id: project.to_string(),
        source,
        target,
        relation_type,
        confidence,
        weight: None,
        method: "cli".to_string(),
        ai_confidence: None,
        note: None,
    })?;
    println!("{} {} --[{}]--> {}", "Linked".green().bold(), link.source, link.relation_type, link.target);
    Ok(())
}

fn run_links(engine: &SircEngine, project: &str, source: Option<String>, limit: usize) -> anyhow::Result<()> {
    let filter = LinkFilter { project_id: Some(project.to_string()), source, active: Some(true), ..Default::default() };
    let links = engine.query_links(&filter, limit, LinkSort::CreatedAtDesc)?;
    for link in links {
        println!("{:>6.3} {} --[{}]--> {}", link.confidence, link.source, link.relation_type.yellow(), link.target);
    }
    Ok(())
}

fn run_suggest(engine: &SircEngine, project: &str, node_id: &str, top_k: usize) -> anyhow::Result<()> {
    let opts = LinkSuggestOptions {
        top_k,
        include_context_bias: false,
        context_history: Vec::new(),
        mode: AiMode::Mock,
        project_id: Some(project.to_string()),
        radius_power: 40,
    };
    let suggestions = engine.suggest_links(node_id, &opts)?;
    for s in suggestions {
        println!("{:>6.3} {} --[{}]--> {}", s.confidence, node_id, s.relation_type.yellow(), s.candidate_id);
    }
    Ok(())
}

fn run_reason(engine: &SircEngine, project: &str, node_id: String, depth: u32, top_k: usize) -> anyhow::Result<()> {
    let opts = InferOptions {
        start_node_id: node_id,
        projects: vec![project.to_string()],
        depth,
        top_k,
        mode: AiMode::Mock,
        threshold: 0.5,
        context_history: Vec::new(),
    };
    let relations = engine.infer_relations(&opts, &CancelSignal::new())?;
    for r in relations {
        println!("{:>6.3} {} --[{}]--> {}", r.confidence, r.from, r.relation_type.yellow(), r.to);
    }
    Ok(())
}

fn run_chains(engine: &SircEngine, project: &str, source: &str, target: &str, max_depth: u32) -> anyhow::Result<()> {
    let chains = engine.find_chains(source, target, max_depth, 10, Some(project))?;
    print!("{}", Reasoner::chain_transcript(&chains));
    Ok(())
}

fn run_topics(engine: &SircEngine, project: &str) -> anyhow::Result<()> {
    let mut modeller = engine.new_topic_modeller();
    let bundle = engine.project_bundle_parts(project, &[])?;
    let node_ids: Vec<String> = bundle.0.iter().map(|n| n.id.clone()).collect();
    modeller.update_with_nodes(&node_ids, chrono::Utc::now(), &CancelSignal::new())?;
    for topic in modeller.get_topics(None, None) {
        let keywords: Vec<&str> = topic.keywords.iter().map(|k| k.word.as_str()).collect();
        println!("{} ({} nodes, weight {:.2}): {}", topic.topic_id.cyan(), topic.node_ids.len(), topic.weight, keywords.join(", "));
    }
    Ok(())
}

fn run_export(engine: &SircEngine, project: &str, output: PathBuf, format: String) -> anyhow::Result<()> {
    let (nodes, links) = engine.project_bundle_parts(project, &[])?;
    let contents = match format.as_str() {
        "native" => {
            let bundle = ProjectBundle {
                project_id: project.to_string(),
                exported_at: chrono::Utc::now(),
                status: "ok".to_string(),
                stats: ProjectStats { node_count: nodes.len(), link_count: links.len(), topic_count: 0 },
                nodes,
                links,
                topics: Vec::new(),
                crdt_history: None,
            };
            serde_json::to_string_pretty(&sirc_core::export::export_fmind(vec![bundle], serde_json::Value::Null))?
        }
        "jsonld" => serde_json::to_string_pretty(&sirc_core::export::export_graph_jsonld(&nodes, &links))?,
        "csv" => sirc_core::export::export_csv(&nodes, &["id", "title", "text", "created_at"], Some(&links)),
        other => anyhow::bail!("unknown export format '{other}' (expected native, jsonld, or csv)"),
    };
    std::fs::write(&output, contents)?;
    println!("{} {}", "Exported".green().bold(), output.display());
    Ok(())
}

fn run_crdt_sim(engine: &SircEngine) -> anyhow::Result<()> {
    let create = engine.apply_local_change(
        "crdt-sim",
        "u1",
        OperationKind::CreateNode { data: serde_json::json!({"id": "n", "title": "A"}) },
    );
    let conflicting = sirc_core::model::Operation {
        op_id: sirc_core::model::Operation::make_op_id("u2", 1, create.timestamp + 50),
        kind: OperationKind::UpdateNode { id: "n".to_string(), data: serde_json::json!({"title": "B"}) },
        actor_id: "u2".to_string(),
        timestamp: create.timestamp + 50,
        sequence: 1,
        dependencies: Vec::new(),
    };
    let applied = engine.merge_remote_change("crdt-sim", conflicting);
    let snapshot = engine.crdt_snapshot("crdt-sim").expect("document exists");
    println!("merged remote op: {applied}");
    println!("final title: {}", snapshot.nodes["n"]["title"]);
    Ok(())
}
