//! refgraph CLI
//!
//! Resolves a root schema and reports what the graph looks like:
//! documents visited, resolved nodes, cyclic keys and failed branches.
//!
//! Usage:
//!   cargo run --features cli --bin refgraph -- schema/root.yaml
//!   cargo run --features cli --bin refgraph -- schema/root.yaml --json --depth 2
//!   cargo run --features cli --bin refgraph -- schema/root.yaml \
//!     --node 'file:///abs/schema/root.yaml#/components/schemas/Node' --json

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;

use refgraph::{NodeKey, ResolutionEngine, ResolverConfig};

/// Resolve $ref pointers across schema documents
#[derive(Parser, Debug)]
#[command(name = "refgraph")]
#[command(about = "Resolve $ref pointers across schema documents")]
struct Args {
    /// Root document (YAML or JSON)
    root: PathBuf,

    /// Resolver configuration file (YAML)
    #[arg(long, short = 'c', env = "REFGRAPH_CONFIG")]
    config: Option<PathBuf>,

    /// Print the materialized graph as JSON instead of a summary
    #[arg(long)]
    json: bool,

    /// Canonical key of the node to print (default: the root)
    #[arg(long, short = 'n')]
    node: Option<String>,

    /// Back-edge expansions when materializing (default from config)
    #[arg(long, short = 'd')]
    depth: Option<usize>,
}

fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Args::parse()) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every branch resolved
fn run(args: Args) -> Result<bool> {
    let mut config = match &args.config {
        Some(path) => ResolverConfig::from_file(path)?,
        None => ResolverConfig::default(),
    };
    config.apply_env()?;
    let depth = args.depth.unwrap_or(config.recursion_limit);

    let engine = ResolutionEngine::file_system(config);
    let resolution = engine
        .resolve_path(&args.root)
        .with_context(|| format!("Failed to resolve {}", args.root.display()))?;
    let graph = &resolution.graph;

    if args.json {
        let node = match &args.node {
            Some(key) => {
                let key = NodeKey::parse(key).ok_or_else(|| anyhow!("invalid node key '{}'", key))?;
                graph
                    .get_node(&key)
                    .ok_or_else(|| anyhow!("no resolved node for '{}'", key))?
            }
            None => graph.get_root(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&graph.materialize(node.id, depth))?
        );
    } else {
        println!("{} {}", "Root:".bold(), graph.get_root().key);
        println!("{} {}", "Documents:".bold(), resolution.documents.len());
        for document in &resolution.documents {
            println!("  {}", document);
        }
        println!("{} {}", "Nodes:".bold(), graph.len());

        let cyclic: Vec<_> = graph.iter().filter(|n| graph.is_cyclic(n)).collect();
        println!("{} {}", "Cyclic:".bold(), cyclic.len());
        for node in cyclic {
            println!("  {}", node.key.to_string().yellow());
        }
    }

    for failure in &resolution.failures {
        eprintln!("{} {}", "unresolved:".red().bold(), failure);
    }

    Ok(resolution.is_complete())
}
