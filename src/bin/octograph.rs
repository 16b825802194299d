//! Octograph CLI: run an ingestion from a YAML config.
//!
//! Usage:
//!   octograph ingest --config octograph.yaml [--token T] [--cache-dir dir] [--output nodes.json]
//!   octograph schema --config octograph.yaml
//!   octograph config-schema

use clap::{Parser, Subcommand};
use octograph::{
    AssetResolver, HttpAssetFetcher, HttpClientFactory, IngestPipeline, NodeStore, PipelineConfig,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "octograph",
    version,
    about = "Aggregate GitHub GraphQL sources into a typed node graph"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured source and materialize nodes
    Ingest {
        /// Path to the YAML config
        #[arg(long)]
        config: PathBuf,
        /// Credential used when the config sets none
        #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Directory for downloaded assets
        #[arg(long)]
        cache_dir: Option<PathBuf>,
        /// Write committed nodes as JSON
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the declared types and links without fetching
    Schema {
        #[arg(long)]
        config: PathBuf,
    },
    /// Print the JSON schema of the config file
    ConfigSchema,
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("octograph=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_pipeline(config: &Path) -> Result<IngestPipeline, String> {
    let config = PipelineConfig::load(config)
        .map_err(|e| format!("failed to load {}: {}", config.display(), e))?;
    Ok(IngestPipeline::new(config, Arc::new(HttpClientFactory::new())))
}

async fn cmd_ingest(
    config: &Path,
    token: Option<String>,
    cache_dir: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), String> {
    let cache_dir = cache_dir.unwrap_or_else(HttpAssetFetcher::default_cache_dir);
    let fetcher = HttpAssetFetcher::new(&cache_dir)
        .map_err(|e| format!("failed to prepare cache dir {}: {}", cache_dir.display(), e))?;
    let pipeline = load_pipeline(config)?
        .with_fallback_token(token)
        .with_asset_resolver(AssetResolver::new(Arc::new(fetcher)));

    let store = NodeStore::new();
    let report = pipeline.run(&store).await.map_err(|e| e.to_string())?;

    for (role, count) in &report.records {
        println!("{:<24} {:>6} records", role, count);
    }
    println!(
        "{} nodes committed ({} materialized, {} staged, {} duplicate ids, {} across modules)",
        store.len(),
        report.nodes_materialized,
        report.nodes_staged,
        report.collisions,
        report.cross_module_collisions
    );
    println!(
        "assets: {} attempted, {} resolved, {} skipped",
        report.assets.attempted, report.assets.resolved, report.assets.skipped
    );

    if let Some(path) = output {
        let mut nodes = store.all_nodes();
        nodes.sort_by(|a, b| a.node_type().cmp(b.node_type()).then(a.id.cmp(&b.id)));
        let json = serde_json::to_string_pretty(&nodes).map_err(|e| e.to_string())?;
        std::fs::write(&path, json)
            .map_err(|e| format!("failed to write {}: {}", path.display(), e))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn cmd_schema(config: &Path) -> Result<(), String> {
    let schema = load_pipeline(config)?.schema().map_err(|e| e.to_string())?;
    print!("{}", schema);
    Ok(())
}

fn cmd_config_schema() -> Result<(), String> {
    let json = serde_json::to_string_pretty(&PipelineConfig::json_schema())
        .map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Ingest {
            config,
            token,
            cache_dir,
            output,
        } => cmd_ingest(&config, token, cache_dir, output).await,
        Commands::Schema { config } => cmd_schema(&config),
        Commands::ConfigSchema => cmd_config_schema(),
    };
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
