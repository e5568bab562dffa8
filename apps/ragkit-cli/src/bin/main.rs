use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ragkit_core::config::{expand_path, Config, RagConfig};
use ragkit_core::data_processor::DataProcessor;
use ragkit_core::traits::{Embedder, SharedCacheStore};
use ragkit_embed::get_default_embedder;
use ragkit_pipeline::{QueryRequest, RagPipeline};
use ragkit_vector::{Ingestor, LanceCacheStore, LanceVectorIndex, VectorRetriever};

const USAGE: &str = "Usage: ragkit <command> [args...]

Commands:
  ingest [dir] [--limit N]                       chunk, embed and index .txt files
  query \"<question>\" [--identity ID] [--tier NAME] [--no-cache] [--health]
  chunk <file>                                   print chunks and metadata as JSON lines";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("{USAGE}");
        std::process::exit(1);
    }
    let cmd = args.remove(0);
    (cmd, args)
}

/// Value following `flag`, if present.
fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).cloned()
}

/// First argument that is neither a flag nor a flag's value.
fn positional(args: &[String], valued_flags: &[&str]) -> Option<String> {
    let mut skip = false;
    for a in args {
        if skip {
            skip = false;
            continue;
        }
        if valued_flags.contains(&a.as_str()) {
            skip = true;
        } else if !a.starts_with("--") {
            return Some(a.clone());
        }
    }
    None
}

fn embedder() -> Arc<dyn Embedder> {
    Arc::from(get_default_embedder())
}

async fn open_index(cfg: &RagConfig, dim: usize) -> anyhow::Result<LanceVectorIndex> {
    let dir = expand_path(&cfg.data.lancedb_dir);
    fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
    Ok(LanceVectorIndex::open(&dir.to_string_lossy(), &cfg.data.documents_table, dim).await?)
}

async fn ingest(cfg: &RagConfig, args: &[String]) -> anyhow::Result<()> {
    let data_dir = positional(args, &["--limit"]).map_or_else(|| expand_path(&cfg.data.raw_txt_dir), PathBuf::from);
    let limit = flag_value(args, "--limit")
        .map(|v| v.parse::<usize>().context("--limit requires a number"))
        .transpose()?;
    println!("Ingesting from {}", data_dir.display());

    let processor = DataProcessor::new(&cfg.chunking)?;
    let chunks = match limit {
        Some(n) => processor.process_directory_limited(&data_dir, n)?,
        None => processor.process_directory(&data_dir)?,
    };
    if chunks.is_empty() {
        println!("No chunks produced, nothing to index");
        return Ok(());
    }

    let embedder = embedder();
    let index = Arc::new(open_index(cfg, embedder.dim()).await?);
    let report = Ingestor::new(embedder, index).with_progress(true).ingest(&chunks).await?;
    println!(
        "✅ Ingest complete: {} chunks, {} indexed, {} duplicates skipped, {} stale rows replaced",
        report.total, report.indexed, report.duplicates, report.replaced
    );
    Ok(())
}

async fn query(cfg: RagConfig, args: &[String]) -> anyhow::Result<()> {
    let valued = ["--identity", "--tier"];
    let Some(question) = positional(args, &valued) else {
        eprintln!("Usage: ragkit query \"<question>\" [--identity ID] [--tier NAME] [--no-cache] [--health]");
        std::process::exit(1);
    };

    let embedder = embedder();
    let index = Arc::new(open_index(&cfg, embedder.dim()).await?);
    let retriever = Arc::new(VectorRetriever::new(embedder.clone(), index));
    let mut builder = RagPipeline::builder(cfg.clone()).retriever(retriever).embedder(embedder);
    let mut shared: Option<Arc<dyn SharedCacheStore>> = None;
    if cfg.cache.l2_enabled {
        let dir = expand_path(&cfg.data.lancedb_dir);
        let store: Arc<dyn SharedCacheStore> =
            Arc::new(LanceCacheStore::open(&dir.to_string_lossy(), &cfg.data.cache_table).await?);
        builder = builder.shared_store(store.clone());
        shared = Some(store);
    }
    let pipeline = builder.build()?;

    let mut request = QueryRequest::new(question);
    if let Some(identity) = flag_value(args, "--identity") {
        request = request.identity(identity);
    }
    if let Some(tier) = flag_value(args, "--tier") {
        request = request.tier(pipeline.tier(&tier)?);
    }
    if args.iter().any(|a| a == "--no-cache") {
        request = request.without_cache();
    }

    let response = pipeline.query(request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    if args.iter().any(|a| a == "--health") {
        println!("{}", serde_json::to_string_pretty(&pipeline.health())?);
    }
    // one-shot process: no health probe runs, so expire rows here
    if let Some(store) = shared {
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(n) => info!(removed = n, "purged expired cache rows"),
            Err(e) => warn!(error = %e, "cache purge failed"),
        }
    }
    Ok(())
}

fn chunk_file(cfg: &RagConfig, args: &[String]) -> anyhow::Result<()> {
    let Some(file) = args.first() else {
        eprintln!("Usage: ragkit chunk <file>");
        std::process::exit(1);
    };
    let path = Path::new(file);
    let content = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let doc_id = path.file_stem().map_or_else(|| file.clone(), |s| s.to_string_lossy().into_owned());
    let processor = DataProcessor::new(&cfg.chunking)?;
    for chunk in processor.process_text(&doc_id, file, &content) {
        println!("{}", serde_json::to_string(&chunk)?);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,ragkit=info")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;
    let cfg = config.rag()?;
    let (cmd, args) = parse_args();
    info!(command = %cmd, "starting");

    let rt = tokio::runtime::Runtime::new()?;
    match cmd.as_str() {
        "ingest" => rt.block_on(ingest(&cfg, &args))?,
        "query" => rt.block_on(query(cfg, &args))?,
        "chunk" => chunk_file(&cfg, &args)?,
        _ => {
            eprintln!("Unknown command: {cmd}\n\n{USAGE}");
            std::process::exit(1);
        }
    }
    Ok(())
}
