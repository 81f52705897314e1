//! notemill CLI
//!
//! Drives the pipeline end to end: ingest exported notes, enrich them
//! through LLM backends, build the search index, and serve or query it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use notemill_agents::{
    BatchIngestor, Dispatcher, EnrichAgent, IngestAgent, ModelConfig, OllamaClient,
};
use notemill_core::{IngestStatus, IngestTask, TaskPayload};
use notemill_search::{IndexBuilder, QueryEngine, VectorStore, INDEX_FILE};
use notemill_store::{JournalWriter, NoteStore, VersionDiffer};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

const DEFAULT_MODEL: &str = "qwen2.5:7b";
const VECTOR_STORE_FILE: &str = "vector_store.json";

/// notemill - personal note ingestion, enrichment, and search
#[derive(Parser)]
#[command(name = "notemill")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Root directory for the note store (defaults to ./data)
    #[arg(short, long)]
    json_root: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest one exported HTML file
    Ingest {
        /// Path to the exported file
        path: PathBuf,

        /// Title override
        #[arg(short, long)]
        title: Option<String>,

        /// Language hint used when detection is inconclusive
        #[arg(short, long)]
        language_hint: Option<String>,

        /// Source type label
        #[arg(long, default_value = "evernote_html")]
        source_type: String,

        /// Also write a pending-LLM extraction stub
        #[arg(long)]
        with_stub: bool,
    },

    /// Ingest every HTML export under a directory
    Batch {
        /// Directory to walk for .html / .htm files
        input_dir: PathBuf,

        /// Process at most N files (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Spawn the worker in the background and exit immediately
        #[arg(long)]
        daemon: bool,
    },

    /// Enrich a note with an LLM summary
    Enhance {
        /// Note ID
        note_id: String,

        /// Models to try in order (comma-separated)
        #[arg(short, long)]
        models: Option<String>,
    },

    /// Build the inverted index (and optionally the vector store)
    BuildIndex {
        /// Maximum notes to index (0 = all)
        #[arg(short, long, default_value = "0")]
        limit: usize,

        /// Also encode clean text into the vector store
        #[arg(long)]
        with_vectors: bool,
    },

    /// Search the index
    Search {
        /// Search query
        query: String,

        /// Filter by language
        #[arg(long)]
        lang: Option<String>,

        /// Maximum results
        #[arg(short, long, default_value = "10")]
        limit: usize,

        /// Minimum score
        #[arg(long, default_value = "0.0")]
        min_score: f64,
    },

    /// Serve the search API over HTTP
    Serve {
        /// Bind address
        #[arg(short, long, default_value = "0.0.0.0:8080")]
        bind: String,
    },

    /// Show journal metrics and index stats
    Stats,

    /// Show stage-by-stage diffs for a note (or all notes)
    Diff {
        /// Note ID (omit to report on every note)
        note_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env if present.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let json_root = cli
        .json_root
        .unwrap_or_else(|| PathBuf::from("data"));
    let store = NoteStore::new(&json_root)
        .with_context(|| format!("failed to open note store at {}", json_root.display()))?;
    info!(json_root = %json_root.display(), "using note store");

    match cli.command {
        Commands::Ingest {
            path,
            title,
            language_hint,
            source_type,
            with_stub,
        } => {
            let agent = IngestAgent::new(store)?;
            let mut payload = TaskPayload::for_path(path.to_string_lossy());
            payload.title = title;
            payload.language_hint = language_hint;
            payload.source_type = Some(source_type);
            let mut task = IngestTask::new(notemill_agents::ingest::AGENT_ID, payload);
            if with_stub {
                task = task.with_requested_output("extraction_stub");
            }
            let result = agent.process(&task);
            match result.status {
                IngestStatus::Success => {
                    let note = result.note.context("ingest succeeded without a note")?;
                    println!("Ingested note {}", note.id);
                    println!("  title:    {}", note.canonical_title);
                    println!("  language: {}", note.language);
                }
                _ => {
                    let message = result
                        .error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "unknown error".to_string());
                    anyhow::bail!("ingest failed: {}", message);
                }
            }
        }

        Commands::Batch {
            input_dir,
            limit,
            daemon,
        } => {
            if daemon {
                // Re-exec the same batch in a detached child.
                let exe = std::env::current_exe()?;
                let child = std::process::Command::new(exe)
                    .arg("--json-root")
                    .arg(&json_root)
                    .arg("batch")
                    .arg(&input_dir)
                    .arg("--limit")
                    .arg(limit.to_string())
                    .stdin(std::process::Stdio::null())
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .spawn()
                    .context("failed to spawn background batch worker")?;
                println!("Batch worker started in background (pid {})", child.id());
                return Ok(());
            }
            let journal_root = store.journal_root();
            let agent = IngestAgent::new(store)?;
            let batch = BatchIngestor::new(agent, journal_root)?;
            let summary = batch.run(&input_dir, limit)?;
            println!(
                "Batch {}: {} files, {} succeeded, {} failed",
                summary.batch_id, summary.total, summary.succeeded, summary.failed
            );
            if summary.failed > 0 {
                anyhow::bail!("{} files failed; see batch_progress.jsonl", summary.failed);
            }
        }

        Commands::Enhance { note_id, models } => {
            let dispatcher = build_dispatcher(&store, models.as_deref())?;
            let agent = EnrichAgent::new(store, dispatcher)?;
            let requested: Option<Vec<String>> = models
                .map(|list| list.split(',').map(|m| m.trim().to_string()).collect());
            let outcome = agent.enhance_note(&note_id, requested.as_deref()).await?;
            println!(
                "Enhanced {} via {} ({}) quality={:.3} in {:.2}s",
                outcome.note_id,
                outcome.model,
                outcome.status.as_str(),
                outcome.quality_score,
                outcome.latency_seconds
            );
        }

        Commands::BuildIndex {
            limit,
            with_vectors,
        } => {
            let builder = IndexBuilder::new(NoteStore::new(&json_root)?, &json_root);
            let result = builder.build(limit)?;
            println!(
                "Indexed {} notes ({} weighted tokens) -> {}",
                result.note_count,
                result.token_count,
                result.output_path.display()
            );
            if with_vectors {
                let count = build_vectors(&store, &json_root)?;
                println!("Encoded {} notes into {}", count, VECTOR_STORE_FILE);
            }
        }

        Commands::Search {
            query,
            lang,
            limit,
            min_score,
        } => {
            let engine = QueryEngine::open(&json_root.join(INDEX_FILE))?;
            let hits = engine.search(&query, lang.as_deref(), limit, min_score);
            if hits.is_empty() {
                println!("No results for '{}'", query);
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "{}. [{:.4}] {} ({})",
                    rank + 1,
                    hit.score,
                    hit.title,
                    hit.note_id
                );
                if !hit.summary.is_empty() {
                    println!("   {}", hit.summary);
                }
            }
        }

        Commands::Serve { bind } => {
            let engine = QueryEngine::open_or_build(store, &json_root)?;
            notemill_search::serve(engine, &bind).await?;
        }

        Commands::Stats => {
            let journal = JournalWriter::new(store.journal_root())?;
            let metrics = journal.read_metrics()?;
            println!("Journal entries: {}", metrics.total_entries);
            for (stage, count) in &metrics.by_stage {
                println!("  stage {}: {}", stage, count);
            }
            for (status, count) in &metrics.by_status {
                println!("  status {}: {}", status, count);
            }
            match QueryEngine::open(&json_root.join(INDEX_FILE)) {
                Ok(engine) => {
                    let stats = engine.stats();
                    println!(
                        "Index: {} notes, {} unique terms",
                        stats.notes_indexed, stats.unique_terms
                    );
                }
                Err(_) => println!("Index: not built yet"),
            }
        }

        Commands::Diff { note_id } => {
            let ids: Vec<String> = match note_id {
                Some(id) => vec![id],
                None => store.list_note_ids()?.collect(),
            };
            let differ = VersionDiffer::new(store);
            for diff in differ.report(ids) {
                println!("note {} ({})", diff.note.id, diff.note.canonical_title);
                println!(
                    "  raw -> clean:     -{} +{}",
                    diff.raw_to_clean.lines_removed.len(),
                    diff.raw_to_clean.lines_added.len()
                );
                println!(
                    "  clean -> summary: -{} +{}",
                    diff.clean_to_summary.lines_removed.len(),
                    diff.clean_to_summary.lines_added.len()
                );
            }
        }
    }

    Ok(())
}

/// Register the default model plus any explicitly requested ones.
fn build_dispatcher(store: &NoteStore, models: Option<&str>) -> Result<Dispatcher> {
    let default_model =
        std::env::var("NOTEMILL_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
    let timeout_secs: u64 = std::env::var("NOTEMILL_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(120);

    let mut names = vec![default_model.clone()];
    if let Some(models) = models {
        for name in models.split(',') {
            let name = name.trim().to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    let configs = names.into_iter().map(ModelConfig::new).collect();

    let client = Arc::new(OllamaClient::from_env());
    let dispatcher = Dispatcher::new(
        configs,
        default_model,
        client,
        Duration::from_secs(timeout_secs),
    )?
    .with_run_log(store.journal_root())?;
    Ok(dispatcher)
}

/// Encode every note's clean text into the vector store.
fn build_vectors(store: &NoteStore, json_root: &std::path::Path) -> Result<usize> {
    let mut vectors = VectorStore::open(json_root.join(VECTOR_STORE_FILE))?;
    let mut count = 0;
    for note_id in store.list_note_ids()? {
        let Ok(bundle) = store.load_note_bundle(&note_id) else {
            continue;
        };
        let Ok(clean) = bundle.latest_content(notemill_core::VariantType::CleanText) else {
            continue;
        };
        vectors.upsert(note_id, &clean);
        count += 1;
    }
    vectors.persist()?;
    Ok(count)
}
