//! tendersift — extract procurement tenders into canonical JSON records.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;

fn print_help() {
    println!("tendersift — tender extraction and reconciliation");
    println!();
    println!("Usage: tendersift <command> [args]");
    println!();
    println!("Commands:");
    println!("  extract <files...> [--out DIR] [--db DIR]   Extract records from documents");
    println!("  validate <extraction.json>                  Check a record against the schema");
    println!("  records <db-dir>                            List records persisted by extract --db");
    println!("  help                                        Show this message");
    println!();
    println!("Environment:");
    println!("  TENDERSIFT_CONFIG          Pipeline config JSON (default: tendersift.json)");
    println!("  TENDERSIFT_LLM_CONFIG      Provider config JSON (default: llm-config.json)");
    println!("  TENDERSIFT_USE_LLM         Enable/disable the generative passes");
    println!("  TENDERSIFT_USE_RAG         Enable/disable retrieval context");
    println!("  TENDERSIFT_MAX_CONCURRENCY Documents processed in parallel");
    println!("  RUST_LOG                   Log filter (default: info)");
}

fn env_path(name: &str, default: &str) -> PathBuf {
    std::env::var(name)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "extract" => {
            let opts = match commands::ExtractArgs::parse(&args[2..]) {
                Ok(opts) => opts,
                Err(msg) => {
                    eprintln!("{}", msg);
                    eprintln!("Usage: tendersift extract <files...> [--out DIR] [--db DIR]");
                    std::process::exit(2);
                }
            };
            let failed = run_extract(opts).await?;
            std::process::exit(if failed == 0 { 0 } else { 1 });
        }
        "validate" => {
            let Some(path) = args.get(2) else {
                eprintln!("Usage: tendersift validate <extraction.json>");
                std::process::exit(2);
            };
            let config = tendersift_core::PipelineConfig::load(env_path(
                "TENDERSIFT_CONFIG",
                "tendersift.json",
            ))?;
            let problems = commands::validate_file(&PathBuf::from(path), &config.categories)?;
            if problems.is_empty() {
                println!("{}: ok", path);
                return Ok(());
            }
            for problem in &problems {
                println!("{}: {}", path, problem);
            }
            std::process::exit(1);
        }
        "records" => {
            let Some(db_dir) = args.get(2) else {
                eprintln!("Usage: tendersift records <db-dir>");
                std::process::exit(2);
            };
            let store = tendersift_store::SqliteStore::open(db_dir)?;
            for line in commands::records_report(&store)? {
                println!("{}", line);
            }
            Ok(())
        }
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_help();
            std::process::exit(2);
        }
    }
}

/// Returns the number of documents that failed.
async fn run_extract(opts: commands::ExtractArgs) -> anyhow::Result<usize> {
    use tendersift_core::PipelineConfig;
    use tendersift_llm::{HttpCompletion, LLMConfig};
    use tendersift_resolve::SqliteRetriever;
    use tendersift_runtime::{BatchRunner, TenderPipeline};
    use tendersift_store::SqliteStore;
    use tokio_util::sync::CancellationToken;

    let config = PipelineConfig::load(env_path("TENDERSIFT_CONFIG", "tendersift.json"))?;
    let mut pipeline = TenderPipeline::new(config.clone());

    if config.use_llm_extract || config.use_llm_eval {
        let llm_config = LLMConfig::load(&env_path("TENDERSIFT_LLM_CONFIG", "llm-config.json"));
        match llm_config.resolve_provider() {
            Some(provider) => {
                info!("LLM provider: {} ({})", provider.provider, provider.model);
                let backend = HttpCompletion::new(
                    provider,
                    config.llm_timeout_secs,
                    config.max_response_bytes,
                )?;
                pipeline = pipeline.with_completion(Arc::new(backend));
            }
            None => warn!("No LLM provider configured; running pattern extraction only"),
        }
    }

    if let Some(db_dir) = &opts.db_dir {
        let store = Arc::new(SqliteStore::open(db_dir)?);
        info!("Store opened at {}", store.db_path().display());
        pipeline = pipeline
            .with_retriever(Arc::new(SqliteRetriever::new(Arc::clone(&store))))
            .with_store(store);
    }

    let documents = commands::read_documents(&opts.files);
    if documents.is_empty() {
        anyhow::bail!("no readable input files");
    }
    let unreadable = opts.files.len() - documents.len();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing documents in flight");
            on_signal.cancel();
        }
    });

    let report = BatchRunner::new(Arc::new(pipeline))
        .on_progress(|p| {
            info!(
                "[{}/{}] {}{}",
                p.done,
                p.total,
                p.filename,
                if p.failed { " (failed)" } else { "" }
            )
        })
        .run(documents, cancel)
        .await;

    std::fs::create_dir_all(&opts.out_dir)?;
    for analysis in &report.analyses {
        let dir = commands::write_artifacts(&opts.out_dir, analysis)?;
        info!("Wrote {}", dir.display());
    }

    println!(
        "{} completed, {} failed, {} cancelled, {} unreadable",
        report.completed, report.failed, report.cancelled, unreadable
    );
    Ok(report.failed + unreadable)
}
