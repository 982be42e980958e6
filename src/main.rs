use anyhow::Context;
use clap::{Parser, Subcommand};
use findora::catalog::{self, CatalogEntry};
use findora::{EngineConfig, ItemId, Match, MatchEngine, MatchStorage, MatchStore, MemoryMatchStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Lost-and-found match engine
#[derive(Parser, Debug)]
#[command(name = "findora")]
#[command(about = "Match lost and found item reports", long_about = None)]
struct Args {
    /// Log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Match every report in a catalog file and print the matches as JSON
    Match {
        /// JSON array of reports
        #[arg(long)]
        catalog: PathBuf,

        /// Directory image paths are resolved against (default: the catalog's directory)
        #[arg(long)]
        images: Option<PathBuf>,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Persist matches under this directory
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Override the confidence floor
        #[arg(long)]
        min_confidence: Option<f32>,
    },

    /// Watch an inbox directory and match new reports as they arrive
    Agent {
        /// Directory polled for `*.json` reports
        #[arg(long)]
        inbox: PathBuf,

        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,

        /// Engine configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Match storage directory
        #[arg(short, long, default_value = "./data")]
        data_dir: PathBuf,
    },
}

#[derive(Serialize)]
struct ItemMatches {
    item_id: ItemId,
    matches: Vec<Match>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level.as_str()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Findora v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Match { catalog, images, config, data_dir, min_confidence } => {
            tokio::task::spawn_blocking(move || {
                run_match(&catalog, images, config, data_dir, min_confidence)
            })
            .await??;
        }
        Command::Agent { inbox, interval, config, data_dir } => {
            run_agent(inbox, interval, config, data_dir).await?;
        }
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

fn run_match(
    catalog_path: &Path,
    images: Option<PathBuf>,
    config: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    min_confidence: Option<f32>,
) -> anyhow::Result<()> {
    let mut config = load_config(config.as_deref())?;
    if let Some(floor) = min_confidence {
        config.similarity.thresholds.min_confidence = floor;
    }

    let storage = match &data_dir {
        Some(dir) => Some(Arc::new(
            MatchStorage::open(dir).with_context(|| format!("opening {}", dir.display()))?,
        )),
        None => None,
    };
    let store: Arc<dyn MatchStore> = match &storage {
        Some(storage) => storage.clone(),
        None => Arc::new(MemoryMatchStore::new()),
    };

    let engine = MatchEngine::new(config, store).context("invalid configuration")?;

    let entries: Vec<CatalogEntry> = catalog::load_catalog(catalog_path)
        .with_context(|| format!("reading catalog {}", catalog_path.display()))?;
    let image_dir = images.unwrap_or_else(|| {
        catalog_path.parent().map(Path::to_path_buf).unwrap_or_default()
    });
    info!("Matching {} reports", entries.len());

    let ids = catalog::submit_catalog(&engine, entries, &image_dir)?;
    engine.wait_idle();

    let output: Vec<ItemMatches> = ids
        .into_iter()
        .map(|item_id| ItemMatches { matches: engine.matches_for(&item_id), item_id })
        .collect();
    serde_json::to_writer_pretty(std::io::stdout().lock(), &output)?;
    println!();

    let stats = engine.stats();
    info!(
        "Done: {} matches ({} high confidence), {} failed runs",
        stats.matches,
        stats.high_confidence_matches,
        engine.failed_runs()
    );

    engine.shutdown();
    if let Some(storage) = storage {
        storage.save().context("saving match snapshot")?;
    }
    Ok(())
}

async fn run_agent(
    inbox: PathBuf,
    interval: u64,
    config: Option<PathBuf>,
    data_dir: PathBuf,
) -> anyhow::Result<()> {
    let config = load_config(config.as_deref())?;
    std::fs::create_dir_all(&inbox).with_context(|| format!("creating {}", inbox.display()))?;

    let storage = Arc::new(
        MatchStorage::open(&data_dir).with_context(|| format!("opening {}", data_dir.display()))?,
    );
    let engine = Arc::new(MatchEngine::new(config, storage.clone())?);
    info!("Inbox: {:?}", inbox);
    info!("Data directory: {:?}", data_dir);

    let replayed = {
        let engine = engine.clone();
        let inbox = inbox.clone();
        tokio::task::spawn_blocking(move || {
            let replayed = catalog::replay_processed(&engine, &inbox)?;
            engine.wait_idle();
            Ok::<_, findora::Error>(replayed)
        })
        .await??
    };
    info!("Restored {} reports, {} stored matches", replayed, storage.len());

    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown signal received");
                break;
            }
            _ = ticker.tick() => {
                let pass_engine = engine.clone();
                let pass_storage = storage.clone();
                let inbox = inbox.clone();
                let result = tokio::task::spawn_blocking(move || {
                    let pass = catalog::drain_inbox(&pass_engine, &inbox)?;
                    if pass.submitted > 0 {
                        pass_engine.wait_idle();
                        pass_storage.save()?;
                    }
                    Ok::<_, findora::Error>(pass)
                })
                .await?;

                match result {
                    Ok(pass) if pass.submitted + pass.rejected > 0 => {
                        let stats = engine.stats();
                        info!(
                            "Processed {} reports ({} rejected); {} matches, {} high confidence",
                            pass.submitted,
                            pass.rejected,
                            stats.matches,
                            stats.high_confidence_matches
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!("Inbox pass failed: {}", e),
                }
            }
        }
    }

    info!("Shutting down...");
    tokio::task::spawn_blocking(move || {
        engine.shutdown();
        storage.save()
    })
    .await?
    .context("saving match snapshot")?;
    Ok(())
}
