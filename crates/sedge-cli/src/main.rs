//! `sedge` binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and either ingests a directory tree of SEC JSON
//! documents or serves the read-only API.
//!
//! ```text
//! sedge ingest [--root data/]
//! sedge serve [--ingest]
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use sedge_core::report::RunState;
use sedge_ingest::Pipeline;
use sedge_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "SEC filing-data ingestion and query")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest every JSON document under the data root, idempotently.
  Ingest {
    /// Directory to scan; overrides `data_root` from the config file.
    #[arg(long)]
    root: Option<PathBuf>,
  },
  /// Serve the read-only JSON API.
  Serve {
    /// Also run an ingest pass in the background; progress is visible at
    /// `/api/status`.
    #[arg(long)]
    ingest: bool,
  },
}

/// Runtime configuration, deserialised from `config.toml` with a `SEDGE_`
/// environment override layer.
#[derive(Debug, Clone, Deserialize)]
struct Settings {
  host:       String,
  port:       u16,
  store_path: PathBuf,
  data_root:  PathBuf,
}

fn load_settings(path: &Path) -> anyhow::Result<Settings> {
  let settings = config::Config::builder()
    .set_default("host", "127.0.0.1")?
    .set_default("port", 8080)?
    .set_default("store_path", "sedge.db")?
    .set_default("data_root", "data")?
    .add_source(config::File::from(path.to_path_buf()).required(false))
    .add_source(config::Environment::with_prefix("SEDGE"))
    .build()
    .context("failed to read config file")?;

  settings
    .try_deserialize()
    .context("failed to deserialise settings")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = load_settings(&cli.config)?;

  let store = SqliteStore::open(&settings.store_path)
    .await
    .with_context(|| {
      format!("failed to open store at {:?}", settings.store_path)
    })?;
  let store = Arc::new(store);

  match cli.command {
    Command::Ingest { root } => {
      let root = root.unwrap_or_else(|| settings.data_root.clone());
      run_ingest(store, &root).await
    },
    Command::Serve { ingest } => serve(store, &settings, ingest).await,
  }
}

async fn run_ingest(
  store: Arc<SqliteStore>,
  root: &Path,
) -> anyhow::Result<()> {
  let pipeline = Pipeline::new(store);

  // Ctrl-C requests cooperative cancellation; the current file finishes and
  // the run ends in the `cancelled` state, resumable later.
  let cancel = pipeline.cancel_handle();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      tracing::warn!("cancellation requested, finishing current file");
      cancel.store(true, std::sync::atomic::Ordering::Relaxed);
    }
  });

  let status = pipeline
    .run(root)
    .await
    .with_context(|| format!("ingest failed for {root:?}"))?;

  tracing::info!(
    state = ?status.state,
    files_done = status.files_done,
    files_skipped = status.files_skipped,
    files_failed = status.files_failed,
    inserted = status.report.inserted,
    duplicates = status.report.skipped_duplicate,
    "ingest complete"
  );
  if !status.skip_reasons.is_empty() {
    for (reason, count) in &status.skip_reasons.counts {
      let samples = status.skip_reasons.samples[reason].join(", ");
      tracing::warn!(%reason, count, samples = %samples, "files skipped");
    }
  }

  if status.state == RunState::Cancelled {
    anyhow::bail!("run cancelled before completion");
  }
  Ok(())
}

async fn serve(
  store: Arc<SqliteStore>,
  settings: &Settings,
  ingest: bool,
) -> anyhow::Result<()> {
  let pipeline = Pipeline::new(Arc::clone(&store));
  let status = pipeline.subscribe();

  if ingest {
    let root = settings.data_root.clone();
    tokio::spawn(async move {
      if let Err(e) = pipeline.run(&root).await {
        tracing::error!(error = %e, "background ingest failed");
      }
    });
  }

  let app = axum::Router::new()
    .nest("/api", sedge_api::api_router(store, status))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", settings.host, settings.port);
  tracing::info!("listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
