//! ara-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, and serves the audit API over HTTP.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use ara_api::{ApiState, ImageStorage};
use ara_server::{ServerConfig, app, expand_tilde, load_catalog};
use ara_store_sqlite::SqliteStore;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Ara accessibility audit server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let server_cfg = ServerConfig::load(&cli.config)?;

  let catalog_path = server_cfg.catalog_path.as_deref().map(expand_tilde);
  let catalog = load_catalog(catalog_path.as_deref())?;

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.database_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let uploads_dir = expand_tilde(&server_cfg.uploads_dir);
  tokio::fs::create_dir_all(&uploads_dir)
    .await
    .with_context(|| format!("failed to create uploads dir {uploads_dir:?}"))?;

  let state = ApiState {
    store:   Arc::new(store),
    catalog: Arc::new(catalog),
    images:  Arc::new(ImageStorage::new(uploads_dir, server_cfg.max_upload_bytes)),
  };

  let address = server_cfg.address();
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app(state)).await.context("server error")?;

  Ok(())
}
