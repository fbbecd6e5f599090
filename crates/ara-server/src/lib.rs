//! HTTP server assembly for Ara: configuration, catalog loading and the
//! top-level router.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use ara_api::{ApiState, api_router};
use ara_core::{criteria::Catalog, store::AuditStore};
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and `ARA_*`
/// environment variables. Every field has a default.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub database_path:    PathBuf,
  /// Root directory for example image blobs.
  pub uploads_dir:      PathBuf,
  /// JSON catalog replacing the built-in RGAA 4.1 criteria.
  pub catalog_path:     Option<PathBuf>,
  pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      host:             "127.0.0.1".to_string(),
      port:             8080,
      database_path:    PathBuf::from("ara.db"),
      uploads_dir:      PathBuf::from("uploads"),
      catalog_path:     None,
      max_upload_bytes: 10 * 1024 * 1024,
    }
  }
}

impl ServerConfig {
  /// Layer the optional TOML file at `path` under `ARA_*` environment
  /// variables.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("ARA").try_parsing(true))
      .build()
      .context("failed to read config file")?;

    settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

/// The configured catalog, or the built-in one.
pub fn load_catalog(path: Option<&Path>) -> anyhow::Result<Catalog> {
  let Some(path) = path else {
    return Ok(Catalog::rgaa());
  };
  let json = std::fs::read_to_string(path)
    .with_context(|| format!("failed to read catalog at {path:?}"))?;
  Catalog::from_json(&json).with_context(|| format!("invalid catalog at {path:?}"))
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The complete application: the API under `/api`, with request tracing.
pub fn app<S>(state: ApiState<S>) -> Router
where
  S: AuditStore + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use ara_api::ImageStorage;
  use ara_store_sqlite::SqliteStore;
  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;

  use super::*;

  fn from_toml(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    assert_eq!(from_toml(""), ServerConfig::default());
    assert_eq!(ServerConfig::default().address(), "127.0.0.1:8080");
  }

  #[test]
  fn config_overrides_fields() {
    let cfg = from_toml(
      r#"
        port = 9000
        database_path = "~/ara/audits.db"
        catalog_path = "rgaa.json"
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.database_path, PathBuf::from("~/ara/audits.db"));
    assert_eq!(cfg.catalog_path, Some(PathBuf::from("rgaa.json")));
    assert_eq!(cfg.max_upload_bytes, 10 * 1024 * 1024);
  }

  #[test]
  fn expand_tilde_leaves_plain_paths() {
    assert_eq!(expand_tilde(Path::new("/var/ara.db")), PathBuf::from("/var/ara.db"));
    assert_eq!(expand_tilde(Path::new("ara.db")), PathBuf::from("ara.db"));
  }

  #[test]
  fn builtin_catalog_without_path() {
    let catalog = load_catalog(None).unwrap();
    assert_eq!(catalog.topics.len(), 13);
    assert!(load_catalog(Some(Path::new("/nonexistent/catalog.json"))).is_err());
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    let state = ApiState {
      store:   Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      catalog: Arc::new(Catalog::rgaa()),
      images:  Arc::new(ImageStorage::new(std::env::temp_dir(), 1024)),
    };

    let req = Request::builder().uri("/api/criteria").body(Body::empty()).unwrap();
    let resp = app(state.clone()).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().uri("/criteria").body(Body::empty()).unwrap();
    let resp = app(state).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }
}
