//! Error types for `ara-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// No live audit and no trace for this token: it was never issued.
  #[error("audit not found: {0}")]
  AuditNotFound(String),

  /// The token was issued once but its audit has since been deleted.
  #[error("audit {0} has been deleted")]
  AuditGone(String),

  #[error("audit cannot be published: {not_tested} criteria are not tested")]
  AuditIncomplete { not_tested: usize },

  #[error("page {0} does not belong to this audit")]
  UnknownPage(i64),

  #[error("criterion {topic}.{criterion} is not part of this audit")]
  UnknownCriterion { topic: u8, criterion: u8 },

  #[error("example image not found: {0}")]
  ImageNotFound(i64),

  #[error("invalid payload: {0}")]
  Invalid(String),

  #[error("catalog error: {0}")]
  Catalog(#[from] serde_json::Error),

  /// Any other backend failure. Never recovered locally.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
