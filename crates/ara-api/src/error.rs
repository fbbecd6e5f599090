//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("gone: {0}")]
  Gone(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error through the domain taxonomy.
  pub fn from_store<E: Into<ara_core::Error>>(e: E) -> Self { Self::from(e.into()) }
}

impl From<ara_core::Error> for ApiError {
  fn from(e: ara_core::Error) -> Self {
    use ara_core::Error as E;
    match e {
      E::AuditNotFound(_) | E::ImageNotFound(_) => ApiError::NotFound(e.to_string()),
      E::AuditGone(_) => ApiError::Gone(e.to_string()),
      E::AuditIncomplete { .. } => ApiError::Conflict(e.to_string()),
      E::UnknownPage(_) | E::UnknownCriterion { .. } | E::Invalid(_) => {
        ApiError::BadRequest(e.to_string())
      }
      E::Catalog(_) | E::Store(_) => ApiError::Store(Box::new(e)),
    }
  }
}

impl From<std::io::Error> for ApiError {
  fn from(e: std::io::Error) -> Self { ApiError::Store(Box::new(e)) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Gone(m) => (StatusCode::GONE, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
