//! Handlers for `/audits` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/audits` | Body: [`NewAudit`]; returns 201 + audit |
//! | `GET`    | `/audits/{edit}` | 404 unknown, 410 deleted |
//! | `PUT`    | `/audits/{edit}` | Body: [`AuditUpdate`]; full desired state |
//! | `DELETE` | `/audits/{edit}` | 204; image blobs removed best-effort |
//! | `PUT`    | `/audits/{edit}/publish` | 409 while results are not tested |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use ara_core::{
  audit::{Audit, AuditUpdate, NewAudit},
  store::AuditStore,
};

use crate::{ApiState, error::ApiError, validate};

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /audits`
pub async fn create<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Json(body): Json<NewAudit>,
) -> Result<impl IntoResponse, ApiError> {
  validate::new_audit(&body)?;
  let audit = state
    .store
    .create_audit(body)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(
    audit_type = audit.metadata.audit_type.as_ref(),
    pages = audit.pages.len(),
    "audit created"
  );
  Ok((StatusCode::CREATED, Json(audit)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /audits/{edit}`
pub async fn get_one<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
) -> Result<Json<Audit>, ApiError> {
  let audit = state.store.get_audit(edit).await.map_err(ApiError::from_store)?;
  Ok(Json(audit))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /audits/{edit}`
pub async fn update<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
  Json(body): Json<AuditUpdate>,
) -> Result<Json<Audit>, ApiError> {
  validate::audit_update(&body)?;
  let audit = state
    .store
    .update_audit(edit, body)
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(
    status = ?audit.status(),
    edited = audit.edited_at.is_some(),
    "audit updated"
  );
  Ok(Json(audit))
}

// ─── Publish ──────────────────────────────────────────────────────────────────

/// `PUT /audits/{edit}/publish`
pub async fn publish<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
) -> Result<Json<Audit>, ApiError> {
  let audit = state
    .store
    .publish_audit(edit, Arc::clone(&state.catalog))
    .await
    .map_err(ApiError::from_store)?;
  tracing::info!(status = ?audit.status(), "audit published");
  Ok(Json(audit))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /audits/{edit}`
pub async fn delete<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
) -> Result<StatusCode, ApiError> {
  let images = state
    .store
    .delete_audit(edit)
    .await
    .map_err(ApiError::from_store)?;
  let count = images.len();
  state.images.remove_all(images.into_iter().map(|i| i.key)).await;
  tracing::info!(images = count, "audit deleted");
  Ok(StatusCode::NO_CONTENT)
}
