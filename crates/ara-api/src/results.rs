//! Handlers for `/audits/{edit}/results`.
//!
//! `GET` returns the complete matrix: one entry per page (transverse page
//! last) and catalog criterion of the audit type, untouched combinations
//! filled in as `NOT_TESTED`. `PATCH` upserts a batch and returns 204.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use ara_core::{
  audit::AuditToken,
  result::{CriterionResult, ResultUpdate, synthesize},
  store::AuditStore,
};

use crate::{ApiState, error::ApiError, validate};

/// `GET /audits/{edit}/results`
pub async fn matrix<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
) -> Result<Json<Vec<CriterionResult>>, ApiError> {
  let fetched = state
    .store
    .fetch_results(AuditToken::Edit(edit))
    .await
    .map_err(ApiError::from_store)?;
  let audit = &fetched.audit;
  Ok(Json(synthesize(
    &audit.page_ids(),
    &state.catalog,
    audit.metadata.audit_type,
    fetched.results,
  )))
}

/// `PATCH /audits/{edit}/results` — body: `[ResultUpdate, ...]`
pub async fn update<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
  Json(body): Json<Vec<ResultUpdate>>,
) -> Result<StatusCode, ApiError> {
  let audit = state
    .store
    .get_audit(edit.clone())
    .await
    .map_err(ApiError::from_store)?;
  validate::result_updates(&state.catalog, audit.metadata.audit_type, &body)?;

  let count = body.len();
  state
    .store
    .upsert_results(edit, body)
    .await
    .map_err(ApiError::from_store)?;
  tracing::debug!(count, "results updated");
  Ok(StatusCode::NO_CONTENT)
}
