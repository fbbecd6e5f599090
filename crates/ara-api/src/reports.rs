//! `GET /reports/{consult}` — the read-only report behind a consult token.

use axum::{
  Json,
  extract::{Path, State},
};
use ara_core::{
  audit::AuditToken,
  report::{self, Report},
  store::AuditStore,
};

use crate::{ApiState, error::ApiError};

pub async fn get_one<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(consult): Path<String>,
) -> Result<Json<Report>, ApiError> {
  let fetched = state
    .store
    .fetch_results(AuditToken::Consult(consult))
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(report::build(&fetched.audit, fetched.results, &state.catalog)))
}
