//! `GET /criteria[?audit_type=FAST|COMPLEMENTARY|FULL]` — the catalog, optionally
//! narrowed to the criteria one audit type is scored against.

use axum::{
  Json,
  extract::{Query, State},
};
use ara_core::{audit::AuditType, criteria::Catalog, store::AuditStore};
use serde::Deserialize;

use crate::ApiState;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub audit_type: Option<AuditType>,
}

pub async fn list<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Json<Catalog> {
  let mut catalog = state.catalog.as_ref().clone();
  if let Some(audit_type) = params.audit_type {
    for topic in &mut catalog.topics {
      topic.criteria.retain(|c| c.audit_type <= audit_type);
    }
    catalog.topics.retain(|t| !t.criteria.is_empty());
  }
  Json(catalog)
}
