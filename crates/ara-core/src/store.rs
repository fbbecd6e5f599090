//! The `AuditStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `ara-store-sqlite`).
//! The API layer depends on this abstraction, not on any concrete backend.
//!
//! Every operation addressed by a token that finds no live audit fails with
//! [`Error::AuditGone`](crate::Error::AuditGone) when the token's trace still
//! exists and [`Error::AuditNotFound`](crate::Error::AuditNotFound) otherwise.

use std::{future::Future, sync::Arc};

use crate::{
  audit::{Audit, AuditToken, AuditUpdate, NewAudit},
  criteria::Catalog,
  result::{CriterionResult, ExampleImage, NewImage, ResultKey, ResultUpdate},
};

/// An audit together with its materialized results.
#[derive(Debug, Clone)]
pub struct AuditResults {
  pub audit:   Audit,
  /// Only the stored rows; see [`crate::result::synthesize`] for the full
  /// matrix.
  pub results: Vec<CriterionResult>,
}

/// Abstraction over an audit store backend.
///
/// Each mutating method commits atomically: either every row change it implies
/// is visible afterwards or none is. Concurrent writers are last-write-wins.
pub trait AuditStore: Send + Sync {
  type Error: std::error::Error + Into<crate::Error> + Send + Sync + 'static;

  // ── Audits ────────────────────────────────────────────────────────────

  /// Persist a new audit with fresh edit/consult tokens, its transverse page
  /// and its permanent trace.
  fn create_audit(
    &self,
    input: NewAudit,
  ) -> impl Future<Output = Result<Audit, Self::Error>> + Send + '_;

  fn get_audit(
    &self,
    edit_id: String,
  ) -> impl Future<Output = Result<Audit, Self::Error>> + Send + '_;

  /// Replace the scalar fields and reconcile every nested collection so the
  /// stored state equals `update`. Stamps the edition date when the audit is
  /// already published.
  fn update_audit(
    &self,
    edit_id: String,
    update: AuditUpdate,
  ) -> impl Future<Output = Result<Audit, Self::Error>> + Send + '_;

  /// Publish the audit if the completion check passes. Only results on
  /// criteria of the audit's current type are counted.
  fn publish_audit(
    &self,
    edit_id: String,
    catalog: Arc<Catalog>,
  ) -> impl Future<Output = Result<Audit, Self::Error>> + Send + '_;

  /// Delete the audit and everything it owns. The trace survives. Returns the
  /// example images that were attached so their blobs can be removed.
  fn delete_audit(
    &self,
    edit_id: String,
  ) -> impl Future<Output = Result<Vec<ExampleImage>, Self::Error>> + Send + '_;

  // ── Results ───────────────────────────────────────────────────────────

  /// Read an audit and its stored results in one snapshot, by either token.
  fn fetch_results(
    &self,
    token: AuditToken,
  ) -> impl Future<Output = Result<AuditResults, Self::Error>> + Send + '_;

  /// Create or overwrite one result per update. Every referenced page must
  /// belong to the audit.
  fn upsert_results(
    &self,
    edit_id: String,
    updates: Vec<ResultUpdate>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Example images ────────────────────────────────────────────────────

  /// Record an uploaded image on a result, materializing the result as
  /// `NOT_TESTED` if it does not exist yet.
  fn attach_image(
    &self,
    edit_id: String,
    key: ResultKey,
    image: NewImage,
  ) -> impl Future<Output = Result<ExampleImage, Self::Error>> + Send + '_;

  /// Remove an image record and return it.
  fn detach_image(
    &self,
    edit_id: String,
    image_id: i64,
  ) -> impl Future<Output = Result<ExampleImage, Self::Error>> + Send + '_;
}
