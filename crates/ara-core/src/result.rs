//! Per-criterion results and the lazy materialization policy.
//!
//! A result row exists only once a `(page, topic, criterion)` triple has been
//! scored. Reads synthesize the complete matrix, filling every missing triple
//! with a `NOT_TESTED` placeholder.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

use crate::{
  audit::AuditType,
  criteria::{Catalog, CriterionRef},
};

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CriterionStatus {
  Compliant,
  NotCompliant,
  NotApplicable,
  #[default]
  NotTested,
}

/// How badly a non-compliance affects users.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum UserImpact {
  Minor,
  Major,
  Blocking,
}

/// A screenshot illustrating a result. The bytes live in the object store;
/// only the key and metadata are recorded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleImage {
  pub id:                i64,
  /// Object-store key.
  pub key:               String,
  pub original_filename: String,
  pub mime_type:         String,
  pub size:              u64,
  /// SHA-256 hex digest of the bytes.
  pub content_hash:      String,
  pub created_at:        DateTime<Utc>,
}

/// Input to [`crate::store::AuditStore::attach_image`]; the blob has already
/// been written under `key`.
#[derive(Debug, Clone)]
pub struct NewImage {
  pub key:               String,
  pub original_filename: String,
  pub mime_type:         String,
  pub size:              u64,
  pub content_hash:      String,
}

/// The judgement for one `(page, topic, criterion)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionResult {
  pub page_id:                i64,
  pub topic:                  u8,
  pub criterion:              u8,
  pub status:                 CriterionStatus,
  pub compliant_comment:      Option<String>,
  pub not_compliant_comment:  Option<String>,
  pub not_applicable_comment: Option<String>,
  pub user_impact:            Option<UserImpact>,
  #[serde(default)]
  pub quick_win:              bool,
  #[serde(default)]
  pub example_images:         Vec<ExampleImage>,
}

impl CriterionResult {
  /// The placeholder returned for a triple that has never been scored.
  pub fn not_tested(page_id: i64, criterion: CriterionRef) -> Self {
    Self {
      page_id,
      topic: criterion.topic,
      criterion: criterion.criterion,
      status: CriterionStatus::NotTested,
      compliant_comment: None,
      not_compliant_comment: None,
      not_applicable_comment: None,
      user_impact: None,
      quick_win: false,
      example_images: Vec::new(),
    }
  }

  pub fn criterion_ref(&self) -> CriterionRef {
    CriterionRef { topic: self.topic, criterion: self.criterion }
  }
}

/// One element of a results batch update. Overwrites every field of the
/// addressed result (or creates it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultUpdate {
  pub page_id:                i64,
  pub topic:                  u8,
  pub criterion:              u8,
  pub status:                 CriterionStatus,
  pub compliant_comment:      Option<String>,
  pub not_compliant_comment:  Option<String>,
  pub not_applicable_comment: Option<String>,
  pub user_impact:            Option<UserImpact>,
  #[serde(default)]
  pub quick_win:              bool,
}

impl ResultUpdate {
  pub fn criterion_ref(&self) -> CriterionRef {
    CriterionRef { topic: self.topic, criterion: self.criterion }
  }
}

/// Address of a single result, used when attaching example images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultKey {
  pub page_id:   i64,
  pub topic:     u8,
  pub criterion: u8,
}

/// Build the complete result matrix for `page_ids` × the catalog subset of
/// `audit_type`.
///
/// Stored rows override placeholders at matching triples. Stored rows whose
/// page or criterion falls outside the matrix are dropped, so the output
/// always holds exactly `page_ids.len() * catalog.count(audit_type)` entries,
/// ordered by page then catalog order.
pub fn synthesize(
  page_ids: &[i64],
  catalog: &Catalog,
  audit_type: AuditType,
  stored: Vec<CriterionResult>,
) -> Vec<CriterionResult> {
  let mut by_triple: HashMap<(i64, CriterionRef), CriterionResult> = stored
    .into_iter()
    .map(|r| ((r.page_id, r.criterion_ref()), r))
    .collect();

  let criteria: Vec<CriterionRef> = catalog.criteria(audit_type).collect();
  let mut matrix = Vec::with_capacity(page_ids.len() * criteria.len());
  for &page_id in page_ids {
    for &c in &criteria {
      matrix.push(
        by_triple
          .remove(&(page_id, c))
          .unwrap_or_else(|| CriterionResult::not_tested(page_id, c)),
      );
    }
  }
  matrix
}

#[cfg(test)]
mod tests {
  use super::*;

  fn stored(page_id: i64, topic: u8, criterion: u8, status: CriterionStatus) -> CriterionResult {
    CriterionResult {
      status,
      compliant_comment: Some("ok".into()),
      ..CriterionResult::not_tested(page_id, CriterionRef { topic, criterion })
    }
  }

  #[test]
  fn matrix_covers_every_page_and_criterion() {
    let catalog = Catalog::rgaa();
    let matrix = synthesize(&[1, 2, 3], &catalog, AuditType::Fast, vec![]);
    assert_eq!(matrix.len(), 3 * 25);
    assert!(matrix.iter().all(|r| r.status == CriterionStatus::NotTested));
    assert!(matrix.iter().all(|r| r.compliant_comment.is_none()));
  }

  #[test]
  fn stored_rows_override_placeholders() {
    let catalog = Catalog::rgaa();
    let matrix = synthesize(
      &[10, 20],
      &catalog,
      AuditType::Fast,
      vec![stored(20, 1, 1, CriterionStatus::Compliant)],
    );
    assert_eq!(matrix.len(), 50);

    let hit = matrix
      .iter()
      .find(|r| r.page_id == 20 && r.topic == 1 && r.criterion == 1)
      .unwrap();
    assert_eq!(hit.status, CriterionStatus::Compliant);
    assert_eq!(hit.compliant_comment.as_deref(), Some("ok"));

    let other_page = matrix
      .iter()
      .find(|r| r.page_id == 10 && r.topic == 1 && r.criterion == 1)
      .unwrap();
    assert_eq!(other_page.status, CriterionStatus::NotTested);
  }

  #[test]
  fn rows_outside_the_audit_type_are_dropped() {
    let catalog = Catalog::rgaa();
    // 4.13 only belongs to full audits.
    let matrix = synthesize(
      &[1],
      &catalog,
      AuditType::Fast,
      vec![stored(1, 4, 13, CriterionStatus::NotCompliant)],
    );
    assert_eq!(matrix.len(), 25);
    assert!(!matrix.iter().any(|r| r.topic == 4 && r.criterion == 13));
  }

  #[test]
  fn matrix_is_ordered_by_page_then_catalog() {
    let catalog = Catalog::rgaa();
    let matrix = synthesize(&[7, 3], &catalog, AuditType::Fast, vec![]);
    assert_eq!(matrix[0].page_id, 7);
    assert_eq!(matrix[25].page_id, 3);
    assert_eq!((matrix[0].topic, matrix[0].criterion), (1, 1));
    assert_eq!((matrix[24].topic, matrix[24].criterion), (13, 1));
  }
}
