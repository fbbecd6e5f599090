//! Audit lifecycle: draft → published → (re-edited) → deleted.
//!
//! A deleted audit has no row any more; only its trace remains, which is how
//! lookups tell "gone" apart from "never existed".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  audit::{Audit, AuditType},
  criteria::{Catalog, CriterionRef},
  result::CriterionStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
  Draft,
  Published,
}

impl Audit {
  pub fn status(&self) -> AuditStatus {
    if self.published_at.is_some() {
      AuditStatus::Published
    } else {
      AuditStatus::Draft
    }
  }
}

/// `true` iff none of the materialized results is `NOT_TESTED`.
///
/// Triples that were never materialized are not counted, so an audit with no
/// stored results at all is complete.
pub fn is_complete(statuses: impl IntoIterator<Item = CriterionStatus>) -> bool {
  not_tested_count(statuses) == 0
}

/// Statuses that count toward completion for an audit of `audit_type`.
///
/// Rows scored on a criterion outside the type's subset (left behind by a
/// type change) are dropped, the same way the results matrix and the report
/// ignore them.
pub fn scoped_statuses<'a>(
  catalog: &'a Catalog,
  audit_type: AuditType,
  rows: impl IntoIterator<Item = (CriterionRef, CriterionStatus)> + 'a,
) -> impl Iterator<Item = CriterionStatus> + 'a {
  rows
    .into_iter()
    .filter(move |(criterion, _)| catalog.contains(audit_type, *criterion))
    .map(|(_, status)| status)
}

fn not_tested_count(statuses: impl IntoIterator<Item = CriterionStatus>) -> usize {
  statuses
    .into_iter()
    .filter(|s| *s == CriterionStatus::NotTested)
    .count()
}

/// Timestamps an audit takes when published at `now`: the publication date is
/// set and the edition date cleared.
///
/// Fails with [`Error::AuditIncomplete`] when the completion check does not
/// pass.
pub fn publish(
  statuses: impl IntoIterator<Item = CriterionStatus>,
  now: DateTime<Utc>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
  match not_tested_count(statuses) {
    0 => Ok((Some(now), None)),
    not_tested => Err(Error::AuditIncomplete { not_tested }),
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;
  use crate::result::CriterionStatus::*;

  fn now() -> DateTime<Utc> { Utc.timestamp_opt(1_700_000_000, 0).unwrap() }

  #[test]
  fn no_results_is_vacuously_complete() {
    assert!(is_complete([]));
  }

  #[test]
  fn any_not_tested_result_is_incomplete() {
    assert!(is_complete([Compliant, NotApplicable, NotCompliant]));
    assert!(!is_complete([Compliant, NotTested]));
  }

  #[test]
  fn publish_sets_publication_and_clears_edition() {
    let (published_at, edited_at) = publish([Compliant, NotCompliant], now()).unwrap();
    assert_eq!(published_at, Some(now()));
    assert_eq!(edited_at, None);
  }

  #[test]
  fn publish_incomplete_audit_conflicts() {
    let err = publish([NotTested, Compliant, NotTested], now()).unwrap_err();
    assert!(matches!(err, Error::AuditIncomplete { not_tested: 2 }));
  }

  #[test]
  fn out_of_type_rows_do_not_count() {
    let catalog = Catalog::rgaa();
    let full_only = CriterionRef { topic: 4, criterion: 13 };
    let fast = CriterionRef { topic: 1, criterion: 1 };
    assert!(!catalog.contains(AuditType::Fast, full_only));

    let rows = [(full_only, NotTested), (fast, Compliant)];
    let scoped: Vec<_> = scoped_statuses(&catalog, AuditType::Fast, rows).collect();
    assert_eq!(scoped, vec![Compliant]);
    assert!(is_complete(scoped));

    let full: Vec<_> = scoped_statuses(&catalog, AuditType::Full, rows).collect();
    assert!(!is_complete(full));
  }

  #[test]
  fn status_follows_publication() {
    let transverse = crate::audit::AuditedPage {
      id:   1,
      name: "Transverse".into(),
      url:  String::new(),
    };
    let mut audit = Audit {
      edit_unique_id:    "edit".into(),
      consult_unique_id: "consult".into(),
      metadata:          crate::audit::AuditMetadata::new(AuditType::Fast, "Site"),
      created_at:        now(),
      published_at:      None,
      edited_at:         None,
      recipients:        Vec::new(),
      tools:             Vec::new(),
      environments:      Vec::new(),
      pages:             Vec::new(),
      transverse_page:   transverse,
    };
    assert_eq!(audit.status(), AuditStatus::Draft);
    audit.published_at = Some(now());
    assert_eq!(audit.status(), AuditStatus::Published);
  }
}
