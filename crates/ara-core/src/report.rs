//! Report aggregation: the public, read-only summary of an audit.
//!
//! The report is always derived from the stored results and the catalog; it
//! is never persisted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  audit::{Audit, AuditType, AuditedPage, TestEnvironment, Tool},
  criteria::{Catalog, CriterionRef},
  result::{CriterionResult, CriterionStatus, UserImpact},
};

pub const REFERENTIAL: &str = "RGAA Version 4.1";

// ─── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
  pub raw:        usize,
  pub percentage: f64,
}

impl Distribution {
  /// `raw` as a percentage of `total`; zero when `total` is zero.
  fn of(raw: usize, total: usize) -> Self {
    let percentage = if total == 0 {
      0.0
    } else {
      raw as f64 / total as f64 * 100.0
    };
    Self { raw, percentage }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusDistribution {
  pub compliant:      Distribution,
  pub not_applicable: Distribution,
  pub not_compliant:  Distribution,
}

impl StatusDistribution {
  fn count<'a>(
    results: impl IntoIterator<Item = &'a CriterionResult>,
    total: usize,
  ) -> Self {
    let (mut compliant, mut not_applicable, mut not_compliant) = (0, 0, 0);
    for r in results {
      match r.status {
        CriterionStatus::Compliant => compliant += 1,
        CriterionStatus::NotApplicable => not_applicable += 1,
        CriterionStatus::NotCompliant => not_compliant += 1,
        CriterionStatus::NotTested => {}
      }
    }
    Self {
      compliant:      Distribution::of(compliant, total),
      not_applicable: Distribution::of(not_applicable, total),
      not_compliant:  Distribution::of(not_compliant, total),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageDistribution {
  pub page_id:      i64,
  pub name:         String,
  pub url:          String,
  /// Percentages are relative to the catalog size of the audit type.
  #[serde(flatten)]
  pub distribution: StatusDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicDistribution {
  pub topic:        u8,
  pub title:        String,
  /// Percentages are relative to the number of results in the topic.
  #[serde(flatten)]
  pub distribution: StatusDistribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportContext {
  pub referential:  String,
  pub technologies: Vec<String>,
  pub tools:        Vec<Tool>,
  pub environments: Vec<TestEnvironment>,
  pub samples:      Vec<AuditedPage>,
}

/// Criterion-level counts. A criterion is aggregated over every page it was
/// scored on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaSummary {
  /// Criteria with at least one result other than `NOT_APPLICABLE`.
  pub applicable:     usize,
  /// Applicable criteria whose results are all `COMPLIANT` or
  /// `NOT_APPLICABLE`.
  pub compliant:      usize,
  pub not_applicable: usize,
  pub not_compliant:  usize,
}

impl CriteriaSummary {
  pub fn from_results(results: &[CriterionResult]) -> Self {
    let mut groups: BTreeMap<CriterionRef, Vec<CriterionStatus>> = BTreeMap::new();
    for r in results {
      groups.entry(r.criterion_ref()).or_default().push(r.status);
    }

    let mut summary = Self { applicable: 0, compliant: 0, not_applicable: 0, not_compliant: 0 };
    for statuses in groups.values() {
      let applicable = statuses.iter().any(|s| *s != CriterionStatus::NotApplicable);
      if !applicable {
        summary.not_applicable += 1;
        continue;
      }
      summary.applicable += 1;
      let compliant = statuses.iter().all(|s| {
        matches!(s, CriterionStatus::Compliant | CriterionStatus::NotApplicable)
      });
      if compliant {
        summary.compliant += 1;
      } else {
        summary.not_compliant += 1;
      }
    }
    summary
  }
}

/// `round(100 × compliant / applicable)`, or `None` when no criterion is
/// applicable.
pub fn accessibility_rate(compliant: usize, applicable: usize) -> Option<u8> {
  if applicable == 0 {
    return None;
  }
  Some((compliant as f64 / applicable as f64 * 100.0).round() as u8)
}

/// The public report served under the consult token. Carries no edit token
/// and no private notes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
  pub consult_unique_id:         String,
  pub audit_type:                AuditType,
  pub procedure_name:            String,
  pub procedure_url:             Option<String>,
  pub initiator:                 Option<String>,
  pub auditor_name:              Option<String>,
  pub auditor_email:             Option<String>,
  pub auditor_organisation:      Option<String>,
  pub contact_name:              Option<String>,
  pub contact_email:             Option<String>,
  pub contact_form_url:          Option<String>,
  pub not_compliant_content:     Option<String>,
  pub derogated_content:         Option<String>,
  pub not_in_scope_content:      Option<String>,
  pub created_at:                DateTime<Utc>,
  pub published_at:              Option<DateTime<Utc>>,
  pub edited_at:                 Option<DateTime<Utc>>,
  pub context:                   ReportContext,
  pub total_criteria_count:      usize,
  pub applicable_criteria_count: usize,
  pub compliant_criteria_count:  usize,
  pub accessibility_rate:        Option<u8>,
  pub error_count:               usize,
  pub blocking_error_count:      usize,
  /// Criterion-level distribution over the catalog size.
  pub result_distribution:       StatusDistribution,
  pub page_distributions:        Vec<PageDistribution>,
  pub topic_distributions:       Vec<TopicDistribution>,
  pub transverse_page:           AuditedPage,
  pub results:                   Vec<CriterionResult>,
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

/// Compute the report for `audit` from its stored `results`.
///
/// Results whose criterion is outside the catalog subset of the audit type
/// are ignored.
pub fn build(audit: &Audit, results: Vec<CriterionResult>, catalog: &Catalog) -> Report {
  let audit_type = audit.metadata.audit_type;
  let total = catalog.count(audit_type);
  let results: Vec<CriterionResult> = results
    .into_iter()
    .filter(|r| catalog.contains(audit_type, r.criterion_ref()))
    .collect();

  let summary = CriteriaSummary::from_results(&results);

  let result_distribution = StatusDistribution {
    compliant:      Distribution::of(summary.compliant, total),
    not_applicable: Distribution::of(summary.not_applicable, total),
    not_compliant:  Distribution::of(summary.not_compliant, total),
  };

  let page_distributions = audit
    .pages
    .iter()
    .chain(std::iter::once(&audit.transverse_page))
    .map(|page| PageDistribution {
      page_id:      page.id,
      name:         page.name.clone(),
      url:          page.url.clone(),
      distribution: StatusDistribution::count(
        results.iter().filter(|r| r.page_id == page.id),
        total,
      ),
    })
    .collect();

  let topic_distributions = catalog
    .topics
    .iter()
    .filter(|t| t.criteria.iter().any(|c| c.audit_type <= audit_type))
    .map(|t| {
      let in_topic: Vec<&CriterionResult> =
        results.iter().filter(|r| r.topic == t.number).collect();
      TopicDistribution {
        topic:        t.number,
        title:        t.title.clone(),
        distribution: StatusDistribution::count(in_topic.iter().copied(), in_topic.len()),
      }
    })
    .collect();

  let errors = results
    .iter()
    .filter(|r| r.status == CriterionStatus::NotCompliant);
  let error_count = errors.clone().count();
  let blocking_error_count = errors
    .filter(|r| r.user_impact == Some(UserImpact::Blocking))
    .count();

  let meta = &audit.metadata;
  Report {
    consult_unique_id: audit.consult_unique_id.clone(),
    audit_type,
    procedure_name: meta.procedure_name.clone(),
    procedure_url: meta.procedure_url.clone(),
    initiator: meta.initiator.clone(),
    auditor_name: meta.auditor_name.clone(),
    auditor_email: meta.auditor_email.clone(),
    auditor_organisation: meta.auditor_organisation.clone(),
    contact_name: meta.contact_name.clone(),
    contact_email: meta.contact_email.clone(),
    contact_form_url: meta.contact_form_url.clone(),
    not_compliant_content: meta.not_compliant_content.clone(),
    derogated_content: meta.derogated_content.clone(),
    not_in_scope_content: meta.not_in_scope_content.clone(),
    created_at: audit.created_at,
    published_at: audit.published_at,
    edited_at: audit.edited_at,
    context: ReportContext {
      referential:  REFERENTIAL.to_owned(),
      technologies: meta.technologies.clone(),
      tools:        audit.tools.clone(),
      environments: audit.environments.clone(),
      samples:      audit.pages.clone(),
    },
    total_criteria_count: total,
    applicable_criteria_count: summary.applicable,
    compliant_criteria_count: summary.compliant,
    accessibility_rate: accessibility_rate(summary.compliant, summary.applicable),
    error_count,
    blocking_error_count,
    result_distribution,
    page_distributions,
    topic_distributions,
    transverse_page: audit.transverse_page.clone(),
    results,
  }
}
