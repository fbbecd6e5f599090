//! Audit — the aggregate root that owns pages, recipients, tools and test
//! environments.
//!
//! An audit is addressed from the outside only through its two opaque tokens:
//! the edit token (mutations) and the consult token (read-only report).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

// ─── Audit type ──────────────────────────────────────────────────────────────

/// How much of the criteria catalog an audit covers.
///
/// Variants are ordered: every criterion of a smaller audit type is also part
/// of every larger one.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditType {
  Fast,
  Complementary,
  Full,
}

// ─── Scalar fields ───────────────────────────────────────────────────────────

/// The editable scalar fields of an audit. Shared by the read model, the
/// creation payload and the update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetadata {
  pub audit_type:            AuditType,
  pub procedure_name:        String,
  pub procedure_url:         Option<String>,
  pub initiator:             Option<String>,
  pub auditor_name:          Option<String>,
  pub auditor_email:         Option<String>,
  pub auditor_organisation:  Option<String>,
  pub contact_name:          Option<String>,
  pub contact_email:         Option<String>,
  pub contact_form_url:      Option<String>,
  #[serde(default)]
  pub technologies:          Vec<String>,
  pub not_compliant_content: Option<String>,
  pub derogated_content:     Option<String>,
  pub not_in_scope_content:  Option<String>,
  /// Private auditor notes; never part of the public report.
  pub notes:                 Option<String>,
}

impl AuditMetadata {
  /// Minimal metadata with every optional field empty.
  pub fn new(audit_type: AuditType, procedure_name: impl Into<String>) -> Self {
    Self {
      audit_type,
      procedure_name: procedure_name.into(),
      procedure_url: None,
      initiator: None,
      auditor_name: None,
      auditor_email: None,
      auditor_organisation: None,
      contact_name: None,
      contact_email: None,
      contact_form_url: None,
      technologies: Vec::new(),
      not_compliant_content: None,
      derogated_content: None,
      not_in_scope_content: None,
      notes: None,
    }
  }
}

// ─── Nested collections ──────────────────────────────────────────────────────

/// Someone who receives the audit links by email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
  pub id:    i64,
  pub name:  String,
  pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipientInput {
  pub name:  String,
  pub email: String,
}

/// A testing tool used during the audit (e.g. a contrast checker).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tool {
  pub id:       i64,
  pub name:     String,
  #[serde(default)]
  pub function: String,
  #[serde(default)]
  pub url:      String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInput {
  pub name:     String,
  #[serde(default)]
  pub function: String,
  #[serde(default)]
  pub url:      String,
}

/// A platform / assistive technology / browser combination the pages were
/// tested with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestEnvironment {
  pub id:                           i64,
  pub platform:                     String,
  pub operating_system:             String,
  #[serde(default)]
  pub operating_system_version:     String,
  pub assistive_technology:         String,
  #[serde(default)]
  pub assistive_technology_version: String,
  pub browser:                      String,
  #[serde(default)]
  pub browser_version:              String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentInput {
  pub platform:                     String,
  pub operating_system:             String,
  #[serde(default)]
  pub operating_system_version:     String,
  pub assistive_technology:         String,
  #[serde(default)]
  pub assistive_technology_version: String,
  pub browser:                      String,
  #[serde(default)]
  pub browser_version:              String,
}

/// A page under audit. Pages are ordered by their position in the audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditedPage {
  pub id:   i64,
  pub name: String,
  pub url:  String,
}

/// A page in an update payload. `id` is present for pages that already
/// exist and absent for pages to create.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInput {
  #[serde(default)]
  pub id:   Option<i64>,
  pub name: String,
  pub url:  String,
}

impl PageInput {
  pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
    Self { id: None, name: name.into(), url: url.into() }
  }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// The full read model of an audit with all its nested collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Audit {
  pub edit_unique_id:    String,
  pub consult_unique_id: String,
  #[serde(flatten)]
  pub metadata:          AuditMetadata,
  pub created_at:        DateTime<Utc>,
  pub published_at:      Option<DateTime<Utc>>,
  /// Last edition after publication; cleared on every (re)publication.
  pub edited_at:         Option<DateTime<Utc>>,
  pub recipients:        Vec<Recipient>,
  pub tools:             Vec<Tool>,
  pub environments:      Vec<TestEnvironment>,
  pub pages:             Vec<AuditedPage>,
  /// Holds the results of criteria that apply to the whole site rather than
  /// to one page.
  pub transverse_page:   AuditedPage,
}

impl Audit {
  /// Ids of every page results can be attached to: user pages in order,
  /// then the transverse page.
  pub fn page_ids(&self) -> Vec<i64> {
    self
      .pages
      .iter()
      .map(|p| p.id)
      .chain(std::iter::once(self.transverse_page.id))
      .collect()
  }
}

/// Input to [`crate::store::AuditStore::create_audit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAudit {
  #[serde(flatten)]
  pub metadata:   AuditMetadata,
  #[serde(default)]
  pub recipients: Vec<RecipientInput>,
  #[serde(default)]
  pub pages:      Vec<PageInput>,
}

/// Input to [`crate::store::AuditStore::update_audit`]: the full desired state
/// of the audit's scalar fields and nested collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditUpdate {
  #[serde(flatten)]
  pub metadata:     AuditMetadata,
  #[serde(default)]
  pub recipients:   Vec<RecipientInput>,
  #[serde(default)]
  pub tools:        Vec<ToolInput>,
  #[serde(default)]
  pub environments: Vec<EnvironmentInput>,
  pub pages:        Vec<PageInput>,
}

/// Which of the two tokens an operation addresses the audit by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditToken {
  Edit(String),
  Consult(String),
}

impl AuditToken {
  pub fn as_str(&self) -> &str {
    match self {
      Self::Edit(t) | Self::Consult(t) => t,
    }
  }
}
