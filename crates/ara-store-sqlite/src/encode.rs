//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings, enums as their
//! SCREAMING_SNAKE_CASE names and the technology list as compact JSON.

use std::str::FromStr;

use ara_core::{
  audit::{
    Audit, AuditMetadata, AuditType, AuditedPage, Recipient, TestEnvironment,
    Tool,
  },
  result::{CriterionResult, CriterionStatus, ExampleImage, UserImpact},
};
use chrono::{DateTime, Utc};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<&str>) -> Result<Option<DateTime<Utc>>> {
  s.map(decode_dt).transpose()
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_enum<T: FromStr>(column: &'static str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::UnknownValue { column, value: s.to_owned() })
}

pub fn decode_status(s: &str) -> Result<CriterionStatus> { decode_enum("status", s) }

// ─── Technologies ────────────────────────────────────────────────────────────

pub fn encode_technologies(technologies: &[String]) -> Result<String> {
  Ok(serde_json::to_string(technologies)?)
}

pub fn decode_technologies(s: &str) -> Result<Vec<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawAuditRow`]'s field order.
pub const AUDIT_COLUMNS: &str = "
  edit_unique_id, consult_unique_id, audit_type, procedure_name,
  procedure_url, initiator, auditor_name, auditor_email, auditor_organisation,
  contact_name, contact_email, contact_form_url, technologies,
  not_compliant_content, derogated_content, not_in_scope_content, notes,
  created_at, published_at, edited_at";

/// Raw strings read directly from an `audits` row.
pub struct RawAuditRow {
  pub edit_unique_id:        String,
  pub consult_unique_id:     String,
  pub audit_type:            String,
  pub procedure_name:        String,
  pub procedure_url:         Option<String>,
  pub initiator:             Option<String>,
  pub auditor_name:          Option<String>,
  pub auditor_email:         Option<String>,
  pub auditor_organisation:  Option<String>,
  pub contact_name:          Option<String>,
  pub contact_email:         Option<String>,
  pub contact_form_url:      Option<String>,
  pub technologies:          String,
  pub not_compliant_content: Option<String>,
  pub derogated_content:     Option<String>,
  pub not_in_scope_content:  Option<String>,
  pub notes:                 Option<String>,
  pub created_at:            String,
  pub published_at:          Option<String>,
  pub edited_at:             Option<String>,
}

impl RawAuditRow {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      edit_unique_id:        row.get(0)?,
      consult_unique_id:     row.get(1)?,
      audit_type:            row.get(2)?,
      procedure_name:        row.get(3)?,
      procedure_url:         row.get(4)?,
      initiator:             row.get(5)?,
      auditor_name:          row.get(6)?,
      auditor_email:         row.get(7)?,
      auditor_organisation:  row.get(8)?,
      contact_name:          row.get(9)?,
      contact_email:         row.get(10)?,
      contact_form_url:      row.get(11)?,
      technologies:          row.get(12)?,
      not_compliant_content: row.get(13)?,
      derogated_content:     row.get(14)?,
      not_in_scope_content:  row.get(15)?,
      notes:                 row.get(16)?,
      created_at:            row.get(17)?,
      published_at:          row.get(18)?,
      edited_at:             row.get(19)?,
    })
  }
}

/// An `audits` row plus its nested collections, not yet decoded.
pub struct RawAudit {
  pub row:             RawAuditRow,
  pub recipients:      Vec<Recipient>,
  pub tools:           Vec<Tool>,
  pub environments:    Vec<TestEnvironment>,
  pub pages:           Vec<AuditedPage>,
  pub transverse_page: AuditedPage,
}

impl RawAudit {
  pub fn into_audit(self) -> Result<Audit> {
    let row = self.row;
    let audit_type: AuditType = decode_enum("audit_type", &row.audit_type)?;
    Ok(Audit {
      edit_unique_id:    row.edit_unique_id,
      consult_unique_id: row.consult_unique_id,
      metadata:          AuditMetadata {
        audit_type,
        procedure_name: row.procedure_name,
        procedure_url: row.procedure_url,
        initiator: row.initiator,
        auditor_name: row.auditor_name,
        auditor_email: row.auditor_email,
        auditor_organisation: row.auditor_organisation,
        contact_name: row.contact_name,
        contact_email: row.contact_email,
        contact_form_url: row.contact_form_url,
        technologies: decode_technologies(&row.technologies)?,
        not_compliant_content: row.not_compliant_content,
        derogated_content: row.derogated_content,
        not_in_scope_content: row.not_in_scope_content,
        notes: row.notes,
      },
      created_at:        decode_dt(&row.created_at)?,
      published_at:      decode_opt_dt(row.published_at.as_deref())?,
      edited_at:         decode_opt_dt(row.edited_at.as_deref())?,
      recipients:        self.recipients,
      tools:             self.tools,
      environments:      self.environments,
      pages:             self.pages,
      transverse_page:   self.transverse_page,
    })
  }
}

/// Raw strings read directly from an `example_images` row.
pub struct RawImage {
  pub id:                i64,
  pub result_id:         i64,
  pub storage_key:       String,
  pub original_filename: String,
  pub mime_type:         String,
  pub size:              i64,
  pub content_hash:      String,
  pub created_at:        String,
}

impl RawImage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                row.get(0)?,
      result_id:         row.get(1)?,
      storage_key:       row.get(2)?,
      original_filename: row.get(3)?,
      mime_type:         row.get(4)?,
      size:              row.get(5)?,
      content_hash:      row.get(6)?,
      created_at:        row.get(7)?,
    })
  }

  pub fn into_image(self) -> Result<ExampleImage> {
    Ok(ExampleImage {
      id:                self.id,
      key:               self.storage_key,
      original_filename: self.original_filename,
      mime_type:         self.mime_type,
      size:              self.size.max(0) as u64,
      content_hash:      self.content_hash,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `criterion_results` row.
pub struct RawResult {
  pub id:                     i64,
  pub page_id:                i64,
  pub topic:                  u8,
  pub criterion:              u8,
  pub status:                 String,
  pub compliant_comment:      Option<String>,
  pub not_compliant_comment:  Option<String>,
  pub not_applicable_comment: Option<String>,
  pub user_impact:            Option<String>,
  pub quick_win:              bool,
}

impl RawResult {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                     row.get(0)?,
      page_id:                row.get(1)?,
      topic:                  row.get(2)?,
      criterion:              row.get(3)?,
      status:                 row.get(4)?,
      compliant_comment:      row.get(5)?,
      not_compliant_comment:  row.get(6)?,
      not_applicable_comment: row.get(7)?,
      user_impact:            row.get(8)?,
      quick_win:              row.get(9)?,
    })
  }

  /// Decode together with the images attached to this row.
  pub fn into_result(self, images: Vec<RawImage>) -> Result<CriterionResult> {
    let user_impact = self
      .user_impact
      .as_deref()
      .map(|s| decode_enum::<UserImpact>("user_impact", s))
      .transpose()?;

    Ok(CriterionResult {
      page_id: self.page_id,
      topic: self.topic,
      criterion: self.criterion,
      status: decode_status(&self.status)?,
      compliant_comment: self.compliant_comment,
      not_compliant_comment: self.not_compliant_comment,
      not_applicable_comment: self.not_applicable_comment,
      user_impact,
      quick_win: self.quick_win,
      example_images: images
        .into_iter()
        .map(RawImage::into_image)
        .collect::<Result<_>>()?,
    })
  }
}
