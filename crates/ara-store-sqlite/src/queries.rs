//! Synchronous SQL helpers run inside `tokio_rusqlite` call closures.
//!
//! Each helper takes a plain [`Connection`] so it can be used both on the
//! connection itself and on an open [`rusqlite::Transaction`] (which derefs to
//! one). Domain failures are raised with [`reject`] so the surrounding
//! transaction is dropped, and therefore rolled back, before they surface.

use std::collections::{HashMap, HashSet};

use ara_core::{
  Error as CoreError,
  audit::{
    AuditMetadata, AuditToken, AuditedPage, EnvironmentInput, Recipient,
    RecipientInput, TestEnvironment, Tool, ToolInput,
  },
  reconcile::{PlacedPage, Plan},
  result::ResultUpdate,
};
use rusqlite::{Connection, OptionalExtension as _, params};

use crate::{
  encode::{AUDIT_COLUMNS, RawAudit, RawAuditRow, RawImage, RawResult},
  error::reject,
};

type TResult<T> = tokio_rusqlite::Result<T>;

// ─── Audit lookup ────────────────────────────────────────────────────────────

/// Resolve the row id of the live audit behind `token`.
///
/// On a miss the trace table decides between gone and never issued.
pub fn resolve_audit(conn: &Connection, token: &AuditToken) -> TResult<i64> {
  let column = match token {
    AuditToken::Edit(_) => "edit_unique_id",
    AuditToken::Consult(_) => "consult_unique_id",
  };

  let id: Option<i64> = conn
    .query_row(
      &format!("SELECT id FROM audits WHERE {column} = ?1"),
      params![token.as_str()],
      |r| r.get(0),
    )
    .optional()?;
  if let Some(id) = id {
    return Ok(id);
  }

  let traced = conn
    .query_row(
      &format!("SELECT 1 FROM audit_traces WHERE {column} = ?1"),
      params![token.as_str()],
      |_| Ok(()),
    )
    .optional()?
    .is_some();

  let token = token.as_str().to_owned();
  Err(reject(if traced {
    CoreError::AuditGone(token)
  } else {
    CoreError::AuditNotFound(token)
  }))
}

pub fn load_audit(conn: &Connection, audit_id: i64) -> TResult<RawAudit> {
  let row = conn.query_row(
    &format!("SELECT {AUDIT_COLUMNS} FROM audits WHERE id = ?1"),
    params![audit_id],
    RawAuditRow::from_row,
  )?;

  let mut pages = load_pages(conn, audit_id)?;
  let transverse_page = match pages.iter().position(|(_, transverse)| *transverse) {
    Some(i) => pages.remove(i).0,
    None => return Err(rusqlite::Error::QueryReturnedNoRows.into()),
  };

  Ok(RawAudit {
    row,
    recipients: load_recipients(conn, audit_id)?,
    tools: load_tools(conn, audit_id)?,
    environments: load_environments(conn, audit_id)?,
    pages: pages.into_iter().map(|(page, _)| page).collect(),
    transverse_page,
  })
}

// ─── Nested collections: reads ───────────────────────────────────────────────

pub fn load_recipients(conn: &Connection, audit_id: i64) -> TResult<Vec<Recipient>> {
  let mut stmt =
    conn.prepare("SELECT id, name, email FROM recipients WHERE audit_id = ?1 ORDER BY id")?;
  let rows = stmt
    .query_map(params![audit_id], |row| {
      Ok(Recipient { id: row.get(0)?, name: row.get(1)?, email: row.get(2)? })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn load_tools(conn: &Connection, audit_id: i64) -> TResult<Vec<Tool>> {
  let mut stmt = conn
    .prepare("SELECT id, name, function, url FROM tools WHERE audit_id = ?1 ORDER BY id")?;
  let rows = stmt
    .query_map(params![audit_id], |row| {
      Ok(Tool {
        id:       row.get(0)?,
        name:     row.get(1)?,
        function: row.get(2)?,
        url:      row.get(3)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub fn load_environments(conn: &Connection, audit_id: i64) -> TResult<Vec<TestEnvironment>> {
  let mut stmt = conn.prepare(
    "SELECT id, platform, operating_system, operating_system_version,
            assistive_technology, assistive_technology_version,
            browser, browser_version
     FROM test_environments WHERE audit_id = ?1 ORDER BY id",
  )?;
  let rows = stmt
    .query_map(params![audit_id], |row| {
      Ok(TestEnvironment {
        id:                           row.get(0)?,
        platform:                     row.get(1)?,
        operating_system:             row.get(2)?,
        operating_system_version:     row.get(3)?,
        assistive_technology:         row.get(4)?,
        assistive_technology_version: row.get(5)?,
        browser:                      row.get(6)?,
        browser_version:              row.get(7)?,
      })
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Every page of the audit in position order, flagged with `is_transverse`.
fn load_pages(conn: &Connection, audit_id: i64) -> TResult<Vec<(AuditedPage, bool)>> {
  let mut stmt = conn.prepare(
    "SELECT id, name, url, is_transverse FROM audited_pages
     WHERE audit_id = ?1 ORDER BY position, id",
  )?;
  let rows = stmt
    .query_map(params![audit_id], |row| {
      Ok((
        AuditedPage { id: row.get(0)?, name: row.get(1)?, url: row.get(2)? },
        row.get(3)?,
      ))
    })?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// The user (non-transverse) pages of the audit.
pub fn load_user_pages(conn: &Connection, audit_id: i64) -> TResult<Vec<AuditedPage>> {
  Ok(
    load_pages(conn, audit_id)?
      .into_iter()
      .filter(|(_, transverse)| !transverse)
      .map(|(page, _)| page)
      .collect(),
  )
}

/// Ids of every page results can be attached to, transverse page included.
pub fn page_ids(conn: &Connection, audit_id: i64) -> TResult<HashSet<i64>> {
  let mut stmt = conn.prepare("SELECT id FROM audited_pages WHERE audit_id = ?1")?;
  let ids = stmt
    .query_map(params![audit_id], |row| row.get(0))?
    .collect::<rusqlite::Result<HashSet<i64>>>()?;
  Ok(ids)
}

// ─── Audit rows: writes ──────────────────────────────────────────────────────

/// Insert the audit row and its trace; returns the new row id.
pub fn insert_audit(
  conn: &Connection,
  edit_id: &str,
  consult_id: &str,
  created_at: &str,
) -> TResult<i64> {
  conn.execute(
    "INSERT INTO audits (edit_unique_id, consult_unique_id, audit_type, procedure_name, created_at)
     VALUES (?1, ?2, 'FULL', '', ?3)",
    params![edit_id, consult_id, created_at],
  )?;
  let audit_id = conn.last_insert_rowid();
  conn.execute(
    "INSERT INTO audit_traces (edit_unique_id, consult_unique_id, created_at)
     VALUES (?1, ?2, ?3)",
    params![edit_id, consult_id, created_at],
  )?;
  Ok(audit_id)
}

pub fn insert_transverse_page(conn: &Connection, audit_id: i64) -> TResult<()> {
  conn.execute(
    "INSERT INTO audited_pages (audit_id, position, name, url, is_transverse)
     VALUES (?1, 0, 'Éléments transverses', '', 1)",
    params![audit_id],
  )?;
  Ok(())
}

/// Overwrite every scalar field. `technologies` is the pre-encoded JSON list.
pub fn write_metadata(
  conn: &Connection,
  audit_id: i64,
  meta: &AuditMetadata,
  technologies: &str,
) -> TResult<()> {
  conn.execute(
    "UPDATE audits SET
       audit_type = ?2, procedure_name = ?3, procedure_url = ?4, initiator = ?5,
       auditor_name = ?6, auditor_email = ?7, auditor_organisation = ?8,
       contact_name = ?9, contact_email = ?10, contact_form_url = ?11,
       technologies = ?12, not_compliant_content = ?13, derogated_content = ?14,
       not_in_scope_content = ?15, notes = ?16
     WHERE id = ?1",
    params![
      audit_id,
      meta.audit_type.as_ref(),
      meta.procedure_name,
      meta.procedure_url,
      meta.initiator,
      meta.auditor_name,
      meta.auditor_email,
      meta.auditor_organisation,
      meta.contact_name,
      meta.contact_email,
      meta.contact_form_url,
      technologies,
      meta.not_compliant_content,
      meta.derogated_content,
      meta.not_in_scope_content,
      meta.notes,
    ],
  )?;
  Ok(())
}

/// Record an edition at `now` if, and only if, the audit is published.
pub fn stamp_edition(conn: &Connection, audit_id: i64, now: &str) -> TResult<()> {
  conn.execute(
    "UPDATE audits SET edited_at = ?2 WHERE id = ?1 AND published_at IS NOT NULL",
    params![audit_id, now],
  )?;
  Ok(())
}

pub fn set_publication(
  conn: &Connection,
  audit_id: i64,
  published_at: Option<&str>,
  edited_at: Option<&str>,
) -> TResult<()> {
  conn.execute(
    "UPDATE audits SET published_at = ?2, edited_at = ?3 WHERE id = ?1",
    params![audit_id, published_at, edited_at],
  )?;
  Ok(())
}

pub fn delete_audit(conn: &Connection, audit_id: i64) -> TResult<()> {
  conn.execute("DELETE FROM audits WHERE id = ?1", params![audit_id])?;
  Ok(())
}

// ─── Nested collections: plan execution ──────────────────────────────────────

fn delete_ids(conn: &Connection, table: &str, ids: &[i64]) -> TResult<()> {
  let mut stmt = conn.prepare(&format!("DELETE FROM {table} WHERE id = ?1"))?;
  for id in ids {
    stmt.execute(params![id])?;
  }
  Ok(())
}

pub fn apply_recipients(
  conn: &Connection,
  audit_id: i64,
  plan: Plan<RecipientInput>,
) -> TResult<()> {
  delete_ids(conn, "recipients", &plan.delete)?;
  for (id, r) in plan.update {
    conn.execute(
      "UPDATE recipients SET name = ?2, email = ?3 WHERE id = ?1",
      params![id, r.name, r.email],
    )?;
  }
  for r in plan.insert {
    conn.execute(
      "INSERT INTO recipients (audit_id, name, email) VALUES (?1, ?2, ?3)",
      params![audit_id, r.name, r.email],
    )?;
  }
  Ok(())
}

pub fn apply_tools(conn: &Connection, audit_id: i64, plan: Plan<ToolInput>) -> TResult<()> {
  delete_ids(conn, "tools", &plan.delete)?;
  for (id, t) in plan.update {
    conn.execute(
      "UPDATE tools SET name = ?2, function = ?3, url = ?4 WHERE id = ?1",
      params![id, t.name, t.function, t.url],
    )?;
  }
  for t in plan.insert {
    conn.execute(
      "INSERT INTO tools (audit_id, name, function, url) VALUES (?1, ?2, ?3, ?4)",
      params![audit_id, t.name, t.function, t.url],
    )?;
  }
  Ok(())
}

pub fn apply_environments(
  conn: &Connection,
  audit_id: i64,
  plan: Plan<EnvironmentInput>,
) -> TResult<()> {
  delete_ids(conn, "test_environments", &plan.delete)?;
  for (id, e) in plan.update {
    conn.execute(
      "UPDATE test_environments SET
         platform = ?2, operating_system = ?3, operating_system_version = ?4,
         assistive_technology = ?5, assistive_technology_version = ?6,
         browser = ?7, browser_version = ?8
       WHERE id = ?1",
      params![
        id,
        e.platform,
        e.operating_system,
        e.operating_system_version,
        e.assistive_technology,
        e.assistive_technology_version,
        e.browser,
        e.browser_version,
      ],
    )?;
  }
  for e in plan.insert {
    conn.execute(
      "INSERT INTO test_environments (
         audit_id, platform, operating_system, operating_system_version,
         assistive_technology, assistive_technology_version, browser, browser_version
       ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
      params![
        audit_id,
        e.platform,
        e.operating_system,
        e.operating_system_version,
        e.assistive_technology,
        e.assistive_technology_version,
        e.browser,
        e.browser_version,
      ],
    )?;
  }
  Ok(())
}

/// Apply a page plan. Deleted pages take their results and images with them
/// through `ON DELETE CASCADE`.
pub fn apply_pages(conn: &Connection, audit_id: i64, plan: Plan<PlacedPage>) -> TResult<()> {
  delete_ids(conn, "audited_pages", &plan.delete)?;
  for (id, p) in plan.update {
    conn.execute(
      "UPDATE audited_pages SET position = ?2, name = ?3, url = ?4
       WHERE id = ?1 AND is_transverse = 0",
      params![id, p.position, p.name, p.url],
    )?;
  }
  for p in plan.insert {
    conn.execute(
      "INSERT INTO audited_pages (audit_id, position, name, url) VALUES (?1, ?2, ?3, ?4)",
      params![audit_id, p.position, p.name, p.url],
    )?;
  }
  Ok(())
}

// ─── Results ─────────────────────────────────────────────────────────────────

const RESULT_COLUMNS: &str = "
  r.id, r.page_id, r.topic, r.criterion, r.status, r.compliant_comment,
  r.not_compliant_comment, r.not_applicable_comment, r.user_impact, r.quick_win";

const IMAGE_COLUMNS: &str = "
  i.id, i.result_id, i.storage_key, i.original_filename, i.mime_type, i.size,
  i.content_hash, i.created_at";

/// Create the result or overwrite every field of the existing one.
pub fn upsert_result(conn: &Connection, u: &ResultUpdate) -> TResult<()> {
  conn.execute(
    "INSERT INTO criterion_results (
       page_id, topic, criterion, status, compliant_comment,
       not_compliant_comment, not_applicable_comment, user_impact, quick_win
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
     ON CONFLICT (page_id, topic, criterion) DO UPDATE SET
       status                 = excluded.status,
       compliant_comment      = excluded.compliant_comment,
       not_compliant_comment  = excluded.not_compliant_comment,
       not_applicable_comment = excluded.not_applicable_comment,
       user_impact            = excluded.user_impact,
       quick_win              = excluded.quick_win",
    params![
      u.page_id,
      u.topic,
      u.criterion,
      u.status.as_ref(),
      u.compliant_comment,
      u.not_compliant_comment,
      u.not_applicable_comment,
      u.user_impact.as_ref().map(AsRef::<str>::as_ref),
      u.quick_win,
    ],
  )?;
  Ok(())
}

/// Id of the result at `(page, topic, criterion)`, materializing it as
/// `NOT_TESTED` when absent.
pub fn ensure_result(conn: &Connection, page_id: i64, topic: u8, criterion: u8) -> TResult<i64> {
  conn.execute(
    "INSERT INTO criterion_results (page_id, topic, criterion) VALUES (?1, ?2, ?3)
     ON CONFLICT (page_id, topic, criterion) DO NOTHING",
    params![page_id, topic, criterion],
  )?;
  Ok(conn.query_row(
    "SELECT id FROM criterion_results WHERE page_id = ?1 AND topic = ?2 AND criterion = ?3",
    params![page_id, topic, criterion],
    |r| r.get(0),
  )?)
}

pub fn audit_type(conn: &Connection, audit_id: i64) -> TResult<String> {
  Ok(conn.query_row(
    "SELECT audit_type FROM audits WHERE id = ?1",
    params![audit_id],
    |r| r.get(0),
  )?)
}

/// `(topic, criterion, status)` of every materialized result of the audit.
pub fn result_statuses(
  conn: &Connection,
  audit_id: i64,
) -> TResult<Vec<(u8, u8, String)>> {
  let mut stmt = conn.prepare(
    "SELECT r.topic, r.criterion, r.status FROM criterion_results r
     JOIN audited_pages p ON p.id = r.page_id
     WHERE p.audit_id = ?1",
  )?;
  let rows = stmt
    .query_map(params![audit_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

/// Every stored result of the audit, each paired with its images.
pub fn load_results(
  conn: &Connection,
  audit_id: i64,
) -> TResult<Vec<(RawResult, Vec<RawImage>)>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {RESULT_COLUMNS} FROM criterion_results r
     JOIN audited_pages p ON p.id = r.page_id
     WHERE p.audit_id = ?1
     ORDER BY p.is_transverse, p.position, r.topic, r.criterion"
  ))?;
  let results = stmt
    .query_map(params![audit_id], RawResult::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut images: HashMap<i64, Vec<RawImage>> = HashMap::new();
  for image in load_images(conn, audit_id)? {
    images.entry(image.result_id).or_default().push(image);
  }

  Ok(
    results
      .into_iter()
      .map(|r| {
        let own = images.remove(&r.id).unwrap_or_default();
        (r, own)
      })
      .collect(),
  )
}

// ─── Example images ──────────────────────────────────────────────────────────

/// Every image attached to any result of the audit.
pub fn load_images(conn: &Connection, audit_id: i64) -> TResult<Vec<RawImage>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {IMAGE_COLUMNS} FROM example_images i
     JOIN criterion_results r ON r.id = i.result_id
     JOIN audited_pages p ON p.id = r.page_id
     WHERE p.audit_id = ?1
     ORDER BY i.id"
  ))?;
  let rows = stmt
    .query_map(params![audit_id], RawImage::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

pub struct ImageRow<'a> {
  pub result_id:         i64,
  pub storage_key:       &'a str,
  pub original_filename: &'a str,
  pub mime_type:         &'a str,
  pub size:              i64,
  pub content_hash:      &'a str,
  pub created_at:        &'a str,
}

pub fn insert_image(conn: &Connection, image: &ImageRow<'_>) -> TResult<i64> {
  conn.execute(
    "INSERT INTO example_images (
       result_id, storage_key, original_filename, mime_type, size, content_hash, created_at
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    params![
      image.result_id,
      image.storage_key,
      image.original_filename,
      image.mime_type,
      image.size,
      image.content_hash,
      image.created_at,
    ],
  )?;
  Ok(conn.last_insert_rowid())
}

/// Delete the image if it belongs to the audit; returns the removed row.
pub fn take_image(conn: &Connection, audit_id: i64, image_id: i64) -> TResult<RawImage> {
  let image = conn
    .query_row(
      &format!(
        "SELECT {IMAGE_COLUMNS} FROM example_images i
         JOIN criterion_results r ON r.id = i.result_id
         JOIN audited_pages p ON p.id = r.page_id
         WHERE p.audit_id = ?1 AND i.id = ?2"
      ),
      params![audit_id, image_id],
      RawImage::from_row,
    )
    .optional()?
    .ok_or_else(|| reject(CoreError::ImageNotFound(image_id)))?;

  conn.execute("DELETE FROM example_images WHERE id = ?1", params![image_id])?;
  Ok(image)
}
