//! [`SqliteStore`] — the SQLite implementation of [`AuditStore`].

use std::{path::Path, sync::Arc};

use ara_core::{
  Error as CoreError,
  audit::{Audit, AuditToken, AuditType, AuditUpdate, NewAudit, Recipient},
  criteria::{Catalog, CriterionRef},
  lifecycle,
  reconcile::{plan_by_key, plan_pages},
  result::{ExampleImage, NewImage, ResultKey, ResultUpdate},
  store::{AuditResults, AuditStore},
  token,
};
use chrono::Utc;

use crate::{
  Error, Result,
  encode::{RawAudit, decode_enum, decode_status, encode_dt, encode_technologies},
  error::{is_foreign_key_violation, reject},
  queries::{self, ImageRow},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An audit store backed by a single SQLite file.
///
/// Clones share one background connection.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open a private in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Read the audit behind `token` outside of any write.
  async fn read_audit(&self, token: AuditToken) -> Result<Audit> {
    let raw: RawAudit = self
      .conn
      .call(move |conn| {
        let audit_id = queries::resolve_audit(conn, &token)?;
        queries::load_audit(conn, audit_id)
      })
      .await?;
    raw.into_audit()
  }
}

/// A foreign-key failure while writing under `edit_id` means the audit row
/// vanished mid-operation; report it as not found.
pub(crate) fn missing_on_fk(e: tokio_rusqlite::Error, edit_id: &str) -> Error {
  if is_foreign_key_violation(&e) {
    Error::Core(CoreError::AuditNotFound(edit_id.to_owned()))
  } else {
    Error::from(e)
  }
}

// ─── AuditStore impl ─────────────────────────────────────────────────────────

impl AuditStore for SqliteStore {
  type Error = Error;

  // ── Audits ────────────────────────────────────────────────────────────────

  async fn create_audit(&self, input: NewAudit) -> Result<Audit> {
    let edit_id = token::generate();
    let consult_id = token::generate();
    let created_at = encode_dt(Utc::now());
    let technologies = encode_technologies(&input.metadata.technologies)?;

    let raw: RawAudit = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::insert_audit(&tx, &edit_id, &consult_id, &created_at)?;
        queries::write_metadata(&tx, audit_id, &input.metadata, &technologies)?;
        queries::insert_transverse_page(&tx, audit_id)?;
        queries::apply_recipients(&tx, audit_id, plan_by_key::<Recipient, _>(&[], input.recipients))?;
        let pages = plan_pages(&[], input.pages).map_err(reject)?;
        queries::apply_pages(&tx, audit_id, pages)?;
        let raw = queries::load_audit(&tx, audit_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_audit()
  }

  async fn get_audit(&self, edit_id: String) -> Result<Audit> {
    self.read_audit(AuditToken::Edit(edit_id)).await
  }

  async fn update_audit(&self, edit_id: String, update: AuditUpdate) -> Result<Audit> {
    let now = encode_dt(Utc::now());
    let technologies = encode_technologies(&update.metadata.technologies)?;
    let token = AuditToken::Edit(edit_id.clone());

    let raw: RawAudit = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;

        let recipients = plan_by_key(&queries::load_recipients(&tx, audit_id)?, update.recipients);
        let tools = plan_by_key(&queries::load_tools(&tx, audit_id)?, update.tools);
        let environments =
          plan_by_key(&queries::load_environments(&tx, audit_id)?, update.environments);
        let pages = plan_pages(&queries::load_user_pages(&tx, audit_id)?, update.pages)
          .map_err(reject)?;

        queries::write_metadata(&tx, audit_id, &update.metadata, &technologies)?;
        queries::apply_recipients(&tx, audit_id, recipients)?;
        queries::apply_tools(&tx, audit_id, tools)?;
        queries::apply_environments(&tx, audit_id, environments)?;
        queries::apply_pages(&tx, audit_id, pages)?;
        queries::stamp_edition(&tx, audit_id, &now)?;

        let raw = queries::load_audit(&tx, audit_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await
      .map_err(|e| missing_on_fk(e, &edit_id))?;

    raw.into_audit()
  }

  async fn publish_audit(&self, edit_id: String, catalog: Arc<Catalog>) -> Result<Audit> {
    let now = Utc::now();
    let token = AuditToken::Edit(edit_id);

    let raw: RawAudit = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;

        let audit_type: AuditType =
          decode_enum("audit_type", &queries::audit_type(&tx, audit_id)?).map_err(reject)?;
        let rows = queries::result_statuses(&tx, audit_id)?
          .into_iter()
          .map(|(topic, criterion, status)| -> Result<_> {
            Ok((CriterionRef { topic, criterion }, decode_status(&status)?))
          })
          .collect::<Result<Vec<_>>>()
          .map_err(reject)?;
        let statuses = lifecycle::scoped_statuses(&catalog, audit_type, rows);
        let (published_at, edited_at) = lifecycle::publish(statuses, now).map_err(reject)?;

        queries::set_publication(
          &tx,
          audit_id,
          published_at.map(encode_dt).as_deref(),
          edited_at.map(encode_dt).as_deref(),
        )?;
        let raw = queries::load_audit(&tx, audit_id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_audit()
  }

  async fn delete_audit(&self, edit_id: String) -> Result<Vec<ExampleImage>> {
    let token = AuditToken::Edit(edit_id);

    let images = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;
        let images = queries::load_images(&tx, audit_id)?;
        queries::delete_audit(&tx, audit_id)?;
        tx.commit()?;
        Ok(images)
      })
      .await?;

    images.into_iter().map(|raw| raw.into_image()).collect()
  }

  // ── Results ───────────────────────────────────────────────────────────────

  async fn fetch_results(&self, token: AuditToken) -> Result<AuditResults> {
    let (raw_audit, raw_results) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;
        let audit = queries::load_audit(&tx, audit_id)?;
        let results = queries::load_results(&tx, audit_id)?;
        tx.commit()?;
        Ok((audit, results))
      })
      .await?;

    Ok(AuditResults {
      audit:   raw_audit.into_audit()?,
      results: raw_results
        .into_iter()
        .map(|(result, images)| result.into_result(images))
        .collect::<Result<_>>()?,
    })
  }

  async fn upsert_results(&self, edit_id: String, updates: Vec<ResultUpdate>) -> Result<()> {
    let now = encode_dt(Utc::now());
    let token = AuditToken::Edit(edit_id.clone());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;
        let pages = queries::page_ids(&tx, audit_id)?;

        for update in &updates {
          if !pages.contains(&update.page_id) {
            return Err(reject(CoreError::UnknownPage(update.page_id)));
          }
          queries::upsert_result(&tx, update)?;
        }
        queries::stamp_edition(&tx, audit_id, &now)?;
        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(|e| missing_on_fk(e, &edit_id))
  }

  // ── Example images ────────────────────────────────────────────────────────

  async fn attach_image(
    &self,
    edit_id: String,
    key: ResultKey,
    image: NewImage,
  ) -> Result<ExampleImage> {
    let now = Utc::now();
    let created_at = encode_dt(now);
    let token = AuditToken::Edit(edit_id.clone());
    let row_image = image.clone();

    let image_id = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;
        if !queries::page_ids(&tx, audit_id)?.contains(&key.page_id) {
          return Err(reject(CoreError::UnknownPage(key.page_id)));
        }

        let result_id = queries::ensure_result(&tx, key.page_id, key.topic, key.criterion)?;
        let image_id = queries::insert_image(&tx, &ImageRow {
          result_id,
          storage_key: &row_image.key,
          original_filename: &row_image.original_filename,
          mime_type: &row_image.mime_type,
          size: i64::try_from(row_image.size).unwrap_or(i64::MAX),
          content_hash: &row_image.content_hash,
          created_at: &created_at,
        })?;
        queries::stamp_edition(&tx, audit_id, &created_at)?;
        tx.commit()?;
        Ok(image_id)
      })
      .await
      .map_err(|e| missing_on_fk(e, &edit_id))?;

    Ok(ExampleImage {
      id:                image_id,
      key:               image.key,
      original_filename: image.original_filename,
      mime_type:         image.mime_type,
      size:              image.size,
      content_hash:      image.content_hash,
      created_at:        now,
    })
  }

  async fn detach_image(&self, edit_id: String, image_id: i64) -> Result<ExampleImage> {
    let now = encode_dt(Utc::now());
    let token = AuditToken::Edit(edit_id);

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let audit_id = queries::resolve_audit(&tx, &token)?;
        let raw = queries::take_image(&tx, audit_id, image_id)?;
        queries::stamp_edition(&tx, audit_id, &now)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    raw.into_image()
  }
}
