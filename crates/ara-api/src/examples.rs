//! Handlers for example images attached to criterion results.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/audits/{edit}/results/examples` | multipart: `page_id`, `topic`, `criterion`, `image` |
//! | `DELETE` | `/audits/{edit}/results/examples/{id}` | 204 |
//!
//! The blob is written before its row is recorded; when recording fails the
//! blob is removed again.

use axum::{
  Json,
  extract::{Multipart, Path, State, multipart::Field},
  http::StatusCode,
  response::IntoResponse,
};
use ara_core::{
  criteria::CriterionRef,
  result::{NewImage, ResultKey},
  store::AuditStore,
};
use bytes::Bytes;

use crate::{ApiState, error::ApiError, storage::content_hash, validate};

// ─── Upload ───────────────────────────────────────────────────────────────────

struct Upload {
  filename:     String,
  content_type: String,
  data:         Bytes,
}

#[derive(Default)]
struct UploadForm {
  page_id:   Option<i64>,
  topic:     Option<u8>,
  criterion: Option<u8>,
  image:     Option<Upload>,
}

impl UploadForm {
  async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
    let mut form = UploadForm::default();
    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
      let name = field.name().unwrap_or_default().to_owned();
      match name.as_str() {
        "page_id" => form.page_id = Some(parse_field(field, "page_id").await?),
        "topic" => form.topic = Some(parse_field(field, "topic").await?),
        "criterion" => form.criterion = Some(parse_field(field, "criterion").await?),
        "image" => {
          let filename = field.file_name().unwrap_or("image").to_owned();
          let content_type = field.content_type().unwrap_or_default().to_owned();
          let data = field.bytes().await.map_err(bad_multipart)?;
          form.image = Some(Upload { filename, content_type, data });
        }
        _ => {}
      }
    }
    Ok(form)
  }

  fn key(&self) -> Result<ResultKey, ApiError> {
    match (self.page_id, self.topic, self.criterion) {
      (Some(page_id), Some(topic), Some(criterion)) => {
        Ok(ResultKey { page_id, topic, criterion })
      }
      _ => Err(ApiError::BadRequest(
        "page_id, topic and criterion are required".into(),
      )),
    }
  }
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
  ApiError::BadRequest(format!("invalid multipart body: {e}"))
}

async fn parse_field<T: std::str::FromStr>(
  field: Field<'_>,
  name: &str,
) -> Result<T, ApiError> {
  let text = field.text().await.map_err(bad_multipart)?;
  text
    .trim()
    .parse()
    .map_err(|_| ApiError::BadRequest(format!("invalid {name}: {text:?}")))
}

/// `POST /audits/{edit}/results/examples`
pub async fn upload<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path(edit): Path<String>,
  multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
  let mut form = UploadForm::read(multipart).await?;
  let key = form.key()?;
  let image = form
    .image
    .take()
    .ok_or_else(|| ApiError::BadRequest("missing image field".into()))?;

  if !image.content_type.starts_with("image/") {
    return Err(ApiError::BadRequest(format!(
      "unsupported content type {:?}",
      image.content_type
    )));
  }
  if image.data.len() > state.images.max_upload_bytes() {
    return Err(ApiError::BadRequest(format!(
      "image exceeds {} bytes",
      state.images.max_upload_bytes()
    )));
  }

  let audit = state
    .store
    .get_audit(edit.clone())
    .await
    .map_err(ApiError::from_store)?;
  validate::criterion(
    &state.catalog,
    audit.metadata.audit_type,
    CriterionRef { topic: key.topic, criterion: key.criterion },
  )?;

  let storage_key = state.images.key_for(&audit.edit_unique_id, &image.filename);
  state.images.put(&storage_key, &image.data).await?;

  let record = NewImage {
    key:               storage_key.clone(),
    original_filename: image.filename,
    mime_type:         image.content_type,
    size:              image.data.len() as u64,
    content_hash:      content_hash(&image.data),
  };
  match state.store.attach_image(edit, key, record).await {
    Ok(attached) => {
      tracing::debug!(key = %attached.key, size = attached.size, "example image stored");
      Ok((StatusCode::CREATED, Json(attached)))
    }
    Err(e) => {
      state.images.remove_all([storage_key]).await;
      Err(ApiError::from_store(e))
    }
  }
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /audits/{edit}/results/examples/{id}`
pub async fn remove<S: AuditStore>(
  State(state): State<ApiState<S>>,
  Path((edit, id)): Path<(String, i64)>,
) -> Result<StatusCode, ApiError> {
  let image = state
    .store
    .detach_image(edit, id)
    .await
    .map_err(ApiError::from_store)?;
  state.images.remove_all([image.key]).await;
  Ok(StatusCode::NO_CONTENT)
}
