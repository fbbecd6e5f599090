//! JSON REST API for Ara.
//!
//! Exposes an axum [`Router`] backed by any [`ara_core::store::AuditStore`].
//! Edit tokens in the path authorize mutation; consult tokens only reach the
//! report. TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", ara_api::api_router(state))
//! ```

pub mod audits;
pub mod criteria;
pub mod error;
pub mod examples;
pub mod reports;
pub mod results;
pub mod storage;
pub mod validate;

use std::sync::Arc;

use ara_core::{criteria::Catalog, store::AuditStore};
use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post, put},
};

pub use error::ApiError;
pub use storage::ImageStorage;

/// Room left in a request body for the multipart framing and text fields
/// around an image.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S> {
  pub store:   Arc<S>,
  /// Loaded once at startup and never mutated.
  pub catalog: Arc<Catalog>,
  pub images:  Arc<ImageStorage>,
}

impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:   Arc::clone(&self.store),
      catalog: Arc::clone(&self.catalog),
      images:  Arc::clone(&self.images),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: AuditStore + 'static,
{
  let body_limit = state.images.max_upload_bytes() + MULTIPART_OVERHEAD;

  Router::new()
    // Audits
    .route("/audits", post(audits::create::<S>))
    .route(
      "/audits/{edit}",
      get(audits::get_one::<S>)
        .put(audits::update::<S>)
        .delete(audits::delete::<S>),
    )
    .route("/audits/{edit}/publish", put(audits::publish::<S>))
    // Results
    .route(
      "/audits/{edit}/results",
      get(results::matrix::<S>).patch(results::update::<S>),
    )
    .route("/audits/{edit}/results/examples", post(examples::upload::<S>))
    .route("/audits/{edit}/results/examples/{id}", delete(examples::remove::<S>))
    // Read-only
    .route("/reports/{consult}", get(reports::get_one::<S>))
    .route("/criteria", get(criteria::list::<S>))
    .layer(DefaultBodyLimit::max(body_limit))
    .with_state(state)
}

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use ara_store_sqlite::SqliteStore;
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
  };
  use serde_json::{Value, json};
  use tower::ServiceExt as _;

  use super::*;

  const BOUNDARY: &str = "ara-test-boundary";

  async fn make_state() -> (ApiState<SqliteStore>, PathBuf) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let uploads = std::env::temp_dir().join(format!("ara-api-{}", uuid::Uuid::new_v4()));
    let state = ApiState {
      store:   Arc::new(store),
      catalog: Arc::new(Catalog::rgaa()),
      images:  Arc::new(ImageStorage::new(&uploads, 1024)),
    };
    (state, uploads)
  }

  async fn send(
    state: &ApiState<SqliteStore>,
    method: &str,
    uri: &str,
    body: Option<Value>,
  ) -> Response {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
      Some(json) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };
    api_router(state.clone()).oneshot(req).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  fn audit_body() -> Value {
    json!({
      "audit_type": "FAST",
      "procedure_name": "Démarche en ligne",
      "recipients": [{ "name": "Alice", "email": "alice@example.org" }],
      "pages": [{ "name": "Accueil", "url": "https://example.org" }],
    })
  }

  async fn create(state: &ApiState<SqliteStore>) -> Value {
    let resp = send(state, "POST", "/audits", Some(audit_body())).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await
  }

  fn multipart(fields: &[(&str, &str)], image: Option<(&str, &str, &[u8])>) -> Body {
    let mut body = Vec::new();
    for (name, value) in fields {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
      );
    }
    if let Some((filename, content_type, data)) = image {
      body.extend_from_slice(
        format!(
          "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; \
           filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
      );
      body.extend_from_slice(data);
      body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    Body::from(body)
  }

  async fn upload(state: &ApiState<SqliteStore>, edit: &str, body: Body) -> Response {
    let req = Request::builder()
      .method("POST")
      .uri(format!("/audits/{edit}/results/examples"))
      .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
      .body(body)
      .unwrap();
    api_router(state.clone()).oneshot(req).await.unwrap()
  }

  // ── Audits ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_returns_tokens_and_pages() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;

    assert!(audit["edit_unique_id"].as_str().is_some_and(|t| !t.is_empty()));
    assert!(audit["consult_unique_id"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(audit["audit_type"], "FAST");
    assert_eq!(audit["pages"].as_array().unwrap().len(), 1);
    assert!(audit["transverse_page"]["id"].is_i64());
    assert!(audit["published_at"].is_null());
  }

  #[tokio::test]
  async fn create_validates_payload() {
    let (state, _) = make_state().await;

    let mut body = audit_body();
    body["procedure_name"] = json!("");
    let resp = send(&state, "POST", "/audits", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());

    let mut body = audit_body();
    body["pages"] = json!([]);
    let resp = send(&state, "POST", "/audits", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let mut body = audit_body();
    body["recipients"] = json!([{ "name": "Bob", "email": "" }]);
    let resp = send(&state, "POST", "/audits", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn unknown_token_is_404_and_deleted_is_410() {
    let (state, _) = make_state().await;
    let resp = send(&state, "GET", "/audits/never-issued", None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let consult = audit["consult_unique_id"].as_str().unwrap();

    let resp = send(&state, "DELETE", &format!("/audits/{edit}"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&state, "GET", &format!("/audits/{edit}"), None).await;
    assert_eq!(resp.status(), StatusCode::GONE);
    let resp = send(&state, "GET", &format!("/reports/{consult}"), None).await;
    assert_eq!(resp.status(), StatusCode::GONE);
  }

  #[tokio::test]
  async fn update_replaces_collections() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].clone();

    let body = json!({
      "audit_type": "FAST",
      "procedure_name": "Renamed",
      "recipients": [{ "name": "Bob", "email": "bob@example.org" }],
      "tools": [{ "name": "Axe", "url": "https://axe" }],
      "pages": [
        { "id": page_id, "name": "Accueil", "url": "https://example.org" },
        { "name": "Contact", "url": "https://example.org/contact" },
      ],
    });
    let resp = send(&state, "PUT", &format!("/audits/{edit}"), Some(body)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let updated = json_body(resp).await;
    assert_eq!(updated["procedure_name"], "Renamed");
    assert_eq!(updated["recipients"].as_array().unwrap().len(), 1);
    assert_eq!(updated["recipients"][0]["email"], "bob@example.org");
    assert_eq!(updated["tools"][0]["name"], "Axe");
    assert_eq!(updated["pages"][0]["id"], page_id);
    assert_eq!(updated["pages"].as_array().unwrap().len(), 2);
  }

  // ── Results ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn results_matrix_is_complete() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();

    let resp = send(&state, "GET", &format!("/audits/{edit}/results"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let matrix = json_body(resp).await;
    // One user page plus the transverse page, 25 criteria each.
    assert_eq!(matrix.as_array().unwrap().len(), 2 * 25);
    assert!(matrix.as_array().unwrap().iter().all(|r| r["status"] == "NOT_TESTED"));
  }

  #[tokio::test]
  async fn patch_results_then_publish() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].clone();

    let batch = json!([
      { "page_id": page_id, "topic": 1, "criterion": 1, "status": "COMPLIANT" },
      { "page_id": page_id, "topic": 1, "criterion": 2, "status": "NOT_TESTED" },
    ]);
    let resp = send(&state, "PATCH", &format!("/audits/{edit}/results"), Some(batch)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&state, "PUT", &format!("/audits/{edit}/publish"), None).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let batch = json!([{
      "page_id": page_id, "topic": 1, "criterion": 2, "status": "NOT_COMPLIANT",
      "not_compliant_comment": "Alternative absente", "user_impact": "BLOCKING",
    }]);
    let resp = send(&state, "PATCH", &format!("/audits/{edit}/results"), Some(batch)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = send(&state, "PUT", &format!("/audits/{edit}/publish"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let published = json_body(resp).await;
    assert!(published["published_at"].is_string());
    assert!(published["edited_at"].is_null());
  }

  #[tokio::test]
  async fn publish_after_downgrade_ignores_dropped_criteria() {
    let (state, _) = make_state().await;
    let mut body = audit_body();
    body["audit_type"] = json!("FULL");
    let resp = send(&state, "POST", "/audits", Some(body)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let audit = json_body(resp).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].clone();

    let batch = json!([{ "page_id": page_id, "topic": 4, "criterion": 13, "status": "NOT_TESTED" }]);
    let resp = send(&state, "PATCH", &format!("/audits/{edit}/results"), Some(batch)).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let downgrade = json!({
      "audit_type": "FAST",
      "procedure_name": "Démarche en ligne",
      "recipients": [{ "name": "Alice", "email": "alice@example.org" }],
      "pages": [{ "id": page_id, "name": "Accueil", "url": "https://example.org" }],
    });
    let resp = send(&state, "PUT", &format!("/audits/{edit}"), Some(downgrade)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&state, "PUT", &format!("/audits/{edit}/publish"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn patch_rejects_criterion_outside_audit_type() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].clone();

    let batch = json!([{ "page_id": page_id, "topic": 1, "criterion": 4, "status": "COMPLIANT" }]);
    let resp = send(&state, "PATCH", &format!("/audits/{edit}/results"), Some(batch)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let batch = json!([{ "page_id": 999_999, "topic": 1, "criterion": 1, "status": "COMPLIANT" }]);
    let resp = send(&state, "PATCH", &format!("/audits/{edit}/results"), Some(batch)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  // ── Reports & catalog ───────────────────────────────────────────────────────

  #[tokio::test]
  async fn report_by_consult_token() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let consult = audit["consult_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].clone();

    let batch = json!([
      { "page_id": page_id, "topic": 1, "criterion": 1, "status": "COMPLIANT" },
      { "page_id": page_id, "topic": 1, "criterion": 2, "status": "NOT_COMPLIANT" },
      { "page_id": page_id, "topic": 2, "criterion": 1, "status": "NOT_APPLICABLE" },
    ]);
    send(&state, "PATCH", &format!("/audits/{edit}/results"), Some(batch)).await;

    let resp = send(&state, "GET", &format!("/reports/{consult}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = json_body(resp).await;
    assert_eq!(report["total_criteria_count"], 25);
    assert_eq!(report["applicable_criteria_count"], 2);
    assert_eq!(report["accessibility_rate"], 50);
    assert!(report.get("edit_unique_id").is_none());
    assert!(report.get("notes").is_none());

    // The edit token is not a consult token.
    let resp = send(&state, "GET", &format!("/reports/{edit}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn report_without_applicable_criteria_has_null_rate() {
    let (state, _) = make_state().await;
    let audit = create(&state).await;
    let consult = audit["consult_unique_id"].as_str().unwrap();

    let report = json_body(send(&state, "GET", &format!("/reports/{consult}"), None).await).await;
    assert!(report["accessibility_rate"].is_null());
  }

  #[tokio::test]
  async fn criteria_catalog_can_be_filtered() {
    let (state, _) = make_state().await;

    let full = json_body(send(&state, "GET", "/criteria", None).await).await;
    assert_eq!(full["topics"].as_array().unwrap().len(), 13);

    let fast = json_body(send(&state, "GET", "/criteria?audit_type=FAST", None).await).await;
    let count: usize = fast["topics"]
      .as_array()
      .unwrap()
      .iter()
      .map(|t| t["criteria"].as_array().unwrap().len())
      .sum();
    assert_eq!(count, 25);
  }

  // ── Example images ──────────────────────────────────────────────────────────

  #[tokio::test]
  async fn upload_and_delete_example_image() {
    let (state, uploads) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].to_string();

    let body = multipart(
      &[("page_id", page_id.as_str()), ("topic", "1"), ("criterion", "1")],
      Some(("capture.png", "image/png", &b"\x89PNG fake"[..])),
    );
    let resp = upload(&state, edit, body).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let image = json_body(resp).await;
    let key = image["key"].as_str().unwrap().to_owned();
    assert!(key.starts_with(&format!("{edit}/")));
    assert_eq!(image["original_filename"], "capture.png");
    assert!(uploads.join(&key).exists());

    let matrix = json_body(send(&state, "GET", &format!("/audits/{edit}/results"), None).await).await;
    let scored = matrix
      .as_array()
      .unwrap()
      .iter()
      .find(|r| r["topic"] == 1 && r["criterion"] == 1 && r["page_id"].to_string() == page_id)
      .unwrap();
    assert_eq!(scored["example_images"].as_array().unwrap().len(), 1);

    let id = image["id"].as_i64().unwrap();
    let resp = send(&state, "DELETE", &format!("/audits/{edit}/results/examples/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(!uploads.join(&key).exists());

    let resp = send(&state, "DELETE", &format!("/audits/{edit}/results/examples/{id}"), None).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(uploads);
  }

  #[tokio::test]
  async fn upload_rejects_non_images_and_oversized_files() {
    let (state, uploads) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["pages"][0]["id"].to_string();
    let fields = [("page_id", page_id.as_str()), ("topic", "1"), ("criterion", "1")];

    let text = multipart(&fields, Some(("notes.txt", "text/plain", &b"hi"[..])));
    let resp = upload(&state, edit, text).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let big = vec![0u8; 2048];
    let oversized = multipart(&fields, Some(("big.png", "image/png", big.as_slice())));
    let resp = upload(&state, edit, oversized).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = upload(&state, edit, multipart(&fields, None)).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert!(!uploads.exists());
  }

  #[tokio::test]
  async fn deleting_audit_removes_blobs() {
    let (state, uploads) = make_state().await;
    let audit = create(&state).await;
    let edit = audit["edit_unique_id"].as_str().unwrap();
    let page_id = audit["transverse_page"]["id"].to_string();

    let body = multipart(
      &[("page_id", page_id.as_str()), ("topic", "3"), ("criterion", "1")],
      Some(("a.jpg", "image/jpeg", &b"jpeg"[..])),
    );
    let image = json_body(upload(&state, edit, body).await).await;
    let key = image["key"].as_str().unwrap().to_owned();
    assert!(uploads.join(&key).exists());

    let resp = send(&state, "DELETE", &format!("/audits/{edit}"), None).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(!uploads.join(&key).exists());

    let _ = std::fs::remove_dir_all(uploads);
  }
}
