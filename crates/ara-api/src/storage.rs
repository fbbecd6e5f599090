//! Local-directory object store for example image blobs.

use std::{io, path::PathBuf};

use bytes::Bytes;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Longest file name kept in a storage key.
const MAX_FILENAME_LEN: usize = 100;

/// Blob storage rooted at a directory. Keys are relative `/`-separated paths.
#[derive(Debug, Clone)]
pub struct ImageStorage {
  root:             PathBuf,
  max_upload_bytes: usize,
}

impl ImageStorage {
  pub fn new(root: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
    Self { root: root.into(), max_upload_bytes }
  }

  pub fn max_upload_bytes(&self) -> usize { self.max_upload_bytes }

  /// A fresh key `<edit-token>/<uuid>-<filename>` for an upload.
  pub fn key_for(&self, edit_id: &str, filename: &str) -> String {
    format!("{}/{}-{}", sanitize(edit_id), Uuid::new_v4(), sanitize(filename))
  }

  pub async fn put(&self, key: &str, data: &Bytes) -> io::Result<()> {
    let path = self.root.join(key);
    if let Some(parent) = path.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, data).await
  }

  pub async fn remove(&self, key: &str) -> io::Result<()> {
    tokio::fs::remove_file(self.root.join(key)).await
  }

  /// Remove every key, logging the ones that fail instead of aborting.
  pub async fn remove_all(&self, keys: impl IntoIterator<Item = String>) {
    for key in keys {
      if let Err(error) = self.remove(&key).await {
        tracing::warn!(%key, %error, "failed to remove image blob");
      }
    }
  }
}

/// Hex SHA-256 of the blob contents.
pub fn content_hash(data: &[u8]) -> String { hex::encode(Sha256::digest(data)) }

/// Reduce a client-supplied name to a safe single path segment.
fn sanitize(name: &str) -> String {
  let cleaned: String = name
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' }
    })
    .take(MAX_FILENAME_LEN)
    .collect();
  let cleaned = cleaned.trim_start_matches('.');
  if cleaned.is_empty() { "image".to_owned() } else { cleaned.to_owned() }
}
