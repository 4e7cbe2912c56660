//! Blob store interface used by every maintenance action.

use std::path::Path;

use async_trait::async_trait;

use crate::error::StorageError;

/// Key/value object storage scoped to one bucket.
///
/// `put` overwrites silently and `delete` of an absent key succeeds. No
/// operation spans more than one key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the bucket, for diagnostics.
    fn bucket(&self) -> &str;

    /// Whether the bucket exists and is reachable with the configured credentials.
    async fn bucket_exists(&self) -> Result<bool, StorageError>;

    /// Download an object. Absent keys yield [`StorageError::NotFound`].
    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<(), StorageError>;

    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// Every key starting with `prefix`, across all result pages.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    async fn exists(&self, key: &str) -> Result<bool, StorageError>;

    /// Upload a local file.
    async fn put_file(
        &self,
        path: &Path,
        key: &str,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let data = tokio::fs::read(path).await.map_err(|e| StorageError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.put(key, data, content_type).await
    }
}

pub fn content_type_for(key: &str) -> &'static str {
    let lower = key.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else if lower.ends_with(".json") {
        "application/json"
    } else {
        "application/octet-stream"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for("u_s/A1-bird.png"), "image/png");
        assert_eq!(content_type_for("u_s/A1-bird-thumb.jpg"), "image/jpeg");
        assert_eq!(content_type_for("u_s/A1-bird.JPEG"), "image/jpeg");
        assert_eq!(content_type_for("manifest.json"), "application/json");
        assert_eq!(content_type_for("u_s/notes"), "application/octet-stream");
    }
}
