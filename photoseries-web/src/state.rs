use std::sync::Arc;

use anyhow::Result;
use photoseries_core::{BlobStore, ManifestStore, S3BlobStore, StoreSettings};

#[derive(Clone)]
pub struct AppState {
    pub blobs: Arc<dyn BlobStore>,
    pub manifests: ManifestStore,
}

impl AppState {
    pub async fn new(settings: &StoreSettings) -> Result<Self> {
        let blobs: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(settings).await);
        Ok(Self::with_store(blobs, settings.manifest_key.clone()))
    }

    pub fn with_store(blobs: Arc<dyn BlobStore>, manifest_key: String) -> Self {
        Self {
            manifests: ManifestStore::new(Arc::clone(&blobs), manifest_key),
            blobs,
        }
    }
}
