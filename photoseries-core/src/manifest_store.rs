//! The manifest document, stored as one JSON object in the blob store.
//!
//! Reads return a [`ManifestVersion`] (the SHA-256 of the stored bytes).
//! [`ManifestStore::put_if_unchanged`] re-reads the document and refuses to
//! write when someone else changed it in the meantime. The re-read and the
//! write are two calls, so this narrows the race between concurrent writers
//! rather than closing it.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::error::{ManifestError, StorageError};
use crate::manifest::{self, Manifest};
use crate::storage::BlobStore;

/// Identity of the stored manifest at the time it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestVersion {
    /// No manifest document exists yet.
    Absent,
    /// Hex SHA-256 of the stored bytes.
    Digest(String),
}

impl ManifestVersion {
    fn of(bytes: &[u8]) -> Self {
        ManifestVersion::Digest(format!("{:x}", Sha256::digest(bytes)))
    }
}

/// A manifest together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub manifest: Manifest,
    pub version: ManifestVersion,
}

#[derive(Clone)]
pub struct ManifestStore {
    blobs: Arc<dyn BlobStore>,
    key: String,
}

impl ManifestStore {
    pub fn new(blobs: Arc<dyn BlobStore>, key: impl Into<String>) -> Self {
        Self {
            blobs,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn exists(&self) -> Result<bool, StorageError> {
        self.blobs.exists(&self.key).await
    }

    /// The stored manifest, or `None` if no manifest has been written yet.
    ///
    /// A document that exists but does not parse is an error, never an empty manifest.
    pub async fn get(&self) -> Result<Option<Manifest>, ManifestError> {
        match self.read().await? {
            Some(bytes) => self.parse(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Read the manifest for modification. A missing document reads as empty.
    pub async fn fetch(&self) -> Result<Fetched, ManifestError> {
        tracing::debug!("Fetching manifest {}", self.key);
        match self.read().await? {
            Some(bytes) => Ok(Fetched {
                manifest: self.parse(&bytes)?,
                version: ManifestVersion::of(&bytes),
            }),
            None => Ok(Fetched {
                manifest: Manifest::new(),
                version: ManifestVersion::Absent,
            }),
        }
    }

    /// Overwrite the manifest unconditionally.
    pub async fn put(&self, manifest: &Manifest) -> Result<ManifestVersion, ManifestError> {
        let json = manifest::to_json(manifest).map_err(ManifestError::Serialize)?;
        let bytes = json.into_bytes();
        let version = ManifestVersion::of(&bytes);

        tracing::info!("Uploading manifest {} ({} series)", self.key, manifest.len());
        self.blobs.put(&self.key, bytes, "application/json").await?;
        Ok(version)
    }

    /// Write the manifest only if the stored document is still at `expected`.
    pub async fn put_if_unchanged(
        &self,
        manifest: &Manifest,
        expected: &ManifestVersion,
    ) -> Result<ManifestVersion, ManifestError> {
        let current = match self.read().await? {
            Some(bytes) => ManifestVersion::of(&bytes),
            None => ManifestVersion::Absent,
        };
        if &current != expected {
            tracing::warn!(
                "Manifest {} changed since it was read ({:?} != {:?})",
                self.key,
                current,
                expected
            );
            return Err(ManifestError::Conflict {
                key: self.key.clone(),
            });
        }
        self.put(manifest).await
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, StorageError> {
        match self.blobs.get(&self.key).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    fn parse(&self, bytes: &[u8]) -> Result<Manifest, ManifestError> {
        manifest::from_json(bytes).map_err(|source| ManifestError::Parse {
            key: self.key.clone(),
            source,
        })
    }
}
