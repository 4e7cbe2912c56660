//! Error types for every layer of the maintenance pipeline.
//!
//! Helpers return the narrow error of their own layer. Only [`ActionError`]
//! decides whether a failure left storage and the manifest out of sync.

use std::path::PathBuf;

use thiserror::Error;

/// A string that does not have the `<uuid>_<name>/<file>` object key shape.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("Invalid object key: {0}")]
    Malformed(String),
}

/// Failures while reading a series directory.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Could not find {file} for image series in '{}'", dir.display())]
    MissingTitle { dir: PathBuf, file: &'static str },

    #[error("Title file '{}' is empty", .0.display())]
    EmptyTitle(PathBuf),

    #[error("Image name {name} does not match the required format (e.g. A1-lake.png)")]
    BadFileName { name: String },

    #[error("No images with extension(s) {extensions} found in '{}'", dir.display())]
    NoImages { dir: PathBuf, extensions: String },

    #[error("Images {first} and {second} would both be stored as {key}; rename one of them")]
    KeyCollision {
        first: String,
        second: String,
        key: String,
    },

    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to list directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Failures while deriving a thumbnail or reading image dimensions.
#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to decode image '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Failed to encode thumbnail '{}': {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("I/O error for '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from a blob store backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Object not found in the bucket.
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// The storage service rejected or failed the call.
    #[error("{operation} failed for {bucket}/{key}: {message}")]
    Service {
        operation: &'static str,
        bucket: String,
        key: String,
        message: String,
    },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },

    /// Background task panicked or was cancelled.
    #[error("Transfer task failed: {message}")]
    Task { message: String },
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Errors reading or writing the manifest document.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Manifest {key} is not valid JSON: {source}")]
    Parse {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to serialize manifest: {0}")]
    Serialize(#[source] serde_json::Error),

    /// The stored manifest changed between read and write.
    #[error("Manifest {key} was modified by someone else since it was read")]
    Conflict { key: String },
}

/// In-memory edits that do not fit the current manifest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestEditError {
    #[error("Series {0} not found in manifest")]
    UnknownSeries(String),

    #[error("Series {0} is already in the manifest")]
    DuplicateSeries(String),
}

/// Problems with the secrets file or resolved store settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read secrets file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Secrets file is not valid: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Secrets file is missing required field {0}")]
    Missing(&'static str),
}

/// Outcome of a failed maintenance action.
///
/// Every variant except [`ActionError::OutOfSync`] means the published site
/// is unchanged.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("Bucket {bucket} is not accessible: {message}")]
    BucketMissing { bucket: String, message: String },

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Thumbnail(#[from] ThumbnailError),

    #[error("Series {0} not found in manifest")]
    NotFound(String),

    #[error("Series {0} is already in the manifest")]
    Duplicate(String),

    #[error("Failed to read or write manifest: {0}")]
    Manifest(#[source] ManifestError),

    #[error("Storage request failed: {0}")]
    Storage(#[from] StorageError),

    #[error("Manifest {key} changed while this action ran; nothing was written, run it again")]
    Conflict { key: String },

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Storage and the manifest disagree. Never repaired automatically.
    #[error("MANIFEST IS OUT OF SYNC for series {series_uuid}: {reason}. {hint}")]
    OutOfSync {
        series_uuid: String,
        reason: String,
        hint: String,
    },
}

impl ActionError {
    /// Whether the action partially happened and needs a manual fix.
    pub fn is_out_of_sync(&self) -> bool {
        matches!(self, ActionError::OutOfSync { .. })
    }

    /// Whether simply re-running the same command is expected to succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Conflict { .. })
    }
}

impl From<ManifestError> for ActionError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Conflict { key } => ActionError::Conflict { key },
            other => ActionError::Manifest(other),
        }
    }
}

impl From<ManifestEditError> for ActionError {
    fn from(err: ManifestEditError) -> Self {
        match err {
            ManifestEditError::UnknownSeries(uuid) => ActionError::NotFound(uuid),
            ManifestEditError::DuplicateSeries(uuid) => ActionError::Duplicate(uuid),
        }
    }
}
