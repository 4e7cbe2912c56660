pub mod actions;
pub mod config;
pub mod error;
pub mod keys;
pub mod manifest;
pub mod manifest_store;
pub mod memory;
pub mod progress;
pub mod s3;
pub mod scan;
pub mod storage;
pub mod thumbnails;
pub mod transfer;

pub use actions::{ActionOptions, AuditReport, Deleted, SeriesActions};
pub use config::{Secrets, StoreSettings};
pub use error::{
    ActionError, ConfigError, KeyError, ManifestEditError, ManifestError, ScanError, StorageError,
    ThumbnailError,
};
pub use manifest::{BaseImage, ImageRow, ImageSeries, Manifest, ThumbImage, WebImage};
pub use manifest_store::{Fetched, ManifestStore, ManifestVersion};
pub use memory::MemoryBlobStore;
pub use progress::{Progress, Silent, Stage};
pub use s3::S3BlobStore;
pub use storage::BlobStore;
