//! Multi-object uploads and deletes.
//!
//! Objects are transferred concurrently on tokio tasks. A failed object never
//! stops the others; every failure is collected into the [`TransferReport`].

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::StorageError;
use crate::manifest::{ImageSeries, ThumbImage};
use crate::progress::{Progress, Stage};
use crate::storage::{content_type_for, BlobStore};

pub const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferFailure {
    pub key: String,
    pub error: StorageError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub succeeded: usize,
    /// Sorted by key.
    pub failed: Vec<TransferFailure>,
}

impl TransferReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.failed.len()
    }

    pub fn failed_keys(&self) -> Vec<&str> {
        self.failed.iter().map(|f| f.key.as_str()).collect()
    }
}

type Outcome = (String, Result<(), StorageError>);

/// Local file / object key pairs for every full image and thumbnail of a series.
pub fn series_files(series: &ImageSeries<ThumbImage>) -> Vec<(PathBuf, String)> {
    series
        .images()
        .flat_map(|thumb| {
            [
                (thumb.image.path.clone(), thumb.image.object_key.clone()),
                (thumb.thumb_path.clone(), thumb.thumb_object_key.clone()),
            ]
        })
        .collect()
}

/// Upload every full image and thumbnail of a series. Does not touch the manifest.
pub async fn upload_series(
    blobs: Arc<dyn BlobStore>,
    series: &ImageSeries<ThumbImage>,
    concurrency: usize,
    progress: Arc<dyn Progress>,
) -> TransferReport {
    tracing::info!("Uploading image series {} ({})", series.title, series.uuid);
    upload_files(blobs, series_files(series), concurrency, progress).await
}

pub async fn upload_files(
    blobs: Arc<dyn BlobStore>,
    files: Vec<(PathBuf, String)>,
    concurrency: usize,
    progress: Arc<dyn Progress>,
) -> TransferReport {
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    progress.start(Stage::Upload, files.len() as u64);

    for (path, key) in files {
        let blobs = Arc::clone(&blobs);
        let limit = Arc::clone(&limit);
        let progress = Arc::clone(&progress);

        tasks.spawn(async move {
            let _permit = limit.acquire_owned().await;
            tracing::debug!("Uploading {} ({})", key, path.display());
            let result = blobs.put_file(&path, &key, content_type_for(&key)).await;
            progress.advance(Stage::Upload, &key);
            (key, result)
        });
    }

    collect(tasks, Stage::Upload, progress).await
}

pub async fn delete_keys(
    blobs: Arc<dyn BlobStore>,
    keys: Vec<String>,
    concurrency: usize,
    progress: Arc<dyn Progress>,
) -> TransferReport {
    let limit = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut tasks = JoinSet::new();
    progress.start(Stage::Delete, keys.len() as u64);

    for key in keys {
        let blobs = Arc::clone(&blobs);
        let limit = Arc::clone(&limit);
        let progress = Arc::clone(&progress);

        tasks.spawn(async move {
            let _permit = limit.acquire_owned().await;
            let result = blobs.delete(&key).await;
            if result.is_ok() {
                tracing::debug!("Deleted object {}", key);
            }
            progress.advance(Stage::Delete, &key);
            (key, result)
        });
    }

    collect(tasks, Stage::Delete, progress).await
}

/// Delete every object whose key starts with `prefix`.
///
/// Listing failures abort before anything is deleted.
pub async fn delete_prefix(
    blobs: Arc<dyn BlobStore>,
    prefix: &str,
    concurrency: usize,
    progress: Arc<dyn Progress>,
) -> Result<TransferReport, StorageError> {
    let keys = blobs.list(prefix).await?;
    tracing::info!("Deleting {} objects under {}", keys.len(), prefix);
    Ok(delete_keys(blobs, keys, concurrency, progress).await)
}

async fn collect(
    mut tasks: JoinSet<Outcome>,
    stage: Stage,
    progress: Arc<dyn Progress>,
) -> TransferReport {
    let mut report = TransferReport::default();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(()))) => report.succeeded += 1,
            Ok((key, Err(error))) => {
                tracing::error!("{} failed for {}: {}", stage.label(), key, error);
                report.failed.push(TransferFailure { key, error });
            }
            Err(join_err) => {
                tracing::error!("{} task failed: {}", stage.label(), join_err);
                report.failed.push(TransferFailure {
                    key: String::new(),
                    error: StorageError::Task {
                        message: join_err.to_string(),
                    },
                });
            }
        }
    }

    report.failed.sort_by(|a, b| a.key.cmp(&b.key));
    progress.finish(stage);
    report
}
