//! Add, update and delete image series.
//!
//! Ordering rules shared by every action:
//!
//! - Local work (scan, thumbnails, dimensions) happens before anything is
//!   uploaded, so format and decode errors leave storage untouched.
//! - When adding, the manifest is read only after every object is uploaded
//!   and is written last, so it never references a missing object.
//! - When deleting, the manifest is written first and objects are removed
//!   afterwards, so a failure leaves orphans rather than dangling references.
//! - Every manifest write is conditional on the version read by the same action.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ActionError;
use crate::keys::{parse_object_key, series_prefix};
use crate::manifest::{self, ImageSeries, Manifest, Removed, ThumbImage, WebImage};
use crate::manifest_store::ManifestStore;
use crate::progress::{Progress, Silent};
use crate::scan::{build_series_config, ScanOptions};
use crate::storage::BlobStore;
use crate::thumbnails::{series_thumbs, web_series, JpegThumbnailer, Thumbnailer};
use crate::transfer::{self, TransferReport, DEFAULT_CONCURRENCY};

#[derive(Debug, Clone)]
pub struct ActionOptions {
    pub scan: ScanOptions,
    /// Maximum concurrent object transfers.
    pub concurrency: usize,
}

impl Default for ActionOptions {
    fn default() -> Self {
        Self {
            scan: ScanOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Result of a successful delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub title: String,
    /// Uuid of the series that was displayed just before the deleted one.
    pub previous: Option<String>,
}

/// Differences between the manifest and the bucket contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    pub series: usize,
    /// Keys referenced by the manifest that are not stored.
    pub missing: Vec<String>,
    /// Stored series objects that the manifest does not reference.
    pub orphaned: Vec<String>,
    /// Stored keys that are neither the manifest nor a series object.
    pub unrecognized: Vec<String>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.orphaned.is_empty()
    }
}

/// A series prepared on local disk, ready to upload.
struct Prepared {
    thumbs: ImageSeries<ThumbImage>,
    web: ImageSeries<WebImage>,
}

pub struct SeriesActions {
    blobs: Arc<dyn BlobStore>,
    manifests: ManifestStore,
    thumbnailer: Arc<dyn Thumbnailer>,
    progress: Arc<dyn Progress>,
    options: ActionOptions,
}

impl SeriesActions {
    pub fn new(blobs: Arc<dyn BlobStore>, manifest_key: impl Into<String>) -> Self {
        Self {
            manifests: ManifestStore::new(Arc::clone(&blobs), manifest_key),
            blobs,
            thumbnailer: Arc::new(JpegThumbnailer::default()),
            progress: Arc::new(Silent),
            options: ActionOptions::default(),
        }
    }

    pub fn with_thumbnailer(mut self, thumbnailer: Arc<dyn Thumbnailer>) -> Self {
        self.thumbnailer = thumbnailer;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn Progress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_options(mut self, options: ActionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Fail unless the configured bucket is reachable.
    pub async fn ensure_bucket(&self) -> Result<(), ActionError> {
        let bucket = self.blobs.bucket().to_string();
        tracing::info!("Checking for bucket {}", bucket);
        match self.blobs.bucket_exists().await {
            Ok(true) => {
                tracing::info!("Found bucket {}", bucket);
                Ok(())
            }
            Ok(false) => Err(ActionError::BucketMissing {
                bucket,
                message: "bucket does not exist".to_string(),
            }),
            Err(err) => Err(ActionError::BucketMissing {
                bucket,
                message: err.to_string(),
            }),
        }
    }

    /// Publish the series in `dir` under `series_uuid`, first in the manifest
    /// or right after the series `after`. Returns the uuid used.
    pub async fn add(
        &self,
        dir: &Path,
        series_uuid: &str,
        after: Option<&str>,
    ) -> Result<String, ActionError> {
        self.ensure_bucket().await?;

        let current = self.manifests.fetch().await?;
        manifest::check_insert(&current.manifest, series_uuid, after)?;

        let prepared = self.prepare(dir, series_uuid).await?;
        self.publish(prepared, after).await?;

        tracing::info!("Finished adding image series {}", series_uuid);
        Ok(series_uuid.to_string())
    }

    /// Replace the content of a series, keeping its uuid and its position.
    pub async fn update(&self, dir: &Path, series_uuid: &str) -> Result<String, ActionError> {
        self.ensure_bucket().await?;

        // Refuse before touching anything if the new content is unusable.
        let prepared = self.prepare(dir, series_uuid).await?;

        let removed = self.remove_from_manifest(series_uuid).await?;
        let after = removed.previous.as_deref();

        self.delete_objects(series_uuid)
            .await
            .map_err(|err| republish_error(dir, series_uuid, after, err))?;
        self.publish(prepared, after)
            .await
            .map_err(|err| republish_error(dir, series_uuid, after, err))?;

        tracing::info!("Finished updating image series {}", series_uuid);
        Ok(series_uuid.to_string())
    }

    /// Remove a series from the manifest, then delete its objects.
    pub async fn delete(&self, series_uuid: &str) -> Result<Deleted, ActionError> {
        self.ensure_bucket().await?;
        self.delete_series(series_uuid).await
    }

    /// Empty the manifest, then delete the objects of every former series.
    ///
    /// Returns how many series were removed.
    pub async fn delete_all(&self) -> Result<usize, ActionError> {
        self.ensure_bucket().await?;

        let current = self.manifests.fetch().await?;
        self.manifests
            .put_if_unchanged(&Manifest::new(), &current.version)
            .await?;

        let mut failed = Vec::new();
        for series in &current.manifest {
            if self.delete_objects(&series.uuid).await.is_err() {
                failed.push(series.uuid.clone());
            }
        }
        if !failed.is_empty() {
            return Err(orphans_error(
                &failed.join(", "),
                &format!("objects of {} series could not all be deleted", failed.len()),
            ));
        }

        Ok(current.manifest.len())
    }

    /// The published manifest. A missing manifest lists as empty.
    pub async fn list(&self) -> Result<Manifest, ActionError> {
        Ok(self.manifests.fetch().await?.manifest)
    }

    /// Compare the manifest with what the bucket actually holds.
    pub async fn audit(&self) -> Result<AuditReport, ActionError> {
        let manifest = self.manifests.fetch().await?.manifest;
        let stored: BTreeSet<String> = self
            .blobs
            .list("")
            .await?
            .into_iter()
            .collect();

        let referenced: BTreeSet<&str> = manifest
            .iter()
            .flat_map(|series| series.images())
            .flat_map(|image| [image.key.as_str(), image.thumb_key.as_str()])
            .collect();

        let mut report = AuditReport {
            series: manifest.len(),
            missing: referenced
                .iter()
                .filter(|key| !stored.contains(**key))
                .map(|key| key.to_string())
                .collect(),
            ..AuditReport::default()
        };

        for key in &stored {
            if key == self.manifests.key() || referenced.contains(key.as_str()) {
                continue;
            }
            if parse_object_key(key).is_ok() {
                report.orphaned.push(key.clone());
            } else {
                report.unrecognized.push(key.clone());
            }
        }

        Ok(report)
    }

    /// Delete every orphaned series object found by [`SeriesActions::audit`].
    pub async fn purge_orphans(&self) -> Result<TransferReport, ActionError> {
        self.ensure_bucket().await?;
        let audit = self.audit().await?;
        Ok(transfer::delete_keys(
            Arc::clone(&self.blobs),
            audit.orphaned,
            self.options.concurrency,
            Arc::clone(&self.progress),
        )
        .await)
    }

    /// Scan, thumbnail and measure a series directory. No network access.
    async fn prepare(&self, dir: &Path, series_uuid: &str) -> Result<Prepared, ActionError> {
        let dir: PathBuf = dir.to_path_buf();
        let series_uuid = series_uuid.to_string();
        let scan = self.options.scan.clone();
        let thumbnailer = Arc::clone(&self.thumbnailer);
        let progress = Arc::clone(&self.progress);

        tokio::task::spawn_blocking(move || {
            let base = build_series_config(&dir, &series_uuid, &scan)?;
            tracing::info!(
                "Preparing image series {} ({}), {} images in {} rows",
                base.title,
                series_uuid,
                base.image_count(),
                base.rows.len()
            );
            let thumbs = series_thumbs(&base, thumbnailer, progress.as_ref())?;
            let web = web_series(&thumbs)?;
            Ok::<_, ActionError>(Prepared { thumbs, web })
        })
        .await?
    }

    /// Upload a prepared series and insert it into the manifest.
    async fn publish(&self, prepared: Prepared, after: Option<&str>) -> Result<(), ActionError> {
        let series_uuid = prepared.web.uuid.clone();
        let title = prepared.web.title.clone();

        let report = transfer::upload_series(
            Arc::clone(&self.blobs),
            &prepared.thumbs,
            self.options.concurrency,
            Arc::clone(&self.progress),
        )
        .await;
        if !report.is_complete() {
            return Err(orphans_error(
                &series_uuid,
                &format!(
                    "{} of {} uploads failed, manifest not updated",
                    report.failed.len(),
                    report.total()
                ),
            ));
        }
        tracing::info!("Image series {} ({}) uploaded successfully", title, series_uuid);

        let current = self.manifests.fetch().await.map_err(|err| {
            orphans_error(
                &series_uuid,
                &format!("failed to get manifest after uploading: {err}"),
            )
        })?;

        let mut next = current.manifest;
        manifest::insert_series(&mut next, prepared.web, after).map_err(|err| {
            orphans_error(&series_uuid, &format!("manifest changed after uploading: {err}"))
        })?;

        self.manifests
            .put_if_unchanged(&next, &current.version)
            .await
            .map_err(|err| {
                orphans_error(
                    &series_uuid,
                    &format!("failed to upload manifest after uploading: {err}"),
                )
            })?;

        Ok(())
    }

    async fn delete_series(&self, series_uuid: &str) -> Result<Deleted, ActionError> {
        let removed = self.remove_from_manifest(series_uuid).await?;
        self.delete_objects(series_uuid).await?;

        Ok(Deleted {
            title: removed.series.title,
            previous: removed.previous,
        })
    }

    async fn remove_from_manifest(&self, series_uuid: &str) -> Result<Removed, ActionError> {
        let current = self.manifests.fetch().await?;

        let mut next = current.manifest;
        let removed = manifest::remove_series(&mut next, series_uuid)?;
        self.manifests.put_if_unchanged(&next, &current.version).await?;

        tracing::info!("Removed series {} ({}) from manifest", removed.series.title, series_uuid);
        Ok(removed)
    }

    /// Delete every object under the series prefix. Runs after the manifest
    /// stopped referencing them, so failures only leave orphans.
    async fn delete_objects(&self, series_uuid: &str) -> Result<(), ActionError> {
        let report = transfer::delete_prefix(
            Arc::clone(&self.blobs),
            &series_prefix(series_uuid),
            self.options.concurrency,
            Arc::clone(&self.progress),
        )
        .await
        .map_err(|err| orphans_error(series_uuid, &format!("failed to list objects: {err}")))?;

        if !report.is_complete() {
            return Err(orphans_error(
                series_uuid,
                &format!(
                    "{} of {} objects could not be deleted",
                    report.failed.len(),
                    report.total()
                ),
            ));
        }
        Ok(())
    }
}

/// Objects exist in storage that the manifest does not reference.
fn orphans_error(series_uuid: &str, reason: &str) -> ActionError {
    tracing::error!("Storage and manifest out of sync for {}: {}", series_uuid, reason);
    ActionError::OutOfSync {
        series_uuid: series_uuid.to_string(),
        reason: reason.to_string(),
        hint: "Stored objects may no longer be referenced by the manifest; \
               run `check --purge` to remove them, or re-run the command"
            .to_string(),
    }
}

/// The series left the manifest during an update but did not come back.
fn republish_error(
    dir: &Path,
    series_uuid: &str,
    after: Option<&str>,
    err: ActionError,
) -> ActionError {
    let cause = match err {
        ActionError::OutOfSync { reason, .. } => reason,
        other => other.to_string(),
    };
    let hint = match after {
        Some(after) => format!(
            "Re-add it with `add-after {} {} --uuid {}`",
            dir.display(),
            after,
            series_uuid
        ),
        None => format!("Re-add it with `add {} --uuid {}`", dir.display(), series_uuid),
    };
    tracing::error!("Series {} removed from manifest but not re-published: {}", series_uuid, cause);

    ActionError::OutOfSync {
        series_uuid: series_uuid.to_string(),
        reason: format!("the series was removed from the manifest but not re-published ({cause})"),
        hint,
    }
}
