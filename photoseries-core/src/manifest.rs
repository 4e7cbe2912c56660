use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::ManifestEditError;

/// Images displayed left to right at equal height.
pub type ImageRow<T> = Vec<T>;

/// The published document: every series, most prominent first.
pub type Manifest = Vec<ImageSeries<WebImage>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSeries<T> {
    pub title: String,
    pub uuid: String,
    pub rows: Vec<ImageRow<T>>,
}

/// One source file of a series directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseImage {
    pub path: PathBuf,
    pub file_name: String,
    pub alt_text: String,
    pub object_key: String,
}

/// A source file together with its generated thumbnail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbImage {
    pub image: BaseImage,
    pub thumb_path: PathBuf,
    pub thumb_file_name: String,
    pub thumb_object_key: String,
}

/// An image as the browser renderer consumes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebImage {
    pub alt: String,
    pub key: String,
    pub thumb_key: String,
    pub width: u32,
    pub height: u32,
}

impl<T> ImageSeries<T> {
    pub fn images(&self) -> impl Iterator<Item = &T> {
        self.rows.iter().flatten()
    }

    pub fn image_count(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Replace every image, keeping row and series structure intact.
    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(&T) -> Result<U, E>,
    ) -> Result<ImageSeries<U>, E> {
        let rows = self
            .rows
            .iter()
            .map(|row| row.iter().map(&mut f).collect::<Result<Vec<_>, E>>())
            .collect::<Result<Vec<_>, E>>()?;

        Ok(ImageSeries {
            title: self.title.clone(),
            uuid: self.uuid.clone(),
            rows,
        })
    }
}

impl WebImage {
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

/// Result of taking a series out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removed {
    pub series: ImageSeries<WebImage>,
    /// Uuid of the series displayed just before the removed one.
    pub previous: Option<String>,
}

pub fn position(manifest: &[ImageSeries<WebImage>], uuid: &str) -> Option<usize> {
    manifest.iter().position(|series| series.uuid == uuid)
}

/// Check that `series_uuid` could be inserted after `after` without touching the manifest.
pub fn check_insert(
    manifest: &[ImageSeries<WebImage>],
    series_uuid: &str,
    after: Option<&str>,
) -> Result<(), ManifestEditError> {
    if position(manifest, series_uuid).is_some() {
        return Err(ManifestEditError::DuplicateSeries(series_uuid.to_string()));
    }
    if let Some(after) = after {
        if position(manifest, after).is_none() {
            return Err(ManifestEditError::UnknownSeries(after.to_string()));
        }
    }
    Ok(())
}

/// Insert a series at the head, or right after the series `after`.
///
/// Returns the index the series now occupies.
pub fn insert_series(
    manifest: &mut Manifest,
    series: ImageSeries<WebImage>,
    after: Option<&str>,
) -> Result<usize, ManifestEditError> {
    check_insert(manifest, &series.uuid, after)?;

    let index = match after {
        Some(after) => position(manifest, after)
            .map(|i| i + 1)
            .ok_or_else(|| ManifestEditError::UnknownSeries(after.to_string()))?,
        None => 0,
    };
    manifest.insert(index, series);
    Ok(index)
}

pub fn remove_series(manifest: &mut Manifest, uuid: &str) -> Result<Removed, ManifestEditError> {
    let index =
        position(manifest, uuid).ok_or_else(|| ManifestEditError::UnknownSeries(uuid.to_string()))?;
    let previous = index
        .checked_sub(1)
        .map(|prev| manifest[prev].uuid.clone());
    let series = manifest.remove(index);

    Ok(Removed { series, previous })
}

pub fn to_json(manifest: &[ImageSeries<WebImage>]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(manifest)
}

pub fn from_json(json: &[u8]) -> serde_json::Result<Manifest> {
    serde_json::from_slice(json)
}
