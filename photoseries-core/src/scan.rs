//! Series directory scanning.
//!
//! A series directory looks like this:
//!
//! ```text
//! birds/
//! ├── title.txt            # Series title
//! ├── A1-heron.png         # Row A, first image, alt text "heron"
//! ├── A2-kingfisher.png
//! └── B1-crow at dawn.png  # Row B, alt text "crow at dawn"
//! ```
//!
//! Rows are identified by a single uppercase letter and displayed in
//! alphabetical order; the number orders images within a row. Any image whose
//! name does not follow `<Letter><Digits>-<description>.<ext>` fails the scan.
//! Nothing is uploaded or written here.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use walkdir::WalkDir;

use crate::error::ScanError;
use crate::keys::object_key;
use crate::manifest::{BaseImage, ImageSeries};
use crate::thumbnails::{is_thumbnail_name, thumb_file_name};

pub const TITLE_FILE: &str = "title.txt";

static IMAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Z])([0-9]+)-(.+)\.[^.]+$").expect("static regex"));

#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Accepted image extensions, without the dot. Compared case-insensitively.
    pub extensions: Vec<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: vec!["png".to_string()],
        }
    }
}

impl ScanOptions {
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.extensions
                    .iter()
                    .any(|accepted| accepted.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}

/// Position of an image within its row, compared numerically.
///
/// Kept as digits so that arbitrarily long numbers still order correctly.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position {
    // Field order matters: fewer significant digits is the smaller number.
    len: usize,
    digits: String,
}

impl Position {
    pub fn from_digits(digits: &str) -> Self {
        let trimmed = digits.trim_start_matches('0');
        let digits = if trimmed.is_empty() { "0" } else { trimmed };
        Self {
            len: digits.len(),
            digits: digits.to_string(),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digits)
    }
}

/// Row, position and alt text encoded in an image file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageName {
    pub row: char,
    pub order: Position,
    pub alt_text: String,
}

/// Parse `A12-alt text.png` into row `A`, order 12 and alt text `alt text`.
pub fn parse_image_name(name: &str) -> Result<ImageName, ScanError> {
    let bad_name = || ScanError::BadFileName {
        name: name.to_string(),
    };
    let captures = IMAGE_NAME.captures(name).ok_or_else(bad_name)?;

    Ok(ImageName {
        row: captures[1].chars().next().ok_or_else(bad_name)?,
        order: Position::from_digits(&captures[2]),
        alt_text: captures[3].to_string(),
    })
}

/// Read the series title. Surrounding whitespace, including the trailing newline, is dropped.
pub fn read_title(dir: &Path) -> Result<String, ScanError> {
    let path = dir.join(TITLE_FILE);
    if !path.is_file() {
        return Err(ScanError::MissingTitle {
            dir: dir.to_path_buf(),
            file: TITLE_FILE,
        });
    }

    let title = std::fs::read_to_string(&path).map_err(|source| ScanError::Io {
        path: path.clone(),
        source,
    })?;
    let title = title.trim();
    if title.is_empty() {
        return Err(ScanError::EmptyTitle(path));
    }
    Ok(title.to_string())
}

/// Describe the images of `dir` as a series, before any thumbnail or upload work.
pub fn build_series_config(
    dir: &Path,
    series_uuid: &str,
    options: &ScanOptions,
) -> Result<ImageSeries<BaseImage>, ScanError> {
    let title = read_title(dir)?;

    let mut rows: BTreeMap<char, Vec<(Position, BaseImage)>> = BTreeMap::new();
    // Every object key the series will use, with the file that claims it.
    let mut claimed: HashMap<String, String> = HashMap::new();
    for path in collect_image_paths(dir, options)? {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| ScanError::BadFileName {
                name: path.display().to_string(),
            })?
            .to_string();
        let parsed = parse_image_name(&file_name)?;

        let image = BaseImage {
            object_key: object_key(series_uuid, &title, &file_name),
            alt_text: parsed.alt_text,
            file_name,
            path,
        };
        let thumb_key = object_key(series_uuid, &title, &thumb_file_name(&image.file_name));
        for key in [&image.object_key, &thumb_key] {
            if let Some(first) = claimed.insert(key.clone(), image.file_name.clone()) {
                return Err(ScanError::KeyCollision {
                    first,
                    second: image.file_name.clone(),
                    key: key.clone(),
                });
            }
        }
        rows.entry(parsed.row).or_default().push((parsed.order, image));
    }

    if rows.is_empty() {
        return Err(ScanError::NoImages {
            dir: dir.to_path_buf(),
            extensions: options.extensions.join(", "),
        });
    }

    let rows = rows
        .into_values()
        .map(|mut row| {
            row.sort_by(|(a_order, a), (b_order, b)| {
                a_order.cmp(b_order).then_with(|| a.file_name.cmp(&b.file_name))
            });
            row.into_iter().map(|(_, image)| image).collect()
        })
        .collect();

    tracing::debug!("Scanned series '{}' in {}", title, dir.display());
    Ok(ImageSeries {
        title,
        uuid: series_uuid.to_string(),
        rows,
    })
}

/// Direct children of `dir` with an accepted extension, excluding generated thumbnails.
fn collect_image_paths(dir: &Path, options: &ScanOptions) -> Result<Vec<PathBuf>, ScanError> {
    let mut paths = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() || !options.accepts(entry.path()) {
            continue;
        }
        let is_thumb = entry
            .file_name()
            .to_str()
            .map(is_thumbnail_name)
            .unwrap_or(false);
        if !is_thumb {
            paths.push(entry.into_path());
        }
    }

    paths.sort();
    Ok(paths)
}
