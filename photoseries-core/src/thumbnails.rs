//! Thumbnail generation.
//!
//! Thumbnails are written next to their source image as `<stem>-thumb.jpg`.
//! An existing thumbnail is always reused, so re-running an action on the same
//! directory never re-encodes anything.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, DynamicImage, GenericImageView};
use rayon::prelude::*;

use crate::error::ThumbnailError;
use crate::keys::object_key;
use crate::manifest::{BaseImage, ImageSeries, ThumbImage, WebImage};
use crate::progress::{Progress, Stage};

pub const THUMB_SUFFIX: &str = "-thumb.jpg";

/// Largest width or height of a thumbnail.
pub const THUMB_BOUND: u32 = 1920;

const THUMB_QUALITY: u8 = 85;

/// Renders a downscaled JPEG copy of an image.
pub trait Thumbnailer: Send + Sync {
    fn render(&self, source: &Path, target: &Path) -> Result<(), ThumbnailError>;
}

#[derive(Debug, Clone, Copy)]
pub struct JpegThumbnailer {
    pub bound: u32,
    pub quality: u8,
}

impl Default for JpegThumbnailer {
    fn default() -> Self {
        Self {
            bound: THUMB_BOUND,
            quality: THUMB_QUALITY,
        }
    }
}

impl Thumbnailer for JpegThumbnailer {
    fn render(&self, source: &Path, target: &Path) -> Result<(), ThumbnailError> {
        let img = open_image(source)?;

        let (width, height) = img.dimensions();
        let (thumb_width, thumb_height) = fit_within((width, height), self.bound);
        let resized = if (thumb_width, thumb_height) == (width, height) {
            img
        } else {
            img.resize_exact(thumb_width, thumb_height, FilterType::Lanczos3)
        };

        // Written under a temporary name so an interrupted run never leaves
        // a truncated thumbnail that later runs would reuse.
        let partial = target.with_extension("jpg.partial");
        encode_jpeg(&resized, &partial, self.quality)?;
        std::fs::rename(&partial, target).map_err(|source| ThumbnailError::Io {
            path: target.to_path_buf(),
            source,
        })
    }
}

fn encode_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), ThumbnailError> {
    let file = File::create(path).map_err(|source| ThumbnailError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), quality);

    // JPEG has no alpha channel
    DynamicImage::ImageRgb8(img.to_rgb8())
        .write_with_encoder(encoder)
        .map_err(|source| ThumbnailError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

fn open_image(path: &Path) -> Result<DynamicImage, ThumbnailError> {
    image::ImageReader::open(path)
        .map_err(|source| ThumbnailError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .with_guessed_format()
        .map_err(|source| ThumbnailError::Io {
            path: path.to_path_buf(),
            source,
        })?
        .decode()
        .map_err(|source| ThumbnailError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

/// Scale `(width, height)` down so both fit within `bound`, keeping the aspect ratio.
///
/// Never upscales. Neither side drops below one pixel.
pub fn fit_within((width, height): (u32, u32), bound: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (width, height);
    }
    let scale = (bound as f64 / width as f64)
        .min(bound as f64 / height as f64)
        .min(1.0);
    if scale >= 1.0 {
        return (width, height);
    }
    let scaled = |side: u32| ((side as f64 * scale).round() as u32).max(1);
    (scaled(width), scaled(height))
}

/// `A1-bird.png` becomes `A1-bird-thumb.jpg`.
pub fn thumb_file_name(file_name: &str) -> String {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or(file_name);
    format!("{stem}{THUMB_SUFFIX}")
}

pub fn is_thumbnail_name(file_name: &str) -> bool {
    file_name.ends_with(THUMB_SUFFIX)
}

/// Make sure a thumbnail exists for `image` and describe it.
pub fn ensure_thumbnail(
    image: &BaseImage,
    series_uuid: &str,
    series_title: &str,
    thumbnailer: &dyn Thumbnailer,
) -> Result<ThumbImage, ThumbnailError> {
    let thumb_file_name = thumb_file_name(&image.file_name);
    let thumb_path = thumb_path_for(&image.path, &thumb_file_name);

    if thumb_path.is_file() {
        tracing::debug!("Found thumbnail {} for image {}", thumb_file_name, image.path.display());
    } else {
        thumbnailer.render(&image.path, &thumb_path)?;
        tracing::debug!("Created thumbnail {} for image {}", thumb_file_name, image.path.display());
    }

    Ok(ThumbImage {
        image: image.clone(),
        thumb_object_key: object_key(series_uuid, series_title, &thumb_file_name),
        thumb_path,
        thumb_file_name,
    })
}

fn thumb_path_for(source: &Path, thumb_file_name: &str) -> PathBuf {
    source.with_file_name(thumb_file_name)
}

/// Thumbnail every image of a series in parallel, keeping rows and order intact.
pub fn series_thumbs(
    series: &ImageSeries<BaseImage>,
    thumbnailer: Arc<dyn Thumbnailer>,
    progress: &dyn Progress,
) -> Result<ImageSeries<ThumbImage>, ThumbnailError> {
    progress.start(Stage::Thumbnails, series.image_count() as u64);

    let rows = series
        .rows
        .par_iter()
        .map(|row| {
            row.par_iter()
                .map(|image| {
                    let thumb = ensure_thumbnail(
                        image,
                        &series.uuid,
                        &series.title,
                        thumbnailer.as_ref(),
                    );
                    progress.advance(Stage::Thumbnails, &image.file_name);
                    thumb
                })
                .collect::<Result<Vec<_>, _>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    progress.finish(Stage::Thumbnails);
    Ok(ImageSeries {
        title: series.title.clone(),
        uuid: series.uuid.clone(),
        rows,
    })
}

/// Natural pixel size of an image file, read from its header.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32), ThumbnailError> {
    image::image_dimensions(path).map_err(|source| ThumbnailError::Decode {
        path: path.to_path_buf(),
        source,
    })
}

/// Describe a thumbnailed series the way the browser renderer consumes it.
pub fn web_series(
    series: &ImageSeries<ThumbImage>,
) -> Result<ImageSeries<WebImage>, ThumbnailError> {
    series.try_map(|thumb| {
        let (width, height) = image_dimensions(&thumb.image.path)?;
        Ok(WebImage {
            alt: thumb.image.alt_text.clone(),
            key: thumb.image.object_key.clone(),
            thumb_key: thumb.thumb_object_key.clone(),
            width,
            height,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Silent;
    use crate::scan::{build_series_config, ScanOptions, TITLE_FILE};
    use image::{Rgba, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const UUID: &str = "bbfb361e-88f8-4e1c-bf0a-8d813323eb52";

    struct Counting {
        inner: JpegThumbnailer,
        calls: AtomicUsize,
    }

    impl Thumbnailer for Counting {
        fn render(&self, source: &Path, target: &Path) -> Result<(), ThumbnailError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.render(source, target)
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 128]))
            .save(path)
            .unwrap();
    }

    fn setup() -> TempDir {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(TITLE_FILE), "My Images").unwrap();
        write_png(&tmp.path().join("A1-bird.png"), 64, 48);
        write_png(&tmp.path().join("A2-nest.png"), 30, 40);
        write_png(&tmp.path().join("B1-egg.png"), 10, 10);
        tmp
    }

    #[test]
    fn fit_within_bound() {
        assert_eq!(fit_within((3840, 2160), 1920), (1920, 1080));
        assert_eq!(fit_within((1000, 4000), 1920), (480, 1920));
        assert_eq!(fit_within((800, 600), 1920), (800, 600));
        assert_eq!(fit_within((1920, 1920), 1920), (1920, 1920));
        assert_eq!(fit_within((10000, 1), 100), (100, 1));
    }

    #[test]
    fn thumb_names() {
        assert_eq!(thumb_file_name("A1-bird.png"), "A1-bird-thumb.jpg");
        assert_eq!(thumb_file_name("A1-my bird.v2.png"), "A1-my bird.v2-thumb.jpg");
        assert!(is_thumbnail_name("A1-bird-thumb.jpg"));
        assert!(!is_thumbnail_name("A1-bird.jpg"));
    }

    #[test]
    fn series_thumbnails_are_described() {
        let tmp = setup();
        let config = build_series_config(tmp.path(), UUID, &ScanOptions::default()).unwrap();
        let thumbs = series_thumbs(&config, Arc::new(JpegThumbnailer::default()), &Silent).unwrap();

        assert_eq!(thumbs.title, "My Images");
        assert_eq!(thumbs.uuid, UUID);
        assert_eq!(thumbs.rows.len(), 2);
        assert_eq!(thumbs.rows[0].len(), 2);

        let bird = &thumbs.rows[0][0];
        assert_eq!(bird.image, config.rows[0][0]);
        assert_eq!(bird.thumb_path, tmp.path().join("A1-bird-thumb.jpg"));
        assert_eq!(bird.thumb_file_name, "A1-bird-thumb.jpg");
        assert_eq!(bird.thumb_object_key, object_key(UUID, "My Images", "A1-bird-thumb.jpg"));
        assert!(std::fs::metadata(&bird.thumb_path).unwrap().len() > 0);
        assert_eq!(image_dimensions(&bird.thumb_path).unwrap(), (64, 48));
        assert_eq!(thumbs.rows[0][1].image.file_name, "A2-nest.png");
    }

    #[test]
    fn existing_thumbnails_are_reused() {
        let tmp = setup();
        let config = build_series_config(tmp.path(), UUID, &ScanOptions::default()).unwrap();
        let counting = Arc::new(Counting {
            inner: JpegThumbnailer::default(),
            calls: AtomicUsize::new(0),
        });

        let first = series_thumbs(&config, counting.clone(), &Silent).unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
        let bytes = std::fs::read(tmp.path().join("A1-bird-thumb.jpg")).unwrap();

        let second = series_thumbs(&config, counting.clone(), &Silent).unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
        assert_eq!(first, second);
        assert_eq!(std::fs::read(tmp.path().join("A1-bird-thumb.jpg")).unwrap(), bytes);
    }

    #[test]
    fn large_images_are_downscaled() {
        let tmp = TempDir::new().unwrap();
        let source = tmp.path().join("A1-wide.png");
        write_png(&source, 400, 100);

        let thumbnailer = JpegThumbnailer { bound: 100, quality: 80 };
        let target = tmp.path().join("A1-wide-thumb.jpg");
        thumbnailer.render(&source, &target).unwrap();

        assert_eq!(image_dimensions(&target).unwrap(), (100, 25));
        assert!(!tmp.path().join("A1-wide-thumb.jpg.partial").exists());
    }

    #[test]
    fn undecodable_image_fails() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(TITLE_FILE), "Broken").unwrap();
        std::fs::write(tmp.path().join("A1-broken.png"), "not an image").unwrap();

        let config = build_series_config(tmp.path(), UUID, &ScanOptions::default()).unwrap();
        let err =
            series_thumbs(&config, Arc::new(JpegThumbnailer::default()), &Silent).unwrap_err();

        assert!(matches!(err, ThumbnailError::Decode { .. }));
        assert!(!tmp.path().join("A1-broken-thumb.jpg").exists());
    }

    #[test]
    fn web_series_reads_full_size_dimensions() {
        let tmp = setup();
        let config = build_series_config(tmp.path(), UUID, &ScanOptions::default()).unwrap();
        let thumbs = series_thumbs(&config, Arc::new(JpegThumbnailer::default()), &Silent).unwrap();
        let web = web_series(&thumbs).unwrap();

        let nest = &web.rows[0][1];
        assert_eq!((nest.width, nest.height), (30, 40));
        assert_eq!(nest.alt, "nest");
        assert_eq!(nest.key, thumbs.rows[0][1].image.object_key);
        assert_eq!(nest.thumb_key, thumbs.rows[0][1].thumb_object_key);
    }
}
