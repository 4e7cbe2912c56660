use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use photoseries_core::keys::parse_object_key;
use photoseries_core::storage::content_type_for;
use photoseries_core::{ImageSeries, Manifest, WebImage};

use crate::state::AppState;

/// Gallery page: every series in manifest order, one CSS grid per row.
pub async fn index(State(state): State<AppState>) -> Response {
    tracing::info!("Gallery page request");

    match state.manifests.get().await {
        Ok(manifest) => Html(generate_gallery_html(&manifest.unwrap_or_default())).into_response(),
        Err(e) => {
            tracing::error!("Failed to read manifest {}: {}", state.manifests.key(), e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(generate_error_html(500, "The gallery could not be loaded.")),
            )
                .into_response()
        }
    }
}

/// Get manifest JSON
pub async fn get_manifest(State(state): State<AppState>) -> Result<Json<Manifest>, StatusCode> {
    tracing::info!("Manifest API request");

    match state.manifests.get().await {
        Ok(Some(manifest)) => Ok(Json(manifest)),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to read manifest {}: {}", state.manifests.key(), e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Get a series image or thumbnail from the bucket
pub async fn get_image(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, StatusCode> {
    tracing::info!("Image request: key={}", key);

    if parse_object_key(&key).is_err() {
        tracing::debug!("Refusing non-series key {}", key);
        return Err(StatusCode::NOT_FOUND);
    }

    let image_data = state.blobs.get(&key).await.map_err(|e| {
        if e.is_not_found() {
            tracing::debug!("Image {} not found", key);
            StatusCode::NOT_FOUND
        } else {
            tracing::error!("Failed to fetch image {}: {}", key, e);
            StatusCode::BAD_GATEWAY
        }
    })?;

    let content_type = content_type_for(&key);
    tracing::debug!(
        "Serving image: key={}, content_type={}, size={} bytes",
        key,
        content_type,
        image_data.len()
    );
    Ok(([(header::CONTENT_TYPE, content_type)], image_data).into_response())
}

fn generate_gallery_html(manifest: &Manifest) -> String {
    let series = if manifest.is_empty() {
        r#"<p class="empty">No photo series published yet.</p>"#.to_string()
    } else {
        manifest
            .iter()
            .map(generate_series_html)
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Photo Series</title>
    <style>
        * {{
            margin: 0;
            padding: 0;
            box-sizing: border-box;
        }}

        body {{
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            background: #ffffff;
            color: #333;
            line-height: 1.6;
        }}

        .gallery-container {{
            max-width: 1400px;
            margin: 0 auto;
            padding: 40px 20px;
        }}

        .imageSeries {{
            margin-bottom: 60px;
        }}

        .imageSeriesTitle {{
            font-size: 2rem;
            font-weight: 300;
            margin-bottom: 20px;
            text-align: center;
        }}

        /* Each row is a grid whose columns are proportional to the image aspect ratios,
           so every image in a row has the same height and the row fills the width. */
        .imageSeriesRow {{
            display: grid;
            gap: 10px;
            margin-bottom: 10px;
        }}

        .imageSeriesImage {{
            display: block;
            width: 100%;
            height: auto;
            cursor: pointer;
            background: #f5f5f5;
        }}

        .empty {{
            text-align: center;
            color: #666;
        }}

        /* Lightbox */
        .lightbox {{
            display: none;
            position: fixed;
            top: 0;
            left: 0;
            width: 100%;
            height: 100%;
            background: rgba(0, 0, 0, 0.95);
            z-index: 1000;
            align-items: center;
            justify-content: center;
        }}

        .lightbox.active {{
            display: flex;
        }}

        .lightbox-image {{
            max-width: 95%;
            max-height: 95vh;
            object-fit: contain;
        }}

        .close-btn {{
            position: fixed;
            top: 20px;
            left: 20px;
            background: rgba(255, 255, 255, 0.9);
            border: none;
            width: 40px;
            height: 40px;
            cursor: pointer;
            font-size: 1.5rem;
            border-radius: 4px;
            z-index: 1001;
        }}

        .close-btn:hover {{
            background: #fff;
        }}

        @media (max-width: 768px) {{
            .imageSeriesRow {{
                grid-template-columns: 1fr !important;
            }}
        }}
    </style>
</head>
<body>
    <div class="gallery-container" id="gallery">
        {series}
    </div>

    <div class="lightbox" id="lightbox">
        <button class="close-btn" onclick="closeLightbox()">&times;</button>
        <img class="lightbox-image" id="lightbox-img" src="" alt="">
    </div>

    <script>
        function openLightbox(thumb) {{
            const lightbox = document.getElementById('lightbox');
            const lightboxImg = document.getElementById('lightbox-img');

            // Show the thumbnail while the full image loads
            lightboxImg.src = thumb.src;
            lightboxImg.alt = thumb.alt;
            lightbox.classList.add('active');

            const fullImg = new Image();
            fullImg.onload = () => {{
                lightboxImg.src = fullImg.src;
            }};
            fullImg.src = thumb.dataset.full;
        }}

        function closeLightbox() {{
            document.getElementById('lightbox').classList.remove('active');
        }}

        document.querySelectorAll('.imageSeriesImage').forEach((img) => {{
            img.addEventListener('click', () => openLightbox(img));
        }});

        // Close on escape key
        document.addEventListener('keydown', (e) => {{
            if (e.key === 'Escape') closeLightbox();
        }});

        // Close on background click
        document.getElementById('lightbox').addEventListener('click', (e) => {{
            if (e.target.id === 'lightbox') closeLightbox();
        }});
    </script>
</body>
</html>"#,
        series = series,
    )
}

fn generate_series_html(series: &ImageSeries<WebImage>) -> String {
    let rows = series
        .rows
        .iter()
        .map(|row| {
            let images = row
                .iter()
                .map(|image| {
                    format!(
                        r#"<img class="imageSeriesImage" src="/images/{thumb_key}" data-full="/images/{key}" alt="{alt}" width="{width}" height="{height}" loading="lazy">"#,
                        thumb_key = image.thumb_key,
                        key = image.key,
                        alt = html_escape(&image.alt),
                        width = image.width,
                        height = image.height,
                    )
                })
                .collect::<Vec<_>>()
                .join("\n                ");
            format!(
                r#"<div class="imageSeriesRow" style="grid-template-columns: {columns}">
                {images}
            </div>"#,
                columns = row_template(row),
                images = images,
            )
        })
        .collect::<Vec<_>>()
        .join("\n            ");

    format!(
        r#"<div class="imageSeries" id="series-{uuid}">
            <h2 class="imageSeriesTitle">{title}</h2>
            {rows}
        </div>"#,
        uuid = series.uuid,
        title = html_escape(&series.title),
        rows = rows,
    )
}

/// Grid columns sized by aspect ratio, so images in a row share one height.
fn row_template(row: &[WebImage]) -> String {
    row.iter()
        .map(|image| format!("{:.4}fr", image.aspect_ratio()))
        .collect::<Vec<_>>()
        .join(" ")
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn generate_error_html(code: u16, message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{code} - Photo Series</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, "Segoe UI", Roboto, sans-serif;
            display: flex;
            align-items: center;
            justify-content: center;
            min-height: 100vh;
            margin: 0;
            background: #ffffff;
            color: #333;
        }}
        .container {{
            text-align: center;
            padding: 40px 20px;
            max-width: 500px;
        }}
        h1 {{
            font-size: 6rem;
            font-weight: 300;
            margin: 0;
            color: #999;
        }}
        p {{
            font-size: 1.2rem;
            margin: 20px 0;
            color: #666;
        }}
        a {{
            color: #333;
            text-decoration: none;
            border-bottom: 1px solid #333;
        }}
        a:hover {{
            border-bottom: 2px solid #333;
        }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{code}</h1>
        <p>{message}</p>
        <p><a href="/">Try again</a></p>
    </div>
</body>
</html>"#,
        code = code,
        message = html_escape(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(width: u32, height: u32) -> WebImage {
        WebImage {
            alt: "x".to_string(),
            key: "k".to_string(),
            thumb_key: "t".to_string(),
            width,
            height,
        }
    }

    #[test]
    fn columns_follow_aspect_ratio() {
        assert_eq!(
            row_template(&[image(1200, 800), image(600, 900), image(500, 500)]),
            "1.5000fr 0.6667fr 1.0000fr"
        );
    }

    #[test]
    fn zero_height_falls_back_to_square() {
        assert_eq!(row_template(&[image(1200, 0)]), "1.0000fr");
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(
            html_escape(r#"<a href="x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }
}
