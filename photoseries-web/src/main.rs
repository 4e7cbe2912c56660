mod handlers;
mod state;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use photoseries_core::config::Overrides;
use photoseries_core::{Secrets, StoreSettings};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photoseries_web=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get configuration from environment
    let secrets_path: PathBuf = env::var("PHOTO_SECRETS_PATH")
        .context("PHOTO_SECRETS_PATH environment variable must be set")?
        .into();
    let secrets = Secrets::from_file(&secrets_path)
        .with_context(|| format!("Failed to load secrets from {}", secrets_path.display()))?;
    let settings = StoreSettings::resolve(
        secrets,
        Overrides {
            bucket: env::var("PHOTO_BUCKET").ok(),
            manifest_key: env::var("PHOTO_MANIFEST_KEY").ok(),
            endpoint: env::var("AWS_ENDPOINT_URL").ok(),
        },
    )?;
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());

    let state = AppState::new(&settings).await?;
    let app = router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Gallery web server listening on {} (bucket {})", addr, settings.bucket);

    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/manifest", get(handlers::get_manifest))
        .route("/images/*key", get(handlers::get_image))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
