use std::sync::Arc;

use anyhow::{Context, Result};
use photoseries_core::actions::ActionOptions;
use photoseries_core::config::Overrides;
use photoseries_core::scan::ScanOptions;
use photoseries_core::{S3BlobStore, Secrets, SeriesActions, StoreSettings};

use crate::progress::BarProgress;
use crate::StoreArgs;

/// Resolve credentials and build the actions for the configured bucket.
pub async fn connect(args: &StoreArgs) -> Result<SeriesActions> {
    let secrets_path = args
        .secrets
        .as_deref()
        .context("No secrets file given; pass --secrets or set PHOTO_SECRETS_PATH")?;
    let secrets = Secrets::from_file(secrets_path)
        .with_context(|| format!("Failed to load secrets from {}", secrets_path.display()))?;

    let settings = StoreSettings::resolve(
        secrets,
        Overrides {
            bucket: args.bucket.clone(),
            manifest_key: args.manifest_key.clone(),
            endpoint: args.endpoint_url.clone(),
        },
    )?;
    tracing::debug!("Using {:?}", settings);

    let blobs = Arc::new(S3BlobStore::new(&settings).await);
    let options = ActionOptions {
        scan: ScanOptions::with_extensions(&args.extension),
        ..ActionOptions::default()
    };

    Ok(SeriesActions::new(blobs, settings.manifest_key)
        .with_options(options)
        .with_progress(Arc::new(BarProgress::default())))
}
