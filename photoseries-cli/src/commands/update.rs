use std::path::PathBuf;

use anyhow::{Context, Result};
use photoseries_core::SeriesActions;
use uuid::Uuid;

/// Update series one pair at a time; the first failure stops the run.
pub async fn execute(actions: &SeriesActions, pairs: Vec<(PathBuf, Uuid)>) -> Result<()> {
    for (dir, series) in pairs {
        let series_uuid = series.to_string();
        tracing::info!("Updating series {} from {}", series_uuid, dir.display());

        actions
            .update(&dir, &series_uuid)
            .await
            .with_context(|| format!("Failed to update series {series_uuid}"))?;

        println!("✓ Series updated: {series_uuid}");
    }
    Ok(())
}
