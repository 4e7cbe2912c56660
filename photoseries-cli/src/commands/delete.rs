use anyhow::{Context, Result};
use photoseries_core::SeriesActions;
use uuid::Uuid;

pub async fn execute(actions: &SeriesActions, series: Vec<Uuid>) -> Result<()> {
    for series_uuid in series {
        let series_uuid = series_uuid.to_string();
        tracing::info!("Deleting series: {}", series_uuid);

        let deleted = actions
            .delete(&series_uuid)
            .await
            .with_context(|| format!("Failed to delete series {series_uuid}"))?;

        println!("✓ Series deleted successfully: {} ({})", deleted.title, series_uuid);
    }

    Ok(())
}

pub async fn execute_all(actions: &SeriesActions, yes: bool) -> Result<()> {
    if !yes {
        anyhow::bail!("delete-all removes every series from the gallery; pass --yes to confirm");
    }

    let removed = actions.delete_all().await.context("Failed to delete all series")?;

    println!("✓ Deleted {removed} series, manifest is now empty");
    Ok(())
}
