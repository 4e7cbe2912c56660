use anyhow::{Context, Result};
use photoseries_core::SeriesActions;

pub async fn execute(actions: &SeriesActions) -> Result<()> {
    let manifest = actions.list().await.context("Failed to read manifest")?;

    if manifest.is_empty() {
        println!("No series published");
        return Ok(());
    }

    for (position, series) in manifest.iter().enumerate() {
        println!(
            "{:>3}. {}  {}  ({} images in {} rows)",
            position + 1,
            series.uuid,
            series.title,
            series.image_count(),
            series.rows.len()
        );
    }

    Ok(())
}
