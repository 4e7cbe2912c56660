use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use photoseries_core::SeriesActions;
use uuid::Uuid;

/// Add each directory as a new series at the top of the gallery.
///
/// Directories are handled one at a time and the first failure stops the run.
pub async fn execute(
    actions: &SeriesActions,
    dirs: Vec<PathBuf>,
    uuid: Option<Uuid>,
) -> Result<()> {
    if uuid.is_some() && dirs.len() > 1 {
        anyhow::bail!("--uuid can only be used with a single directory");
    }
    for dir in dirs {
        add_one(actions, &dir, uuid, None).await?;
    }
    Ok(())
}

/// Add each directory right after the series paired with it, in order.
pub async fn execute_after(
    actions: &SeriesActions,
    pairs: Vec<(PathBuf, Uuid)>,
    uuid: Option<Uuid>,
) -> Result<()> {
    if uuid.is_some() && pairs.len() > 1 {
        anyhow::bail!("--uuid can only be used with a single DIR AFTER pair");
    }
    for (dir, after) in pairs {
        add_one(actions, &dir, uuid, Some(after)).await?;
    }
    Ok(())
}

async fn add_one(
    actions: &SeriesActions,
    dir: &Path,
    uuid: Option<Uuid>,
    after: Option<Uuid>,
) -> Result<()> {
    let series_uuid = uuid.unwrap_or_else(Uuid::new_v4).to_string();
    let after = after.map(|after| after.to_string());
    println!("Series directory: {}", dir.display());
    println!("Series ID: {}\n", series_uuid);

    actions
        .add(dir, &series_uuid, after.as_deref())
        .await
        .with_context(|| format!("Failed to add {}", dir.display()))?;

    match &after {
        Some(after) => println!("✓ Series added after {after}: {series_uuid}\n"),
        None => println!("✓ Series added: {series_uuid}\n"),
    }
    Ok(())
}
