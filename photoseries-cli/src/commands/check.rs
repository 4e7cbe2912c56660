use anyhow::{Context, Result};
use photoseries_core::SeriesActions;

pub async fn execute(actions: &SeriesActions, purge: bool) -> Result<()> {
    let report = actions.audit().await.context("Failed to compare manifest with bucket")?;

    println!("Series in manifest: {}", report.series);
    for key in &report.missing {
        println!("  missing:      {key}");
    }
    for key in &report.orphaned {
        println!("  orphaned:     {key}");
    }
    for key in &report.unrecognized {
        println!("  unrecognized: {key}");
    }

    if report.is_consistent() {
        println!("✓ Manifest and bucket agree");
        return Ok(());
    }

    if purge && !report.orphaned.is_empty() {
        let purged = actions.purge_orphans().await.context("Failed to purge orphaned objects")?;
        if !purged.is_complete() {
            anyhow::bail!(
                "Failed to delete {} orphaned objects: {}",
                purged.failed.len(),
                purged.failed_keys().join(", ")
            );
        }
        println!("✓ Deleted {} orphaned objects", purged.succeeded);
    }

    if !report.missing.is_empty() {
        anyhow::bail!(
            "{} objects referenced by the manifest are missing; \
             re-publish the affected series with `update`",
            report.missing.len()
        );
    }
    if !purge {
        anyhow::bail!(
            "{} orphaned objects found; run `check --purge` to delete them",
            report.orphaned.len()
        );
    }

    Ok(())
}
