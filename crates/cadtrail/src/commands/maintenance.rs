//! Maintenance command handlers: stats, purge, migrate and config.

use super::print_json;
use cadtrail_core::{MigrationStatus, Tracker, TrackerSettings};
use std::path::{Path, PathBuf};

/// Show aggregate numbers for a document's history.
pub async fn handle_stats(tracker: &Tracker, document: &Path, json: bool) -> anyhow::Result<()> {
    let stats = tracker.history_stats(document).await?;
    if json {
        return print_json(&stats);
    }

    println!("Document: {}", document.display());
    println!("Snapshots: {}", stats.snapshot_count);
    println!("Change events: {}", stats.event_count);
    println!("Blob storage: {} bytes", stats.total_blob_bytes);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!(
            "Span: {} .. {}",
            oldest.format("%Y-%m-%d %H:%M:%S"),
            newest.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

/// Delete a document's history. Refuses without `--yes`.
pub async fn handle_purge(
    tracker: &Tracker,
    document: &Path,
    yes: bool,
    json: bool,
) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!(
            "refusing to purge history of {} without --yes",
            document.display()
        );
    }

    let report = tracker.purge_history(document).await?;
    if json {
        return print_json(&report);
    }
    println!(
        "Purged {} snapshot(s) and {} event(s){}",
        report.snapshots,
        report.events,
        if report.folder_removed {
            ", history folder removed"
        } else {
            ""
        }
    );
    Ok(())
}

/// Wait for the startup migration of legacy histories and report it.
pub async fn handle_migrate(tracker: &Tracker, json: bool) -> anyhow::Result<()> {
    match tracker.migration().await {
        MigrationStatus::Finished(report) => {
            if json {
                return print_json(&report);
            }
            if report.is_empty() {
                println!("No legacy history to migrate.");
            } else {
                println!(
                    "Migrated {} file(s): {} snapshot(s), {} event(s); {} failed",
                    report.files, report.snapshots, report.events, report.failed
                );
            }
            Ok(())
        }
        MigrationStatus::Failed(message) => anyhow::bail!("migration failed: {message}"),
        MigrationStatus::Running => anyhow::bail!("migration did not finish"),
    }
}

/// Show the resolved settings and where they came from.
pub fn show_config(settings: &TrackerSettings, sources: &[PathBuf]) {
    println!("Config sources:");
    if sources.is_empty() {
        println!("  (defaults)");
    }
    for source in sources {
        println!("  {}", source.display());
    }
    println!();
    println!("poll_interval_ms: {}", settings.poll_interval.as_millis());
    println!("max_snapshots: {}", settings.max_snapshots);
    println!("event_batch_size: {}", settings.event_batch_size);
    println!("auto_snapshot_threshold: {}", settings.auto_snapshot_threshold);
    println!("dimension_tolerance: {}", settings.tolerance);
    println!("data_dir: {}", settings.data_dir.display());
    match &settings.history_root {
        Some(root) => println!("history_root: {}", root.display()),
        None => println!("history_root: (next to each document)"),
    }
    println!("legacy_dir: {}", settings.legacy_dir.display());
}
