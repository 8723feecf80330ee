//! History inspection command handlers.
//!
//! Lists snapshots and change events, shows one snapshot, and compares two.

use super::{print_json, truncate};
use cadtrail_core::Tracker;
use cadtrail_snapshot::{DiffKind, SnapshotId};
use std::path::Path;

/// List a document's snapshots, most recent first.
pub async fn handle_history(tracker: &Tracker, document: &Path, json: bool) -> anyhow::Result<()> {
    let entries = tracker.history_for(document).await?;
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        println!("No history for {}", document.display());
        return Ok(());
    }

    println!(
        "{:<30} {:<5} {:<16} {:<20} {:>8} {:>10}  DESCRIPTION",
        "ID", "VER", "KIND", "TIME", "FEATURES", "SIZE"
    );
    println!("{}", "-".repeat(120));
    for entry in entries {
        println!(
            "{:<30} {:<5} {:<16} {:<20} {:>8} {:>10}  {}",
            entry.snapshot_id.as_str(),
            format!("v{}", entry.version),
            entry.kind.as_str(),
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.feature_count,
            entry.blob_size,
            truncate(&entry.description, 40)
        );
    }
    Ok(())
}

/// List a document's change events, oldest first.
pub async fn handle_events(
    tracker: &Tracker,
    document: &Path,
    feature: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let events = tracker.events_for(document, feature).await?;
    if json {
        return print_json(&events);
    }

    if events.is_empty() {
        println!("No change events recorded.");
        return Ok(());
    }

    println!("{:<20} {:<10} {:<30} {:<20}", "TIME", "KIND", "FEATURE", "TYPE");
    println!("{}", "-".repeat(80));
    for event in events {
        println!(
            "{:<20} {:<10} {:<30} {:<20}",
            event.timestamp.format("%Y-%m-%d %H:%M:%S"),
            event.kind.as_str(),
            truncate(event.feature_name(), 30),
            event.new_state.type_name
        );
    }
    Ok(())
}

/// Show one snapshot's features.
pub async fn handle_show(tracker: &Tracker, id: &str, json: bool) -> anyhow::Result<()> {
    let snapshot = tracker.snapshot(&SnapshotId::from_string(id)).await?;
    if json {
        return print_json(&snapshot);
    }

    println!("Snapshot: {}", snapshot.id);
    println!("Document: {}", snapshot.document_path.display());
    println!("Version: v{} ({})", snapshot.version, snapshot.kind);
    println!("Created: {}", snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("Description: {}", snapshot.description);
    if let Some(parent) = &snapshot.parent_snapshot_id {
        println!("Parent: {parent}");
    }
    if !snapshot.tags.is_empty() {
        println!("Tags: {}", snapshot.tags.join(", "));
    }
    for (key, value) in &snapshot.document_properties {
        println!("Property {key}: {value}");
    }

    println!();
    println!("Features ({}):", snapshot.features.len());
    for feature in &snapshot.features {
        let suppressed = if feature.is_suppressed { " [suppressed]" } else { "" };
        println!("  {} ({}){suppressed}", feature.name, feature.type_name);
        for (key, value) in &feature.parameters {
            println!("    {key} = {value}");
        }
        for dim in &feature.sketch_dimensions {
            println!("    {} = {}", dim.name, dim.value);
        }
    }
    Ok(())
}

/// Compare snapshot `from` against snapshot `to`.
pub async fn handle_diff(tracker: &Tracker, from: &str, to: &str, json: bool) -> anyhow::Result<()> {
    let diffs = tracker
        .compare(&SnapshotId::from_string(from), &SnapshotId::from_string(to))
        .await?;
    if json {
        return print_json(&diffs);
    }

    if diffs.is_empty() {
        println!("No differences.");
        return Ok(());
    }

    for diff in diffs {
        let marker = match diff.kind {
            DiffKind::Added => "+",
            DiffKind::Removed => "-",
            DiffKind::Modified => "~",
        };
        println!("{marker} {} ({})", diff.feature_name, diff.type_name);
        for change in diff.changes {
            println!(
                "    {}: {} -> {}",
                change.property,
                change.old_value.as_deref().unwrap_or("(none)"),
                change.new_value.as_deref().unwrap_or("(none)")
            );
        }
    }
    Ok(())
}
