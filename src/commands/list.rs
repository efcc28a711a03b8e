use std::path::Path;

use chrono::Utc;
use comfy_table::{ContentArrangement, Table, presets::UTF8_HORIZONTAL_ONLY};

use crate::analytics::TimeRange;
use crate::error::Result;
use crate::storage::Store;

/// Run the list command
pub fn run(file: &Path, range: TimeRange) -> Result<()> {
    let store = Store::open_existing(file)?;
    let snapshots = store.list_snapshots()?;

    let cutoff = range.cutoff(Utc::now());
    let snapshots: Vec<_> = snapshots
        .into_iter()
        .filter(|s| cutoff.is_none_or(|c| s.taken_at >= c))
        .collect();

    // Header comment
    println!("# {}", file.display());
    if let Some(source) = store.source_url()? {
        println!("# Source: {source}");
    }
    println!("# Snapshots: {} (range: {})", snapshots.len(), range.label());
    println!();

    if snapshots.is_empty() {
        match range {
            TimeRange::All => println!("No snapshots recorded yet."),
            _ => println!("No snapshots in the last {}.", range.label()),
        }
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["TAKEN AT (UTC)", "TOTAL", "PROVIDERS", "ORIGINS"]);

    for snapshot in &snapshots {
        table.add_row(vec![
            snapshot.taken_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            snapshot.total_count.to_string(),
            snapshot.inference_providers.len().to_string(),
            snapshot.model_providers.len().to_string(),
        ]);
    }

    println!("{table}");
    Ok(())
}
