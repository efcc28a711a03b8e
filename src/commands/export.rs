use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::storage::{Snapshot, Store};

/// Envelope written by the export command. Deserialize is derived too so the
/// file can be read back into the same shapes.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub generated_at: DateTime<Utc>,
    pub snapshot_count: usize,
    pub snapshots: Vec<Snapshot>,
}

/// Run the export command
pub fn run(file: &Path, output: Option<&Path>) -> Result<()> {
    let store = Store::open_existing(file)?;
    let snapshots = store.list_snapshots()?;

    let document = ExportDocument {
        generated_at: Utc::now(),
        snapshot_count: snapshots.len(),
        snapshots,
    };
    let json = serde_json::to_string_pretty(&document)?;

    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")?;
            eprintln!(
                "Wrote {} snapshot(s) to {}",
                document.snapshot_count,
                path.display()
            );
        }
        None => println!("{json}"),
    }

    Ok(())
}
