use std::path::Path;

use crate::error::Result;
use crate::storage::Store;

/// Run the clear command
pub fn run(file: &Path) -> Result<()> {
    let mut store = Store::open_existing(file)?;
    let removed = store.clear()?;

    if removed == 1 {
        println!("Removed 1 snapshot from {}", file.display());
    } else {
        println!("Removed {} snapshots from {}", removed, file.display());
    }
    Ok(())
}
