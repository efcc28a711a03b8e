mod app;
mod ui;

use std::time::Duration;

use crate::collector::CollectorHandle;
use crate::error::Result;
use crate::storage::Store;

pub use app::App;

/// Run the trend dashboard over a live collector writing to `store`
pub fn run(
    store: Store,
    collector: CollectorHandle,
    file_name: String,
    max_duration: Option<Duration>,
) -> Result<()> {
    let mut app = App::live(store, collector, file_name, max_duration)?;
    app.run()
}
