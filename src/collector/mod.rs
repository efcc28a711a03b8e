use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use crate::analytics::ProviderCounts;
use crate::catalog::CatalogClient;
use crate::error::Result;
use crate::storage::Store;

/// Outcome of one collect cycle
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// A snapshot row was written
    Recorded { taken_at: DateTime<Utc>, total: u64 },
    /// The catalog was fetched but the newest stored snapshot is still too
    /// young, so nothing was written
    Deferred { total: u64 },
}

/// What the background collector reports to the viewer
#[derive(Debug, Clone)]
pub enum CollectorEvent {
    Recorded { taken_at: DateTime<Utc>, total: u64 },
    Deferred { total: u64 },
    Failed(String),
}

/// Fetches the catalog and feeds the snapshot store. Owns its own store
/// handle; with WAL enabled a separate reader can watch the same file.
pub struct Collector {
    client: CatalogClient,
    store: Store,
    min_gap: Duration,
}

impl Collector {
    pub fn new(client: CatalogClient, store: Store, min_gap: Duration) -> Self {
        Collector {
            client,
            store,
            min_gap,
        }
    }

    /// Fetch the full model list, aggregate per-provider counts, and attempt
    /// the guarded insert
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let models = self.client.fetch_models()?;
        let counts = ProviderCounts::from_models(&models);
        let now = Utc::now();

        if self.store.insert_if_due(&counts, now, self.min_gap)? {
            Ok(CycleOutcome::Recorded {
                taken_at: now,
                total: counts.total,
            })
        } else {
            Ok(CycleOutcome::Deferred {
                total: counts.total,
            })
        }
    }
}

/// A collector running on its own thread. The handle owns the thread: ask it
/// to stop (or drop it) and the loop exits at the next wakeup and is joined,
/// so no cycle outlives the UI that spawned it.
pub struct CollectorHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    events: Receiver<CollectorEvent>,
}

impl CollectorHandle {
    /// Spawn the collect loop. The first cycle runs immediately, later ones
    /// every `interval`.
    pub fn spawn(mut collector: Collector, interval: Duration) -> CollectorHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let (tx, rx) = channel();

        let thread = thread::spawn(move || {
            collect_loop(&mut collector, interval, &flag, &tx);
        });

        CollectorHandle {
            stop,
            thread: Some(thread),
            events: rx,
        }
    }

    /// Next pending event, if any. Never blocks.
    pub fn try_recv(&self) -> Option<CollectorEvent> {
        self.events.try_recv().ok()
    }

    /// Signal the loop and wait for the thread to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CollectorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn collect_loop(
    collector: &mut Collector,
    interval: Duration,
    stop: &AtomicBool,
    events: &Sender<CollectorEvent>,
) {
    let mut next_cycle = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        if Instant::now() >= next_cycle {
            let event = match collector.run_cycle() {
                Ok(CycleOutcome::Recorded { taken_at, total }) => {
                    CollectorEvent::Recorded { taken_at, total }
                }
                Ok(CycleOutcome::Deferred { total }) => CollectorEvent::Deferred { total },
                Err(e) => CollectorEvent::Failed(e.to_string()),
            };
            // receiver gone means the UI is shutting down
            if events.send(event).is_err() {
                break;
            }
            next_cycle = Instant::now() + interval;
        }

        // Sleep in short slices so stop requests take effect quickly
        thread::sleep(Duration::from_millis(200));
    }
}
