use anyhow::Context;
use clap::Parser;
use modelwatch::cli::{Cli, Command};
use modelwatch::collector::{Collector, CollectorHandle, CycleOutcome};
use modelwatch::error::exit_code;
use std::process::ExitCode;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::from(exit_code::SUCCESS as u8),
        Err(e) => {
            eprintln!("Error: {e:#}");
            if let Some(app_err) = e.downcast_ref::<modelwatch::Error>() {
                ExitCode::from(app_err.exit_code() as u8)
            } else {
                ExitCode::from(exit_code::GENERAL_ERROR as u8)
            }
        }
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Validate CLI arguments
    cli.validate()?;

    match &cli.command {
        Some(Command::View { file }) => {
            let path = cli.resolve_file(file.as_deref());
            modelwatch::commands::view::run(&path)?;
        }
        Some(Command::List { file, range }) => {
            let path = cli.resolve_file(file.as_deref());
            modelwatch::commands::list::run(&path, *range)?;
        }
        Some(Command::Export { file, output }) => {
            let path = cli.resolve_file(file.as_deref());
            modelwatch::commands::export::run(&path, output.as_deref())?;
        }
        Some(Command::Clear { file }) => {
            let path = cli.resolve_file(file.as_deref());
            modelwatch::commands::clear::run(&path)?;
        }
        Some(Command::Completions { shell }) => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "modelwatch", &mut std::io::stdout());
        }
        None => {
            // Collecting mode
            run_collector(&cli)?;
        }
    }

    Ok(())
}

fn run_collector(cli: &Cli) -> anyhow::Result<()> {
    let source = match cli.resolve_source() {
        Some(source) => source,
        None => unreachable!("validated in cli"),
    };
    let client = modelwatch::catalog::CatalogClient::new(&source, &cli.table, cli.resolve_api_key());
    eprintln!("Watching {}", client.endpoint());

    // Open (or create) the snapshot database
    let db_path = cli.db_path();
    let store = modelwatch::storage::Store::open(&db_path)?;
    store.set_source_url(&client.endpoint())?;
    match store.last_taken_at()? {
        Some(taken_at) => eprintln!(
            "Database: {} ({} snapshots, last {})",
            db_path.display(),
            store.snapshot_count()?,
            taken_at.format("%Y-%m-%d %H:%M:%S")
        ),
        None => eprintln!("Database: {} (no snapshots yet)", db_path.display()),
    }

    let collector = Collector::new(client, store, cli.min_gap);

    if cli.quiet {
        run_headless(collector, cli.interval, cli.duration)?;
    } else {
        // The dashboard reads through its own connection; WAL keeps the
        // collector's writes visible to it
        let viewer = modelwatch::storage::Store::open(&db_path)?;
        let handle = CollectorHandle::spawn(collector, cli.interval);
        let file_name = db_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| db_path.display().to_string());
        modelwatch::tui::run(viewer, handle, file_name, cli.duration)?;
    }

    Ok(())
}

fn run_headless(
    mut collector: Collector,
    interval: std::time::Duration,
    duration: Option<std::time::Duration>,
) -> anyhow::Result<()> {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl-C handler")?;

    let start = std::time::Instant::now();
    let mut next_cycle = std::time::Instant::now();
    let mut recorded = 0u64;
    let mut deferred = 0u64;
    let mut failed = 0u64;

    eprintln!("Collecting (Ctrl-C to stop)...");

    while running.load(Ordering::SeqCst) {
        // Check duration limit
        if let Some(max_duration) = duration {
            if start.elapsed() >= max_duration {
                break;
            }
        }

        if std::time::Instant::now() >= next_cycle {
            match collector.run_cycle() {
                Ok(CycleOutcome::Recorded { taken_at, total }) => {
                    recorded += 1;
                    eprintln!(
                        "{} snapshot written ({} models)",
                        taken_at.format("%Y-%m-%d %H:%M:%S"),
                        total
                    );
                }
                Ok(CycleOutcome::Deferred { total }) => {
                    deferred += 1;
                    eprintln!("{} models, last snapshot still fresh", total);
                }
                Err(e) => {
                    failed += 1;
                    eprintln!("fetch failed: {e}");
                }
            }
            next_cycle = std::time::Instant::now() + interval;
        }

        // Sleep briefly to avoid busy-waiting
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    eprintln!(
        "Collecting complete. Recorded: {} | Deferred: {} | Failed: {}",
        recorded, deferred, failed
    );

    Ok(())
}
