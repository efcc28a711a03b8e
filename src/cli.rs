use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::analytics::TimeRange;
use crate::catalog;
use crate::error::Error;

/// Database path used when --db is not given
pub const DEFAULT_DB: &str = "modelwatch.db";

#[derive(Parser, Debug)]
#[command(name = "modelwatch")]
#[command(about = "Records daily snapshots of an AI model catalog and charts provider trends")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Catalog base URL, e.g. https://xyz.supabase.co
    /// (falls back to $MODELWATCH_SOURCE_URL)
    #[arg(long, short = 's', global = true)]
    pub source: Option<String>,

    /// API key, sent as both apikey and bearer headers
    /// (falls back to $MODELWATCH_API_KEY)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Catalog table to read
    #[arg(long, global = true, default_value = catalog::DEFAULT_TABLE)]
    pub table: String,

    /// Snapshot database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Catalog poll interval
    #[arg(long, short = 'i', default_value = "5m", value_parser = parse_duration)]
    pub interval: Duration,

    /// Minimum gap between two persisted snapshots
    #[arg(long, default_value = "12h", value_parser = parse_duration)]
    pub min_gap: Duration,

    /// Collecting duration (default: until Ctrl-C)
    #[arg(long, short = 'd', value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Disable TUI, collect only
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Interactive trend viewer over a snapshot database
    View {
        /// Snapshot database file (defaults to --db)
        file: Option<PathBuf>,
    },

    /// Print stored snapshots as a table
    List {
        /// Snapshot database file (defaults to --db)
        file: Option<PathBuf>,

        /// Only include snapshots within this range
        #[arg(long, short = 'r', value_enum, default_value = "all")]
        range: TimeRange,
    },

    /// Write the snapshot history as a JSON document
    Export {
        /// Snapshot database file (defaults to --db)
        file: Option<PathBuf>,

        /// Output path (stdout when omitted)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Delete every stored snapshot
    Clear {
        /// Snapshot database file (defaults to --db)
        file: Option<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

fn parse_duration(s: &str) -> Result<Duration, String> {
    // Try humantime first
    if let Ok(d) = humantime::parse_duration(s) {
        return Ok(d);
    }

    // Try bare number as seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    Err(format!(
        "Invalid duration '{}'. Examples: 30s, 5m, 12h, 1h30m, 90",
        s
    ))
}

impl Cli {
    pub fn validate(&self) -> Result<(), Error> {
        // Collect mode (no subcommand) needs somewhere to fetch from
        if self.command.is_none() && self.resolve_source().is_none() {
            return Err(Error::InvalidArgument(
                "a catalog source is required for collecting: pass --source or set MODELWATCH_SOURCE_URL"
                    .to_string(),
            ));
        }

        if self.interval.is_zero() {
            return Err(Error::InvalidArgument(
                "--interval must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Catalog URL from the flag or the environment
    pub fn resolve_source(&self) -> Option<String> {
        self.source
            .clone()
            .or_else(|| std::env::var("MODELWATCH_SOURCE_URL").ok())
            .filter(|s| !s.is_empty())
    }

    /// API key from the flag or the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("MODELWATCH_API_KEY").ok())
            .filter(|s| !s.is_empty())
    }

    /// Database path for collect mode
    pub fn db_path(&self) -> PathBuf {
        self.db.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DB))
    }

    /// Database path for a subcommand, preferring its positional argument
    pub fn resolve_file(&self, file: Option<&std::path::Path>) -> PathBuf {
        file.map(PathBuf::from).unwrap_or_else(|| self.db_path())
    }
}
