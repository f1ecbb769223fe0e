#![allow(clippy::collapsible_if)]

// Core modules
pub mod app;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod logging;
pub mod utils;

// Re-export commonly used types outside of crate
pub use app::run;
pub use data::{RangeFetcher, SqliteFeatureStore};
pub use domain::OhlcRecord;
pub use engine::IngestionCoordinator;
pub use logging::{LogConfig, LogSink, init_logging};

// CLI argument parsing
use {
    chrono::NaiveDate,
    clap::{Parser, Subcommand},
    config::{PERSISTENCE, SYMBOLS, default_log_file_path},
    log::LevelFilter,
    std::path::PathBuf,
};

fn parse_level(text: &str) -> Result<LevelFilter, String> {
    text.parse::<LevelFilter>()
        .map_err(|_| format!("'{}' is not a log level (off, error, warn, info, debug, trace)", text))
}

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// SQLite feature store file
    #[arg(long, global = true, default_value = PERSISTENCE.store.db_path)]
    pub db_path: String,

    #[arg(long, global = true, default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,

    /// Log to the console only
    #[arg(long, global = true, default_value_t = false)]
    pub no_log_file: bool,

    /// Log file path (default logs/logs.txt)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the feature group if needed and load yesterday and today
    Init {
        #[arg(long, default_value = SYMBOLS.default)]
        symbol: String,
    },
    /// Fetch a day range from the exchange and store it
    Ingest {
        #[arg(long, default_value = SYMBOLS.default)]
        symbol: String,
        /// First day, YYYY-MM-DD or DD-MM-YYYY
        #[arg(long, value_parser = utils::parse_day)]
        from: NaiveDate,
        /// Last day (inclusive)
        #[arg(long, value_parser = utils::parse_day)]
        to: NaiveDate,
    },
    /// Print stored records for a symbol
    Query {
        #[arg(long, default_value = SYMBOLS.default)]
        symbol: String,
        /// Most recent rows to print
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

impl Cli {
    pub fn log_config(&self) -> LogConfig {
        LogConfig {
            level: self.log_level,
            log_to_file: !self.no_log_file,
            log_file_path: self.log_file.clone().unwrap_or_else(default_log_file_path),
        }
    }
}
