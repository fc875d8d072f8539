//! Command-line arguments
//!
//! Flags override the loaded configuration file field by field; anything not
//! given on the command line keeps its configured value.

use clap::Parser;
use std::path::PathBuf;

use crate::infrastructure::config::AppConfig;

/// Resumable parcel enumeration crawler
#[derive(Parser, Debug, Default)]
#[command(name = "parcel-crawler", version)]
#[command(about = "Enumerate assessor parcel numbers into a SQLite database")]
pub struct CliArgs {
    /// Configuration file (JSON); defaults to the user config directory
    #[arg(long, env = "PARCEL_CRAWLER_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, env = "PARCEL_CRAWLER_DATABASE")]
    pub database: Option<PathBuf>,

    /// First 8-digit search key to visit (inclusive)
    #[arg(long)]
    pub start: Option<u32>,

    /// Last 8-digit search key to visit (inclusive)
    #[arg(long)]
    pub end: Option<u32>,

    /// Log level: error, warn, info, debug, trace
    #[arg(long, env = "PARCEL_CRAWLER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Skip search keys whose remote calls fail instead of stopping
    #[arg(long)]
    pub continue_on_error: bool,
}

impl CliArgs {
    /// Layer the given flags over `config`.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.database {
            config.database.path.clone_from(path);
        }
        if let Some(start) = self.start {
            config.crawl.start_key = start;
        }
        if let Some(end) = self.end {
            config.crawl.end_key = end;
        }
        if let Some(level) = &self.log_level {
            config.logging.level.clone_from(level);
        }
        if self.continue_on_error {
            config.crawl.continue_on_error = true;
        }
    }
}
