//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use eyre::Result;
use tomahawk_config::TomahawkConfig;

/// Failover router for Esplora REST backends.
#[derive(Debug, Parser)]
#[command(name = "tomahawk", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "TOMAHAWK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `info` or `tomahawk_router=debug`.
    #[arg(long, default_value = "info", env = "TOMAHAWK_LOG")]
    pub log_level: String,
}

impl Cli {
    /// Load the configuration named on the command line.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load_config(&self) -> Result<TomahawkConfig> {
        match &self.config {
            Some(path) => TomahawkConfig::from_file(path),
            None => {
                let config = TomahawkConfig::default();
                config.validate()?;
                Ok(config)
            }
        }
    }
}
