//! The `tomahawk` binary.

use clap::Parser;
use eyre::{Context, Result};
use tomahawk_cli::{AppBuilder, Cli, Logger, init_tracing, run_server};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli.log_level)?;

    let config = cli.load_config().wrap_err("failed to load configuration")?;
    Logger::new().log(&config);

    let app = AppBuilder::new().build(&config)?;
    run_server(app, &config).await
}
