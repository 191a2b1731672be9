//! reposter CLI entrypoint

use anyhow::Result;
use clap::Parser;

use reposter::cli::Cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Tracing is installed by the CLI once the log file location is known
    let cli = Cli::parse();
    cli.execute().await
}
