use anyhow::Result;
use clap::Parser;
use tripsplit::cli::Cli;
use tripsplit::telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.log_json);
    cli.run().await
}
