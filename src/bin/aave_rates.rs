use dotenvy::dotenv;
use tracing::{info, instrument};

use defi_data_harvester::aave::fetcher::SubgraphSource;
use defi_data_harvester::aave::pipeline;
use defi_data_harvester::config;
use defi_data_harvester::logging;

#[instrument(name = "aave_rates_main")]
#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Load environment variables from .env file
    dotenv()?;

    // Initialize logging
    if let Err(e) = logging::init_logging(env!("CARGO_BIN_NAME").to_string()) {
        eprintln!("Failed to initialize logging: {}", e);
        return Err(e);
    }

    // Load configuration
    let cfg = config::Config::load()?;

    // Reserve symbol to fetch, defaulting to USDC
    let symbol = std::env::args().nth(1).unwrap_or_else(|| "USDC".to_string());
    info!(symbol = %symbol, "Starting Aave rate pipeline");

    let source = SubgraphSource::new(&cfg);
    let merged_path = pipeline::run(&cfg, &source, &symbol).await?;
    info!(path = %merged_path.display(), "Merged rate history written");

    tokio::time::sleep(std::time::Duration::from_secs(1)).await; // Allow time for logging to flush

    Ok(())
}
