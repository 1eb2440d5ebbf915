use dotenvy::dotenv;
use futures::stream::{self, StreamExt};
use tracing::{info, instrument};

use defi_data_harvester::config;
use defi_data_harvester::constants::TRACKED_TOKENS;
use defi_data_harvester::logging;
use defi_data_harvester::price_feed::PriceFeed;
use defi_data_harvester::sink;
use defi_data_harvester::uniswap::{factory, pool};

#[instrument(name = "uniswap_pools_main")]
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

    // One price request up front covers every pairing of tracked tokens
    let tokens: Vec<_> = TRACKED_TOKENS.iter().map(|(_, address)| *address).collect();
    let price_feed = PriceFeed::new(&cfg);
    let usd_prices = price_feed.usd_prices(&tokens).await?;
    info!(token_count = usd_prices.len(), "USD prices fetched");

    let pools = factory::discover_pools(cfg.eth_provider.clone()).await?;

    // Snapshot pools concurrently, buffered keeps discovery order in the output
    let results: Vec<_> = stream::iter(pools)
        .map(|(version, address)| {
            let provider = cfg.eth_provider.clone();
            let usd_prices = &usd_prices;
            async move {
                match version {
                    pool::PoolVersion::V2 => pool::snapshot_v2(provider, address, usd_prices).await,
                    pool::PoolVersion::V3 => pool::snapshot_v3(provider, address, usd_prices).await,
                }
            }
        })
        .buffered(8)
        .collect()
        .await;

    let mut snapshots = Vec::new();
    for result in results {
        if let Some(snapshot) = result? {
            snapshots.push(snapshot);
        }
    }

    let path = sink::write_pools_csv(&cfg.output_dir, &snapshots)?;
    info!(path = %path.display(), pools = snapshots.len(), "Pool snapshot run complete");

    tokio::time::sleep(std::time::Duration::from_secs(1)).await; // Allow time for logging to flush

    Ok(())
}
