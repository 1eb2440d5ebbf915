use std::str::FromStr;

use dotenvy::dotenv;
use ethers::types::Address;
use tracing::{info, instrument};

use defi_data_harvester::abi_registry::AbiRegistry;
use defi_data_harvester::config;
use defi_data_harvester::constants::{DEFAULT_DECODE_BLOCK, UNISWAP_V2_FACTORY, UNISWAP_V3_FACTORY};
use defi_data_harvester::decoder::call::InteractionKind;
use defi_data_harvester::decoder::{traces, transactions};
use defi_data_harvester::logging;

#[instrument(name = "decode_block_main")]
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

    // Usage: decode_block [addresses] [block_number] [to|from|both] [--traces]
    let args: Vec<String> = std::env::args().skip(1).collect();
    let use_traces = args.iter().any(|arg| arg == "--traces");
    let positional: Vec<&String> = args
        .iter()
        .filter(|arg| arg.as_str() != "--traces")
        .collect();

    let targets = match positional.first() {
        Some(raw) => raw
            .split(',')
            .map(|address| Address::from_str(address.trim()).map_err(Into::into))
            .collect::<eyre::Result<Vec<Address>>>()?,
        None => vec![
            Address::from_str(UNISWAP_V2_FACTORY)?,
            Address::from_str(UNISWAP_V3_FACTORY)?,
        ],
    };
    let block_number = match positional.get(1) {
        Some(raw) => raw.parse()?,
        None => DEFAULT_DECODE_BLOCK,
    };
    let kind = match positional.get(2) {
        Some(raw) => raw.parse()?,
        None => InteractionKind::Both,
    };

    info!(
        block_number,
        kind = %kind,
        targets = targets.len(),
        traces = use_traces,
        "Decoding block"
    );

    let registry = AbiRegistry::new(&cfg);

    if use_traces {
        let decoded = traces::decode_block_traces(
            cfg.eth_provider.clone(),
            &registry,
            &targets,
            block_number,
            kind,
        )
        .await?;
        for trace in &decoded {
            info!(
                tx = ?trace.transaction_hash,
                to = ?trace.to,
                function = %trace.call.function,
                args = ?trace.call.args,
                "Decoded trace"
            );
        }
    } else {
        let decoded = transactions::decode_block_transactions(
            cfg.eth_provider.clone(),
            &registry,
            &targets,
            block_number,
            kind,
        )
        .await?;
        for tx in &decoded {
            info!(
                tx = ?tx.tx_hash,
                to = ?tx.to,
                function = %tx.call.function,
                args = ?tx.call.args,
                "Decoded transaction"
            );
        }
    }

    tokio::time::sleep(std::time::Duration::from_secs(1)).await; // Allow time for logging to flush

    Ok(())
}
