use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ethers::providers::{Http, Provider};
use eyre::{Result, eyre};

use crate::constants::DEFAULT_AAVE_SUBGRAPH_URL;

/// Process configuration, read from the environment once at startup.
/// Everything downstream takes this by reference instead of consulting the
/// environment itself.
pub struct Config {
    pub eth_provider: Arc<Provider<Http>>,
    pub etherscan_api_key: Option<String>,
    pub coingecko_api_key: Option<String>,
    pub aave_subgraph_url: String,
    pub subgraph_api_key: Option<String>,
    pub chain_id: u64,
    pub output_dir: PathBuf,
    pub abi_cache_dir: PathBuf,
    pub page_size: usize,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let rpc_url =
            env::var("ETHEREUM_HTTP_ENDPOINT").map_err(|_| eyre!("Missing ETHEREUM_HTTP_ENDPOINT"))?;
        let provider = Provider::<Http>::try_from(rpc_url.as_str())
            .map_err(|e| eyre!("Failed to create Ethereum provider: {e}"))?;

        let chain_id = env::var("CHAIN_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse::<u64>()
            .map_err(|e| eyre!("Invalid CHAIN_ID: {e}"))?;

        let page_size = env::var("PAGE_SIZE")
            .unwrap_or_else(|_| "1000".to_string())
            .parse::<usize>()
            .map_err(|e| eyre!("Invalid PAGE_SIZE: {e}"))?;

        let http_timeout_secs = env::var("HTTP_TIMEOUT_SECS")
            .unwrap_or_else(|_| "10".to_string())
            .parse::<u64>()
            .map_err(|e| eyre!("Invalid HTTP_TIMEOUT_SECS: {e}"))?;

        let output_dir = PathBuf::from(env::var("OUTPUT_DIR").unwrap_or_else(|_| "data".to_string()));
        let abi_cache_dir =
            PathBuf::from(env::var("ABI_CACHE_DIR").unwrap_or_else(|_| "fetched_abis".to_string()));
        fs::create_dir_all(&output_dir)?;
        fs::create_dir_all(&abi_cache_dir)?;

        Ok(Config {
            eth_provider: Arc::new(provider),
            etherscan_api_key: env::var("ETHERSCAN_API_KEY").ok(),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok(),
            aave_subgraph_url: env::var("AAVE_SUBGRAPH_URL")
                .unwrap_or_else(|_| DEFAULT_AAVE_SUBGRAPH_URL.to_string()),
            subgraph_api_key: env::var("SUBGRAPH_API_KEY").ok(),
            chain_id,
            output_dir,
            abi_cache_dir,
            page_size,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}
