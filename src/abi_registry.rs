use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use ethers::abi::Abi;
use ethers::types::Address;
use eyre::{Result, eyre};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::Config;

#[derive(Debug, Deserialize)]
struct AbiV2Response {
    status: String,
    message: String,
    result: String, // the ABI JSON string when status == "1"
}

/// Contract ABI lookups with two cache layers: a per-run memory map and a
/// disk directory of `<address>.json` files that survives across runs.
/// Misses fall through to the Etherscan v2 API. Unverified contracts resolve
/// to None and are remembered, so each address is asked about at most once.
pub struct AbiRegistry {
    http_client: ClientWithMiddleware,
    cache_dir: PathBuf,
    etherscan_api_key: Option<String>,
    chain_id: u64,
    memory: RwLock<HashMap<Address, Option<Abi>>>,
}

impl AbiRegistry {
    pub fn new(config: &Config) -> Self {
        let reqwest_client = reqwest_middleware::reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_millis(1000))
            .build_with_max_retries(3);

        let http_client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        AbiRegistry {
            http_client,
            cache_dir: config.abi_cache_dir.clone(),
            etherscan_api_key: config.etherscan_api_key.clone(),
            chain_id: config.chain_id,
            memory: RwLock::new(HashMap::new()),
        }
    }

    /// Resolves a contract's ABI. `Ok(None)` means Etherscan holds no
    /// verified source for the address; callers skip that contract.
    pub async fn get_abi(&self, address: Address) -> Result<Option<Abi>> {
        if let Some(cached) = self.memory.read().await.get(&address) {
            return Ok(cached.clone());
        }

        let path = self.cache_dir.join(format!("{:?}.json", address));
        if path.exists() {
            let raw = fs::read_to_string(&path)?;
            let abi: Abi = serde_json::from_str(&raw)?;
            debug!(address = ?address, "ABI served from disk cache");
            self.memory.write().await.insert(address, Some(abi.clone()));
            return Ok(Some(abi));
        }

        let abi = match self.fetch_from_etherscan(address).await? {
            Some(raw) => {
                // Normalize through Value so the cache file holds valid JSON
                let value: serde_json::Value = serde_json::from_str(&raw)?;
                fs::write(&path, value.to_string())?;
                Some(serde_json::from_value::<Abi>(value)?)
            }
            None => None,
        };

        self.memory.write().await.insert(address, abi.clone());
        Ok(abi)
    }

    async fn fetch_from_etherscan(&self, address: Address) -> Result<Option<String>> {
        let api_key = self
            .etherscan_api_key
            .as_ref()
            .ok_or_else(|| eyre!("ETHERSCAN_API_KEY is required to fetch uncached ABIs"))?;
        let url = format!(
            "https://api.etherscan.io/v2/api?chainid={}&module=contract&action=getabi&address={:?}&apikey={}",
            self.chain_id, address, api_key
        );

        let response = self
            .http_client
            .get(&url)
            .send()
            .await?
            .json::<AbiV2Response>()
            .await?;

        if response.status != "1" {
            warn!(
                address = ?address,
                message = %response.message,
                "No verified ABI on Etherscan"
            );
            return Ok(None);
        }

        info!(address = ?address, "Fetched ABI from Etherscan");
        Ok(Some(response.result))
    }
}
