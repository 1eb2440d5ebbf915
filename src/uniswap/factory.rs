use std::str::FromStr;
use std::sync::Arc;

use ethers::prelude::*;
use eyre::Result;
use tracing::{debug, info};

use crate::constants::{
    TRACKED_TOKENS, UNISWAP_V2_FACTORY, UNISWAP_V3_FACTORY, UNISWAP_V3_FEE_TIERS,
};
use crate::uniswap::pool::PoolVersion;

// Factory lookups resolving token pairs to deployed pools
abigen!(
    IUniswapV2Factory,
    r#"[
        function getPair(address, address) external view returns (address)
    ]"#
);

abigen!(
    IUniswapV3Factory,
    r#"[
        function getPool(address, address, uint24) external view returns (address)
    ]"#
);

/// Every unordered pair of tracked tokens, in registry order.
fn token_pairs() -> Vec<((&'static str, Address), (&'static str, Address))> {
    let tokens = &*TRACKED_TOKENS;
    let mut pairs = Vec::new();
    for i in 0..tokens.len() {
        for j in (i + 1)..tokens.len() {
            pairs.push((tokens[i], tokens[j]));
        }
    }
    pairs
}

/// Resolves the v2 pair and the v3 pool at each fee tier for every tracked
/// token pair. A zero address means the factory never deployed that pool and
/// is skipped.
pub async fn discover_pools(provider: Arc<Provider<Http>>) -> Result<Vec<(PoolVersion, Address)>> {
    let v2_factory =
        IUniswapV2Factory::new(Address::from_str(UNISWAP_V2_FACTORY)?, provider.clone());
    let v3_factory =
        IUniswapV3Factory::new(Address::from_str(UNISWAP_V3_FACTORY)?, provider.clone());

    let mut pools: Vec<(PoolVersion, Address)> = Vec::new();

    for ((symbol_a, token_a), (symbol_b, token_b)) in token_pairs() {
        let pair = v2_factory.get_pair(token_a, token_b).call().await?;
        if pair.is_zero() {
            debug!(pair = format!("{}/{}", symbol_a, symbol_b), "No v2 pair");
        } else {
            pools.push((PoolVersion::V2, pair));
        }

        for fee in UNISWAP_V3_FEE_TIERS {
            let pool = v3_factory.get_pool(token_a, token_b, fee).call().await?;
            if pool.is_zero() {
                debug!(
                    pair = format!("{}/{}", symbol_a, symbol_b),
                    fee, "No v3 pool"
                );
            } else {
                pools.push((PoolVersion::V3, pool));
            }
        }
    }

    info!(pool_count = pools.len(), "Pool discovery complete");
    Ok(pools)
}
