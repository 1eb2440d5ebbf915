use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ethers::prelude::*;
use eyre::{Result, eyre};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::uniswap::math;

// Minimal v3 pool surface: tokens, fee, current slot state
abigen!(
    IUniswapV3Pool,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function fee() external view returns (uint24)
        function slot0() external view returns (uint160, int24, uint16, uint16, uint16, uint8, bool)
    ]"#
);

// Minimal v2 pair surface: tokens and reserves
abigen!(
    IUniswapV2Pair,
    r#"[
        function token0() external view returns (address)
        function token1() external view returns (address)
        function getReserves() external view returns (uint112, uint112, uint32)
    ]"#
);

// ERC20 metadata and balance reads
abigen!(
    Erc20,
    r#"[
        function symbol() external view returns (string)
        function decimals() external view returns (uint8)
        function balanceOf(address) external view returns (uint256)
    ]"#
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolVersion {
    V2,
    V3,
}

impl fmt::Display for PoolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolVersion::V2 => write!(f, "v2"),
            PoolVersion::V3 => write!(f, "v3"),
        }
    }
}

/// One pool's instantaneous state. Produced fresh each run; nothing here is
/// persisted beyond the CSV row it becomes.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolSnapshot {
    pub version: PoolVersion,
    pub pool_address: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee_tier: Option<u32>,
    pub token0_balance: Decimal,
    pub token1_balance: Decimal,
    pub price_token0_in_token1: Decimal,
    pub price_token1_in_token0: Decimal,
    pub token0_usd_price: Decimal,
    pub token1_usd_price: Decimal,
    pub tvl_token0_usd: Decimal,
    pub tvl_token1_usd: Decimal,
}

/// Reads a v3 pool's state and prices it. Returns None for pools that exist
/// but have never been initialized (zero sqrtPriceX96).
pub async fn snapshot_v3(
    provider: Arc<Provider<Http>>,
    pool_address: Address,
    usd_prices: &HashMap<Address, Decimal>,
) -> Result<Option<PoolSnapshot>> {
    let pool = IUniswapV3Pool::new(pool_address, provider.clone());
    let token0 = pool.token_0().call().await?;
    let token1 = pool.token_1().call().await?;
    let fee_tier = pool.fee().call().await?;
    let slot0 = pool.slot_0().call().await?;

    let sqrt_price_x96 = slot0.0;
    if sqrt_price_x96.is_zero() {
        warn!(pool = ?pool_address, "Uninitialized v3 pool, skipping");
        return Ok(None);
    }

    let token0_contract = Erc20::new(token0, provider.clone());
    let token1_contract = Erc20::new(token1, provider.clone());
    let token0_symbol = token0_contract.symbol().call().await?;
    let token1_symbol = token1_contract.symbol().call().await?;
    let token0_decimals = token0_contract.decimals().call().await?;
    let token1_decimals = token1_contract.decimals().call().await?;

    let token0_balance = math::u256_to_decimal(
        token0_contract.balance_of(pool_address).call().await?,
        token0_decimals,
    )?;
    let token1_balance = math::u256_to_decimal(
        token1_contract.balance_of(pool_address).call().await?,
        token1_decimals,
    )?;

    let (price_token0_in_token1, price_token1_in_token0) =
        math::sqrt_price_x96_to_prices(sqrt_price_x96, token0_decimals, token1_decimals)?;
    let (token0_usd_price, token1_usd_price) = usd_price_pair(usd_prices, token0, token1)?;

    info!(
        pool = ?pool_address,
        pair = format!("{}/{}", token0_symbol, token1_symbol),
        fee_tier,
        "Snapshotted v3 pool"
    );

    Ok(Some(PoolSnapshot {
        version: PoolVersion::V3,
        pool_address,
        token0,
        token1,
        fee_tier: Some(fee_tier),
        token0_balance,
        token1_balance,
        price_token0_in_token1,
        price_token1_in_token0,
        token0_usd_price,
        token1_usd_price,
        tvl_token0_usd: token0_balance * token0_usd_price,
        tvl_token1_usd: token1_balance * token1_usd_price,
    }))
}

/// Reads a v2 pair's reserves and prices it. Returns None for pairs with an
/// empty reserve, which cannot quote a price.
pub async fn snapshot_v2(
    provider: Arc<Provider<Http>>,
    pool_address: Address,
    usd_prices: &HashMap<Address, Decimal>,
) -> Result<Option<PoolSnapshot>> {
    let pair = IUniswapV2Pair::new(pool_address, provider.clone());
    let token0 = pair.token_0().call().await?;
    let token1 = pair.token_1().call().await?;
    let (reserve0, reserve1, _) = pair.get_reserves().call().await?;

    if reserve0 == 0 || reserve1 == 0 {
        warn!(pool = ?pool_address, "Empty v2 reserves, skipping");
        return Ok(None);
    }

    let token0_contract = Erc20::new(token0, provider.clone());
    let token1_contract = Erc20::new(token1, provider.clone());
    let token0_symbol = token0_contract.symbol().call().await?;
    let token1_symbol = token1_contract.symbol().call().await?;
    let token0_decimals = token0_contract.decimals().call().await?;
    let token1_decimals = token1_contract.decimals().call().await?;

    let token0_balance = math::u256_to_decimal(U256::from(reserve0), token0_decimals)?;
    let token1_balance = math::u256_to_decimal(U256::from(reserve1), token1_decimals)?;

    let (price_token0_in_token1, price_token1_in_token0) =
        math::reserve_ratio_prices(token0_balance, token1_balance)?;
    let (token0_usd_price, token1_usd_price) = usd_price_pair(usd_prices, token0, token1)?;

    info!(
        pool = ?pool_address,
        pair = format!("{}/{}", token0_symbol, token1_symbol),
        "Snapshotted v2 pair"
    );

    Ok(Some(PoolSnapshot {
        version: PoolVersion::V2,
        pool_address,
        token0,
        token1,
        fee_tier: None,
        token0_balance,
        token1_balance,
        price_token0_in_token1,
        price_token1_in_token0,
        token0_usd_price,
        token1_usd_price,
        tvl_token0_usd: token0_balance * token0_usd_price,
        tvl_token1_usd: token1_balance * token1_usd_price,
    }))
}

fn usd_price_pair(
    usd_prices: &HashMap<Address, Decimal>,
    token0: Address,
    token1: Address,
) -> Result<(Decimal, Decimal)> {
    let price0 = *usd_prices
        .get(&token0)
        .ok_or_else(|| eyre!("No USD price for token {:?}", token0))?;
    let price1 = *usd_prices
        .get(&token1)
        .ok_or_else(|| eyre!("No USD price for token {:?}", token1))?;
    Ok((price0, price1))
}
