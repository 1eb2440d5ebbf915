use ethers::types::Address;
use std::str::FromStr;
use std::sync::LazyLock;

/// Aave encodes its rates in ray fixed point: 27 implied decimal places.
pub const RAY_DECIMALS: u32 = 27;

/// Aave V3 mainnet subgraph, overridable via AAVE_SUBGRAPH_URL.
pub const DEFAULT_AAVE_SUBGRAPH_URL: &str =
    "https://api.thegraph.com/subgraphs/name/aave/protocol-v3";

pub const COINGECKO_BASE_URL: &str = "https://api.coingecko.com/api/v3";

pub const UNISWAP_V2_FACTORY: &str = "0x5C69bEe701ef814a2B6a3EDD4B1652CB9cc5aA6f";
pub const UNISWAP_V3_FACTORY: &str = "0x1F98431c8aD98523631AE4a59f267346ea31F984";

/// Uniswap v3 fee tiers, in hundredths of a bip.
pub const UNISWAP_V3_FEE_TIERS: [u32; 4] = [100, 500, 3000, 10000];

/// Default block for the transaction decoder when none is given.
pub const DEFAULT_DECODE_BLOCK: u64 = 10_008_355;

/// Mainnet tokens whose pools get snapshotted, keyed by symbol.
pub static TRACKED_TOKENS: LazyLock<Vec<(&'static str, Address)>> = LazyLock::new(|| {
    [
        ("WETH", "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"),
        ("USDC", "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48"),
        ("DAI", "0x6B175474E89094C44Da98b954EedeAC495271d0F"),
        ("WBTC", "0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
        ("USDT", "0xdAC17F958D2ee523a2206206994597C13D831ec7"),
    ]
    .into_iter()
    .map(|(symbol, addr)| {
        (
            symbol,
            Address::from_str(addr).expect("token address constant must parse"),
        )
    })
    .collect()
});
