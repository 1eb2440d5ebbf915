pub mod aave;
pub mod abi_registry;
pub mod config;
pub mod constants;
pub mod decoder;
pub mod errors;
pub mod logging;
pub mod price_feed;
pub mod sink;
pub mod uniswap;
