use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ethers::types::Address;
use eyre::{Result, eyre};
use governor::{DefaultDirectRateLimiter, Quota};
use nonzero_ext::*;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::Deserialize;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Config;
use crate::constants::COINGECKO_BASE_URL;

struct CoinGeckoRateLimiter {
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl reqwest_ratelimit::RateLimiter for CoinGeckoRateLimiter {
    async fn acquire_permit(&self) {
        self.rate_limiter.until_ready().await;
    }
}

#[derive(Debug, Deserialize)]
struct TokenPrice {
    usd: Option<f64>,
}

/// CoinGecko unit-price client, shared by every pool snapshot in a run. The
/// free tier allows about one request per second, enforced client-side so a
/// burst of lookups queues instead of getting 429s.
pub struct PriceFeed {
    http_client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl PriceFeed {
    pub fn new(config: &Config) -> Self {
        let reqwest_client = reqwest_middleware::reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        let retry_policy = ExponentialBackoff::builder()
            .retry_bounds(Duration::from_millis(500), Duration::from_millis(1000))
            .build_with_max_retries(3);

        let rate_limiter = CoinGeckoRateLimiter {
            rate_limiter: Arc::new(DefaultDirectRateLimiter::direct(Quota::per_second(
                nonzero!(1u32),
            ))),
        };

        let http_client = ClientBuilder::new(reqwest_client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .with(reqwest_ratelimit::all(rate_limiter))
            .build();

        Self {
            http_client,
            base_url: COINGECKO_BASE_URL.to_string(),
            api_key: config.coingecko_api_key.clone(),
        }
    }

    /// Fetches USD unit prices for a set of token contracts in one request.
    /// Every requested token must come back priced; a gap is an error.
    #[instrument(skip(self))]
    pub async fn usd_prices(&self, tokens: &[Address]) -> Result<HashMap<Address, Decimal>> {
        let url = Url::parse(&format!("{}/simple/token_price/ethereum", self.base_url))?;
        let contract_addresses = tokens
            .iter()
            .map(|token| format!("{:?}", token))
            .collect::<Vec<_>>()
            .join(",");
        let params = [
            ("contract_addresses", contract_addresses),
            ("vs_currencies", "usd".to_string()),
        ];

        let mut request = self.http_client.get(url).query(&params);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await?.error_for_status()?;
        let raw: HashMap<String, TokenPrice> = response.json().await?;

        let prices = collect_prices(tokens, &raw)?;
        debug!(token_count = prices.len(), "Fetched USD prices");
        Ok(prices)
    }
}

/// CoinGecko keys the response by lowercased contract address, which matches
/// the Debug rendering of Address.
fn collect_prices(
    tokens: &[Address],
    raw: &HashMap<String, TokenPrice>,
) -> Result<HashMap<Address, Decimal>> {
    let mut prices = HashMap::new();
    for token in tokens {
        let key = format!("{:?}", token);
        let quote = raw
            .get(&key)
            .and_then(|price| price.usd)
            .ok_or_else(|| eyre!("CoinGecko returned no USD price for {}", key))?;
        let price = Decimal::from_f64(quote)
            .ok_or_else(|| eyre!("Unrepresentable USD price {} for {}", quote, key))?;
        prices.insert(*token, price);
    }
    Ok(prices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn weth() -> Address {
        Address::from_str("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2").unwrap()
    }

    #[test]
    fn response_shape_deserializes() {
        let raw = r#"{
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2": {"usd": 2450.12},
            "0x6b175474e89094c44da98b954eedeac495271d0f": {"usd": 1.0}
        }"#;
        let parsed: HashMap<String, TokenPrice> = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn prices_key_by_lowercased_address() {
        let mut raw = HashMap::new();
        raw.insert(
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            TokenPrice { usd: Some(2450.0) },
        );

        let prices = collect_prices(&[weth()], &raw).unwrap();
        assert_eq!(prices[&weth()], dec!(2450));
    }

    #[test]
    fn missing_token_is_an_error() {
        let raw = HashMap::new();
        assert!(collect_prices(&[weth()], &raw).is_err());
    }

    #[test]
    fn null_usd_quote_is_an_error() {
        let mut raw = HashMap::new();
        raw.insert(
            "0xc02aaa39b223fe8d0a0e5c4f27ead9083c756cc2".to_string(),
            TokenPrice { usd: None },
        );
        assert!(collect_prices(&[weth()], &raw).is_err());
    }
}
