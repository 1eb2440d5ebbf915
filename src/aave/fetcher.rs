use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use crate::aave::types::{DataType, RateRecord};
use crate::config::Config;
use crate::errors::FetchError;

/// A remote source serving one page of rate observations at a time, filtered
/// to records with id strictly greater than the cursor.
#[async_trait]
pub trait RatePageSource {
    async fn fetch_page(
        &self,
        data_type: DataType,
        symbol: &str,
        last_id: &str,
    ) -> Result<Vec<RateRecord>, FetchError>;
}

/// Drains a series by cursor pagination. The cursor starts as the empty
/// string, which sorts before every real id, and advances to the last id of
/// each page. Only an empty page terminates the loop; a full page never
/// implies anything about what follows.
#[instrument(skip(source), fields(data_type = %data_type, symbol = symbol))]
pub async fn fetch_all<S>(
    source: &S,
    data_type: DataType,
    symbol: &str,
) -> Result<Vec<RateRecord>, FetchError>
where
    S: RatePageSource + Sync + ?Sized,
{
    let mut records: Vec<RateRecord> = Vec::new();
    let mut last_id = String::new();

    loop {
        let page = source.fetch_page(data_type, symbol, &last_id).await?;
        if page.is_empty() {
            break;
        }
        debug!(page_len = page.len(), cursor = %last_id, "Fetched page");
        if let Some(last) = page.last() {
            last_id = last.id.clone();
        }
        records.extend(page);
    }

    info!(record_count = records.len(), "Series fetch complete");
    Ok(records)
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PageData>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

/// The requested collection is aliased to `records` in the query so both
/// series deserialize into the same shape.
#[derive(Debug, Deserialize)]
struct PageData {
    records: Vec<WireRecord>,
}

#[derive(Debug, Deserialize)]
struct WireRecord {
    id: String,
    timestamp: i64,
    reserve: WireReserve,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireReserve {
    stable_borrow_rate: String,
    variable_borrow_rate: String,
    utilization_rate: String,
}

impl WireRecord {
    fn into_rate_record(
        self,
        data_type: DataType,
        symbol: &str,
        cursor: &str,
    ) -> Result<RateRecord, FetchError> {
        let stable_borrow_rate = U256::from_dec_str(&self.reserve.stable_borrow_rate)
            .map_err(|e| {
                FetchError::malformed(
                    data_type,
                    symbol,
                    cursor,
                    format!("bad stableBorrowRate '{}': {e}", self.reserve.stable_borrow_rate),
                )
            })?;
        let variable_borrow_rate = U256::from_dec_str(&self.reserve.variable_borrow_rate)
            .map_err(|e| {
                FetchError::malformed(
                    data_type,
                    symbol,
                    cursor,
                    format!(
                        "bad variableBorrowRate '{}': {e}",
                        self.reserve.variable_borrow_rate
                    ),
                )
            })?;
        let utilization_rate = Decimal::from_str(&self.reserve.utilization_rate).map_err(|e| {
            FetchError::malformed(
                data_type,
                symbol,
                cursor,
                format!("bad utilizationRate '{}': {e}", self.reserve.utilization_rate),
            )
        })?;

        Ok(RateRecord {
            id: self.id,
            timestamp: self.timestamp,
            stable_borrow_rate,
            variable_borrow_rate,
            utilization_rate,
        })
    }
}

/// Production page source backed by the Aave V3 subgraph. Transient HTTP
/// failures retry with exponential backoff inside the client middleware,
/// outside the cursor logic.
pub struct SubgraphSource {
    http_client: ClientWithMiddleware,
    url: String,
    api_key: Option<String>,
    page_size: usize,
}

impl SubgraphSource {
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

        SubgraphSource {
            http_client,
            url: config.aave_subgraph_url.clone(),
            api_key: config.subgraph_api_key.clone(),
            page_size: config.page_size,
        }
    }

    fn build_query(&self, data_type: DataType, symbol: &str, last_id: &str) -> String {
        format!(
            r#"{{
    records: {}(
        where: {{reserve_: {{symbol: "{}"}}, id_gt: "{}"}}
        orderBy: timestamp
        orderDirection: asc
        first: {}
    ) {{
        id
        timestamp
        reserve {{
            stableBorrowRate
            variableBorrowRate
            utilizationRate
            lastUpdateTimestamp
        }}
    }}
}}"#,
            data_type.collection(),
            symbol,
            last_id,
            self.page_size
        )
    }
}

#[async_trait]
impl RatePageSource for SubgraphSource {
    async fn fetch_page(
        &self,
        data_type: DataType,
        symbol: &str,
        last_id: &str,
    ) -> Result<Vec<RateRecord>, FetchError> {
        let query = self.build_query(data_type, symbol, last_id);
        let body = serde_json::json!({ "query": query });

        let mut request = self.http_client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FetchError::transport(data_type, symbol, last_id, e))?
            .error_for_status()
            .map_err(|e| FetchError::transport(data_type, symbol, last_id, e.into()))?;

        let envelope: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| FetchError::malformed(data_type, symbol, last_id, e.to_string()))?;

        if let Some(errors) = envelope.errors {
            let joined = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(FetchError::malformed(data_type, symbol, last_id, joined));
        }

        let data = envelope.data.ok_or_else(|| {
            FetchError::malformed(data_type, symbol, last_id, "response carried no data")
        })?;

        data.records
            .into_iter()
            .map(|wire| wire.into_rate_record(data_type, symbol, last_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn record(id: &str, timestamp: i64) -> RateRecord {
        RateRecord {
            id: id.to_string(),
            timestamp,
            stable_borrow_rate: U256::zero(),
            variable_borrow_rate: U256::zero(),
            utilization_rate: Decimal::ZERO,
        }
    }

    fn page(start: usize, len: usize) -> Vec<RateRecord> {
        (start..start + len)
            .map(|i| record(&format!("{:08}", i), 1_700_000_000 + i as i64))
            .collect()
    }

    struct ScriptedSource {
        pages: Mutex<Vec<Vec<RateRecord>>>,
        requests: AtomicUsize,
        cursors_seen: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Vec<RateRecord>>) -> Self {
            ScriptedSource {
                pages: Mutex::new(pages),
                requests: AtomicUsize::new(0),
                cursors_seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RatePageSource for ScriptedSource {
        async fn fetch_page(
            &self,
            _data_type: DataType,
            _symbol: &str,
            last_id: &str,
        ) -> Result<Vec<RateRecord>, FetchError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.cursors_seen.lock().unwrap().push(last_id.to_string());
            let mut pages = self.pages.lock().unwrap();
            if pages.is_empty() {
                Ok(Vec::new())
            } else {
                Ok(pages.remove(0))
            }
        }
    }

    #[tokio::test]
    async fn drains_full_pages_until_empty_page() {
        let source = ScriptedSource::new(vec![page(0, 1000), page(1000, 1000), Vec::new()]);

        let records = fetch_all(&source, DataType::Supplies, "USDC").await.unwrap();

        assert_eq!(records.len(), 2000);
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn cursor_advances_to_last_id_of_each_page() {
        let source = ScriptedSource::new(vec![page(0, 3), page(3, 2), Vec::new()]);

        fetch_all(&source, DataType::Borrows, "DAI").await.unwrap();

        let cursors = source.cursors_seen.lock().unwrap();
        assert_eq!(*cursors, vec!["", "00000002", "00000004"]);
    }

    #[tokio::test]
    async fn empty_first_page_means_empty_series() {
        let source = ScriptedSource::new(vec![]);

        let records = fetch_all(&source, DataType::Supplies, "WBTC").await.unwrap();

        assert!(records.is_empty());
        assert_eq!(source.requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_page_still_requires_empty_page_to_stop() {
        // 999 records is not a termination signal by itself
        let source = ScriptedSource::new(vec![page(0, 999), Vec::new()]);

        let records = fetch_all(&source, DataType::Borrows, "USDT").await.unwrap();

        assert_eq!(records.len(), 999);
        assert_eq!(source.requests.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wire_record_with_bad_rate_is_malformed() {
        let wire = WireRecord {
            id: "1".to_string(),
            timestamp: 1_700_000_000,
            reserve: WireReserve {
                stable_borrow_rate: "not-a-number".to_string(),
                variable_borrow_rate: "0".to_string(),
                utilization_rate: "0.5".to_string(),
            },
        };

        let err = wire
            .into_rate_record(DataType::Supplies, "USDC", "")
            .unwrap_err();
        assert!(matches!(err, FetchError::Malformed { .. }));
    }

    #[test]
    fn wire_record_converts_rates() {
        let wire = WireRecord {
            id: "42".to_string(),
            timestamp: 1_700_000_000,
            reserve: WireReserve {
                stable_borrow_rate: "35000000000000000000000000".to_string(),
                variable_borrow_rate: "12000000000000000000000000".to_string(),
                utilization_rate: "0.731".to_string(),
            },
        };

        let record = wire.into_rate_record(DataType::Borrows, "USDC", "").unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(
            record.stable_borrow_rate,
            U256::from_dec_str("35000000000000000000000000").unwrap()
        );
        assert_eq!(record.utilization_rate.to_string(), "0.731");
    }

    #[test]
    fn graphql_errors_deserialize() {
        let raw = r#"{"errors":[{"message":"rate limited"},{"message":"try later"}]}"#;
        let envelope: GraphQlResponse = serde_json::from_str(raw).unwrap();
        let errors = envelope.errors.unwrap();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "rate limited");
        assert!(envelope.data.is_none());
    }

    #[test]
    fn page_payload_deserializes_into_records() {
        let raw = r#"{
            "data": {
                "records": [
                    {
                        "id": "31:2:145",
                        "timestamp": 1709251200,
                        "reserve": {
                            "stableBorrowRate": "100000000000000000000000000",
                            "variableBorrowRate": "200000000000000000000000000",
                            "utilizationRate": "0.5"
                        }
                    }
                ]
            }
        }"#;
        let envelope: GraphQlResponse = serde_json::from_str(raw).unwrap();
        let data = envelope.data.unwrap();
        assert_eq!(data.records.len(), 1);
        assert_eq!(data.records[0].id, "31:2:145");
        assert_eq!(data.records[0].timestamp, 1709251200);
    }
}
