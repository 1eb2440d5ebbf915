use std::path::PathBuf;

use eyre::Result;
use tracing::{info, instrument};

use crate::aave::aggregator::aggregate;
use crate::aave::fetcher::{RatePageSource, fetch_all};
use crate::aave::merge::merge;
use crate::aave::rates::attach_daily_rates;
use crate::aave::types::{DailyTable, DataType};
use crate::config::Config;
use crate::sink;

/// Runs one (data type, symbol) series end to end: paginate the source dry,
/// aggregate per day, derive the daily rate pair.
#[instrument(skip(source), fields(data_type = %data_type, symbol = symbol))]
pub async fn run_series<S>(source: &S, data_type: DataType, symbol: &str) -> Result<DailyTable>
where
    S: RatePageSource + Sync + ?Sized,
{
    let records = fetch_all(source, data_type, symbol).await?;
    let mut table = aggregate(data_type, &records)?;
    attach_daily_rates(&mut table);
    info!(
        records = records.len(),
        days = table.rows.len(),
        "Series aggregated"
    );
    Ok(table)
}

/// Fetches supplies and borrows for a symbol concurrently, joins them on
/// date, and writes the three per-symbol CSVs. Returns the merged file path.
pub async fn run<S>(config: &Config, source: &S, symbol: &str) -> Result<PathBuf>
where
    S: RatePageSource + Sync + ?Sized,
{
    let (supplies, borrows) = tokio::try_join!(
        run_series(source, DataType::Supplies, symbol),
        run_series(source, DataType::Borrows, symbol),
    )?;

    let merged = merge(&supplies, &borrows);

    sink::write_supplies_csv(&config.output_dir, symbol, &supplies)?;
    sink::write_borrows_csv(&config.output_dir, symbol, &borrows)?;
    let merged_path = sink::write_merged_csv(&config.output_dir, symbol, &merged)?;

    info!(
        symbol,
        supply_days = supplies.rows.len(),
        borrow_days = borrows.rows.len(),
        merged_days = merged.len(),
        "Aave rate pipeline finished"
    );
    Ok(merged_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aave::rates::annualize;
    use crate::aave::types::RateRecord;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use ethers::types::U256;
    use rust_decimal::prelude::*;

    /// Serves a fixed record set on the first page and terminates on the
    /// second, for either data type.
    struct OnePageSource {
        records: Vec<RateRecord>,
    }

    #[async_trait]
    impl RatePageSource for OnePageSource {
        async fn fetch_page(
            &self,
            _data_type: DataType,
            _symbol: &str,
            last_id: &str,
        ) -> Result<Vec<RateRecord>, crate::errors::FetchError> {
            if last_id.is_empty() {
                Ok(self.records.clone())
            } else {
                Ok(Vec::new())
            }
        }
    }

    fn ray(mantissa: u64, exponent: usize) -> U256 {
        U256::from(mantissa) * U256::exp10(exponent)
    }

    fn timestamp(day: u32, hour: u32) -> i64 {
        NaiveDate::from_ymd_opt(2024, 3, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    fn record(id: &str, ts: i64, stable: U256, variable: U256) -> RateRecord {
        RateRecord {
            id: id.to_string(),
            timestamp: ts,
            stable_borrow_rate: stable,
            variable_borrow_rate: variable,
            utilization_rate: dec!(0.5),
        }
    }

    #[tokio::test]
    async fn run_series_builds_daily_table_with_rates() {
        let source = OnePageSource {
            records: vec![
                record("a", timestamp(1, 0), ray(1, 26), ray(2, 26)),
                record("b", timestamp(1, 12), ray(2, 26), ray(4, 26)),
            ],
        };

        let table = run_series(&source, DataType::Supplies, "USDC")
            .await
            .unwrap();

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.min_stable_borrow_rate, dec!(0.1));
        assert_eq!(row.max_stable_borrow_rate, dec!(0.2));
        // Supplies derive the daily pair from the day's max stable rate. A
        // 0.2 daily rate annualizes past Decimal's range; the f64 column
        // stays finite.
        assert_eq!(row.daily_rate, dec!(0.2));
        assert!(row.daily_apr.is_finite());
        assert_eq!(row.daily_apr, annualize(dec!(0.2)));
    }

    #[tokio::test]
    async fn run_series_for_borrows_uses_variable_rate() {
        let source = OnePageSource {
            records: vec![record("a", timestamp(2, 0), ray(1, 26), ray(3, 26))],
        };

        let table = run_series(&source, DataType::Borrows, "USDC").await.unwrap();

        assert_eq!(table.rows[0].daily_rate, dec!(0.3));
        assert!(table.rows[0].daily_apr.is_finite());
        assert_eq!(table.rows[0].daily_apr, annualize(dec!(0.3)));
    }

    #[tokio::test]
    async fn run_series_with_no_records_yields_empty_table() {
        let source = OnePageSource { records: vec![] };

        let table = run_series(&source, DataType::Borrows, "DAI").await.unwrap();

        assert!(table.rows.is_empty());
    }
}
