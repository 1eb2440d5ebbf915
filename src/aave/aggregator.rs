use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate};
use eyre::Result;
use rust_decimal::Decimal;
use tracing::{instrument, warn};

use crate::aave::normalize::ray_to_fraction;
use crate::aave::types::{DailyEnvelope, DailyTable, DataType, RateRecord};

/// Groups a series by UTC calendar day and folds per-day min/max envelopes
/// over the normalized rates. Rows come out sorted ascending by date; empty
/// input yields an empty table. The derived daily rate columns are left at
/// zero until `rates::attach_daily_rates` fills them.
#[instrument(skip(records), fields(data_type = %data_type, record_count = records.len()))]
pub fn aggregate(data_type: DataType, records: &[RateRecord]) -> Result<DailyTable> {
    let mut days: BTreeMap<NaiveDate, DailyEnvelope> = BTreeMap::new();

    for record in records {
        let Some(date) = DateTime::from_timestamp(record.timestamp, 0).map(|dt| dt.date_naive())
        else {
            warn!(
                id = %record.id,
                timestamp = record.timestamp,
                "Skipping record with unrepresentable timestamp"
            );
            continue;
        };

        let stable = ray_to_fraction(record.stable_borrow_rate)?;
        let variable = ray_to_fraction(record.variable_borrow_rate)?;
        let utilization = record.utilization_rate;

        days.entry(date)
            .and_modify(|envelope| {
                envelope.min_stable_borrow_rate = envelope.min_stable_borrow_rate.min(stable);
                envelope.max_stable_borrow_rate = envelope.max_stable_borrow_rate.max(stable);
                envelope.min_variable_borrow_rate = envelope.min_variable_borrow_rate.min(variable);
                envelope.max_variable_borrow_rate = envelope.max_variable_borrow_rate.max(variable);
                envelope.min_utilization_rate = envelope.min_utilization_rate.min(utilization);
                envelope.max_utilization_rate = envelope.max_utilization_rate.max(utilization);
            })
            .or_insert_with(|| DailyEnvelope {
                date,
                min_stable_borrow_rate: stable,
                max_stable_borrow_rate: stable,
                min_variable_borrow_rate: variable,
                max_variable_borrow_rate: variable,
                min_utilization_rate: utilization,
                max_utilization_rate: utilization,
                daily_rate: Decimal::ZERO,
                daily_apr: 0.0,
            });
    }

    Ok(DailyTable {
        data_type,
        rows: days.into_values().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use ethers::types::U256;
    use rust_decimal::prelude::*;

    fn ts(date: (i32, u32, u32), hour: u32) -> i64 {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp()
    }

    fn record(id: &str, timestamp: i64, stable: U256, variable: U256, utilization: Decimal) -> RateRecord {
        RateRecord {
            id: id.to_string(),
            timestamp,
            stable_borrow_rate: stable,
            variable_borrow_rate: variable,
            utilization_rate: utilization,
        }
    }

    fn ray(coefficient: u64, exponent: usize) -> U256 {
        U256::from(coefficient) * U256::exp10(exponent)
    }

    #[test]
    fn empty_input_yields_empty_table() {
        let table = aggregate(DataType::Supplies, &[]).unwrap();
        assert_eq!(table.data_type, DataType::Supplies);
        assert!(table.rows.is_empty());
    }

    #[test]
    fn two_days_with_min_max_envelopes() {
        // Two observations on 2024-03-01 (0.1 and 0.2 stable), one on 2024-03-02 (0.3)
        let records = vec![
            record("a", ts((2024, 3, 1), 4), ray(1, 26), ray(2, 26), dec!(0.4)),
            record("b", ts((2024, 3, 1), 18), ray(2, 26), ray(1, 26), dec!(0.6)),
            record("c", ts((2024, 3, 2), 9), ray(3, 26), ray(3, 26), dec!(0.5)),
        ];

        let table = aggregate(DataType::Borrows, &records).unwrap();

        assert_eq!(table.rows.len(), 2);

        let first = &table.rows[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(first.min_stable_borrow_rate, dec!(0.1));
        assert_eq!(first.max_stable_borrow_rate, dec!(0.2));
        assert_eq!(first.min_variable_borrow_rate, dec!(0.1));
        assert_eq!(first.max_variable_borrow_rate, dec!(0.2));
        assert_eq!(first.min_utilization_rate, dec!(0.4));
        assert_eq!(first.max_utilization_rate, dec!(0.6));

        let second = &table.rows[1];
        assert_eq!(second.date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
        assert_eq!(second.min_stable_borrow_rate, dec!(0.3));
        assert_eq!(second.max_stable_borrow_rate, dec!(0.3));
    }

    #[test]
    fn single_record_day_has_min_equal_max() {
        let records = vec![record(
            "only",
            ts((2024, 6, 15), 12),
            ray(5, 25),
            ray(7, 25),
            dec!(0.42),
        )];

        let table = aggregate(DataType::Supplies, &records).unwrap();

        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.min_stable_borrow_rate, row.max_stable_borrow_rate);
        assert_eq!(row.min_variable_borrow_rate, row.max_variable_borrow_rate);
        assert_eq!(row.min_utilization_rate, row.max_utilization_rate);
    }

    #[test]
    fn envelopes_hold_min_not_above_max() {
        let records: Vec<RateRecord> = (0..50)
            .map(|i| {
                record(
                    &format!("{i:04}"),
                    ts((2024, 1, 1 + (i % 5) as u32), (i % 24) as u32),
                    ray(1 + (i * 7 % 13) as u64, 25),
                    ray(1 + (i * 11 % 17) as u64, 25),
                    Decimal::from(i % 10) / dec!(10),
                )
            })
            .collect();

        let table = aggregate(DataType::Borrows, &records).unwrap();

        assert_eq!(table.rows.len(), 5);
        for row in &table.rows {
            assert!(row.min_stable_borrow_rate <= row.max_stable_borrow_rate);
            assert!(row.min_variable_borrow_rate <= row.max_variable_borrow_rate);
            assert!(row.min_utilization_rate <= row.max_utilization_rate);
        }
    }

    #[test]
    fn rows_sort_ascending_by_date_regardless_of_input_order() {
        let records = vec![
            record("z", ts((2024, 5, 3), 1), ray(1, 26), ray(1, 26), dec!(0.1)),
            record("a", ts((2024, 5, 1), 1), ray(1, 26), ray(1, 26), dec!(0.1)),
            record("m", ts((2024, 5, 2), 1), ray(1, 26), ray(1, 26), dec!(0.1)),
        ];

        let table = aggregate(DataType::Supplies, &records).unwrap();

        let dates: Vec<NaiveDate> = table.rows.iter().map(|r| r.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
            ]
        );
    }

    #[test]
    fn aggregation_is_deterministic() {
        let records = vec![
            record("a", ts((2024, 3, 1), 4), ray(1, 26), ray(2, 26), dec!(0.4)),
            record("b", ts((2024, 3, 1), 18), ray(2, 26), ray(1, 26), dec!(0.6)),
            record("c", ts((2024, 3, 2), 9), ray(3, 26), ray(3, 26), dec!(0.5)),
        ];

        let first = aggregate(DataType::Borrows, &records).unwrap();
        let second = aggregate(DataType::Borrows, &records).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn unrepresentable_timestamp_is_skipped_not_fatal() {
        let records = vec![
            record("bad", i64::MAX, ray(1, 26), ray(1, 26), dec!(0.1)),
            record("good", ts((2024, 3, 1), 0), ray(1, 26), ray(1, 26), dec!(0.1)),
        ];

        let table = aggregate(DataType::Supplies, &records).unwrap();

        assert_eq!(table.rows.len(), 1);
        assert_eq!(
            table.rows[0].date,
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
    }

    #[test]
    fn day_boundary_splits_at_midnight_utc() {
        let last_second = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(23, 59, 59)
            .unwrap()
            .and_utc()
            .timestamp();
        let records = vec![
            record("a", last_second, ray(1, 26), ray(1, 26), dec!(0.1)),
            record("b", last_second + 1, ray(2, 26), ray(2, 26), dec!(0.2)),
        ];

        let table = aggregate(DataType::Borrows, &records).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(table.rows[1].date, NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());
    }
}
