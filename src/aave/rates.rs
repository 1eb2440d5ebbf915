use rust_decimal::Decimal;
use rust_decimal::prelude::*;

use crate::aave::types::{DailyTable, DataType};

/// Compounds a sequence of per-period rates: prod(1 + r_i) - 1. A
/// single-element sequence passes through unchanged.
pub fn effective_daily_rate(rates: &[Decimal]) -> Decimal {
    let compounded = rates
        .iter()
        .fold(Decimal::ONE, |acc, rate| acc * (Decimal::ONE + rate));
    compounded - Decimal::ONE
}

/// Annualizes a daily rate: (1 + daily)^365 - 1, computed in `f64`. The
/// 365-period product overflows `Decimal`'s 96-bit range once the daily
/// rate passes roughly 0.2.
pub fn annualize(daily_rate: Decimal) -> f64 {
    (1.0 + daily_rate.to_f64().unwrap_or(0.0)).powi(365) - 1.0
}

/// Fills the derived daily rate columns of an aggregated table. Each day's
/// rate compounds a one-element sequence holding that day's max rate (stable
/// for supplies, variable for borrows), so the value passes through as-is;
/// intraday samples are not compounded.
pub fn attach_daily_rates(table: &mut DailyTable) {
    let data_type = table.data_type;
    for row in &mut table.rows {
        let max_rate = match data_type {
            DataType::Supplies => row.max_stable_borrow_rate,
            DataType::Borrows => row.max_variable_borrow_rate,
        };
        row.daily_rate = effective_daily_rate(&[max_rate]);
        row.daily_apr = annualize(row.daily_rate);
    }
}
