use std::fmt;

use chrono::NaiveDate;
use ethers::types::U256;
use rust_decimal::Decimal;

/// Which side of the lending market a rate series tracks. The variants map
/// onto the subgraph's `supplies` and `borrows` event collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Supplies,
    Borrows,
}

impl DataType {
    /// Collection name as it appears in the subgraph schema.
    pub fn collection(&self) -> &'static str {
        match self {
            DataType::Supplies => "supplies",
            DataType::Borrows => "borrows",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collection())
    }
}

/// One rate observation. The borrow rates stay ray-scaled (27 implied
/// decimals) until aggregation; utilization arrives as a plain fraction.
/// `id` is the pagination cursor: opaque but monotonically comparable within
/// a series, not guaranteed unique across symbols.
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecord {
    pub id: String,
    pub timestamp: i64,
    pub stable_borrow_rate: U256,
    pub variable_borrow_rate: U256,
    pub utilization_rate: Decimal,
}

/// Per-day min/max envelope of the normalized rates, plus the derived daily
/// rate columns filled in after aggregation. Every field holds min <= max;
/// a single-observation day has min == max throughout. `daily_apr` is `f64`:
/// 365-period compounding overflows `Decimal`'s 96-bit range once the daily
/// rate passes roughly 0.2.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyEnvelope {
    pub date: NaiveDate,
    pub min_stable_borrow_rate: Decimal,
    pub max_stable_borrow_rate: Decimal,
    pub min_variable_borrow_rate: Decimal,
    pub max_variable_borrow_rate: Decimal,
    pub min_utilization_rate: Decimal,
    pub max_utilization_rate: Decimal,
    pub daily_rate: Decimal,
    pub daily_apr: f64,
}

/// Aggregated envelopes for one series, sorted ascending by date.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyTable {
    pub data_type: DataType,
    pub rows: Vec<DailyEnvelope>,
}

/// One row of the outer-joined supplies/borrows table. A side with no
/// observations on this date stays None and becomes empty CSV cells.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub supply: Option<DailyEnvelope>,
    pub borrow: Option<DailyEnvelope>,
}
