use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::aave::types::{DailyTable, MergedRow};

/// Full outer join of the supplies and borrows tables on date. The result has
/// one row per distinct date across both inputs, sorted ascending; a date
/// present on one side only leaves the other side None.
pub fn merge(supplies: &DailyTable, borrows: &DailyTable) -> Vec<MergedRow> {
    let mut by_date: BTreeMap<NaiveDate, MergedRow> = BTreeMap::new();

    for row in &supplies.rows {
        by_date
            .entry(row.date)
            .or_insert_with(|| MergedRow {
                date: row.date,
                supply: None,
                borrow: None,
            })
            .supply = Some(row.clone());
    }

    for row in &borrows.rows {
        by_date
            .entry(row.date)
            .or_insert_with(|| MergedRow {
                date: row.date,
                supply: None,
                borrow: None,
            })
            .borrow = Some(row.clone());
    }

    by_date.into_values().collect()
}
