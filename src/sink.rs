use std::io;
use std::path::{Path, PathBuf};

use ethers::utils::to_checksum;
use eyre::Result;
use tracing::info;

use crate::aave::types::{DailyEnvelope, DailyTable, MergedRow};
use crate::uniswap::pool::PoolSnapshot;

/// Writes the supplies table to `aave_supplies_<symbol>.csv` under the output
/// directory and returns the path.
pub fn write_supplies_csv(output_dir: &Path, symbol: &str, table: &DailyTable) -> Result<PathBuf> {
    let path = output_dir.join(format!("aave_supplies_{}.csv", symbol.to_lowercase()));
    let mut writer = csv::Writer::from_path(&path)?;
    write_supplies_records(&mut writer, table)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        rows = table.rows.len(),
        "Supplies table written"
    );
    Ok(path)
}

/// Writes the borrows table to `aave_borrows_<symbol>.csv` under the output
/// directory and returns the path.
pub fn write_borrows_csv(output_dir: &Path, symbol: &str, table: &DailyTable) -> Result<PathBuf> {
    let path = output_dir.join(format!("aave_borrows_{}.csv", symbol.to_lowercase()));
    let mut writer = csv::Writer::from_path(&path)?;
    write_borrows_records(&mut writer, table)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        rows = table.rows.len(),
        "Borrows table written"
    );
    Ok(path)
}

/// Writes the merged supplies/borrows rows to `aave_merged_<symbol>.csv`.
/// Dates present on one side only leave the other side's cells empty.
pub fn write_merged_csv(output_dir: &Path, symbol: &str, rows: &[MergedRow]) -> Result<PathBuf> {
    let path = output_dir.join(format!("aave_merged_{}.csv", symbol.to_lowercase()));
    let mut writer = csv::Writer::from_path(&path)?;
    write_merged_records(&mut writer, rows)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        rows = rows.len(),
        "Merged table written"
    );
    Ok(path)
}

/// Writes pool snapshots to `uniswap_pools.csv` under the output directory.
pub fn write_pools_csv(output_dir: &Path, snapshots: &[PoolSnapshot]) -> Result<PathBuf> {
    let path = output_dir.join("uniswap_pools.csv");
    let mut writer = csv::Writer::from_path(&path)?;
    write_pool_records(&mut writer, snapshots)?;
    writer.flush()?;
    info!(
        path = %path.display(),
        rows = snapshots.len(),
        "Pool snapshots written"
    );
    Ok(path)
}

fn write_supplies_records<W: io::Write>(
    writer: &mut csv::Writer<W>,
    table: &DailyTable,
) -> Result<()> {
    writer.write_record([
        "date",
        "min_deposit_APR",
        "max_deposit_APR",
        "min_utilization_rate",
        "max_utilization_rate",
        "daily_deposit_rate",
        "daily_deposit_APR",
    ])?;
    for row in &table.rows {
        let mut record = vec![row.date.to_string()];
        record.extend(supply_cells(row));
        writer.write_record(&record)?;
    }
    Ok(())
}

fn write_borrows_records<W: io::Write>(
    writer: &mut csv::Writer<W>,
    table: &DailyTable,
) -> Result<()> {
    writer.write_record([
        "date",
        "min_stable_borrow_rate",
        "max_stable_borrow_rate",
        "min_variable_borrow_rate",
        "max_variable_borrow_rate",
        "min_utilization_rate",
        "max_utilization_rate",
        "daily_borrow_rate",
        "daily_borrow_APR",
    ])?;
    for row in &table.rows {
        let mut record = vec![row.date.to_string()];
        record.extend(borrow_cells(row));
        writer.write_record(&record)?;
    }
    Ok(())
}

fn write_merged_records<W: io::Write>(
    writer: &mut csv::Writer<W>,
    rows: &[MergedRow],
) -> Result<()> {
    // Only the utilization columns collide between the two sides, so only
    // they carry the _supply/_borrow suffixes.
    writer.write_record([
        "date",
        "min_deposit_APR",
        "max_deposit_APR",
        "min_utilization_rate_supply",
        "max_utilization_rate_supply",
        "daily_deposit_rate",
        "daily_deposit_APR",
        "min_stable_borrow_rate",
        "max_stable_borrow_rate",
        "min_variable_borrow_rate",
        "max_variable_borrow_rate",
        "min_utilization_rate_borrow",
        "max_utilization_rate_borrow",
        "daily_borrow_rate",
        "daily_borrow_APR",
    ])?;
    for row in rows {
        let mut record = vec![row.date.to_string()];
        match &row.supply {
            Some(envelope) => record.extend(supply_cells(envelope)),
            None => record.extend(vec![String::new(); 6]),
        }
        match &row.borrow {
            Some(envelope) => record.extend(borrow_cells(envelope)),
            None => record.extend(vec![String::new(); 8]),
        }
        writer.write_record(&record)?;
    }
    Ok(())
}

fn write_pool_records<W: io::Write>(
    writer: &mut csv::Writer<W>,
    snapshots: &[PoolSnapshot],
) -> Result<()> {
    writer.write_record([
        "version",
        "pool_address",
        "token0",
        "token1",
        "fee_tier",
        "token0_balance",
        "token1_balance",
        "price_token0_in_token1",
        "price_token1_in_token0",
        "token0_usd_price",
        "token1_usd_price",
        "tvl_token0_usd",
        "tvl_token1_usd",
    ])?;
    for snapshot in snapshots {
        let fee_tier = match snapshot.fee_tier {
            Some(fee) => fee.to_string(),
            None => "N/A".to_string(),
        };
        writer.write_record(&[
            snapshot.version.to_string(),
            to_checksum(&snapshot.pool_address, None),
            to_checksum(&snapshot.token0, None),
            to_checksum(&snapshot.token1, None),
            fee_tier,
            snapshot.token0_balance.to_string(),
            snapshot.token1_balance.to_string(),
            snapshot.price_token0_in_token1.to_string(),
            snapshot.price_token1_in_token0.to_string(),
            snapshot.token0_usd_price.to_string(),
            snapshot.token1_usd_price.to_string(),
            snapshot.tvl_token0_usd.to_string(),
            snapshot.tvl_token1_usd.to_string(),
        ])?;
    }
    Ok(())
}

fn supply_cells(envelope: &DailyEnvelope) -> Vec<String> {
    vec![
        envelope.min_stable_borrow_rate.to_string(),
        envelope.max_stable_borrow_rate.to_string(),
        envelope.min_utilization_rate.to_string(),
        envelope.max_utilization_rate.to_string(),
        envelope.daily_rate.to_string(),
        envelope.daily_apr.to_string(),
    ]
}

fn borrow_cells(envelope: &DailyEnvelope) -> Vec<String> {
    vec![
        envelope.min_stable_borrow_rate.to_string(),
        envelope.max_stable_borrow_rate.to_string(),
        envelope.min_variable_borrow_rate.to_string(),
        envelope.max_variable_borrow_rate.to_string(),
        envelope.min_utilization_rate.to_string(),
        envelope.max_utilization_rate.to_string(),
        envelope.daily_rate.to_string(),
        envelope.daily_apr.to_string(),
    ]
}
