use std::str::FromStr;

use ethers::types::U256;
use ethers::utils::format_units;
use eyre::Result;
use rust_decimal::Decimal;

use crate::constants::RAY_DECIMALS;

/// Converts a ray-scaled integer (27 implied decimals) to a decimal fraction.
///
/// `Decimal` keeps 28-29 significant digits, so a raw value wider than that
/// rounds in its last digit; on-chain rates sit orders of magnitude below the
/// limit. Values past `Decimal`'s absolute range fail the parse and error.
pub fn ray_to_fraction(raw: U256) -> Result<Decimal> {
    let formatted = format_units(raw, RAY_DECIMALS as usize)?;
    let fraction = Decimal::from_str(&formatted)?;
    Ok(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    #[test]
    fn twenty_seven_ray_normalizes_to_twenty_seven() {
        let raw = U256::from_dec_str("27000000000000000000000000000").unwrap();
        assert_eq!(ray_to_fraction(raw).unwrap(), dec!(27));
    }

    #[test]
    fn typical_rate_normalizes_to_fraction() {
        // 3.5% borrow rate in ray
        let raw = U256::from_dec_str("35000000000000000000000000").unwrap();
        assert_eq!(ray_to_fraction(raw).unwrap(), dec!(0.035));
    }

    #[test]
    fn zero_is_zero() {
        assert_eq!(ray_to_fraction(U256::zero()).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn one_ray_unit_is_representable() {
        // The smallest nonzero ray value, 10^-27
        let fraction = ray_to_fraction(U256::one()).unwrap();
        assert!(fraction > Decimal::ZERO);
        assert_eq!(fraction.to_string(), "0.000000000000000000000000001");
    }
}
