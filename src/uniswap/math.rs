use std::str::FromStr;

use bigdecimal::num_bigint::BigInt;
use bigdecimal::{BigDecimal, RoundingMode};
use ethers::types::U256;
use ethers::utils::format_units;
use eyre::{Result, eyre};
use rust_decimal::Decimal;

/// Converts a v3 pool's sqrtPriceX96 into the pair of spot prices
/// (token0 in token1 units, token1 in token0 units), adjusted for token
/// decimals. The squared ratio exceeds both u128 and Decimal range, so the
/// intermediate arithmetic runs in BigDecimal before rounding to 18 places.
pub fn sqrt_price_x96_to_prices(
    sqrt_price_x96: U256,
    token0_decimals: u8,
    token1_decimals: u8,
) -> Result<(Decimal, Decimal)> {
    if sqrt_price_x96.is_zero() {
        eyre::bail!("sqrtPriceX96 is zero");
    }

    let sqrt_price = BigInt::from_str(&sqrt_price_x96.to_string())?;
    let numerator = BigDecimal::from(&sqrt_price * &sqrt_price);
    let denominator = BigDecimal::from(BigInt::from(2u8).pow(192u32));
    let ratio = numerator / denominator;

    // price = (sqrtPriceX96^2 / 2^192) * 10^(d0 - d1)
    let exponent = token0_decimals as i64 - token1_decimals as i64;
    let adjusted = ratio * BigDecimal::new(BigInt::from(1u8), -exponent);
    let inverse = BigDecimal::from(1u8) / &adjusted;

    let price_token0_in_token1 =
        Decimal::from_str(&adjusted.with_scale_round(18, RoundingMode::HalfUp).to_string())?;
    let price_token1_in_token0 =
        Decimal::from_str(&inverse.with_scale_round(18, RoundingMode::HalfUp).to_string())?;
    Ok((price_token0_in_token1, price_token1_in_token0))
}

/// Spot prices implied by a v2 pair's reserves: token0 priced in token1 is
/// reserve1/reserve0, and the reciprocal for the other direction. Reserves
/// are expected already normalized by token decimals.
pub fn reserve_ratio_prices(reserve0: Decimal, reserve1: Decimal) -> Result<(Decimal, Decimal)> {
    if reserve0.is_zero() || reserve1.is_zero() {
        eyre::bail!("pair has an empty reserve");
    }
    let price_token0_in_token1 = reserve1
        .checked_div(reserve0)
        .ok_or_else(|| eyre!("reserve ratio out of range"))?;
    let price_token1_in_token0 = reserve0
        .checked_div(reserve1)
        .ok_or_else(|| eyre!("reserve ratio out of range"))?;
    Ok((price_token0_in_token1, price_token1_in_token0))
}

/// Scales a raw on-chain token amount down by the token's decimals.
pub fn u256_to_decimal(value: U256, decimals: u8) -> Result<Decimal> {
    let formatted = format_units(value, decimals as usize)?;
    Decimal::from_str(&formatted).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::*;

    fn x96(mantissa: u64) -> U256 {
        U256::from(mantissa) * U256::from(2u8).pow(U256::from(96u8))
    }

    #[test]
    fn unit_sqrt_price_with_equal_decimals_is_one() {
        let (price01, price10) = sqrt_price_x96_to_prices(x96(1), 18, 18).unwrap();
        assert_eq!(price01, dec!(1));
        assert_eq!(price10, dec!(1));
    }

    #[test]
    fn squared_ratio_carries_through() {
        // sqrtPrice = 2 * 2^96, so the raw ratio is 4
        let (price01, price10) = sqrt_price_x96_to_prices(x96(2), 18, 18).unwrap();
        assert_eq!(price01, dec!(4));
        assert_eq!(price10, dec!(0.25));
    }

    #[test]
    fn decimal_gap_scales_the_price() {
        // Unit ratio, token0 has two more decimals than token1
        let (price01, price10) = sqrt_price_x96_to_prices(x96(1), 8, 6).unwrap();
        assert_eq!(price01, dec!(100));
        assert_eq!(price10, dec!(0.01));
    }

    #[test]
    fn zero_sqrt_price_is_rejected() {
        assert!(sqrt_price_x96_to_prices(U256::zero(), 18, 18).is_err());
    }

    #[test]
    fn reserve_prices_are_the_cross_ratios() {
        let (price01, price10) = reserve_ratio_prices(dec!(100), dec!(200)).unwrap();
        assert_eq!(price01, dec!(2));
        assert_eq!(price10, dec!(0.5));
    }

    #[test]
    fn empty_reserves_are_rejected() {
        assert!(reserve_ratio_prices(Decimal::ZERO, dec!(5)).is_err());
        assert!(reserve_ratio_prices(dec!(5), Decimal::ZERO).is_err());
    }

    #[test]
    fn raw_amounts_normalize_by_decimals() {
        let value = U256::from(1_234_567u64);
        assert_eq!(u256_to_decimal(value, 6).unwrap(), dec!(1.234567));
        assert_eq!(u256_to_decimal(U256::zero(), 18).unwrap(), Decimal::ZERO);
    }
}
