//! Token amount conversion between human units and on-chain smallest units.

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::common::error::{ClmmError, ClmmResult};
use crate::utils::calc::rational::{Rational, RoundingMode};

/// Parses an amount typed by the user.
///
/// Rejects negative values and more fractional digits than the token carries.
pub fn parse_amount(text: &str, decimals: u8) -> ClmmResult<Rational> {
    let amount = Rational::from_decimal_str(text)?;
    if amount.is_negative() {
        return Err(ClmmError::InvalidDecimal(text.to_string()));
    }
    let in_units = &amount * &Rational::pow10(decimals as i32);
    if !in_units.is_integer() {
        return Err(ClmmError::InvalidDecimal(format!("{text} has more than {decimals} decimals")));
    }
    Ok(amount)
}

/// Human amount → smallest units.
pub fn to_raw_amount(amount: &Rational, decimals: u8, mode: RoundingMode) -> ClmmResult<u64> {
    let raw: BigInt = (amount * &Rational::pow10(decimals as i32)).round(mode);
    raw.to_u64().ok_or_else(|| ClmmError::AmountOverflow(raw.to_string()))
}

/// Smallest units → human amount, exact.
pub fn from_raw_amount(raw: u64, decimals: u8) -> Rational {
    Rational::from_scaled(raw, decimals as u32)
}

/// Display form with exactly the token's precision available, trailing zeros trimmed.
pub fn format_amount(amount: &Rational, decimals: u8, mode: RoundingMode) -> String {
    amount.to_decimal_string(decimals as u32, mode)
}
