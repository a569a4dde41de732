//! Tick / price codec.
//!
//! Three price representations meet here:
//! - the decimal price a user types (token B per token A, human units),
//! - the raw price `1.0001^tick` (token B per token A, smallest units),
//! - the pool's Q64.64 `sqrt_price_x64`, which is what goes on chain.
//!
//! `decimal = raw * 10^(decimals_a - decimals_b)`.

use num_bigint::{BigInt, BigUint};
use num_traits::{One, ToPrimitive};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::clmm_math::{MAX_SQRT_PRICE_X64, MAX_TICK, MIN_SQRT_PRICE_X64, MIN_TICK, get_tick_at_sqrt_price};
use super::rational::Rational;
use crate::common::error::{ClmmError, ClmmResult};

/// Fractional bits kept while raising 1.0001 to a tick power.
const PRICE_FRAC_BITS: usize = 160;
const Q64_RESOLUTION: usize = 64;

/// Which neighbour wins when a price sits exactly between two usable ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TieBreak {
    #[default]
    Lower,
    Upper,
}

/// Tick bounds of a pool. Defaults to the protocol bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickBounds {
    pub min_tick: i32,
    pub max_tick: i32,
}

impl Default for TickBounds {
    fn default() -> Self {
        Self { min_tick: MIN_TICK, max_tick: MAX_TICK }
    }
}

impl TickBounds {
    pub fn new(min_tick: i32, max_tick: i32) -> ClmmResult<Self> {
        if min_tick >= max_tick || min_tick < MIN_TICK || max_tick > MAX_TICK {
            return Err(ClmmError::PriceOutOfRange(format!(
                "tick bounds [{min_tick}, {max_tick}] not inside [{MIN_TICK}, {MAX_TICK}]"
            )));
        }
        Ok(Self { min_tick, max_tick })
    }

    pub fn contains(&self, tick: i32) -> bool {
        (self.min_tick..=self.max_tick).contains(&tick)
    }

    /// Outermost ticks divisible by `tick_spacing` that still lie inside the bounds.
    pub fn aligned(&self, tick_spacing: u16) -> ClmmResult<(i32, i32)> {
        check_tick_spacing(tick_spacing)?;
        let s = tick_spacing as i32;
        let lo = -((-self.min_tick).div_euclid(s)) * s;
        let hi = self.max_tick.div_euclid(s) * s;
        if lo >= hi {
            return Err(ClmmError::InvalidTickSpacing(tick_spacing));
        }
        Ok((lo, hi))
    }
}

pub fn check_tick_spacing(tick_spacing: u16) -> ClmmResult<()> {
    if tick_spacing == 0 {
        return Err(ClmmError::InvalidTickSpacing(tick_spacing));
    }
    Ok(())
}

/// 1.0001^n * 2^PRICE_FRAC_BITS, truncated at each step.
fn pow_10001_scaled(n: u32) -> BigUint {
    let mut base = (BigUint::from(10_001u32) << PRICE_FRAC_BITS) / BigUint::from(10_000u32);
    let mut acc = BigUint::one() << PRICE_FRAC_BITS;
    let mut e = n;
    while e > 0 {
        if e & 1 == 1 {
            acc = (&acc * &base) >> PRICE_FRAC_BITS;
        }
        e >>= 1;
        if e > 0 {
            base = (&base * &base) >> PRICE_FRAC_BITS;
        }
    }
    acc
}

/// 1.0001^tick without bounds checking. Negative ticks are exact reciprocals
/// of the positive ones.
fn pow_10001(tick: i32) -> Rational {
    let scaled = BigInt::from(pow_10001_scaled(tick.unsigned_abs()));
    let unit = BigInt::one() << PRICE_FRAC_BITS;
    if tick >= 0 { Rational::reduced(scaled, unit) } else { Rational::reduced(unit, scaled) }
}

/// Raw price at `tick`, i.e. `1.0001^tick` to 160 fractional bits.
pub fn tick_to_price(tick: i32) -> ClmmResult<Rational> {
    if !(MIN_TICK..=MAX_TICK).contains(&tick) {
        return Err(ClmmError::PriceOutOfRange(format!(
            "tick {tick} outside [{MIN_TICK}, {MAX_TICK}]"
        )));
    }
    Ok(pow_10001(tick))
}

/// Raw price of a Q64.64 sqrt price: `sqrt_price_x64^2 / 2^128`.
pub fn sqrt_price_x64_to_price(sqrt_price_x64: u128) -> Rational {
    let s = BigInt::from(sqrt_price_x64);
    Rational::reduced(&s * &s, BigInt::one() << (2 * Q64_RESOLUTION))
}

/// `floor(sqrt(price) * 2^64)`, unchecked against the pool's sqrt-price range.
fn sqrt_x64_of(price: &Rational) -> ClmmResult<BigUint> {
    if !price.is_positive() {
        return Err(ClmmError::NonPositivePrice);
    }
    let scaled = (price.numer() << (2 * Q64_RESOLUTION)) / price.denom();
    Ok(scaled.magnitude().sqrt())
}

fn check_sqrt_price(sqrt_price_x64: &BigUint) -> ClmmResult<u128> {
    sqrt_price_x64
        .to_u128()
        .filter(|s| (MIN_SQRT_PRICE_X64..MAX_SQRT_PRICE_X64).contains(s))
        .ok_or_else(|| {
            ClmmError::PriceOutOfRange(format!(
                "sqrt_price_x64 {sqrt_price_x64} outside [{MIN_SQRT_PRICE_X64}, {MAX_SQRT_PRICE_X64})"
            ))
        })
}

/// Greatest tick whose price does not exceed `price`.
///
/// The sqrt-price lattice gives an estimate that is at most one tick away;
/// the exact comparisons against `1.0001^t` settle the rest.
pub fn floor_tick(price: &Rational) -> ClmmResult<i32> {
    let sqrt_price = sqrt_x64_of(price)?;
    let out_of_range = || ClmmError::PriceOutOfRange(format!("price {price} outside protocol tick bounds"));

    let mut tick = match sqrt_price.to_u128() {
        Some(s) if s < MIN_SQRT_PRICE_X64 => MIN_TICK,
        Some(s) if s < MAX_SQRT_PRICE_X64 => get_tick_at_sqrt_price(s)?,
        _ => MAX_TICK,
    };

    while tick >= MIN_TICK && pow_10001(tick) > *price {
        tick -= 1;
    }
    while tick < MAX_TICK && pow_10001(tick + 1) <= *price {
        tick += 1;
    }
    if tick < MIN_TICK || (tick == MAX_TICK && *price > pow_10001(MAX_TICK)) {
        return Err(out_of_range());
    }
    Ok(tick)
}

/// Closest usable tick to a raw price, with the default bounds and ties going
/// to the lower tick.
pub fn price_to_tick(price: &Rational, tick_spacing: u16) -> ClmmResult<i32> {
    price_to_tick_with(price, tick_spacing, &TickBounds::default(), TieBreak::Lower)
}

/// Closest tick divisible by `tick_spacing`, measured in log space, which is
/// `round(log(price) / log(1.0001))` snapped to the spacing.
///
/// Between neighbours `m0 < m1` the log midpoint is `sqrt(p(m0) * p(m1))`, so
/// comparing `price^2` with `p(m0) * p(m1)` decides exactly.
pub fn price_to_tick_with(
    price: &Rational,
    tick_spacing: u16,
    bounds: &TickBounds,
    tie_break: TieBreak,
) -> ClmmResult<i32> {
    let (lo, hi) = bounds.aligned(tick_spacing)?;
    let floor = floor_tick(price)?;
    if !bounds.contains(floor) {
        return Err(ClmmError::PriceOutOfRange(format!(
            "price {price} maps to tick {floor} outside [{}, {}]",
            bounds.min_tick, bounds.max_tick
        )));
    }

    let s = tick_spacing as i32;
    let m0 = floor.div_euclid(s) * s;
    let m1 = m0 + s;
    let midpoint = pow_10001(m0) * pow_10001(m1);
    let snapped = pick_neighbour((price * price).cmp(&midpoint), m0, m1, tie_break);
    Ok(snapped.clamp(lo, hi))
}

fn pick_neighbour(against_midpoint: Ordering, lower: i32, upper: i32, tie_break: TieBreak) -> i32 {
    match (against_midpoint, tie_break) {
        (Ordering::Less, _) | (Ordering::Equal, TieBreak::Lower) => lower,
        (Ordering::Greater, _) | (Ordering::Equal, TieBreak::Upper) => upper,
    }
}

/// Factor turning a raw price into a decimal price.
pub fn decimal_adjustment(decimals_a: u8, decimals_b: u8) -> Rational {
    Rational::pow10(decimals_a as i32 - decimals_b as i32)
}

/// Decimal price → the pool's Q64.64 sqrt price (floor).
pub fn decimal_price_to_raw_price(price: &Rational, decimals_a: u8, decimals_b: u8) -> ClmmResult<u128> {
    let raw = price.divide(&decimal_adjustment(decimals_a, decimals_b))?;
    check_sqrt_price(&sqrt_x64_of(&raw)?)
}

/// Q64.64 sqrt price → decimal price, exact.
pub fn raw_price_to_decimal_price(sqrt_price_x64: u128, decimals_a: u8, decimals_b: u8) -> ClmmResult<Rational> {
    check_sqrt_price(&BigUint::from(sqrt_price_x64))?;
    Ok(sqrt_price_x64_to_price(sqrt_price_x64) * decimal_adjustment(decimals_a, decimals_b))
}

pub fn tick_to_decimal_price(tick: i32, decimals_a: u8, decimals_b: u8) -> ClmmResult<Rational> {
    Ok(tick_to_price(tick)? * decimal_adjustment(decimals_a, decimals_b))
}

pub fn decimal_price_to_tick(
    price: &Rational,
    tick_spacing: u16,
    decimals_a: u8,
    decimals_b: u8,
    bounds: &TickBounds,
    tie_break: TieBreak,
) -> ClmmResult<i32> {
    let raw = price.divide(&decimal_adjustment(decimals_a, decimals_b))?;
    price_to_tick_with(&raw, tick_spacing, bounds, tie_break)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::calc::rational::RoundingMode;

    fn r(s: &str) -> Rational {
        s.parse().unwrap()
    }

    #[test]
    fn test_tick_to_price_precision() {
        assert_eq!(tick_to_price(0).unwrap(), Rational::one());
        assert_eq!(
            tick_to_price(1).unwrap().to_decimal_string(30, RoundingMode::HalfUp),
            "1.0001"
        );
        // 1.0001^2 = 1.00020001 exactly, well within the working precision
        assert_eq!(
            tick_to_price(2).unwrap().to_decimal_string(30, RoundingMode::HalfUp),
            "1.00020001"
        );
        let down = tick_to_price(-7).unwrap();
        let up = tick_to_price(7).unwrap();
        assert_eq!(&down * &up, Rational::one());
        assert!(tick_to_price(MAX_TICK + 1).is_err());
    }

    #[test]
    fn test_floor_tick() {
        assert_eq!(floor_tick(&Rational::one()).unwrap(), 0);
        assert_eq!(floor_tick(&r("1.00009999")).unwrap(), 0);
        assert_eq!(floor_tick(&r("1.0001")).unwrap(), 1);
        assert_eq!(floor_tick(&r("0.99999")).unwrap(), -1);
        assert_eq!(floor_tick(&r("1.5")).unwrap(), 4054);
        assert_eq!(floor_tick(&Rational::zero()), Err(ClmmError::NonPositivePrice));
        assert!(matches!(
            floor_tick(&Rational::pow10(-40)),
            Err(ClmmError::PriceOutOfRange(_))
        ));
        assert!(matches!(floor_tick(&Rational::pow10(40)), Err(ClmmError::PriceOutOfRange(_))));
    }

    #[test]
    fn test_price_to_tick_snaps_to_spacing() {
        assert_eq!(price_to_tick(&r("1.00"), 60).unwrap(), 0);
        assert_eq!(price_to_tick(&r("1.5"), 60).unwrap(), 4080);
        assert_eq!(price_to_tick(&r("1.2"), 1).unwrap(), 1823);
        assert_eq!(price_to_tick(&r("0.8"), 60).unwrap(), -2220);
        assert_eq!(price_to_tick(&r("1"), 0), Err(ClmmError::InvalidTickSpacing(0)));
    }

    #[test]
    fn test_price_to_tick_recovers_aligned_ticks() {
        for (tick, spacing) in [(0, 1), (60, 60), (-600, 60), (4080, 10), (-120_000, 120), (400_000, 8)] {
            let price = tick_to_price(tick).unwrap();
            assert_eq!(price_to_tick(&price, spacing).unwrap(), tick);
        }
    }

    #[test]
    fn test_exact_midpoint_tie_break() {
        assert_eq!(pick_neighbour(Ordering::Equal, 0, 60, TieBreak::Lower), 0);
        assert_eq!(pick_neighbour(Ordering::Equal, 0, 60, TieBreak::Upper), 60);
        assert_eq!(pick_neighbour(Ordering::Less, 0, 60, TieBreak::Upper), 0);
        assert_eq!(pick_neighbour(Ordering::Greater, 0, 60, TieBreak::Lower), 60);
        // tick 1 is the log midpoint of 0 and 2; truncation puts it a hair above
        let near_midpoint = tick_to_price(1).unwrap();
        let bounds = TickBounds::default();
        let snapped = price_to_tick_with(&near_midpoint, 2, &bounds, TieBreak::Lower).unwrap();
        assert!(snapped == 0 || snapped == 2);
    }

    #[test]
    fn test_custom_bounds() {
        let bounds = TickBounds::new(-1000, 1000).unwrap();
        assert_eq!(bounds.aligned(60).unwrap(), (-960, 960));
        let near_top = tick_to_price(995).unwrap();
        assert_eq!(price_to_tick_with(&near_top, 60, &bounds, TieBreak::Lower).unwrap(), 960);
        assert!(matches!(
            price_to_tick_with(&r("1.5"), 60, &bounds, TieBreak::Lower),
            Err(ClmmError::PriceOutOfRange(_))
        ));
        assert!(TickBounds::new(10, -10).is_err());
    }

    #[test]
    fn test_decimal_raw_price_conversion() {
        // SOL (9 decimals) priced at 150 USDC (6 decimals)
        let price = r("150");
        let sqrt_price = decimal_price_to_raw_price(&price, 9, 6).unwrap();
        let back = raw_price_to_decimal_price(sqrt_price, 9, 6).unwrap();
        assert!(back <= price);
        let error = (&price - &back).divide(&price).unwrap();
        assert!(error < Rational::pow10(-15));

        assert_eq!(decimal_price_to_raw_price(&Rational::one(), 6, 6).unwrap(), 1u128 << 64);
        assert_eq!(
            decimal_price_to_raw_price(&r("-1"), 6, 6),
            Err(ClmmError::NonPositivePrice)
        );
        assert!(matches!(
            decimal_price_to_raw_price(&Rational::pow10(30), 6, 6),
            Err(ClmmError::PriceOutOfRange(_))
        ));
    }

    #[test]
    fn test_decimal_price_to_tick_applies_decimals() {
        let bounds = TickBounds::default();
        let tick = decimal_price_to_tick(&r("150"), 1, 9, 6, &bounds, TieBreak::Lower).unwrap();
        // raw price 0.15 -> ln(0.15)/ln(1.0001) ~ -18972
        let floor = floor_tick(&r("0.15")).unwrap();
        assert!(tick == floor || tick == floor + 1);
        let decimal = tick_to_decimal_price(tick, 9, 6).unwrap();
        let step = tick_to_decimal_price(tick + 1, 9, 6).unwrap() - &decimal;
        assert!((&decimal - &r("150")).abs() <= step);
    }
}
