//! Amount reconciliation.
//!
//! Given one side's amount, derives the other side so the pair is a
//! proportional deposit into `[lower, upper]` at the current price.
//!
//! With `sp`, `sa`, `sb` the Q64.64 sqrt prices of the current price and the
//! two bounds, a deposit of liquidity `L` needs
//!
//! ```text
//! raw_a = L * (sb - sp) * 2^64 / (sp * sb)
//! raw_b = L * (sp - sa) / 2^64
//! ```
//!
//! so `raw_b / raw_a = (sp - sa) * sp * sb / ((sb - sp) * 2^128)`. Everything
//! below is exact rational arithmetic on those lattice integers.

use num_bigint::BigInt;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use super::pool::PoolPrice;
use super::range::{PricePosition, PriceRange, classify};
use crate::common::error::{ClmmError, ClmmResult};
use crate::common::types::Side;
use crate::utils::calc::rational::Rational;
use crate::utils::calc::tick_price::decimal_adjustment;

/// A consistent amount pair. `derived_amount` is unslippaged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub position: PricePosition,
    pub focused_side: Side,
    pub focused_amount: Rational,
    pub derived_amount: Rational,
    /// Liquidity implied by the pair, in raw Q64.64 units (not floored).
    pub liquidity: Rational,
}

impl Reconciliation {
    pub fn amount(&self, side: Side) -> &Rational {
        if side == self.focused_side { &self.focused_amount } else { &self.derived_amount }
    }

    pub fn amount_a(&self) -> &Rational {
        self.amount(Side::A)
    }

    pub fn amount_b(&self) -> &Rational {
        self.amount(Side::B)
    }
}

struct Lattice {
    current: BigInt,
    lower: BigInt,
    upper: BigInt,
}

impl Lattice {
    fn new(range: &PriceRange, price: &PoolPrice) -> ClmmResult<Self> {
        Ok(Self {
            current: BigInt::from(price.sqrt_price_x64),
            lower: BigInt::from(range.lower_sqrt_price_x64()?),
            upper: BigInt::from(range.upper_sqrt_price_x64()?),
        })
    }

    fn q64() -> BigInt {
        BigInt::one() << 64
    }

    /// Human B per human A inside the range, as `(numer, denom)`. Either part
    /// is zero when the price sits on a bound.
    fn ratio_parts(&self, price: &PoolPrice) -> (BigInt, BigInt) {
        let adjust = decimal_adjustment(price.decimals_a, price.decimals_b);
        let numer = (&self.current - &self.lower) * &self.current * &self.upper * adjust.numer();
        let denom = (&self.upper - &self.current) * (BigInt::one() << 128) * adjust.denom();
        (numer, denom)
    }

    fn liquidity_from_a(&self, raw_a: &Rational, from: &BigInt) -> ClmmResult<Rational> {
        let per_unit = Rational::new(from * &self.upper, (&self.upper - from) * Self::q64())?;
        Ok(raw_a * &per_unit)
    }

    fn liquidity_from_b(&self, raw_b: &Rational, to: &BigInt) -> ClmmResult<Rational> {
        let per_unit = Rational::new(Self::q64(), to - &self.lower)?;
        Ok(raw_b * &per_unit)
    }
}

fn to_raw(amount: &Rational, decimals: u8) -> Rational {
    amount * &Rational::pow10(decimals as i32)
}

/// Derives the unfocused amount for `focused_amount` on `focused_side`.
///
/// `position` must be the classification of `current` against `range`.
/// Below the range only token A is accepted, above it only token B; the same
/// holds at the exact lower or upper bound.
pub fn reconcile(
    range: &PriceRange,
    position: PricePosition,
    focused_side: Side,
    focused_amount: &Rational,
    current: &PoolPrice,
) -> ClmmResult<Reconciliation> {
    if focused_amount.is_negative() {
        return Err(ClmmError::InvalidDecimal(focused_amount.to_string()));
    }
    let lattice = Lattice::new(range, current)?;
    let raw_focused = to_raw(
        focused_amount,
        if focused_side == Side::A { current.decimals_a } else { current.decimals_b },
    );
    let mismatch = |position| ClmmError::SingleSidedMismatch { side: focused_side, position };

    let (derived_amount, liquidity) = match position {
        PricePosition::Below => {
            if focused_side == Side::B {
                return Err(mismatch(position));
            }
            (Rational::zero(), lattice.liquidity_from_a(&raw_focused, &lattice.lower)?)
        }
        PricePosition::Above => {
            if focused_side == Side::A {
                return Err(mismatch(position));
            }
            (Rational::zero(), lattice.liquidity_from_b(&raw_focused, &lattice.upper)?)
        }
        PricePosition::Inside => {
            let (numer, denom) = lattice.ratio_parts(current);
            match focused_side {
                Side::A if denom.is_zero() => return Err(mismatch(PricePosition::Above)),
                Side::B if numer.is_zero() => return Err(mismatch(PricePosition::Below)),
                Side::A => (
                    focused_amount * &Rational::new(numer, denom)?,
                    lattice.liquidity_from_a(&raw_focused, &lattice.current)?,
                ),
                Side::B => (
                    focused_amount * &Rational::new(denom, numer)?,
                    lattice.liquidity_from_b(&raw_focused, &lattice.current)?,
                ),
            }
        }
    };

    Ok(Reconciliation {
        position,
        focused_side,
        focused_amount: focused_amount.clone(),
        derived_amount,
        liquidity,
    })
}

/// Classifies and reconciles in one step.
pub fn reconcile_at(
    range: &PriceRange,
    focused_side: Side,
    focused_amount: &Rational,
    current: &PoolPrice,
) -> ClmmResult<Reconciliation> {
    let position = classify(range, current)?;
    reconcile(range, position, focused_side, focused_amount, current)
}

/// Human token B required per human token A, or `None` when only one side
/// can be deposited at this price.
pub fn deposit_ratio(range: &PriceRange, current: &PoolPrice) -> ClmmResult<Option<Rational>> {
    if classify(range, current)? != PricePosition::Inside {
        return Ok(None);
    }
    let (numer, denom) = Lattice::new(range, current)?.ratio_parts(current);
    if numer.is_zero() || denom.is_zero() {
        return Ok(None);
    }
    Ok(Some(Rational::new(numer, denom)?))
}

/// Which sides accept a deposit at this price.
pub fn accepted_sides(position: PricePosition) -> &'static [Side] {
    match position {
        PricePosition::Below => &[Side::A],
        PricePosition::Inside => &[Side::A, Side::B],
        PricePosition::Above => &[Side::B],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::liquidity::range::normalize;

    fn r(s: &str) -> Rational {
        s.parse().unwrap()
    }

    fn setup(current: &str) -> (PriceRange, PoolPrice) {
        let range = normalize(&r("1.00"), &r("1.50"), 60).unwrap();
        let price = PoolPrice::from_decimal_price(&r(current), 6, 6).unwrap();
        (range, price)
    }

    #[test]
    fn test_inside_round_trip_is_exact() {
        let (range, price) = setup("1.20");
        let forward = reconcile_at(&range, Side::A, &r("100.0"), &price).unwrap();
        assert_eq!(forward.position, PricePosition::Inside);
        assert!(forward.amount_b().is_positive());
        assert!(forward.liquidity.is_positive());

        let back = reconcile_at(&range, Side::B, forward.amount_b(), &price).unwrap();
        assert_eq!(back.amount_a(), &r("100"));
        assert_eq!(back.liquidity, forward.liquidity);
    }

    #[test]
    fn test_ratio_matches_closed_form() {
        // amount_b / amount_a = (sqrt(p) - sqrt(pa)) * sqrt(p) * sqrt(pb) / (sqrt(pb) - sqrt(p))
        let (range, price) = setup("1.20");
        let ratio = deposit_ratio(&range, &price).unwrap().unwrap().to_f64();
        let (p, pa, pb) = (1.2f64, 1.0f64, 1.0001f64.powi(4080));
        let expected = (p.sqrt() - pa.sqrt()) * p.sqrt() * pb.sqrt() / (pb.sqrt() - p.sqrt());
        assert!((ratio - expected).abs() / expected < 1e-9);
    }

    #[test]
    fn test_decimals_scale_the_ratio() {
        let range = normalize(&r("0.1"), &r("0.2"), 10).unwrap();
        let raw_price = PoolPrice::from_decimal_price(&r("0.15"), 0, 0).unwrap();
        let raw_ratio = deposit_ratio(&range, &raw_price).unwrap().unwrap();
        // same pool seen as SOL (9) / USDC (6): decimal price 150
        let sol_usdc = PoolPrice { decimals_a: 9, decimals_b: 6, ..raw_price };
        let human_ratio = deposit_ratio(&range, &sol_usdc).unwrap().unwrap();
        assert_eq!(human_ratio, &raw_ratio * &Rational::pow10(3));
    }

    #[test]
    fn test_below_range_single_sided() {
        let (range, price) = setup("0.80");
        let only_a = reconcile_at(&range, Side::A, &r("10"), &price).unwrap();
        assert_eq!(only_a.position, PricePosition::Below);
        assert_eq!(only_a.amount_b(), &Rational::zero());
        assert!(only_a.liquidity.is_positive());
        assert_eq!(
            reconcile_at(&range, Side::B, &r("50"), &price),
            Err(ClmmError::SingleSidedMismatch { side: Side::B, position: PricePosition::Below })
        );
        assert_eq!(deposit_ratio(&range, &price).unwrap(), None);
    }

    #[test]
    fn test_above_range_single_sided() {
        let (range, price) = setup("2.00");
        let only_b = reconcile_at(&range, Side::B, &r("50"), &price).unwrap();
        assert_eq!(only_b.amount_a(), &Rational::zero());
        assert_eq!(
            reconcile_at(&range, Side::A, &r("1"), &price),
            Err(ClmmError::SingleSidedMismatch { side: Side::A, position: PricePosition::Above })
        );
    }

    #[test]
    fn test_price_on_bounds() {
        let range = PriceRange::new(0, 60, 60).unwrap();
        let at_lower = PoolPrice::from_sqrt_price_x64(range.lower_sqrt_price_x64().unwrap(), 6, 6).unwrap();
        let result = reconcile_at(&range, Side::A, &r("5"), &at_lower).unwrap();
        assert_eq!(result.amount_b(), &Rational::zero());
        assert_eq!(
            reconcile_at(&range, Side::B, &r("5"), &at_lower),
            Err(ClmmError::SingleSidedMismatch { side: Side::B, position: PricePosition::Below })
        );

        let at_upper = PoolPrice::from_sqrt_price_x64(range.upper_sqrt_price_x64().unwrap(), 6, 6).unwrap();
        assert_eq!(reconcile_at(&range, Side::B, &r("5"), &at_upper).unwrap().amount_a(), &Rational::zero());
        assert!(reconcile_at(&range, Side::A, &r("5"), &at_upper).is_err());
    }

    #[test]
    fn test_zero_and_negative_amounts() {
        let (range, price) = setup("1.20");
        let zero = reconcile_at(&range, Side::B, &Rational::zero(), &price).unwrap();
        assert!(zero.amount_a().is_zero());
        assert!(matches!(
            reconcile_at(&range, Side::A, &r("-1"), &price),
            Err(ClmmError::InvalidDecimal(_))
        ));
    }

    #[test]
    fn test_idempotent() {
        let (range, price) = setup("1.33");
        let first = reconcile_at(&range, Side::A, &r("12.345678"), &price).unwrap();
        let second = reconcile_at(&range, Side::A, &r("12.345678"), &price).unwrap();
        assert_eq!(first, second);
        assert_eq!(accepted_sides(first.position), &[Side::A, Side::B]);
    }
}
