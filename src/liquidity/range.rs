//! Range normalization and price classification.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use super::pool::{PoolInfo, PoolPrice};
use crate::common::error::{ClmmError, ClmmResult};
use crate::utils::calc::clmm_math::get_sqrt_price_at_tick;
use crate::utils::calc::rational::Rational;
use crate::utils::calc::tick_price::{
    TickBounds, TieBreak, check_tick_spacing, decimal_price_to_tick, price_to_tick_with, tick_to_decimal_price,
    tick_to_price,
};

/// A position's price range. Ticks are the only stored representation;
/// prices are always derived from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PriceRange {
    lower_tick: i32,
    upper_tick: i32,
}

impl PriceRange {
    /// Strict constructor: `lower < upper` and both aligned to `tick_spacing`.
    pub fn new(lower_tick: i32, upper_tick: i32, tick_spacing: u16) -> ClmmResult<Self> {
        check_tick_spacing(tick_spacing)?;
        let s = tick_spacing as i32;
        if lower_tick >= upper_tick || lower_tick % s != 0 || upper_tick % s != 0 {
            return Err(ClmmError::InvalidRange { lower: lower_tick, upper: upper_tick, tick_spacing });
        }
        Ok(Self { lower_tick, upper_tick })
    }

    pub fn lower_tick(&self) -> i32 {
        self.lower_tick
    }

    pub fn upper_tick(&self) -> i32 {
        self.upper_tick
    }

    pub fn is_aligned(&self, tick_spacing: u16) -> bool {
        tick_spacing != 0 && self.lower_tick % tick_spacing as i32 == 0 && self.upper_tick % tick_spacing as i32 == 0
    }

    pub fn lower_sqrt_price_x64(&self) -> ClmmResult<u128> {
        get_sqrt_price_at_tick(self.lower_tick)
    }

    pub fn upper_sqrt_price_x64(&self) -> ClmmResult<u128> {
        get_sqrt_price_at_tick(self.upper_tick)
    }

    pub fn lower_price(&self, decimals_a: u8, decimals_b: u8) -> ClmmResult<Rational> {
        tick_to_decimal_price(self.lower_tick, decimals_a, decimals_b)
    }

    pub fn upper_price(&self, decimals_a: u8, decimals_b: u8) -> ClmmResult<Rational> {
        tick_to_decimal_price(self.upper_tick, decimals_a, decimals_b)
    }

    /// The same range quoted in the opposite token order:
    /// `lower' = 1 / upper`, `upper' = 1 / lower`.
    pub fn inverted(&self) -> Self {
        Self { lower_tick: -self.upper_tick, upper_tick: -self.lower_tick }
    }
}

/// Where the current price sits relative to a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PricePosition {
    Below,
    Inside,
    Above,
}

impl fmt::Display for PricePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PricePosition::Below => f.write_str("below"),
            PricePosition::Inside => f.write_str("inside"),
            PricePosition::Above => f.write_str("above"),
        }
    }
}

/// Classifies `price` against `range` on the sqrt-price lattice.
/// A price equal to either bound counts as `Inside`.
pub fn classify(range: &PriceRange, price: &PoolPrice) -> ClmmResult<PricePosition> {
    let current = price.sqrt_price_x64;
    if current < range.lower_sqrt_price_x64()? {
        Ok(PricePosition::Below)
    } else if current > range.upper_sqrt_price_x64()? {
        Ok(PricePosition::Above)
    } else {
        Ok(PricePosition::Inside)
    }
}

/// Turns arbitrary user bounds into a canonical tick-aligned range for one pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeNormalizer {
    pub tick_spacing: u16,
    pub bounds: TickBounds,
    pub tie_break: TieBreak,
    pub decimals_a: u8,
    pub decimals_b: u8,
}

impl RangeNormalizer {
    /// Normalizer for raw prices (no decimal adjustment) and protocol bounds.
    pub fn new(tick_spacing: u16) -> Self {
        Self { tick_spacing, bounds: TickBounds::default(), tie_break: TieBreak::Lower, decimals_a: 0, decimals_b: 0 }
    }

    pub fn for_pool(pool: &PoolInfo, tie_break: TieBreak) -> Self {
        Self {
            tick_spacing: pool.tick_spacing,
            bounds: pool.bounds,
            tie_break,
            decimals_a: pool.token_a.decimals,
            decimals_b: pool.token_b.decimals,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_decimals(mut self, decimals_a: u8, decimals_b: u8) -> Self {
        self.decimals_a = decimals_a;
        self.decimals_b = decimals_b;
        self
    }

    fn snap(&self, price: &Rational) -> ClmmResult<i32> {
        decimal_price_to_tick(price, self.tick_spacing, self.decimals_a, self.decimals_b, &self.bounds, self.tie_break)
    }

    /// Orders the inputs and snaps both to the tick spacing. Fails with
    /// `DegenerateRange` when they land on the same tick.
    pub fn normalize(&self, lower_input: &Rational, upper_input: &Rational) -> ClmmResult<PriceRange> {
        let (lo, hi) = if lower_input > upper_input { (upper_input, lower_input) } else { (lower_input, upper_input) };
        let lower_tick = self.snap(lo)?;
        let upper_tick = self.snap(hi)?;
        if lower_tick == upper_tick {
            return Err(ClmmError::DegenerateRange { tick: lower_tick });
        }
        PriceRange::new(lower_tick, upper_tick, self.tick_spacing)
    }

    /// Like [`normalize`](Self::normalize), but a zero-width result is widened
    /// by one spacing step: the upper bound moves up, or the lower bound down
    /// when the upper one is already at the pool's limit.
    pub fn normalize_or_widen(&self, lower_input: &Rational, upper_input: &Rational) -> ClmmResult<PriceRange> {
        match self.normalize(lower_input, upper_input) {
            Err(ClmmError::DegenerateRange { tick }) => {
                let widened = self.widen(tick)?;
                warn!(
                    "range [{lower_input}, {upper_input}] collapsed to tick {tick}, widened to [{}, {}]",
                    widened.lower_tick, widened.upper_tick
                );
                Ok(widened)
            }
            other => other,
        }
    }

    fn widen(&self, tick: i32) -> ClmmResult<PriceRange> {
        let (lo, hi) = self.bounds.aligned(self.tick_spacing)?;
        let s = self.tick_spacing as i32;
        if tick + s <= hi {
            PriceRange::new(tick, tick + s, self.tick_spacing)
        } else if tick - s >= lo {
            PriceRange::new(tick - s, tick, self.tick_spacing)
        } else {
            Err(ClmmError::DegenerateRange { tick })
        }
    }

    /// Re-snaps an existing range onto this normalizer's spacing and bounds,
    /// e.g. after the token pair (and so the pool) changed.
    pub fn realign(&self, range: &PriceRange) -> ClmmResult<PriceRange> {
        if range.is_aligned(self.tick_spacing)
            && self.bounds.contains(range.lower_tick)
            && self.bounds.contains(range.upper_tick)
        {
            return Ok(*range);
        }
        let snap_tick = |tick: i32| -> ClmmResult<i32> {
            price_to_tick_with(&tick_to_price(tick)?, self.tick_spacing, &self.bounds, self.tie_break)
        };
        let lower_tick = snap_tick(range.lower_tick)?;
        let upper_tick = snap_tick(range.upper_tick)?;
        if lower_tick == upper_tick {
            let widened = self.widen(lower_tick)?;
            warn!(
                "range [{}, {}] collapsed at spacing {}, widened to [{}, {}]",
                range.lower_tick, range.upper_tick, self.tick_spacing, widened.lower_tick, widened.upper_tick
            );
            return Ok(widened);
        }
        PriceRange::new(lower_tick, upper_tick, self.tick_spacing)
    }
}

/// `normalize` for raw prices with protocol bounds and ties to the lower tick.
pub fn normalize(lower_input: &Rational, upper_input: &Rational, tick_spacing: u16) -> ClmmResult<PriceRange> {
    RangeNormalizer::new(tick_spacing).normalize(lower_input, upper_input)
}
