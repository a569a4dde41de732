//! Pool descriptors supplied by the chain / pool-data collaborator.

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use crate::common::error::{ClmmError, ClmmResult};
use crate::common::types::{Side, TokenDescriptor, serde_pubkey};
use crate::utils::calc::rational::Rational;
use crate::utils::calc::tick_price::{
    TickBounds, check_tick_spacing, decimal_price_to_raw_price, raw_price_to_decimal_price,
};
use crate::utils::calc::clmm_math::get_tick_at_sqrt_price;

/// Current pool price. `sqrt_price_x64` is the source of truth; the decimal
/// price is derived from it exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolPrice {
    pub sqrt_price_x64: u128,
    pub decimals_a: u8,
    pub decimals_b: u8,
}

impl PoolPrice {
    pub fn from_sqrt_price_x64(sqrt_price_x64: u128, decimals_a: u8, decimals_b: u8) -> ClmmResult<Self> {
        if sqrt_price_x64 == 0 {
            return Err(ClmmError::NonPositivePrice);
        }
        // validates the lattice range
        raw_price_to_decimal_price(sqrt_price_x64, decimals_a, decimals_b)?;
        Ok(Self { sqrt_price_x64, decimals_a, decimals_b })
    }

    /// Decimal price (token B per token A), floored onto the Q64.64 lattice.
    pub fn from_decimal_price(price: &Rational, decimals_a: u8, decimals_b: u8) -> ClmmResult<Self> {
        let sqrt_price_x64 = decimal_price_to_raw_price(price, decimals_a, decimals_b)?;
        Ok(Self { sqrt_price_x64, decimals_a, decimals_b })
    }

    pub fn decimal_price(&self) -> ClmmResult<Rational> {
        raw_price_to_decimal_price(self.sqrt_price_x64, self.decimals_a, self.decimals_b)
    }

    /// Tick the pool would report for this price.
    pub fn tick(&self) -> ClmmResult<i32> {
        get_tick_at_sqrt_price(self.sqrt_price_x64)
    }
}

/// The price as delivered by a price source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceFeed {
    /// Raw Q64.64 sqrt price as stored in the pool account
    SqrtX64(u128),
    /// Decimal price, token B per token A
    Decimal(Rational),
}

impl PriceFeed {
    /// Validates the feed and resolves it against the pool's token decimals.
    pub fn resolve(&self, decimals_a: u8, decimals_b: u8) -> ClmmResult<PoolPrice> {
        match self {
            PriceFeed::SqrtX64(sqrt_price_x64) => {
                PoolPrice::from_sqrt_price_x64(*sqrt_price_x64, decimals_a, decimals_b)
            }
            PriceFeed::Decimal(price) => PoolPrice::from_decimal_price(price, decimals_a, decimals_b),
        }
    }
}

/// CLMM pool as seen by the deposit flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolInfo {
    #[serde(with = "serde_pubkey")]
    pub id: Pubkey,
    pub token_a: TokenDescriptor,
    pub token_b: TokenDescriptor,
    pub tick_spacing: u16,
    #[serde(default)]
    pub bounds: TickBounds,
    /// `None` while the pool is not yet initialised (create-pool flow).
    #[serde(default)]
    pub sqrt_price_x64: Option<u128>,
}

impl PoolInfo {
    pub fn new(id: Pubkey, token_a: TokenDescriptor, token_b: TokenDescriptor, tick_spacing: u16) -> ClmmResult<Self> {
        check_tick_spacing(tick_spacing)?;
        if token_a.is_same_mint(&token_b) {
            return Err(ClmmError::PoolMismatch);
        }
        Ok(Self { id, token_a, token_b, tick_spacing, bounds: TickBounds::default(), sqrt_price_x64: None })
    }

    pub fn with_bounds(mut self, bounds: TickBounds) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn with_sqrt_price_x64(mut self, sqrt_price_x64: u128) -> Self {
        self.sqrt_price_x64 = Some(sqrt_price_x64);
        self
    }

    pub fn token(&self, side: Side) -> &TokenDescriptor {
        match side {
            Side::A => &self.token_a,
            Side::B => &self.token_b,
        }
    }

    pub fn decimals(&self, side: Side) -> u8 {
        self.token(side).decimals
    }

    pub fn price(&self) -> Option<ClmmResult<PoolPrice>> {
        self.sqrt_price_x64
            .map(|s| PoolPrice::from_sqrt_price_x64(s, self.token_a.decimals, self.token_b.decimals))
    }

    /// Which pool side `token` sits on, if any.
    pub fn side_of(&self, token: &TokenDescriptor) -> Option<Side> {
        if self.token_a.is_same_mint(token) {
            Some(Side::A)
        } else if self.token_b.is_same_mint(token) {
            Some(Side::B)
        } else {
            None
        }
    }
}
