//! Deposit quote handed to the transaction builder.

use num_traits::ToPrimitive;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;

use super::range::PricePosition;
use super::store::PositionSnapshot;
use crate::common::error::{ClmmError, ClmmResult};
use crate::common::types::{Side, TokenDescriptor, serde_pubkey};
use crate::utils::amount::{format_amount, to_raw_amount};
use crate::utils::calc::rational::{Rational, RoundingMode};

/// Amounts for one side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SideQuote {
    pub token: TokenDescriptor,
    /// Human amount, unslippaged
    pub amount: Rational,
    /// Smallest units, unslippaged
    pub raw_amount: u64,
    /// Smallest units the instruction may take, slippage included
    pub raw_amount_max: u64,
}

impl SideQuote {
    pub fn display_amount(&self) -> String {
        format_amount(&self.amount, self.token.decimals, RoundingMode::HalfUp)
    }
}

/// Everything an open-position instruction needs, in both raw and human form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositQuote {
    #[serde(with = "serde_pubkey")]
    pub pool_id: Pubkey,
    pub lower_tick: i32,
    pub upper_tick: i32,
    pub position: PricePosition,
    /// Side whose amount is fixed; the other side is bounded by `raw_amount_max`
    pub base_side: Side,
    pub side_a: SideQuote,
    pub side_b: SideQuote,
    pub liquidity: u128,
    pub slippage: Rational,
}

impl DepositQuote {
    /// Builds the quote from a consistent snapshot.
    ///
    /// The base side is converted exactly (it was typed with the token's
    /// precision). The derived side rounds up, then slippage is added as
    /// `ceil(raw * (1 + slippage))`.
    pub fn from_snapshot(snapshot: &PositionSnapshot) -> ClmmResult<Self> {
        let pool = snapshot.pool.as_ref().ok_or(ClmmError::PoolNotLoaded)?;
        if let Some(reason) = &snapshot.stale {
            return Err(ClmmError::StalePrice(reason.clone()));
        }
        if let Some(issue) = &snapshot.issue {
            return Err(issue.clone());
        }
        let incomplete = |what: &str| ClmmError::Incomplete(what.to_string());
        let range = snapshot.range.ok_or_else(|| incomplete("range"))?;
        let position = snapshot.position.ok_or_else(|| incomplete("price"))?;
        let liquidity = snapshot.liquidity.as_ref().ok_or_else(|| incomplete("amounts"))?;

        let base_side = snapshot.focused_side;
        let one_plus_slippage = &Rational::one() + &snapshot.slippage;
        let side_quote = |side: Side| -> ClmmResult<SideQuote> {
            let amount = snapshot.amount(side).ok_or_else(|| incomplete("amounts"))?.clone();
            let token = pool.token(side).clone();
            let (raw_amount, raw_amount_max) = if side == base_side {
                let raw = to_raw_amount(&amount, token.decimals, RoundingMode::HalfUp)?;
                (raw, raw)
            } else {
                let raw = to_raw_amount(&amount, token.decimals, RoundingMode::Ceil)?;
                let max = to_raw_amount(&(&amount * &one_plus_slippage), token.decimals, RoundingMode::Ceil)?;
                (raw, max)
            };
            Ok(SideQuote { token, amount, raw_amount, raw_amount_max })
        };

        let liquidity_floor = liquidity.floor();
        let liquidity = liquidity_floor
            .to_u128()
            .ok_or_else(|| ClmmError::AmountOverflow(liquidity_floor.to_string()))?;

        Ok(Self {
            pool_id: pool.id,
            lower_tick: range.lower_tick(),
            upper_tick: range.upper_tick(),
            position,
            base_side,
            side_a: side_quote(Side::A)?,
            side_b: side_quote(Side::B)?,
            liquidity,
            slippage: snapshot.slippage.clone(),
        })
    }

    pub fn side(&self, side: Side) -> &SideQuote {
        match side {
            Side::A => &self.side_a,
            Side::B => &self.side_b,
        }
    }
}

/// `amount_a * usd_a + amount_b * usd_b`, when the position has both amounts
/// and both USD prices are known.
pub fn total_deposit_value(
    snapshot: &PositionSnapshot,
    usd_price_a: Option<&Rational>,
    usd_price_b: Option<&Rational>,
) -> Option<Rational> {
    let value_a = snapshot.amount_a.as_ref()? * usd_price_a?;
    let value_b = snapshot.amount_b.as_ref()? * usd_price_b?;
    Some(value_a + value_b)
}
