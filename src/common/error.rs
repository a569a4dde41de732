//! Errors produced by the reconciliation core.
//!
//! Every error is returned as a value. The position store records them on the
//! published snapshot instead of propagating them to the caller.

use crate::common::types::Side;
use crate::liquidity::range::PricePosition;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, serde::Serialize)]
pub enum ClmmError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("price out of range: {0}")]
    PriceOutOfRange(String),
    #[error("degenerate range: both bounds snap to tick {tick}")]
    DegenerateRange { tick: i32 },
    #[error("token {side} cannot be deposited while the price is {position} the range")]
    SingleSidedMismatch { side: Side, position: PricePosition },
    #[error("invalid decimal: {0:?}")]
    InvalidDecimal(String),
    #[error("price must be positive")]
    NonPositivePrice,
    #[error("invalid tick spacing: {0}")]
    InvalidTickSpacing(u16),
    #[error("invalid range [{lower}, {upper}] for tick spacing {tick_spacing}")]
    InvalidRange { lower: i32, upper: i32, tick_spacing: u16 },
    #[error("invalid slippage tolerance: {0}")]
    InvalidSlippage(String),
    #[error("amount does not fit in u64: {0}")]
    AmountOverflow(String),
    #[error("pool tokens do not match the selected pair")]
    PoolMismatch,
    #[error("pool not loaded")]
    PoolNotLoaded,
    #[error("position incomplete: {0}")]
    Incomplete(String),
    #[error("pool price is stale: {0}")]
    StalePrice(String),
}

pub type ClmmResult<T> = Result<T, ClmmError>;
