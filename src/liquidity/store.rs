//! Position state store.
//!
//! All mutation goes through [`PositionStore::dispatch`]: the current snapshot
//! is cloned, the event applied, the amounts recomputed, and the result
//! published wholesale. Readers on other threads hold a [`StoreReader`] and
//! only ever see complete snapshots.

use arc_swap::ArcSwap;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use super::pool::{PoolInfo, PoolPrice, PriceFeed};
use super::range::{PricePosition, PriceRange, RangeNormalizer, classify};
use super::reconciler::reconcile;
use crate::common::config::EngineConfig;
use crate::common::error::{ClmmError, ClmmResult};
use crate::common::types::{Side, TokenDescriptor};
use crate::utils::amount::parse_amount;
use crate::utils::calc::rational::Rational;
use crate::utils::calc::tick_price::TieBreak;

/// Identifies one price refresh. Only the most recently issued ticket is
/// accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RefreshTicket(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    SelectToken { side: Side, token: TokenDescriptor },
    PoolLoaded(PoolInfo),
    /// Range from two decimal prices, in any order
    SetRange { lower: Rational, upper: Rational },
    /// Range from ticks that must already be aligned
    SetRangeTicks { lower_tick: i32, upper_tick: i32 },
    /// Typed amount; empty text clears both amounts
    SetAmount { side: Side, text: String },
    SetFocusedSide(Side),
    PriceRefreshed { ticket: RefreshTicket, feed: Result<PriceFeed, String> },
    /// Initial price typed by the user when creating a pool
    SetUserPrice(Rational),
    SetSlippage(Rational),
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Empty,
    SingleTokenSelected,
    BothTokensSelected,
    RangeSet,
    AmountsConsistent,
}

/// Immutable view of the position. Both amounts are always replaced together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionSnapshot {
    pub version: u64,
    pub token_a: Option<TokenDescriptor>,
    pub token_b: Option<TokenDescriptor>,
    pub pool: Option<PoolInfo>,
    pub range: Option<PriceRange>,
    pub price: Option<PoolPrice>,
    pub position: Option<PricePosition>,
    pub focused_side: Side,
    pub amount_a: Option<Rational>,
    pub amount_b: Option<Rational>,
    /// Liquidity implied by the amount pair, raw units
    pub liquidity: Option<Rational>,
    pub slippage: Rational,
    /// Set when the last price refresh failed or carried bad data.
    pub stale: Option<String>,
    /// Validation state for the UI. Cleared by the next successful event.
    pub issue: Option<ClmmError>,
}

impl PositionSnapshot {
    fn empty(slippage: Rational) -> Self {
        Self {
            version: 0,
            token_a: None,
            token_b: None,
            pool: None,
            range: None,
            price: None,
            position: None,
            focused_side: Side::A,
            amount_a: None,
            amount_b: None,
            liquidity: None,
            slippage,
            stale: None,
            issue: None,
        }
    }

    pub fn token(&self, side: Side) -> Option<&TokenDescriptor> {
        match side {
            Side::A => self.token_a.as_ref(),
            Side::B => self.token_b.as_ref(),
        }
    }

    fn token_slot(&mut self, side: Side) -> &mut Option<TokenDescriptor> {
        match side {
            Side::A => &mut self.token_a,
            Side::B => &mut self.token_b,
        }
    }

    pub fn amount(&self, side: Side) -> Option<&Rational> {
        match side {
            Side::A => self.amount_a.as_ref(),
            Side::B => self.amount_b.as_ref(),
        }
    }

    fn amount_slot(&mut self, side: Side) -> &mut Option<Rational> {
        match side {
            Side::A => &mut self.amount_a,
            Side::B => &mut self.amount_b,
        }
    }

    pub fn focused_amount(&self) -> Option<&Rational> {
        self.amount(self.focused_side)
    }

    pub fn phase(&self) -> Phase {
        match (&self.token_a, &self.token_b) {
            (None, None) => Phase::Empty,
            (Some(_), None) | (None, Some(_)) => Phase::SingleTokenSelected,
            (Some(_), Some(_)) if self.range.is_none() => Phase::BothTokensSelected,
            _ if self.is_consistent() => Phase::AmountsConsistent,
            _ => Phase::RangeSet,
        }
    }

    /// Both amounts present and derived from the current inputs.
    pub fn is_consistent(&self) -> bool {
        self.stale.is_none()
            && self.issue.is_none()
            && self.amount_a.is_some()
            && self.amount_b.is_some()
            && self.liquidity.is_some()
    }

    pub fn lower_price(&self) -> Option<Rational> {
        let (range, pool) = (self.range?, self.pool.as_ref()?);
        range.lower_price(pool.token_a.decimals, pool.token_b.decimals).ok()
    }

    pub fn upper_price(&self) -> Option<Rational> {
        let (range, pool) = (self.range?, self.pool.as_ref()?);
        range.upper_price(pool.token_a.decimals, pool.token_b.decimals).ok()
    }

    pub fn current_price(&self) -> Option<Rational> {
        self.price.as_ref()?.decimal_price().ok()
    }

    fn clear_amounts(&mut self) {
        self.amount_a = None;
        self.amount_b = None;
        self.liquidity = None;
    }

    fn clear_derived(&mut self) {
        let derived = self.focused_side.other();
        *self.amount_slot(derived) = None;
        self.liquidity = None;
    }

    /// Swaps the two slots so they follow the pool's token order.
    fn swap_orientation(&mut self) {
        std::mem::swap(&mut self.token_a, &mut self.token_b);
        std::mem::swap(&mut self.amount_a, &mut self.amount_b);
        self.focused_side = self.focused_side.other();
        self.range = self.range.map(|r| r.inverted());
    }
}

/// Cheap, clonable read handle.
#[derive(Clone)]
pub struct StoreReader(Arc<ArcSwap<PositionSnapshot>>);

impl StoreReader {
    pub fn snapshot(&self) -> Arc<PositionSnapshot> {
        self.0.load_full()
    }
}

pub struct PositionStore {
    current: Arc<ArcSwap<PositionSnapshot>>,
    tie_break: TieBreak,
    latest_ticket: u64,
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl PositionStore {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(PositionSnapshot::empty(config.default_slippage.clone()))),
            tie_break: config.tie_break,
            latest_ticket: 0,
        }
    }

    pub fn snapshot(&self) -> Arc<PositionSnapshot> {
        self.current.load_full()
    }

    pub fn reader(&self) -> StoreReader {
        StoreReader(self.current.clone())
    }

    /// Starts a refresh. Any ticket issued earlier becomes stale.
    pub fn issue_refresh(&mut self) -> RefreshTicket {
        self.latest_ticket += 1;
        RefreshTicket(self.latest_ticket)
    }

    /// Whether a result for `ticket` would still be applied.
    pub fn is_latest_refresh(&self, ticket: RefreshTicket) -> bool {
        ticket.0 == self.latest_ticket
    }

    fn supersede_refreshes(&mut self) {
        self.latest_ticket += 1;
    }

    /// Applies one event and publishes the resulting snapshot. Errors end up
    /// in `issue`; the published amounts are never half-updated.
    pub fn dispatch(&mut self, event: StoreEvent) -> Arc<PositionSnapshot> {
        let prev = self.current.load_full();
        let mut next = (*prev).clone();
        next.version = prev.version + 1;
        next.issue = None;

        let next = match self.apply(&mut next, event) {
            Ok(()) => {
                self.recompute(&mut next);
                next
            }
            Err(e) => {
                debug!("event rejected: {e}");
                let mut kept = (*prev).clone();
                kept.version = next.version;
                kept.issue = Some(e);
                kept
            }
        };

        let next = Arc::new(next);
        self.current.store(next.clone());
        next
    }

    fn apply(&mut self, s: &mut PositionSnapshot, event: StoreEvent) -> ClmmResult<()> {
        match event {
            StoreEvent::SelectToken { side, token } => {
                if s.token(side) == Some(&token) {
                    return Ok(());
                }
                if s.token(side.other()).is_some_and(|other| other.is_same_mint(&token)) {
                    // 两边选了同一个币，清空另一边
                    *s.token_slot(side.other()) = None;
                    *s.amount_slot(side.other()) = None;
                }
                *s.token_slot(side) = Some(token);
                *s.amount_slot(side) = None;
                if s.pool.take().is_some() {
                    debug!("token pair changed, pool dropped");
                }
                s.price = None;
                s.stale = None;
                self.supersede_refreshes();
            }
            StoreEvent::PoolLoaded(pool) => {
                self.load_pool(s, pool)?;
                self.supersede_refreshes();
            }
            StoreEvent::SetRange { lower, upper } => {
                let pool = s.pool.as_ref().ok_or(ClmmError::PoolNotLoaded)?;
                let normalizer = RangeNormalizer::for_pool(pool, self.tie_break);
                s.range = Some(normalizer.normalize_or_widen(&lower, &upper)?);
            }
            StoreEvent::SetRangeTicks { lower_tick, upper_tick } => {
                let pool = s.pool.as_ref().ok_or(ClmmError::PoolNotLoaded)?;
                let range = PriceRange::new(lower_tick, upper_tick, pool.tick_spacing)?;
                if !pool.bounds.contains(lower_tick) || !pool.bounds.contains(upper_tick) {
                    return Err(ClmmError::PriceOutOfRange(format!(
                        "range [{lower_tick}, {upper_tick}] outside [{}, {}]",
                        pool.bounds.min_tick, pool.bounds.max_tick
                    )));
                }
                s.range = Some(range);
            }
            StoreEvent::SetAmount { side, text } => {
                s.focused_side = side;
                if text.trim().is_empty() {
                    s.clear_amounts();
                    return Ok(());
                }
                let amount = match s.token(side) {
                    Some(token) => parse_amount(&text, token.decimals)?,
                    None => parse_amount(&text, u8::MAX)?,
                };
                *s.amount_slot(side) = Some(amount);
            }
            StoreEvent::SetFocusedSide(side) => {
                // focusing an empty side would drop the amount typed on the other one
                if s.amount(side).is_none() && s.amount(side.other()).is_some() {
                    debug!("ignoring focus switch to empty side {side:?}");
                    return Ok(());
                }
                s.focused_side = side;
            }
            StoreEvent::PriceRefreshed { ticket, feed } => {
                if ticket.0 != self.latest_ticket {
                    debug!("discarding superseded price refresh {} (latest {})", ticket.0, self.latest_ticket);
                    return Ok(());
                }
                let resolved = feed.map_err(ClmmError::StalePrice).and_then(|feed| {
                    let pool = s.pool.as_ref().ok_or(ClmmError::PoolNotLoaded)?;
                    feed.resolve(pool.token_a.decimals, pool.token_b.decimals)
                });
                match resolved {
                    Ok(price) => {
                        s.price = Some(price);
                        s.stale = None;
                    }
                    Err(e) => {
                        warn!("price refresh failed, freezing amounts: {e}");
                        s.stale = Some(e.to_string());
                    }
                }
            }
            StoreEvent::SetUserPrice(price) => {
                let pool = s.pool.as_ref().ok_or(ClmmError::PoolNotLoaded)?;
                s.price = Some(PriceFeed::Decimal(price).resolve(pool.token_a.decimals, pool.token_b.decimals)?);
                s.stale = None;
                self.supersede_refreshes();
            }
            StoreEvent::SetSlippage(slippage) => {
                if slippage.is_negative() || slippage >= Rational::one() {
                    return Err(ClmmError::InvalidSlippage(slippage.to_string()));
                }
                s.slippage = slippage;
            }
            StoreEvent::Reset => {
                s.clear_amounts();
                s.range = None;
                s.position = None;
                s.focused_side = Side::A;
            }
        }
        Ok(())
    }

    fn load_pool(&self, s: &mut PositionSnapshot, pool: PoolInfo) -> ClmmResult<()> {
        let side_of_a = s.token_a.as_ref().map(|t| pool.side_of(t));
        let side_of_b = s.token_b.as_ref().map(|t| pool.side_of(t));
        let reversed = match (side_of_a, side_of_b) {
            (Some(None), _) | (_, Some(None)) => {
                warn!("pool {} does not hold the selected tokens", pool.id);
                return Err(ClmmError::PoolMismatch);
            }
            (Some(Some(a)), Some(Some(b))) if a == b => return Err(ClmmError::PoolMismatch),
            (Some(Some(a)), _) => a == Side::B,
            (None, Some(Some(b))) => b == Side::A,
            (None, None) => false,
        };
        if reversed {
            debug!("reordering token slots to pool {} order", pool.id);
            s.swap_orientation();
        }

        let price = pool.price().transpose()?;
        if let Some(range) = s.range {
            s.range = Some(RangeNormalizer::for_pool(&pool, self.tie_break).realign(&range)?);
        }
        s.token_a = Some(pool.token_a.clone());
        s.token_b = Some(pool.token_b.clone());
        s.price = price;
        s.stale = None;
        s.pool = Some(pool);
        Ok(())
    }

    fn recompute(&self, s: &mut PositionSnapshot) {
        s.position = match (&s.range, &s.price) {
            (Some(range), Some(price)) => classify(range, price).ok(),
            _ => None,
        };

        if let Some(reason) = s.stale.clone() {
            s.clear_derived();
            s.issue = Some(ClmmError::StalePrice(reason));
            return;
        }

        let (Some(range), Some(price), Some(position), Some(focused)) =
            (s.range, s.price, s.position, s.focused_amount().cloned())
        else {
            s.clear_derived();
            return;
        };

        match reconcile(&range, position, s.focused_side, &focused, &price) {
            Ok(result) => {
                *s.amount_slot(result.focused_side.other()) = Some(result.derived_amount);
                s.liquidity = Some(result.liquidity);
            }
            Err(e) => {
                debug!("reconcile failed: {e}");
                s.clear_derived();
                s.issue = Some(e);
            }
        }
    }

    pub fn select_token(&mut self, side: Side, token: TokenDescriptor) -> Arc<PositionSnapshot> {
        self.dispatch(StoreEvent::SelectToken { side, token })
    }

    pub fn pool_loaded(&mut self, pool: PoolInfo) -> Arc<PositionSnapshot> {
        self.dispatch(StoreEvent::PoolLoaded(pool))
    }

    pub fn set_range(&mut self, lower: Rational, upper: Rational) -> Arc<PositionSnapshot> {
        self.dispatch(StoreEvent::SetRange { lower, upper })
    }

    pub fn set_amount(&mut self, side: Side, text: impl Into<String>) -> Arc<PositionSnapshot> {
        self.dispatch(StoreEvent::SetAmount { side, text: text.into() })
    }

    pub fn set_focused_side(&mut self, side: Side) -> Arc<PositionSnapshot> {
        self.dispatch(StoreEvent::SetFocusedSide(side))
    }

    pub fn reset(&mut self) -> Arc<PositionSnapshot> {
        self.dispatch(StoreEvent::Reset)
    }
}
