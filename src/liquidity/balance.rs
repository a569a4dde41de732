//! Wallet balance checks and deposit readiness.

use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fmt;

use super::store::PositionSnapshot;
use crate::common::error::ClmmError;
use crate::common::types::{Side, TokenDescriptor, normalize_mint};
use crate::utils::calc::rational::Rational;

/// Balances reported by the wallet collaborator, in human units.
#[derive(Debug, Clone, Default)]
pub struct WalletBalances {
    connected: bool,
    balances: HashMap<Pubkey, Rational>,
}

impl WalletBalances {
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn connected() -> Self {
        Self { connected: true, balances: HashMap::new() }
    }

    pub fn with_balance(mut self, mint: Pubkey, amount: Rational) -> Self {
        self.balances.insert(normalize_mint(&mint), amount);
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Unknown tokens count as zero.
    pub fn balance(&self, token: &TokenDescriptor) -> Rational {
        self.balances.get(&normalize_mint(&token.mint)).cloned().unwrap_or_default()
    }
}

/// Whether the wallet covers each side. `None` when the side has no token or
/// no amount yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    pub sufficient_a: Option<bool>,
    pub sufficient_b: Option<bool>,
}

impl BalanceCheck {
    pub fn sufficient(&self, side: Side) -> Option<bool> {
        match side {
            Side::A => self.sufficient_a,
            Side::B => self.sufficient_b,
        }
    }
}

/// Compares each side's unslippaged amount against the wallet.
pub fn check_balances(snapshot: &PositionSnapshot, wallet: &WalletBalances) -> BalanceCheck {
    let check = |side: Side| {
        let token = snapshot.token(side)?;
        let amount = snapshot.amount(side)?;
        Some(*amount <= wallet.balance(token))
    };
    BalanceCheck { sufficient_a: check(Side::A), sufficient_b: check(Side::B) }
}

/// First reason the deposit button stays disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum DepositBlocker {
    PoolNotFound,
    WalletNotConnected,
    SelectToken,
    EnterAmount,
    /// The position is not consistent (bad range side, stale price, ...)
    Invalid(ClmmError),
    InsufficientBalance(Side),
}

impl fmt::Display for DepositBlocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepositBlocker::PoolNotFound => f.write_str("pool not found"),
            DepositBlocker::WalletNotConnected => f.write_str("connect wallet"),
            DepositBlocker::SelectToken => f.write_str("select a token"),
            DepositBlocker::EnterAmount => f.write_str("enter an amount"),
            DepositBlocker::Invalid(e) => write!(f, "{e}"),
            DepositBlocker::InsufficientBalance(side) => write!(f, "insufficient token {side} balance"),
        }
    }
}

/// Runs the checks in the order the deposit form reports them.
///
/// A missing pool is reported before anything else.
pub fn deposit_readiness(snapshot: &PositionSnapshot, wallet: &WalletBalances) -> Result<(), DepositBlocker> {
    if snapshot.pool.is_none() {
        return Err(DepositBlocker::PoolNotFound);
    }
    if !wallet.is_connected() {
        return Err(DepositBlocker::WalletNotConnected);
    }
    if snapshot.token_a.is_none() || snapshot.token_b.is_none() {
        return Err(DepositBlocker::SelectToken);
    }
    match snapshot.focused_amount() {
        Some(amount) if amount.is_positive() => {}
        _ => return Err(DepositBlocker::EnterAmount),
    }
    if let Some(reason) = &snapshot.stale {
        return Err(DepositBlocker::Invalid(ClmmError::StalePrice(reason.clone())));
    }
    if let Some(issue) = &snapshot.issue {
        return Err(DepositBlocker::Invalid(issue.clone()));
    }
    if !snapshot.is_consistent() {
        return Err(DepositBlocker::EnterAmount);
    }
    let check = check_balances(snapshot, wallet);
    for side in [Side::A, Side::B] {
        if check.sufficient(side) == Some(false) {
            return Err(DepositBlocker::InsufficientBalance(side));
        }
    }
    Ok(())
}
