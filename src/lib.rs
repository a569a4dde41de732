pub mod common;
pub mod constants;
pub mod liquidity;
pub mod utils;

use crate::common::{AnyResult, EngineConfig};
use crate::liquidity::{
    DepositQuote, EditorHandle, PositionDriver, PositionSnapshot, PositionStore, PriceSourceRef, WalletBalances,
    deposit_readiness,
};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

pub use crate::common::{ClmmError, ClmmResult, Side, TokenDescriptor};
pub use crate::liquidity::{DepositBlocker, PoolInfo, PoolPrice, PriceFeed, PriceRange, PricePosition};
pub use crate::utils::calc::rational::{Rational, RoundingMode};
pub use crate::utils::calc::tick_price::{TickBounds, TieBreak};

/// Entry point for the deposit flow.
///
/// Holds the engine configuration and the pool price source, and opens one
/// position editor per liquidity form.
#[derive(Clone)]
pub struct LiquidityClient {
    config: Arc<EngineConfig>,
    price_source: PriceSourceRef,
}

static INSTANCE: Mutex<Option<Arc<LiquidityClient>>> = Mutex::new(None);

impl LiquidityClient {
    pub fn new(config: EngineConfig, price_source: PriceSourceRef) -> AnyResult<Self> {
        config.validate()?;
        info!(
            "liquidity client ready: slippage {}, tie break {:?}, api {}",
            config.default_slippage, config.tie_break, config.endpoints.origin
        );
        Ok(Self { config: Arc::new(config), price_source })
    }

    /// Default configuration with `CLMM_*` environment overrides applied.
    pub fn from_env(price_source: PriceSourceRef) -> AnyResult<Self> {
        Self::new(EngineConfig::default().apply_env_overrides()?, price_source)
    }

    /// Makes this client the process-wide instance.
    pub fn install(self) -> Arc<Self> {
        let client = Arc::new(self);
        *INSTANCE.lock() = Some(client.clone());
        client
    }

    pub fn get_instance() -> Option<Arc<Self>> {
        INSTANCE.lock().clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Synchronous store, for callers that run their own event loop.
    pub fn new_store(&self) -> PositionStore {
        PositionStore::new(&self.config)
    }

    /// Spawns an async editor on the current tokio runtime.
    pub fn open_editor(&self) -> (EditorHandle, JoinHandle<()>) {
        PositionDriver::spawn(&self.config, self.price_source.clone())
    }

    /// Quote for the transaction builder, after the readiness checks pass.
    pub fn prepare_deposit(
        &self,
        snapshot: &PositionSnapshot,
        wallet: &WalletBalances,
    ) -> Result<DepositQuote, DepositBlocker> {
        deposit_readiness(snapshot, wallet)?;
        DepositQuote::from_snapshot(snapshot).map_err(DepositBlocker::Invalid)
    }
}
