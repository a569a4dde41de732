pub mod balance;
pub mod driver;
pub mod pool;
pub mod price_source;
pub mod quote;
pub mod range;
pub mod reconciler;
pub mod store;

pub use balance::{BalanceCheck, DepositBlocker, WalletBalances, check_balances, deposit_readiness};
pub use driver::{EditorHandle, PositionDriver};
pub use pool::{PoolInfo, PoolPrice, PriceFeed};
pub use price_source::{PoolPriceSource, PriceSourceRef, StaticPriceSource};
pub use quote::{DepositQuote, SideQuote, total_deposit_value};
pub use range::{PricePosition, PriceRange, RangeNormalizer, classify, normalize};
pub use reconciler::{Reconciliation, accepted_sides, deposit_ratio, reconcile, reconcile_at};
pub use store::{Phase, PositionSnapshot, PositionStore, RefreshTicket, StoreEvent, StoreReader};
