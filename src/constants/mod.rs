pub mod tokens;

pub use tokens::*;

/// Default slippage tolerance in basis points (1%)
pub const DEFAULT_SLIPPAGE_BPS: u64 = 100;

/// Basis points denominator
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Default API origin used by the endpoint map
pub const DEFAULT_API_ORIGIN: &str = "https://api-v3.raydium.io";

/// API origin for devnet
pub const DEVNET_API_ORIGIN: &str = "https://api-v3-devnet.raydium.io";

/// Named API endpoints and their default paths
pub const DEFAULT_API_PATHNAMES: &[(&str, &str)] = &[
    ("poolList", "/pools/info/list"),
    ("poolsByMint", "/pools/info/mint"),
    ("poolsById", "/pools/info/ids"),
    ("poolKeys", "/pools/key/ids"),
    ("clmmLiquidityLines", "/pools/line/liquidity"),
    ("clmmConfigs", "/main/clmm-config"),
    ("tokenList", "/mint/list"),
    ("tokenPrice", "/mint/price"),
];
