//! Well-known token mints

use solana_sdk::pubkey;

pub use solana_sdk::pubkey::Pubkey;

/// SOL Mint (Wrapped SOL)
pub const SOL_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");

/// Placeholder mint used by wallets for unwrapped (native) SOL
pub const NATIVE_SOL_MINT: Pubkey = pubkey!("11111111111111111111111111111111");

/// USDC Mint (mainnet)
pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
