use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::fmt;

use crate::constants::tokens::{NATIVE_SOL_MINT, SOL_MINT};

/// One of the two token sides of a position, in pool order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::A => f.write_str("A"),
            Side::B => f.write_str("B"),
        }
    }
}

/// Token metadata supplied by the token-list collaborator (read-only here).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenDescriptor {
    #[serde(with = "serde_pubkey")]
    pub mint: Pubkey,
    pub decimals: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
}

impl TokenDescriptor {
    pub fn new(mint: Pubkey, decimals: u8) -> Self {
        Self { mint, decimals, symbol: None }
    }

    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Mint equality that treats native SOL and wrapped SOL as the same token.
    pub fn is_same_mint(&self, other: &TokenDescriptor) -> bool {
        normalize_mint(&self.mint) == normalize_mint(&other.mint)
    }
}

/// Wallets report unwrapped SOL under the system program id.
pub(crate) fn normalize_mint(mint: &Pubkey) -> Pubkey {
    if *mint == NATIVE_SOL_MINT { SOL_MINT } else { *mint }
}

/// Serializes a `Pubkey` as its base58 string.
pub mod serde_pubkey {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use solana_sdk::pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&key.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(|e| D::Error::custom(format!("invalid pubkey {s}: {e:?}")))
    }
}

pub type AnyResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::tokens::USDC_MINT;

    #[test]
    fn test_native_and_wrapped_sol_are_same_mint() {
        let native = TokenDescriptor::new(NATIVE_SOL_MINT, 9);
        let wrapped = TokenDescriptor::new(SOL_MINT, 9);
        let usdc = TokenDescriptor::new(USDC_MINT, 6);
        assert!(native.is_same_mint(&wrapped));
        assert!(!wrapped.is_same_mint(&usdc));
    }

    #[test]
    fn test_token_descriptor_json() {
        let token = TokenDescriptor::new(USDC_MINT, 6).with_symbol("USDC");
        let json = serde_json::to_string(&token).unwrap();
        assert!(json.contains("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"));
        let back: TokenDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, token);
    }
}
