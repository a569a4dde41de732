//! Engine configuration.

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

use crate::common::types::AnyResult;
use crate::constants::{
    BPS_DENOMINATOR, DEFAULT_API_ORIGIN, DEFAULT_API_PATHNAMES, DEFAULT_SLIPPAGE_BPS, DEVNET_API_ORIGIN,
};
use crate::utils::calc::rational::Rational;
use crate::utils::calc::tick_price::TieBreak;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    #[default]
    Mainnet,
    Devnet,
}

impl std::str::FromStr for NetworkMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> AnyResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mainnet" | "mainnet-beta" => Ok(NetworkMode::Mainnet),
            "devnet" => Ok(NetworkMode::Devnet),
            other => Err(anyhow!("unknown network mode: {other}")),
        }
    }
}

/// Named endpoint → path mapping, fixed at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub mode: NetworkMode,
    pub origin: String,
    pub pathnames: BTreeMap<String, String>,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self::for_mode(NetworkMode::Mainnet)
    }
}

impl ApiEndpoints {
    pub fn for_mode(mode: NetworkMode) -> Self {
        let origin = match mode {
            NetworkMode::Mainnet => DEFAULT_API_ORIGIN,
            NetworkMode::Devnet => DEVNET_API_ORIGIN,
        };
        Self {
            mode,
            origin: origin.to_string(),
            pathnames: DEFAULT_API_PATHNAMES.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    pub fn with_pathname(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.pathnames.insert(name.into(), path.into());
        self
    }

    /// Full URL for a named endpoint, `None` if the name is unknown.
    pub fn url(&self, name: &str) -> Option<String> {
        let path = self.pathnames.get(name)?;
        Some(format!("{}/{}", self.origin.trim_end_matches('/'), path.trim_start_matches('/')))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fraction, e.g. `0.01` for 1%
    pub default_slippage: Rational,
    /// Neighbour chosen when a price is exactly between two usable ticks
    pub tie_break: TieBreak,
    /// Periodic price refresh in the driver; `None` refreshes on demand only
    pub price_refresh_interval_ms: Option<u64>,
    pub endpoints: ApiEndpoints,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_slippage: Rational::reduced(DEFAULT_SLIPPAGE_BPS.into(), BPS_DENOMINATOR.into()),
            tie_break: TieBreak::Lower,
            price_refresh_interval_ms: None,
            endpoints: ApiEndpoints::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_slippage(mut self, slippage: Rational) -> Self {
        self.default_slippage = slippage;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    pub fn with_price_refresh_interval_ms(mut self, interval_ms: u64) -> Self {
        self.price_refresh_interval_ms = Some(interval_ms);
        self
    }

    pub fn with_endpoints(mut self, endpoints: ApiEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn from_json_str(json: &str) -> AnyResult<Self> {
        let config: Self = serde_json::from_str(json).context("invalid engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> AnyResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json_str(&json)
    }

    /// Applies `CLMM_SLIPPAGE`, `CLMM_NETWORK_MODE` and `CLMM_API_ORIGIN`, in
    /// that order, so an explicit origin wins over the mode's default.
    pub fn apply_env_overrides(mut self) -> AnyResult<Self> {
        if let Ok(slippage) = std::env::var("CLMM_SLIPPAGE") {
            self.default_slippage = Rational::from_decimal_str(&slippage)
                .map_err(|e| anyhow!("CLMM_SLIPPAGE: {e}"))?;
            info!("slippage overridden from env: {slippage}");
        }
        if let Ok(mode) = std::env::var("CLMM_NETWORK_MODE") {
            let mode: NetworkMode = mode.parse()?;
            if mode != self.endpoints.mode {
                let pathnames = std::mem::take(&mut self.endpoints.pathnames);
                self.endpoints = ApiEndpoints { pathnames, ..ApiEndpoints::for_mode(mode) };
            }
            info!("network mode from env: {mode:?}");
        }
        if let Ok(origin) = std::env::var("CLMM_API_ORIGIN") {
            info!("api origin overridden from env: {origin}");
            self.endpoints.origin = origin;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> AnyResult<()> {
        if self.default_slippage.is_negative() || self.default_slippage >= Rational::one() {
            return Err(anyhow!("slippage must be in [0, 1), got {}", self.default_slippage));
        }
        if self.price_refresh_interval_ms == Some(0) {
            return Err(anyhow!("price_refresh_interval_ms must be positive"));
        }
        Ok(())
    }
}
