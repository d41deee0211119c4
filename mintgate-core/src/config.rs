//! Client configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

use crate::types::ChainId;

/// Required chain id for all contract interaction (Rinkeby).
pub const DEFAULT_CHAIN_ID: u64 = 4;

/// Fixed poll interval for phase discovery.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Presale mint price: 0.008 ether, in wei.
pub const PRESALE_PRICE_WEI: u128 = 8_000_000_000_000_000;

/// Public mint price: 0.01 ether, in wei.
pub const PUBLIC_PRICE_WEI: u128 = 10_000_000_000_000_000;

/// Configuration for the mint client.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClientConfig {
    /// JSON-RPC endpoint of the wallet provider / node.
    pub rpc_url: String,

    /// Address of the NFT sale contract.
    pub contract_address: String,

    /// Chain id the session must be bound to.
    #[serde(default = "default_chain_id")]
    pub required_chain_id: u64,

    /// Phase poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Presale mint price in wei.
    #[serde(default = "default_presale_price")]
    pub presale_price_wei: u128,

    /// Public mint price in wei.
    #[serde(default = "default_public_price")]
    pub public_price_wei: u128,

    /// Collection size, for `minted/max` display.
    #[serde(default = "default_max_supply")]
    pub max_supply: u64,

    /// Keep refreshing the minted count after the sale has ended. Phase
    /// polling stops at `Ended` either way.
    #[serde(default = "default_refresh_after_end")]
    pub refresh_minted_after_end: bool,
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    30
}

fn default_presale_price() -> u128 {
    PRESALE_PRICE_WEI
}

fn default_public_price() -> u128 {
    PUBLIC_PRICE_WEI
}

fn default_max_supply() -> u64 {
    20
}

fn default_refresh_after_end() -> bool {
    true
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: String::new(),
            required_chain_id: default_chain_id(),
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            presale_price_wei: default_presale_price(),
            public_price_wei: default_public_price(),
            max_supply: default_max_supply(),
            refresh_minted_after_end: default_refresh_after_end(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let rpc_url = env::var("MINTGATE_RPC_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8545".to_string());

        let contract_address =
            env::var("MINTGATE_CONTRACT_ADDRESS").context("MINTGATE_CONTRACT_ADDRESS must be set")?;

        let required_chain_id: u64 = env::var("MINTGATE_CHAIN_ID")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_CHAIN_ID);

        let poll_interval_secs: u64 = env::var("MINTGATE_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_POLL_INTERVAL_SECS);

        let request_timeout_secs: u64 = env::var("MINTGATE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        Ok(Self {
            rpc_url,
            contract_address,
            required_chain_id,
            poll_interval_secs,
            request_timeout_secs,
            ..Self::default()
        })
    }

    /// Required chain id as a typed value.
    pub fn required_chain(&self) -> ChainId {
        ChainId(self.required_chain_id)
    }

    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
