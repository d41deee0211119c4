//! Error types for mint client operations.

use thiserror::Error;

use crate::types::{ChainId, SalePhase};

/// Result type alias for mint client operations.
pub type Result<T> = std::result::Result<T, MintError>;

/// Errors that can occur while coordinating with the sale contract.
#[derive(Debug, Error)]
pub enum MintError {
    /// The user declined the wallet connection prompt.
    #[error("wallet connection rejected by user")]
    ConnectionRejected,

    /// No wallet provider is reachable.
    #[error("no wallet provider available")]
    NoProviderAvailable,

    /// The wallet is connected to the wrong network. A hard stop: no reads or
    /// writes are issued until the network matches.
    #[error("wrong network: connected to chain {observed}, required chain {required}")]
    WrongNetwork {
        observed: ChainId,
        required: ChainId,
    },

    /// No wallet session is established.
    #[error("no wallet connected")]
    NotConnected,

    /// The RPC endpoint failed to serve the request.
    #[error("rpc unavailable: {0}")]
    RpcUnavailable(String),

    /// The request timed out.
    #[error("request timed out")]
    Timeout,

    /// The requested action is not valid for the current sale phase.
    /// Rejected client-side, without a network call.
    #[error("{action} is not valid while {phase}")]
    WrongPhase {
        action: &'static str,
        phase: SalePhase,
    },

    /// The presale mint reverted. The client cannot distinguish "not
    /// whitelisted" from "already minted" without parsing revert reasons, so
    /// both surface as this one kind.
    #[error("address not eligible to mint (not whitelisted or already minted)")]
    NotEligible,

    /// A mint is already in flight; the new request was rejected without
    /// contacting the network.
    #[error("a mint transaction is already in flight")]
    MintAlreadyInFlight,

    /// The transaction was rejected or reverted.
    #[error("transaction reverted: {0}")]
    TransactionReverted(String),

    /// Malformed EVM address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Malformed response payload from the RPC endpoint.
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for MintError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            MintError::Timeout
        } else {
            MintError::RpcUnavailable(e.to_string())
        }
    }
}
