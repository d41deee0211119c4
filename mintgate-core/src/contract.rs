//! Typed accessors over the sale contract.
//!
//! Handed out by [`crate::session::WalletSession`] after network validation.
//! Reads map one logical on-chain fact each and fail independently; "ended"
//! is derived from the deadline against live time, never read as a boolean.

use std::sync::Arc;

use crate::error::Result;
use crate::provider::SaleContract;
use crate::types::{Address, TxHash};

/// Whether the presale deadline has passed. Boundary inclusive: the sale is
/// ended at exactly `end_timestamp`.
///
/// The contract exposes a fixed deadline, not a mutable flag, so callers must
/// recompute this against wall-clock time on every poll instead of caching
/// the answer.
pub fn is_past_end(end_timestamp: u64, now: u64) -> bool {
    now >= end_timestamp
}

/// Read-only contract accessor.
#[derive(Clone)]
pub struct ReadAccessor {
    contract: Arc<dyn SaleContract>,
}

impl std::fmt::Debug for ReadAccessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadAccessor").finish_non_exhaustive()
    }
}

impl ReadAccessor {
    pub(crate) fn new(contract: Arc<dyn SaleContract>) -> Self {
        Self { contract }
    }

    /// `presaleStarted()`
    pub async fn presale_started(&self) -> Result<bool> {
        self.contract.presale_started().await
    }

    /// `presaleEnded()`: the presale deadline as a unix timestamp.
    pub async fn presale_end(&self) -> Result<u64> {
        self.contract.presale_end().await
    }

    /// `owner()`
    pub async fn owner(&self) -> Result<Address> {
        self.contract.owner().await
    }

    /// `tokenIds()`: minted count.
    pub async fn minted_count(&self) -> Result<u64> {
        self.contract.minted_count().await
    }
}

/// Signing contract accessor bound to the connected address.
pub struct SignAccessor {
    contract: Arc<dyn SaleContract>,
    from: Address,
}

impl SignAccessor {
    pub(crate) fn new(contract: Arc<dyn SaleContract>, from: Address) -> Self {
        Self { contract, from }
    }

    /// The address transactions are sent from.
    pub fn from_address(&self) -> &Address {
        &self.from
    }

    /// Submit `startPresale()`.
    pub async fn start_presale(&self) -> Result<TxHash> {
        self.contract.start_presale(&self.from).await
    }

    /// Submit `presaleMint()` with the given payment.
    pub async fn presale_mint(&self, value_wei: u128) -> Result<TxHash> {
        self.contract.presale_mint(&self.from, value_wei).await
    }

    /// Submit `mint()` with the given payment.
    pub async fn public_mint(&self, value_wei: u128) -> Result<TxHash> {
        self.contract.public_mint(&self.from, value_wei).await
    }

    /// Wait for a submitted transaction to be mined.
    pub async fn confirm(&self, tx: &TxHash) -> Result<()> {
        self.contract.confirm(tx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_past_end_is_boundary_inclusive() {
        assert!(!is_past_end(1_000, 999));
        assert!(is_past_end(1_000, 1_000));
        assert!(is_past_end(1_000, 1_001));
    }
}
