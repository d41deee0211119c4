//! Network validation.
//!
//! Every read and write goes through this guard first: a session connected to
//! the wrong chain is a hard stop, never silently corrected.

use crate::error::{MintError, Result};
use crate::provider::WalletProvider;
use crate::types::ChainId;

/// Validates the wallet's connected network against the required chain.
#[derive(Clone, Copy, Debug)]
pub struct NetworkGuard {
    required: ChainId,
}

impl NetworkGuard {
    pub fn new(required: ChainId) -> Self {
        Self { required }
    }

    /// The chain all contract interaction must be bound to.
    pub fn required(&self) -> ChainId {
        self.required
    }

    /// Validate an observed chain id.
    pub fn validate(&self, observed: ChainId) -> Result<()> {
        if observed != self.required {
            return Err(MintError::WrongNetwork {
                observed,
                required: self.required,
            });
        }
        Ok(())
    }

    /// Query the provider's current chain and validate it.
    pub async fn check(&self, provider: &dyn WalletProvider) -> Result<()> {
        let observed = provider.chain_id().await?;
        self.validate(observed)
    }
}
