//! Wallet session lifecycle.
//!
//! Owns the wallet connection handle and hands out read-only or signing
//! accessors. The session is the only component allowed to mutate the
//! connection state; everything else takes it as an explicit dependency.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::contract::{ReadAccessor, SignAccessor};
use crate::error::{MintError, Result};
use crate::network::NetworkGuard;
use crate::provider::{SaleContract, WalletProvider};
use crate::types::{Address, ChainId};

/// A wallet session bound to a required chain.
///
/// Created on the first connect attempt; reset on explicit disconnect or on a
/// network-mismatch failure. Nothing is persisted across process restarts.
pub struct WalletSession {
    provider: Arc<dyn WalletProvider>,
    contract: Arc<dyn SaleContract>,
    guard: NetworkGuard,
    connected: RwLock<Option<Address>>,
}

impl WalletSession {
    pub fn new(
        provider: Arc<dyn WalletProvider>,
        contract: Arc<dyn SaleContract>,
        required_chain: ChainId,
    ) -> Self {
        Self {
            provider,
            contract,
            guard: NetworkGuard::new(required_chain),
            connected: RwLock::new(None),
        }
    }

    /// Connect the wallet. Idempotent: if a session already exists, the
    /// connected address is returned without prompting again.
    pub async fn connect(&self) -> Result<Address> {
        if let Some(address) = self.connected.read().await.clone() {
            debug!(%address, "already connected");
            return Ok(address);
        }

        let accounts = self.provider.request_accounts().await?;
        let address = accounts
            .into_iter()
            .next()
            .ok_or(MintError::ConnectionRejected)?;

        info!(%address, "wallet connected");
        *self.connected.write().await = Some(address.clone());
        Ok(address)
    }

    /// Tear down the session.
    pub async fn disconnect(&self) {
        if self.connected.write().await.take().is_some() {
            info!("wallet disconnected");
        }
    }

    /// The currently connected address, if any.
    pub async fn connected_address(&self) -> Option<Address> {
        self.connected.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.connected.read().await.is_some()
    }

    /// The chain this session is bound to.
    pub fn required_chain(&self) -> ChainId {
        self.guard.required()
    }

    /// Obtain a read-only accessor. Re-validates the network first: the user
    /// may have switched chains since the last call.
    pub async fn reader(&self) -> Result<ReadAccessor> {
        self.ensure_network().await?;
        Ok(ReadAccessor::new(Arc::clone(&self.contract)))
    }

    /// Obtain a signing accessor bound to the connected address. Network is
    /// re-validated first, then the address requirement is enforced.
    pub async fn signer(&self) -> Result<SignAccessor> {
        self.ensure_network().await?;
        let from = self
            .connected
            .read()
            .await
            .clone()
            .ok_or(MintError::NotConnected)?;
        Ok(SignAccessor::new(Arc::clone(&self.contract), from))
    }

    /// Check the provider's current chain against the required one. A
    /// mismatch resets the session: stale handles must not keep issuing
    /// calls against the wrong chain.
    async fn ensure_network(&self) -> Result<()> {
        match self.guard.check(self.provider.as_ref()).await {
            Err(e @ MintError::WrongNetwork { .. }) => {
                warn!(%e, "network mismatch, resetting session");
                self.connected.write().await.take();
                Err(e)
            }
            other => other,
        }
    }
}
