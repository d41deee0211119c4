//! Seams between the coordinator and the wallet / chain.
//!
//! `WalletProvider` models the user-selected wallet connection;
//! `SaleContract` models the minting contract's read and write surface.
//! Production traffic goes through [`crate::rpc::JsonRpcProvider`]; tests use
//! [`crate::testing::MockChain`].

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Address, ChainId, TxHash};

/// Handle to a wallet provider.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    /// Prompt for / look up the provider's accounts.
    ///
    /// Fails with `ConnectionRejected` if the user declines and
    /// `NoProviderAvailable` if no provider is reachable.
    async fn request_accounts(&self) -> Result<Vec<Address>>;

    /// The chain the provider is currently connected to. The user may switch
    /// networks at any time outside the client's control, so this is
    /// re-queried before every contract interaction.
    async fn chain_id(&self) -> Result<ChainId>;
}

/// The sale contract's call surface.
///
/// Reads are side-effect-free and independently fallible. Writes submit a
/// transaction and return its hash; mining is awaited separately via
/// [`SaleContract::confirm`].
#[async_trait]
pub trait SaleContract: Send + Sync {
    /// `presaleStarted() -> bool`
    async fn presale_started(&self) -> Result<bool>;

    /// `presaleEnded() -> uint256`, the fixed presale deadline (unix time).
    async fn presale_end(&self) -> Result<u64>;

    /// `owner() -> address`
    async fn owner(&self) -> Result<Address>;

    /// `tokenIds() -> uint256`, the number of tokens minted so far.
    async fn minted_count(&self) -> Result<u64>;

    /// `startPresale()`. Owner-only.
    async fn start_presale(&self, from: &Address) -> Result<TxHash>;

    /// `presaleMint() payable`. Whitelist-gated.
    async fn presale_mint(&self, from: &Address, value_wei: u128) -> Result<TxHash>;

    /// `mint() payable`. The public mint.
    async fn public_mint(&self, from: &Address, value_wei: u128) -> Result<TxHash>;

    /// Wait for a submitted transaction to be mined. A mined-but-reverted
    /// transaction fails with `TransactionReverted`.
    async fn confirm(&self, tx: &TxHash) -> Result<()>;
}
