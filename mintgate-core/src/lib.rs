//! mintgate-core
//!
//! Client-side coordination for a single on-chain NFT-minting contract
//! across the lifetime of a sale: wallet session management, sale-phase
//! discovery by polling, eligibility gating, and single-flight mint
//! transaction submission.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                        MintCoordinator                         │
//! │   picks the transaction kind from the current phase, enforces  │
//! │   single-flight, maps presale reverts to NotEligible           │
//! └──────────────┬─────────────────────────────────────────────────┘
//!                │ consumes phase
//! ┌──────────────▼─────────────────────────────────────────────────┐
//! │                       PhaseStateMachine                        │
//! │   pure reducer over per-tick reads; fixed-interval polling     │
//! │   with skip-if-busy and generation-checked stale drops         │
//! └──────────────┬─────────────────────────────────────────────────┘
//!                │ reads through
//! ┌──────────────▼─────────────────────────────────────────────────┐
//! │                 WalletSession + NetworkGuard                   │
//! │   connect/disconnect lifecycle; every accessor grant           │
//! │   re-validates the chain id (hard stop on mismatch)            │
//! └──────────────┬─────────────────────────────────────────────────┘
//!                │ seams
//! ┌──────────────▼─────────────────────────────────────────────────┐
//! │            WalletProvider / SaleContract traits                │
//! │   backed by JsonRpcProvider in production, MockChain in tests  │
//! └────────────────────────────────────────────────────────────────┘
//! ```

pub mod abi;
pub mod config;
pub mod contract;
pub mod error;
pub mod mint;
pub mod network;
pub mod phase;
pub mod provider;
pub mod rpc;
pub mod session;
pub mod testing;
pub mod types;

pub use config::{ClientConfig, PRESALE_PRICE_WEI, PUBLIC_PRICE_WEI};
pub use contract::{is_past_end, ReadAccessor, SignAccessor};
pub use error::{MintError, Result};
pub use mint::MintCoordinator;
pub use network::NetworkGuard;
pub use phase::{reduce_eligibility, reduce_phase, PhaseStateMachine};
pub use provider::{SaleContract, WalletProvider};
pub use rpc::JsonRpcProvider;
pub use session::WalletSession;
pub use types::{Address, ChainId, Eligibility, MintKind, SalePhase, SaleState, TickReads, TxHash};
