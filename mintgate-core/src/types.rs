//! Core types for the mint client.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MintError;

// ═══════════════════════════════════════════════════════════════════════════════
// IDENTIFIERS
// ═══════════════════════════════════════════════════════════════════════════════

/// An EVM account address, normalized to lowercase hex.
///
/// Contract owner checks compare addresses case-insensitively; normalizing at
/// construction makes the derived equality do the right thing.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address(String);

impl Address {
    /// Parse and normalize an address. Accepts `0x`-prefixed 40-hex-digit form.
    pub fn new(s: impl AsRef<str>) -> Result<Self, MintError> {
        let s = s.as_ref();
        let body = s
            .strip_prefix("0x")
            .ok_or_else(|| MintError::InvalidAddress(s.to_string()))?;
        if body.len() != 40 || !body.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MintError::InvalidAddress(s.to_string()));
        }
        Ok(Self(format!("0x{}", body.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = MintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// EVM chain identifier (EIP-155).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash of a submitted transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SALE PHASE
// ═══════════════════════════════════════════════════════════════════════════════

/// The sale's current stage, as derived by the phase state machine.
///
/// This is the single source of truth consulted by consumers; no other
/// component infers the phase independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SalePhase {
    /// No wallet session established.
    Disconnected,
    /// Connected, but reads are in flight or have all failed so far.
    Unknown,
    /// Presale has not been started by the owner.
    NotStarted,
    /// Presale is running: whitelisted addresses may mint.
    Active,
    /// Presale deadline passed: public mint allowed.
    Ended,
}

impl SalePhase {
    /// Terminal phases need no further phase polling.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Whether a presale mint is valid in this phase.
    pub fn allows_presale_mint(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Whether a public mint is valid in this phase.
    pub fn allows_public_mint(&self) -> bool {
        matches!(self, Self::Ended)
    }

    /// Whether the owner may start the presale in this phase.
    pub fn allows_start_presale(&self) -> bool {
        matches!(self, Self::NotStarted)
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Disconnected => "wallet not connected",
            Self::Unknown => "sale state unknown",
            Self::NotStarted => "presale not started",
            Self::Active => "presale active",
            Self::Ended => "presale ended, public mint open",
        }
    }
}

impl Default for SalePhase {
    fn default() -> Self {
        Self::Disconnected
    }
}

impl fmt::Display for SalePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// ELIGIBILITY
// ═══════════════════════════════════════════════════════════════════════════════

/// What the connected address is allowed to do, as far as the client can tell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// Connected address is the contract owner (meaningful pre-sale, to gate
    /// the start-presale action).
    pub is_owner: bool,
    /// Whitelist membership. The contract enforces this server-side and
    /// exposes no read for it, so the client only learns it from mint
    /// outcomes: `None` until a presale mint settles.
    pub is_whitelisted: Option<bool>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// MINT KIND
// ═══════════════════════════════════════════════════════════════════════════════

/// Which mint transaction to submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MintKind {
    /// Whitelist-gated mint during the active presale.
    Presale,
    /// Open mint after the presale deadline.
    Public,
}

impl MintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Presale => "presale",
            Self::Public => "public",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TICK READS & SALE STATE
// ═══════════════════════════════════════════════════════════════════════════════

/// Snapshot of one poll tick's contract reads.
///
/// Each field is independently fallible (`None` on a failed read); a failure
/// in one read never blocks facts derivable from the others. Two `Some`
/// fields are snapshots taken concurrently and are not assumed mutually
/// consistent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReads {
    /// `presaleStarted()`.
    pub started: Option<bool>,
    /// `presaleEnded()`: a fixed unix deadline, not a mutable boolean.
    pub end_timestamp: Option<u64>,
    /// `owner()`, only resolved pre-sale.
    pub owner: Option<Address>,
    /// `tokenIds()`: minted count, refreshed every tick.
    pub minted: Option<u64>,
}

/// The authoritative client-side view of the sale, published to consumers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleState {
    /// Current phase.
    pub phase: SalePhase,
    /// Eligibility of the connected address.
    pub eligibility: Eligibility,
    /// Last observed minted count. A snapshot; may lag the chain between
    /// polls.
    pub minted_count: u64,
    /// Presale deadline, once observed.
    pub end_timestamp: Option<u64>,
    /// Unix time of the last applied tick, 0 before the first.
    pub last_updated: u64,
}
