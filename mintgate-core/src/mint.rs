//! Mint transaction coordination.
//!
//! Submits exactly one transaction per user action, selecting the
//! transaction kind from the current phase. Single-flight: a latch is taken
//! before submission and released on every exit path, success or failure;
//! a request arriving while the latch is held is rejected without touching
//! the network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{MintError, Result};
use crate::phase::PhaseStateMachine;
use crate::types::{MintKind, TxHash};

/// Drives mint transactions against the current sale phase.
pub struct MintCoordinator {
    machine: Arc<PhaseStateMachine>,
    presale_price_wei: u128,
    public_price_wei: u128,
    in_flight: AtomicBool,
}

/// Clears the in-flight latch when dropped, so release happens on every exit
/// path: submission rejection, network error, and post-mining revert alike.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MintCoordinator {
    pub fn new(machine: Arc<PhaseStateMachine>, config: &ClientConfig) -> Self {
        Self {
            machine,
            presale_price_wei: config.presale_price_wei,
            public_price_wei: config.public_price_wei,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Whether a transaction is currently unsettled.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Mint during the active presale, paying the presale price. A revert is
    /// surfaced as `NotEligible`: the client cannot tell "not whitelisted"
    /// from "already minted" without parsing revert reasons.
    pub async fn presale_mint(&self) -> Result<TxHash> {
        self.mint(MintKind::Presale).await
    }

    /// Mint after the presale has ended, paying the public price.
    pub async fn public_mint(&self) -> Result<TxHash> {
        self.mint(MintKind::Public).await
    }

    /// Owner action: start the presale. Shares the single-flight latch with
    /// the mint actions and triggers an immediate re-poll on confirmation so
    /// the phase flips without waiting for the next tick.
    pub async fn start_presale(&self) -> Result<TxHash> {
        let phase = self.machine.current().phase;
        if !phase.allows_start_presale() {
            return Err(MintError::WrongPhase {
                action: "start presale",
                phase,
            });
        }
        let _guard = self.acquire()?;

        let signer = self.machine.session().signer().await?;
        let tx = signer.start_presale().await?;
        info!(tx = %tx, "startPresale submitted");
        signer.confirm(&tx).await?;

        self.machine.tick().await;
        Ok(tx)
    }

    async fn mint(&self, kind: MintKind) -> Result<TxHash> {
        let phase = self.machine.current().phase;
        let valid = match kind {
            MintKind::Presale => phase.allows_presale_mint(),
            MintKind::Public => phase.allows_public_mint(),
        };
        if !valid {
            // Client-side rejection: no latch taken, no network contacted.
            return Err(MintError::WrongPhase {
                action: match kind {
                    MintKind::Presale => "presale mint",
                    MintKind::Public => "public mint",
                },
                phase,
            });
        }

        let _guard = self.acquire()?;
        let result = self.submit(kind).await;

        match &result {
            Ok(tx) => {
                info!(kind = kind.as_str(), tx = %tx, "mint confirmed");
                if kind == MintKind::Presale {
                    self.machine.record_whitelist_evidence(true);
                }
                // Reflect the user's own mint immediately rather than waiting
                // for the next poll tick.
                self.machine.refresh_minted().await;
            }
            Err(e) => {
                warn!(kind = kind.as_str(), error = %e, "mint failed");
                if matches!(e, MintError::NotEligible) {
                    self.machine.record_whitelist_evidence(false);
                }
            }
        }
        result
    }

    async fn submit(&self, kind: MintKind) -> Result<TxHash> {
        let signer = self.machine.session().signer().await?;

        let outcome = match kind {
            MintKind::Presale => signer.presale_mint(self.presale_price_wei).await,
            MintKind::Public => signer.public_mint(self.public_price_wei).await,
        };
        let tx = outcome.map_err(|e| map_revert(kind, e))?;
        info!(kind = kind.as_str(), tx = %tx, "mint submitted");

        signer.confirm(&tx).await.map_err(|e| map_revert(kind, e))?;
        Ok(tx)
    }

    fn acquire(&self) -> Result<FlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| MintError::MintAlreadyInFlight)?;
        Ok(FlightGuard(&self.in_flight))
    }
}

/// A reverted presale mint means the address is not whitelisted or has
/// already minted; the public mint keeps the raw revert.
fn map_revert(kind: MintKind, e: MintError) -> MintError {
    match (kind, e) {
        (MintKind::Presale, MintError::TransactionReverted(_)) => MintError::NotEligible,
        (_, e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phase::unix_now;
    use crate::session::WalletSession;
    use crate::testing::MockChain;
    use crate::types::{Address, ChainId, SalePhase};
    use std::time::Duration;

    fn me() -> Address {
        Address::new("0x00000000000000000000000000000000000000aa").unwrap()
    }

    async fn coordinator(chain: &MockChain) -> (Arc<PhaseStateMachine>, Arc<MintCoordinator>) {
        let config = ClientConfig::default();
        let session = Arc::new(WalletSession::new(
            chain.provider(),
            chain.contract(),
            ChainId(4),
        ));
        chain.set_accounts(vec![me()]).await;
        session.connect().await.unwrap();
        let machine = Arc::new(PhaseStateMachine::new(session, &config));
        machine.begin().await;
        let coordinator = Arc::new(MintCoordinator::new(Arc::clone(&machine), &config));
        (machine, coordinator)
    }

    async fn active_chain() -> MockChain {
        let chain = MockChain::new(ChainId(4));
        chain.set_started(true).await;
        chain.set_end(unix_now() + 3600).await;
        chain
    }

    #[tokio::test]
    async fn test_presale_mint_pays_presale_price_and_bumps_count() {
        let chain = active_chain().await;
        chain.set_minted(5).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;
        assert_eq!(machine.current().phase, SalePhase::Active);

        coordinator.presale_mint().await.unwrap();

        assert_eq!(chain.last_payment().await, Some(crate::config::PRESALE_PRICE_WEI));
        // The out-of-band refresh picked up the user's own mint.
        assert_eq!(machine.current().minted_count, 6);
        assert_eq!(machine.current().eligibility.is_whitelisted, Some(true));
        assert!(!coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_public_mint_pays_public_price() {
        let chain = active_chain().await;
        chain.set_end(unix_now() - 1).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;
        machine.tick().await; // Unknown → Ended needs no second step, but converge anyway
        assert_eq!(machine.current().phase, SalePhase::Ended);

        coordinator.public_mint().await.unwrap();
        assert_eq!(chain.last_payment().await, Some(crate::config::PUBLIC_PRICE_WEI));
    }

    #[tokio::test]
    async fn test_mint_rejected_for_wrong_phase_without_network_call() {
        let chain = active_chain().await;
        chain.set_end(unix_now() - 1).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;
        assert_eq!(machine.current().phase, SalePhase::Ended);

        let writes_before = chain.write_calls().await;
        match coordinator.presale_mint().await {
            Err(MintError::WrongPhase { phase, .. }) => assert_eq!(phase, SalePhase::Ended),
            other => panic!("expected WrongPhase, got {other:?}"),
        }
        assert_eq!(chain.write_calls().await, writes_before);
    }

    #[tokio::test]
    async fn test_second_mint_while_first_unsettled_is_rejected() {
        let chain = active_chain().await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;

        chain.hold_writes().await;
        let background = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.presale_mint().await })
        };

        // Wait until the first mint holds the latch.
        for _ in 0..100 {
            if coordinator.is_in_flight() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(coordinator.is_in_flight());

        assert!(matches!(
            coordinator.presale_mint().await,
            Err(MintError::MintAlreadyInFlight)
        ));

        chain.release_writes().await;
        background.await.unwrap().unwrap();

        // After settlement a new mint is accepted again.
        assert!(!coordinator.is_in_flight());
        coordinator.presale_mint().await.unwrap();
    }

    #[tokio::test]
    async fn test_latch_released_after_revert() {
        let chain = active_chain().await;
        chain.revert_writes(true).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;

        assert!(matches!(
            coordinator.presale_mint().await,
            Err(MintError::NotEligible)
        ));
        assert!(!coordinator.is_in_flight());
        assert_eq!(machine.current().eligibility.is_whitelisted, Some(false));

        // The failure did not wedge the latch: the next attempt reaches the
        // contract again instead of failing with MintAlreadyInFlight.
        assert!(matches!(
            coordinator.presale_mint().await,
            Err(MintError::NotEligible)
        ));
    }

    #[tokio::test]
    async fn test_revert_at_confirmation_surfaces_not_eligible() {
        let chain = active_chain().await;
        chain.revert_at_confirm(true).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;
        assert_eq!(machine.current().phase, SalePhase::Active);

        // Submission goes through; the revert only shows up in the mined
        // receipt.
        assert!(matches!(
            coordinator.presale_mint().await,
            Err(MintError::NotEligible)
        ));
        assert!(chain.write_calls().await > 0);
        assert!(!coordinator.is_in_flight());
        assert_eq!(machine.current().eligibility.is_whitelisted, Some(false));
    }

    #[tokio::test]
    async fn test_public_mint_revert_stays_transaction_reverted() {
        let chain = active_chain().await;
        chain.set_end(unix_now() - 1).await;
        chain.revert_writes(true).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;

        assert!(matches!(
            coordinator.public_mint().await,
            Err(MintError::TransactionReverted(_))
        ));
        assert!(!coordinator.is_in_flight());
    }

    #[tokio::test]
    async fn test_start_presale_flips_phase_immediately() {
        let chain = MockChain::new(ChainId(4));
        chain.set_owner(me()).await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;
        assert_eq!(machine.current().phase, SalePhase::NotStarted);
        assert!(machine.current().eligibility.is_owner);

        coordinator.start_presale().await.unwrap();
        // The coordinator re-polled out of band; no poll tick needed.
        assert_eq!(machine.current().phase, SalePhase::Active);
    }

    #[tokio::test]
    async fn test_start_presale_rejected_once_started() {
        let chain = active_chain().await;
        let (machine, coordinator) = coordinator(&chain).await;
        machine.tick().await;

        assert!(matches!(
            coordinator.start_presale().await,
            Err(MintError::WrongPhase { .. })
        ));
    }
}
