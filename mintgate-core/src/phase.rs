//! Sale-phase state machine.
//!
//! Combines independent contract reads into one authoritative [`SalePhase`]
//! and detects transitions. Transition logic is a pure reducer over
//! `(previous phase, new reads, wall-clock time)` so it is unit-testable
//! without timers; the polling loop around it owns scheduling, the
//! skip-if-busy discipline, and stale-result drops by generation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::contract::is_past_end;
use crate::error::MintError;
use crate::session::WalletSession;
use crate::types::{Address, Eligibility, SalePhase, SaleState, TickReads};

// ═══════════════════════════════════════════════════════════════════════════════
// PURE REDUCER
// ═══════════════════════════════════════════════════════════════════════════════

/// Derive the next phase from the previous one and a tick's reads.
///
/// Rules:
/// - no connected address: `Disconnected`, whatever was read;
/// - `Ended` is terminal;
/// - a failed `presaleStarted` read keeps the current phase (no regression to
///   `Unknown` on a transient failure);
/// - `presaleStarted` is the authoritative started signal: "ended" is never
///   computed while it reads false, even if a stale nonzero deadline exists;
/// - an observed phase never regresses (`Active` is kept over a late
///   `started == false` snapshot);
/// - `NotStarted` never jumps straight to `Ended`: when the sale started and
///   the deadline already passed, this tick yields `Active` and the next one
///   converges to `Ended`.
pub fn reduce_phase(prev: SalePhase, reads: &TickReads, connected: bool, now: u64) -> SalePhase {
    if !connected {
        return SalePhase::Disconnected;
    }
    let prev = match prev {
        // A freshly connected session starts from Unknown.
        SalePhase::Disconnected => SalePhase::Unknown,
        SalePhase::Ended => return SalePhase::Ended,
        other => other,
    };

    match reads.started {
        None => prev,
        Some(false) => {
            if prev == SalePhase::Active {
                // Reads are snapshots; an already-observed start wins.
                SalePhase::Active
            } else {
                SalePhase::NotStarted
            }
        }
        Some(true) => match reads.end_timestamp {
            None => prev,
            Some(end) => {
                if !is_past_end(end, now) {
                    SalePhase::Active
                } else if prev == SalePhase::NotStarted {
                    SalePhase::Active
                } else {
                    SalePhase::Ended
                }
            }
        },
    }
}

/// Recompute eligibility from a tick's reads. Owner comparison is
/// case-insensitive (addresses are normalized); facts not covered by this
/// tick's reads are carried over.
pub fn reduce_eligibility(
    prev: Eligibility,
    reads: &TickReads,
    connected: Option<&Address>,
) -> Eligibility {
    let is_owner = match (&reads.owner, connected) {
        (Some(owner), Some(address)) => owner == address,
        (_, None) => false,
        _ => prev.is_owner,
    };
    Eligibility {
        is_owner,
        is_whitelisted: prev.is_whitelisted,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATE MACHINE
// ═══════════════════════════════════════════════════════════════════════════════

/// Polls the contract through the session and publishes the authoritative
/// sale state on a watch channel.
pub struct PhaseStateMachine {
    session: Arc<WalletSession>,
    state: watch::Sender<SaleState>,
    /// Bumped on every session transition; a tick whose reads settle under an
    /// older generation is dropped instead of applied.
    generation: AtomicU64,
    poll_interval: Duration,
    refresh_minted_after_end: bool,
}

impl PhaseStateMachine {
    pub fn new(session: Arc<WalletSession>, config: &ClientConfig) -> Self {
        let (state, _) = watch::channel(SaleState::default());
        Self {
            session,
            state,
            generation: AtomicU64::new(0),
            poll_interval: config.poll_interval(),
            refresh_minted_after_end: config.refresh_minted_after_end,
        }
    }

    /// The session this machine polls through.
    pub fn session(&self) -> &Arc<WalletSession> {
        &self.session
    }

    /// Current authoritative state.
    pub fn current(&self) -> SaleState {
        self.state.borrow().clone()
    }

    /// Subscribe to state updates.
    pub fn subscribe(&self) -> watch::Receiver<SaleState> {
        self.state.subscribe()
    }

    /// Note a (re)connected session: discard any in-flight tick and start
    /// over from `Unknown`.
    pub async fn begin(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let phase = if self.session.is_connected().await {
            SalePhase::Unknown
        } else {
            SalePhase::Disconnected
        };
        self.publish(SaleState {
            phase,
            ..SaleState::default()
        });
    }

    /// Note a disconnected session.
    pub async fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.publish(SaleState::default());
    }

    /// Record evidence about whitelist membership (from a settled presale
    /// mint outcome); the client has no read for it.
    pub fn record_whitelist_evidence(&self, is_whitelisted: bool) {
        self.state.send_modify(|state| {
            state.eligibility.is_whitelisted = Some(is_whitelisted);
        });
    }

    /// Execute one poll tick and return the (possibly updated) state.
    ///
    /// Read failures are swallowed here: a transient RPC hiccup is logged and
    /// the displayed phase is left alone.
    pub async fn tick(&self) -> SaleState {
        let generation = self.generation.load(Ordering::SeqCst);

        let Some(connected) = self.session.connected_address().await else {
            self.publish(SaleState::default());
            return self.current();
        };

        let reader = match self.session.reader().await {
            Ok(reader) => reader,
            Err(e) => {
                debug!(error = %e, "poll tick skipped");
                if matches!(e, MintError::WrongNetwork { .. }) {
                    // The session was reset; reflect it.
                    self.publish(SaleState::default());
                }
                return self.current();
            }
        };

        // The minted counter has no ordering dependency on phase resolution;
        // issue it concurrently with the started read.
        let (started, minted) = tokio::join!(reader.presale_started(), reader.minted_count());
        let mut reads = TickReads {
            started: swallow("presaleStarted", started),
            minted: swallow("tokenIds", minted),
            ..TickReads::default()
        };

        match reads.started {
            // Pre-sale: resolve the owner to gate the start-presale action.
            Some(false) => reads.owner = swallow("owner", reader.owner().await),
            // Started: the ended condition is re-derived from the deadline
            // against live time on every tick.
            Some(true) => reads.end_timestamp = swallow("presaleEnded", reader.presale_end().await),
            None => {}
        }

        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("dropping stale tick results");
            return self.current();
        }
        // The session may have been torn down while the reads were in
        // flight; reads settled against a dead session must not publish a
        // connected phase.
        if self.session.connected_address().await.is_none() {
            self.publish(SaleState::default());
            return self.current();
        }

        self.apply(&reads, Some(&connected), unix_now())
    }

    /// Out-of-band minted-count refresh (e.g. right after the user's own
    /// mint confirmed, so the visible count doesn't wait for the next tick).
    pub async fn refresh_minted(&self) {
        let generation = self.generation.load(Ordering::SeqCst);
        let reader = match self.session.reader().await {
            Ok(reader) => reader,
            Err(e) => {
                debug!(error = %e, "minted refresh skipped");
                return;
            }
        };
        match reader.minted_count().await {
            Ok(minted) => {
                if self.generation.load(Ordering::SeqCst) != generation {
                    debug!("dropping stale minted refresh");
                    return;
                }
                self.state.send_modify(|state| {
                    state.minted_count = minted;
                    state.last_updated = unix_now();
                });
            }
            Err(e) => debug!(error = %e, "minted refresh failed"),
        }
    }

    /// Run the polling loop. Ticks run on a fixed interval; a tick that
    /// would start while the previous one is still reading is skipped, not
    /// queued. Phase polling stops once the sale has ended; the minted
    /// counter keeps refreshing if configured to.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            if self.current().phase.is_terminal() {
                if !self.refresh_minted_after_end {
                    debug!("sale ended, stopping poll loop");
                    break;
                }
                self.refresh_minted().await;
            } else {
                self.tick().await;
            }
        }
    }

    fn apply(&self, reads: &TickReads, connected: Option<&Address>, now: u64) -> SaleState {
        let prev = self.current();
        let phase = reduce_phase(prev.phase, reads, connected.is_some(), now);
        let eligibility = reduce_eligibility(prev.eligibility, reads, connected);

        let next = SaleState {
            phase,
            eligibility,
            minted_count: reads.minted.unwrap_or(prev.minted_count),
            end_timestamp: reads.end_timestamp.or(prev.end_timestamp),
            last_updated: now,
        };

        if next.phase != prev.phase {
            info!(from = %prev.phase, to = %next.phase, "sale phase transition");
        }
        self.publish(next.clone());
        next
    }

    fn publish(&self, state: SaleState) {
        self.state.send_replace(state);
    }
}

fn swallow<T>(what: &'static str, result: crate::error::Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(read = what, error = %e, "contract read failed");
            None
        }
    }
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockChain;
    use crate::types::ChainId;

    const NOW: u64 = 1_700_000_000;

    fn reads(started: Option<bool>, end: Option<u64>) -> TickReads {
        TickReads {
            started,
            end_timestamp: end,
            ..TickReads::default()
        }
    }

    #[test]
    fn test_disconnected_wins_over_any_reads() {
        let r = reads(Some(true), Some(NOW - 1));
        assert_eq!(
            reduce_phase(SalePhase::Active, &r, false, NOW),
            SalePhase::Disconnected
        );
    }

    #[test]
    fn test_not_started() {
        let r = reads(Some(false), None);
        assert_eq!(
            reduce_phase(SalePhase::Unknown, &r, true, NOW),
            SalePhase::NotStarted
        );
    }

    #[test]
    fn test_started_before_deadline_is_active() {
        let r = reads(Some(true), Some(NOW + 3600));
        assert_eq!(
            reduce_phase(SalePhase::Unknown, &r, true, NOW),
            SalePhase::Active
        );
        assert_eq!(
            reduce_phase(SalePhase::NotStarted, &r, true, NOW),
            SalePhase::Active
        );
    }

    #[test]
    fn test_deadline_boundary_is_inclusive() {
        let r = reads(Some(true), Some(NOW));
        assert_eq!(
            reduce_phase(SalePhase::Active, &r, true, NOW),
            SalePhase::Ended
        );
        let r = reads(Some(true), Some(NOW + 1));
        assert_eq!(
            reduce_phase(SalePhase::Active, &r, true, NOW),
            SalePhase::Active
        );
    }

    #[test]
    fn test_not_started_never_jumps_straight_to_ended() {
        let r = reads(Some(true), Some(NOW - 100));
        assert_eq!(
            reduce_phase(SalePhase::NotStarted, &r, true, NOW),
            SalePhase::Active
        );
        // The next tick converges.
        assert_eq!(
            reduce_phase(SalePhase::Active, &r, true, NOW),
            SalePhase::Ended
        );
        // Unknown may land on Ended directly.
        assert_eq!(
            reduce_phase(SalePhase::Unknown, &r, true, NOW),
            SalePhase::Ended
        );
    }

    #[test]
    fn test_failed_read_keeps_current_phase() {
        let r = reads(None, None);
        assert_eq!(
            reduce_phase(SalePhase::Active, &r, true, NOW),
            SalePhase::Active
        );
        assert_eq!(
            reduce_phase(SalePhase::NotStarted, &r, true, NOW),
            SalePhase::NotStarted
        );
        // Started resolved but the deadline read failed: stay put.
        let r = reads(Some(true), None);
        assert_eq!(
            reduce_phase(SalePhase::NotStarted, &r, true, NOW),
            SalePhase::NotStarted
        );
    }

    #[test]
    fn test_ended_is_terminal() {
        let r = reads(Some(false), None);
        assert_eq!(
            reduce_phase(SalePhase::Ended, &r, true, NOW),
            SalePhase::Ended
        );
    }

    #[test]
    fn test_stale_deadline_with_started_false_is_not_ended() {
        // A concluded previous sale leaves a nonzero deadline behind;
        // presaleStarted stays authoritative.
        let r = reads(Some(false), Some(NOW - 10_000));
        assert_eq!(
            reduce_phase(SalePhase::Unknown, &r, true, NOW),
            SalePhase::NotStarted
        );
    }

    #[test]
    fn test_active_not_regressed_by_late_false_snapshot() {
        let r = reads(Some(false), None);
        assert_eq!(
            reduce_phase(SalePhase::Active, &r, true, NOW),
            SalePhase::Active
        );
    }

    #[test]
    fn test_owner_eligibility_matches_case_insensitively() {
        let owner = Address::new("0x00000000000000000000000000000000000000AA").unwrap();
        let me = Address::new("0x00000000000000000000000000000000000000aa").unwrap();
        let r = TickReads {
            owner: Some(owner),
            ..TickReads::default()
        };
        let eligibility = reduce_eligibility(Eligibility::default(), &r, Some(&me));
        assert!(eligibility.is_owner);
    }

    #[test]
    fn test_owner_eligibility_carried_when_not_read() {
        let prev = Eligibility {
            is_owner: true,
            is_whitelisted: None,
        };
        let me = Address::new("0x00000000000000000000000000000000000000aa").unwrap();
        let eligibility = reduce_eligibility(prev, &TickReads::default(), Some(&me));
        assert!(eligibility.is_owner);
    }

    // ── machine-level tests against the mock chain ─────────────────────────

    async fn machine(chain: &MockChain) -> Arc<PhaseStateMachine> {
        let session = Arc::new(WalletSession::new(
            chain.provider(),
            chain.contract(),
            ChainId(4),
        ));
        session.connect().await.unwrap();
        let machine = Arc::new(PhaseStateMachine::new(session, &ClientConfig::default()));
        machine.begin().await;
        machine
    }

    fn me() -> Address {
        Address::new("0x00000000000000000000000000000000000000aa").unwrap()
    }

    #[tokio::test]
    async fn test_lifecycle_not_started_to_active_to_ended() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;
        chain.set_owner(me()).await;
        chain.set_minted(3).await;

        let machine = machine(&chain).await;
        assert_eq!(machine.current().phase, SalePhase::Unknown);

        let state = machine.tick().await;
        assert_eq!(state.phase, SalePhase::NotStarted);
        assert!(state.eligibility.is_owner);
        assert_eq!(state.minted_count, 3);

        chain.set_started(true).await;
        chain.set_end(unix_now() + 3600).await;
        let state = machine.tick().await;
        assert_eq!(state.phase, SalePhase::Active);

        chain.set_end(unix_now() - 1).await;
        let state = machine.tick().await;
        assert_eq!(state.phase, SalePhase::Ended);
    }

    #[tokio::test]
    async fn test_transient_read_failure_keeps_phase() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;
        chain.set_started(true).await;
        chain.set_end(unix_now() + 3600).await;

        let machine = machine(&chain).await;
        assert_eq!(machine.tick().await.phase, SalePhase::Active);

        chain.fail_started(true).await;
        assert_eq!(machine.tick().await.phase, SalePhase::Active);

        chain.fail_started(false).await;
        assert_eq!(machine.tick().await.phase, SalePhase::Active);
    }

    #[tokio::test]
    async fn test_minted_refreshes_even_when_phase_read_fails() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;
        chain.fail_started(true).await;
        chain.set_minted(7).await;

        let machine = machine(&chain).await;
        let state = machine.tick().await;
        assert_eq!(state.minted_count, 7);
    }

    #[tokio::test]
    async fn test_reset_goes_back_to_disconnected() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;

        let machine = machine(&chain).await;
        machine.tick().await;

        machine.session().disconnect().await;
        machine.reset().await;
        assert_eq!(machine.current().phase, SalePhase::Disconnected);

        // A tick with no session stays Disconnected.
        assert_eq!(machine.tick().await.phase, SalePhase::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_during_tick_is_not_reported_active() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;
        chain.set_started(true).await;
        chain.set_end(unix_now() + 3600).await;

        let machine = machine(&chain).await;

        // Hold the tick's reads in flight, then tear the session down
        // underneath it.
        chain.hold_reads().await;
        let tick = {
            let machine = Arc::clone(&machine);
            tokio::spawn(async move { machine.tick().await })
        };
        for _ in 0..100 {
            if chain.read_calls().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(chain.read_calls().await > 0);

        machine.session().disconnect().await;
        chain.release_reads().await;

        // The settled reads would have yielded Active; they must not be
        // applied against the now-empty session.
        let state = tick.await.unwrap();
        assert_eq!(state.phase, SalePhase::Disconnected);
        assert_eq!(machine.current().phase, SalePhase::Disconnected);
    }

    #[tokio::test]
    async fn test_stale_minted_refresh_is_dropped_after_reset() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;
        chain.set_minted(9).await;

        let machine = machine(&chain).await;

        chain.hold_reads().await;
        let refresh = {
            let machine = Arc::clone(&machine);
            tokio::spawn(async move { machine.refresh_minted().await })
        };
        for _ in 0..100 {
            if chain.read_calls().await > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        // A session restart bumps the generation; the held refresh must not
        // stamp its stale count onto the fresh state.
        machine.begin().await;
        chain.release_reads().await;
        refresh.await.unwrap();

        assert_eq!(machine.current().minted_count, 0);
    }

    #[tokio::test]
    async fn test_wrong_network_tick_reports_disconnected() {
        let chain = MockChain::new(ChainId(4));
        chain.set_accounts(vec![me()]).await;
        chain.set_started(true).await;
        chain.set_end(unix_now() + 3600).await;

        let machine = machine(&chain).await;
        assert_eq!(machine.tick().await.phase, SalePhase::Active);

        // User switches networks: the guard trips, the session resets, and
        // the published phase must not stay Active with no session behind it.
        chain.set_chain(ChainId(1)).await;
        assert_eq!(machine.tick().await.phase, SalePhase::Disconnected);
    }
}
