//! Test fixtures: an in-memory chain implementing both seams.
//!
//! `MockChain` plays the wallet provider and the sale contract at once, with
//! settable state, per-read failure injection, revert injection, and hold
//! gates that keep a read or a write unsettled until released (for
//! single-flight and stale-result tests).

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex};

use crate::error::{MintError, Result};
use crate::phase::unix_now;
use crate::provider::{SaleContract, WalletProvider};
use crate::types::{Address, ChainId, TxHash};

#[derive(Debug)]
struct MockState {
    chain: ChainId,
    accounts: Vec<Address>,
    started: bool,
    end_timestamp: u64,
    owner: Address,
    minted: u64,
    fail_started: bool,
    fail_end: bool,
    fail_owner: bool,
    fail_minted: bool,
    revert_writes: bool,
    revert_at_confirm: bool,
    account_prompts: u64,
    read_calls: u64,
    write_calls: u64,
    last_payment: Option<u128>,
}

/// In-memory wallet provider + sale contract.
#[derive(Clone)]
pub struct MockChain {
    state: Arc<Mutex<MockState>>,
    read_gate: Arc<watch::Sender<bool>>,
    write_gate: Arc<watch::Sender<bool>>,
}

impl MockChain {
    pub fn new(chain: ChainId) -> Self {
        let (read_gate, _) = watch::channel(true);
        let (write_gate, _) = watch::channel(true);
        Self {
            state: Arc::new(Mutex::new(MockState {
                chain,
                accounts: Vec::new(),
                started: false,
                end_timestamp: 0,
                owner: zero_address(),
                minted: 0,
                fail_started: false,
                fail_end: false,
                fail_owner: false,
                fail_minted: false,
                revert_writes: false,
                revert_at_confirm: false,
                account_prompts: 0,
                read_calls: 0,
                write_calls: 0,
                last_payment: None,
            })),
            read_gate: Arc::new(read_gate),
            write_gate: Arc::new(write_gate),
        }
    }

    pub fn provider(&self) -> Arc<dyn WalletProvider> {
        Arc::new(self.clone())
    }

    pub fn contract(&self) -> Arc<dyn SaleContract> {
        Arc::new(self.clone())
    }

    // ── state knobs ────────────────────────────────────────────────────────

    pub async fn set_chain(&self, chain: ChainId) {
        self.state.lock().await.chain = chain;
    }

    pub async fn set_accounts(&self, accounts: Vec<Address>) {
        self.state.lock().await.accounts = accounts;
    }

    pub async fn set_started(&self, started: bool) {
        self.state.lock().await.started = started;
    }

    pub async fn set_end(&self, end_timestamp: u64) {
        self.state.lock().await.end_timestamp = end_timestamp;
    }

    pub async fn set_owner(&self, owner: Address) {
        self.state.lock().await.owner = owner;
    }

    pub async fn set_minted(&self, minted: u64) {
        self.state.lock().await.minted = minted;
    }

    // ── failure injection ──────────────────────────────────────────────────

    pub async fn fail_started(&self, fail: bool) {
        self.state.lock().await.fail_started = fail;
    }

    pub async fn fail_end(&self, fail: bool) {
        self.state.lock().await.fail_end = fail;
    }

    pub async fn fail_owner(&self, fail: bool) {
        self.state.lock().await.fail_owner = fail;
    }

    pub async fn fail_minted(&self, fail: bool) {
        self.state.lock().await.fail_minted = fail;
    }

    /// Make every write revert at submission.
    pub async fn revert_writes(&self, revert: bool) {
        self.state.lock().await.revert_writes = revert;
    }

    /// Make writes submit fine but mine with a failure status, so the
    /// revert only surfaces on confirmation.
    pub async fn revert_at_confirm(&self, revert: bool) {
        self.state.lock().await.revert_at_confirm = revert;
    }

    /// Keep subsequent reads unsettled until [`MockChain::release_reads`].
    /// The read is counted and its result snapshotted at entry; only the
    /// return is delayed.
    pub async fn hold_reads(&self) {
        self.read_gate.send_replace(false);
    }

    pub async fn release_reads(&self) {
        self.read_gate.send_replace(true);
    }

    /// Keep subsequent writes unsettled until [`MockChain::release_writes`].
    pub async fn hold_writes(&self) {
        self.write_gate.send_replace(false);
    }

    pub async fn release_writes(&self) {
        self.write_gate.send_replace(true);
    }

    // ── observation ────────────────────────────────────────────────────────

    pub async fn account_prompts(&self) -> u64 {
        self.state.lock().await.account_prompts
    }

    pub async fn read_calls(&self) -> u64 {
        self.state.lock().await.read_calls
    }

    pub async fn write_calls(&self) -> u64 {
        self.state.lock().await.write_calls
    }

    /// Payment attached to the most recent mint write.
    pub async fn last_payment(&self) -> Option<u128> {
        self.state.lock().await.last_payment
    }

    // ── internals ──────────────────────────────────────────────────────────

    async fn read<T>(&self, fail: impl Fn(&MockState) -> bool, value: impl Fn(&MockState) -> T) -> Result<T> {
        let outcome = {
            let mut state = self.state.lock().await;
            state.read_calls += 1;
            if fail(&state) {
                Err(MintError::RpcUnavailable("injected read failure".into()))
            } else {
                Ok(value(&state))
            }
        };
        wait_for_gate(&self.read_gate).await;
        outcome
    }

    async fn begin_write(&self, payment: Option<u128>) -> Result<u64> {
        let mut state = self.state.lock().await;
        state.write_calls += 1;
        if payment.is_some() {
            state.last_payment = payment;
        }
        let seq = state.write_calls;
        let revert = state.revert_writes;
        drop(state);

        wait_for_gate(&self.write_gate).await;
        if revert {
            return Err(MintError::TransactionReverted(
                "execution reverted (injected)".into(),
            ));
        }
        Ok(seq)
    }

    /// A transaction that will mine with a failure status changes no state.
    async fn apply_mint(&self) {
        let mut state = self.state.lock().await;
        if !state.revert_at_confirm {
            state.minted += 1;
        }
    }
}

async fn wait_for_gate(gate: &watch::Sender<bool>) {
    let mut rx = gate.subscribe();
    while !*rx.borrow() {
        if rx.changed().await.is_err() {
            break;
        }
    }
}

fn zero_address() -> Address {
    Address::new("0x0000000000000000000000000000000000000000").expect("static address")
}

fn mock_tx(seq: u64) -> TxHash {
    TxHash(format!("0x{seq:064x}"))
}

#[async_trait]
impl WalletProvider for MockChain {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let mut state = self.state.lock().await;
        state.account_prompts += 1;
        Ok(state.accounts.clone())
    }

    async fn chain_id(&self) -> Result<ChainId> {
        Ok(self.state.lock().await.chain)
    }
}

#[async_trait]
impl SaleContract for MockChain {
    async fn presale_started(&self) -> Result<bool> {
        self.read(|s| s.fail_started, |s| s.started).await
    }

    async fn presale_end(&self) -> Result<u64> {
        self.read(|s| s.fail_end, |s| s.end_timestamp).await
    }

    async fn owner(&self) -> Result<Address> {
        self.read(|s| s.fail_owner, |s| s.owner.clone()).await
    }

    async fn minted_count(&self) -> Result<u64> {
        self.read(|s| s.fail_minted, |s| s.minted).await
    }

    async fn start_presale(&self, _from: &Address) -> Result<TxHash> {
        let seq = self.begin_write(None).await?;
        let mut state = self.state.lock().await;
        state.started = true;
        state.end_timestamp = unix_now() + 3600;
        Ok(mock_tx(seq))
    }

    async fn presale_mint(&self, _from: &Address, value_wei: u128) -> Result<TxHash> {
        let seq = self.begin_write(Some(value_wei)).await?;
        self.apply_mint().await;
        Ok(mock_tx(seq))
    }

    async fn public_mint(&self, _from: &Address, value_wei: u128) -> Result<TxHash> {
        let seq = self.begin_write(Some(value_wei)).await?;
        self.apply_mint().await;
        Ok(mock_tx(seq))
    }

    async fn confirm(&self, _tx: &TxHash) -> Result<()> {
        if self.state.lock().await.revert_at_confirm {
            return Err(MintError::TransactionReverted(
                "transaction mined with failure status (injected)".into(),
            ));
        }
        Ok(())
    }
}
