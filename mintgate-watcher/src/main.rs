//! mintgate-watcher
//!
//! Service that connects to a sale contract and logs its lifecycle.
//!
//! Architecture:
//! 1. Connect a wallet session bound to the configured chain
//! 2. Poll the contract on a fixed interval for phase transitions
//! 3. Log every transition and the running minted count
//! 4. Keep refreshing the minted count after the sale ends

use std::sync::Arc;
use tracing::{error, info};

use mintgate_core::{ClientConfig, JsonRpcProvider, PhaseStateMachine, WalletSession};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mintgate_watcher=info,mintgate_core=info".into()),
        )
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = ClientConfig::from_env()?;

    info!("Starting mintgate-watcher");
    info!("RPC endpoint: {}", config.rpc_url);
    info!("Sale contract: {}", config.contract_address);
    info!("Required chain: {}", config.required_chain_id);

    // Create components
    let rpc = Arc::new(JsonRpcProvider::from_config(&config)?);
    let session = Arc::new(WalletSession::new(
        rpc.clone(),
        rpc,
        config.required_chain(),
    ));

    let address = session.connect().await?;
    info!("Watching as {address}");

    let machine = Arc::new(PhaseStateMachine::new(session, &config));
    machine.begin().await;

    // Spawn the poll loop
    let poller = Arc::clone(&machine);
    let poll_handle = tokio::spawn(async move {
        poller.run().await;
    });

    // Report phase transitions and the running minted count
    let mut state_rx = machine.subscribe();
    let max_supply = config.max_supply;
    let report_handle = tokio::spawn(async move {
        loop {
            if state_rx.changed().await.is_err() {
                error!("state channel closed");
                break;
            }
            let state = state_rx.borrow_and_update().clone();
            info!(
                "{} ({}/{} minted)",
                state.phase.description(),
                state.minted_count,
                max_supply
            );
        }
    });

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutting down watcher...");

    // Cancel tasks
    poll_handle.abort();
    report_handle.abort();

    Ok(())
}
