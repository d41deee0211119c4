//! JSON-RPC backend for the wallet and contract seams.
//!
//! Talks plain JSON-RPC 2.0 over HTTP to the wallet provider's endpoint.
//! Signing stays on the provider side (`eth_sendTransaction`), as it does in
//! the browser dapp this client descends from: the client never holds keys.

use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::abi;
use crate::config::ClientConfig;
use crate::error::{MintError, Result};
use crate::provider::{SaleContract, WalletProvider};
use crate::types::{Address, ChainId, TxHash};

/// Interval between receipt polls while waiting for a transaction to mine.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// JSON-RPC 2.0 client bound to one sale contract.
pub struct JsonRpcProvider {
    http: reqwest::Client,
    url: String,
    contract: Address,
    next_id: AtomicU64,
}

impl JsonRpcProvider {
    /// Create a provider from explicit parameters.
    pub fn new(rpc_url: impl Into<String>, contract: Address, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MintError::RpcUnavailable(e.to_string()))?;

        Ok(Self {
            http,
            url: rpc_url.into(),
            contract,
            next_id: AtomicU64::new(1),
        })
    }

    /// Create a provider from a [`ClientConfig`].
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let contract = Address::new(&config.contract_address)?;
        Self::new(config.rpc_url.clone(), contract, config.request_timeout())
    }

    /// The contract this provider is bound to.
    pub fn contract_address(&self) -> &Address {
        &self.contract
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        trace!(method, id, "rpc request");

        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await?;

        let body: Value = response.json().await?;

        if let Some(error) = body.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error")
                .to_string();
            debug!(method, %message, "rpc error");
            return Err(classify_rpc_error(message));
        }

        body.get("result")
            .cloned()
            .ok_or_else(|| MintError::InvalidResponse(format!("{method}: no result field")))
    }

    async fn eth_call(&self, signature: &str) -> Result<String> {
        let result = self
            .request(
                "eth_call",
                json!([
                    { "to": self.contract.as_str(), "data": abi::encode_call(signature) },
                    "latest",
                ]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| MintError::InvalidResponse(format!("{signature}: non-string result")))
    }

    async fn send_transaction(
        &self,
        from: &Address,
        signature: &str,
        value_wei: Option<u128>,
    ) -> Result<TxHash> {
        let mut tx = json!({
            "from": from.as_str(),
            "to": self.contract.as_str(),
            "data": abi::encode_call(signature),
        });
        if let Some(value) = value_wei {
            tx["value"] = Value::String(abi::encode_quantity(value));
        }

        let result = self.request("eth_sendTransaction", json!([tx])).await?;
        let hash = result
            .as_str()
            .ok_or_else(|| MintError::InvalidResponse("non-string tx hash".into()))?;
        Ok(TxHash(hash.to_string()))
    }
}

#[async_trait]
impl WalletProvider for JsonRpcProvider {
    async fn request_accounts(&self) -> Result<Vec<Address>> {
        let result = match self.request("eth_accounts", json!([])).await {
            Ok(v) => v,
            // An unreachable endpoint at connect time means there is no
            // provider to talk to at all.
            Err(MintError::RpcUnavailable(e)) => {
                debug!(error = %e, "provider endpoint unreachable");
                return Err(MintError::NoProviderAvailable);
            }
            Err(e) => return Err(e),
        };

        let accounts = result
            .as_array()
            .ok_or_else(|| MintError::InvalidResponse("eth_accounts: non-array result".into()))?
            .iter()
            .filter_map(Value::as_str)
            .map(Address::new)
            .collect::<Result<Vec<_>>>()?;

        if accounts.is_empty() {
            // The provider is up but exposed no account to us.
            return Err(MintError::ConnectionRejected);
        }
        Ok(accounts)
    }

    async fn chain_id(&self) -> Result<ChainId> {
        let result = self.request("eth_chainId", json!([])).await?;
        let quantity = result
            .as_str()
            .ok_or_else(|| MintError::InvalidResponse("eth_chainId: non-string result".into()))?;
        Ok(ChainId(abi::decode_quantity(quantity)?))
    }
}

#[async_trait]
impl SaleContract for JsonRpcProvider {
    async fn presale_started(&self) -> Result<bool> {
        abi::decode_bool(&self.eth_call("presaleStarted()").await?)
    }

    async fn presale_end(&self) -> Result<u64> {
        abi::decode_u64(&self.eth_call("presaleEnded()").await?)
    }

    async fn owner(&self) -> Result<Address> {
        abi::decode_address(&self.eth_call("owner()").await?)
    }

    async fn minted_count(&self) -> Result<u64> {
        abi::decode_u64(&self.eth_call("tokenIds()").await?)
    }

    async fn start_presale(&self, from: &Address) -> Result<TxHash> {
        self.send_transaction(from, "startPresale()", None).await
    }

    async fn presale_mint(&self, from: &Address, value_wei: u128) -> Result<TxHash> {
        self.send_transaction(from, "presaleMint()", Some(value_wei))
            .await
    }

    async fn public_mint(&self, from: &Address, value_wei: u128) -> Result<TxHash> {
        self.send_transaction(from, "mint()", Some(value_wei)).await
    }

    async fn confirm(&self, tx: &TxHash) -> Result<()> {
        // No overall deadline here: the wallet's confirmation wait has no
        // default timeout (callers may wrap this in one as a hardening
        // measure without changing success/failure semantics).
        loop {
            let result = self
                .request("eth_getTransactionReceipt", json!([tx.0]))
                .await?;

            if result.is_null() {
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
                continue;
            }

            let status = result
                .get("status")
                .and_then(Value::as_str)
                .ok_or_else(|| MintError::InvalidResponse("receipt without status".into()))?;

            return match status {
                "0x1" => Ok(()),
                _ => Err(MintError::TransactionReverted(format!(
                    "transaction {} mined with failure status",
                    tx.0
                ))),
            };
        }
    }
}

/// Map a JSON-RPC error message to the client's error kinds.
fn classify_rpc_error(message: String) -> MintError {
    let lowered = message.to_ascii_lowercase();
    if lowered.contains("revert") {
        MintError::TransactionReverted(message)
    } else if lowered.contains("denied") || lowered.contains("rejected") {
        MintError::ConnectionRejected
    } else {
        MintError::RpcUnavailable(message)
    }
}
