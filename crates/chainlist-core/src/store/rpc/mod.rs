//! TodoList contract over Ethereum JSON-RPC
//!
//! Mutations are sent with `eth_sendTransaction`, so the node must manage the
//! sending account (a local Hardhat or Anvil node does). Finalization is
//! observed by polling `eth_getTransactionReceipt`. Reads use `eth_call` with
//! the account as sender because the contract keeps one list per sender.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{ListStore, Receipt, Transaction};
use crate::error::StoreError;
use crate::models::Entry;

pub mod abi;
pub mod client;

pub use client::{HttpTransport, RpcClient, RpcTransport};

/// The deployed contract, acting as one account
#[derive(Clone)]
pub struct RpcLedger {
    client: RpcClient,
    contract: String,
    from: String,
    poll_interval: Duration,
}

impl RpcLedger {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        contract: impl Into<String>,
        from: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client: RpcClient::new(transport),
            contract: contract.into(),
            from: from.into(),
            poll_interval,
        }
    }

    pub fn account(&self) -> &str {
        &self.from
    }

    pub fn contract(&self) -> &str {
        &self.contract
    }

    async fn send(&self, data: Vec<u8>) -> Result<Box<dyn Transaction>, StoreError> {
        let params = json!([{
            "from": self.from,
            "to": self.contract,
            "data": abi::to_hex(&data),
        }]);

        let hash: String = self
            .client
            .call("eth_sendTransaction", params)
            .await
            .map_err(classify_submit_error)?;
        debug!(tx = %hash, "Submitted transaction");

        Ok(Box::new(RpcTransaction {
            client: self.client.clone(),
            hash,
            poll_interval: self.poll_interval,
        }))
    }
}

#[async_trait]
impl ListStore for RpcLedger {
    async fn append(&self, text: &str) -> Result<Box<dyn Transaction>, StoreError> {
        self.send(abi::encode_add_todo(text)).await
    }

    async fn toggle_at(&self, index: usize) -> Result<Box<dyn Transaction>, StoreError> {
        self.send(abi::encode_toggle_todo(index)).await
    }

    async fn delete_at(&self, index: usize) -> Result<Box<dyn Transaction>, StoreError> {
        self.send(abi::encode_delete_todo(index)).await
    }

    async fn read_all(&self) -> Result<Vec<Entry>, StoreError> {
        let params = json!([
            {
                "from": self.from,
                "to": self.contract,
                "data": abi::to_hex(&abi::encode_get_todos()),
            },
            "latest"
        ]);

        let result: String = self.client.call("eth_call", params).await?;
        abi::decode_todos(&abi::from_hex(&result)?)
    }
}

/// Anything that stops a transaction from being accepted counts as a
/// rejection, except a node that already knows it would revert.
fn classify_submit_error(err: StoreError) -> StoreError {
    match err {
        StoreError::Rpc { code, message } if code == client::USER_REJECTED => {
            StoreError::Rejected(message)
        }
        StoreError::Rpc { message, .. } if message.to_lowercase().contains("revert") => {
            StoreError::Reverted(message)
        }
        StoreError::Rpc { code, message } => {
            StoreError::Rejected(format!("{} (code {})", message, code))
        }
        other => other,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptJson {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    block_number: Option<String>,
}

struct RpcTransaction {
    client: RpcClient,
    hash: String,
    poll_interval: Duration,
}

#[async_trait]
impl Transaction for RpcTransaction {
    fn id(&self) -> &str {
        &self.hash
    }

    async fn wait_finalized(self: Box<Self>) -> Result<Receipt, StoreError> {
        loop {
            // The node already accepted the tx; a failed poll says nothing about its fate
            let receipt: Option<ReceiptJson> = match self
                .client
                .call("eth_getTransactionReceipt", json!([self.hash]))
                .await
            {
                Ok(receipt) => receipt,
                Err(e @ (StoreError::Transport(_) | StoreError::Rpc { .. })) => {
                    warn!(tx = %self.hash, "Receipt poll failed, retrying: {}", e);
                    tokio::time::sleep(self.poll_interval).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let Some(receipt) = receipt else {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            };

            let block = receipt
                .block_number
                .as_deref()
                .map(abi::parse_quantity)
                .transpose()?;

            // Receipts without a status field predate Byzantium and only exist for mined txs
            return match receipt.status.as_deref().map(abi::parse_quantity).transpose()? {
                Some(0) => Err(StoreError::Reverted(format!(
                    "transaction {} reverted in block {}",
                    self.hash,
                    block.map(|b| b.to_string()).unwrap_or_else(|| "?".to_string())
                ))),
                _ => {
                    debug!(tx = %self.hash, ?block, "Transaction finalized");
                    Ok(Receipt {
                        tx_id: self.hash,
                        block,
                    })
                }
            };
        }
    }
}
