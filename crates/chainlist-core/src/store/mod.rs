//! Remote list store
//!
//! The authoritative list lives behind four operations: append, toggle by
//! position, delete by position, and read everything. Mutations return a
//! `Transaction` whose outcome is only known once it finalizes.
//!
//! ## Backends
//!
//! - `LocalLedger`: in-process ledger, optionally persisted to a JSON file
//! - `RpcLedger`: the deployed TodoList contract over Ethereum JSON-RPC

use std::fmt;

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::Entry;

pub mod local;
pub mod rpc;

pub use local::{Fault, FinalityHold, LedgerCalls, LocalLedger};
pub use rpc::RpcLedger;

/// The three kinds of mutation the store accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Append,
    Toggle,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Append => write!(f, "Append"),
            MutationKind::Toggle => write!(f, "Toggle"),
            MutationKind::Delete => write!(f, "Delete"),
        }
    }
}

/// Proof that a mutation finalized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Backend-specific transaction id (a tx hash for the rpc backend)
    pub tx_id: String,
    /// Block the mutation landed in, when the backend reports one
    pub block: Option<u64>,
}

/// A submitted mutation whose outcome is not yet known
#[async_trait]
pub trait Transaction: Send {
    /// Backend-specific transaction id
    fn id(&self) -> &str;

    /// Wait until the mutation has either taken effect or definitely failed
    ///
    /// Imposes no timeout of its own.
    async fn wait_finalized(self: Box<Self>) -> Result<Receipt, StoreError>;
}

/// The authoritative ordered list
#[async_trait]
pub trait ListStore: Send + Sync {
    async fn append(&self, text: &str) -> Result<Box<dyn Transaction>, StoreError>;

    async fn toggle_at(&self, index: usize) -> Result<Box<dyn Transaction>, StoreError>;

    async fn delete_at(&self, index: usize) -> Result<Box<dyn Transaction>, StoreError>;

    async fn read_all(&self) -> Result<Vec<Entry>, StoreError>;
}
