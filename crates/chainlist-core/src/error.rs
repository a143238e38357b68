//! Error types
//!
//! Three layers:
//! - `StoreError`: what a store backend reports for one call
//! - `AccessError`: why an identity could not be acquired
//! - `SyncError`: what the synchronizer hands to the presentation layer
//!
//! Every remote failure is caught at the synchronizer and turned into a
//! `SyncError`; nothing here is fatal to the process.

use thiserror::Error;

use crate::models::EntryHandle;
use crate::store::MutationKind;
use crate::sync::SyncPhase;

/// Errors reported by a store backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Refused before it reached the ledger (user rejection, bad nonce, ...)
    #[error("Transaction rejected before submission: {0}")]
    Rejected(String),

    /// Reached the ledger but did not take effect
    #[error("Transaction reverted: {0}")]
    Reverted(String),

    /// Could not talk to the backend at all
    #[error("Transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// The backend answered with something we cannot interpret
    #[error("Malformed response: {0}")]
    Decode(String),
}

/// Errors acquiring an identity
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access request was declined")]
    Declined,

    #[error("No identity provider available: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the synchronizer
#[derive(Error, Debug)]
pub enum SyncError {
    /// Identity acquisition refused or impossible
    #[error("Connection required: {0}")]
    AccessDenied(#[from] AccessError),

    #[error("Not connected")]
    NotConnected,

    /// Another operation holds the single mutation slot
    #[error("Another operation is in progress ({0})")]
    Busy(SyncPhase),

    #[error("Entry text must not be empty")]
    EmptyText,

    /// The handle was taken from a snapshot that has since been replaced
    #[error(
        "Entry at position {} refers to list version {} but the current version is {current_version}",
        .handle.index(),
        .handle.version()
    )]
    StaleHandle {
        handle: EntryHandle,
        current_version: u64,
    },

    /// A submitted mutation did not finalize
    #[error("{kind} failed: {source}")]
    MutationRejected {
        kind: MutationKind,
        #[source]
        source: StoreError,
    },

    /// The list could not be read; the last good snapshot is kept
    #[error("Failed to read the list: {0}")]
    ReadFailure(#[source] StoreError),

    /// An edit removed the old entry but could not add the new one
    #[error("Edit lost '{old_text}': it was deleted but adding '{new_text}' failed: {source}")]
    CompositeFailure {
        old_text: String,
        new_text: String,
        #[source]
        source: StoreError,
    },

    /// A batch of deletes stopped partway through
    #[error("Clear completed stopped after {deleted} of {planned} deletes: {source}")]
    BatchInterrupted {
        deleted: usize,
        planned: usize,
        #[source]
        source: StoreError,
    },

    /// The session was dropped while the operation was in flight
    #[error("Session ended before the operation completed")]
    SessionEnded,
}

impl SyncError {
    /// Whether the UI should block on this (modal) rather than show a passing status
    pub fn is_user_blocking(&self) -> bool {
        matches!(
            self,
            SyncError::AccessDenied(_)
                | SyncError::MutationRejected { .. }
                | SyncError::CompositeFailure { .. }
                | SyncError::BatchInterrupted { .. }
        )
    }

    /// Whether the store may have lost user data
    pub fn is_data_loss(&self) -> bool {
        matches!(self, SyncError::CompositeFailure { .. })
    }

    /// A hint for the user, where there is something useful to say
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            SyncError::AccessDenied(_) => {
                Some("Connect a wallet or check that the node is running, then connect again.")
            }
            SyncError::StaleHandle { .. } => {
                Some("The list changed since it was shown. Check the positions and try again.")
            }
            SyncError::CompositeFailure { .. } => {
                Some("The original entry is gone. Add the new text again to restore it.")
            }
            SyncError::BatchInterrupted { .. } => {
                Some("Some completed entries were removed. The list shown is current.")
            }
            SyncError::ReadFailure(_) => Some("Showing the last list that was read successfully."),
            _ => None,
        }
    }
}
