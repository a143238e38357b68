//! Synchronizer phase and events

use std::fmt;

use serde::Serialize;

/// What the synchronizer is doing right now
///
/// Exactly one mutating sequence can be in flight. Anything other than
/// `Idle` means the slot is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    #[default]
    Idle,
    /// Waiting for the identity provider to grant access
    Connecting,
    /// Handing a mutation to the store
    Submitting,
    /// Waiting for a submitted mutation to finalize
    Finalizing,
    /// Reading the full list
    Refreshing,
    /// The current sequence failed; about to return to `Idle`
    Failed,
}

impl SyncPhase {
    pub fn is_busy(&self) -> bool {
        *self != SyncPhase::Idle
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncPhase::Idle => "idle",
            SyncPhase::Connecting => "connecting",
            SyncPhase::Submitting => "submitting",
            SyncPhase::Finalizing => "finalizing",
            SyncPhase::Refreshing => "refreshing",
            SyncPhase::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

/// Events emitted by the synchronizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    PhaseChanged(SyncPhase),
    /// A new snapshot was installed
    SnapshotReplaced { version: u64, len: usize },
    /// A session was installed for this identity
    Connected(String),
    Disconnected,
}
