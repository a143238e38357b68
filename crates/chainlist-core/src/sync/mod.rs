//! Remote list synchronization
//!
//! `ListSynchronizer` owns the local snapshot of the remote list and is the
//! only thing that talks to the store on behalf of the presentation layer.
//!
//! ## Flow
//!
//! Every mutation runs the same sequence:
//! 1. Validate locally (empty text, busy slot, stale handle)
//! 2. Submit one mutation to the store
//! 3. Wait for it to finalize
//! 4. Read the whole list again and replace the snapshot
//!
//! Results of a mutation are never patched into the local snapshot; the
//! refetch in step 4 is the only way the snapshot changes.
//!
//! ## Usage
//!
//! ```ignore
//! let sync = ListSynchronizer::new(provider);
//! sync.connect().await?;
//! let handle = sync.snapshot().handle(0).unwrap();
//! sync.toggle_at(handle).await?;
//! ```

mod batch;
mod phase;
mod synchronizer;

pub use batch::completed_positions;
pub use phase::{SyncEvent, SyncPhase};
pub use synchronizer::ListSynchronizer;

use std::sync::Arc;

use crate::error::SyncError;
use crate::models::Snapshot;

/// What a successful call left behind
#[derive(Debug)]
pub enum Outcome {
    /// Nothing to do; the store was not contacted
    Noop,
    /// The mutation committed and this snapshot reflects it
    Applied { snapshot: Arc<Snapshot> },
    /// The mutation committed but the list could not be re-read
    Unrefreshed(SyncError),
}

impl Outcome {
    /// The snapshot installed by this call, if any
    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Outcome::Applied { snapshot } => Some(snapshot),
            _ => None,
        }
    }
}
