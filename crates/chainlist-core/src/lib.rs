//! chainlist core library
//!
//! A to-do list whose authoritative copy lives in a remote, append-oriented
//! ledger (the `TodoList` contract, or an in-process stand-in). The local
//! side keeps a read-only snapshot and refetches it in full after every
//! write.
//!
//! # Architecture
//!
//! - **Store**: the remote list, addressed by position; writes are
//!   transactions that finalize later
//! - **Synchronizer**: the only writer; one mutating sequence at a time,
//!   full refetch after each
//! - **View**: a pure projection of the current snapshot for display
//!
//! # Quick Start
//!
//! ```text
//! let ledger = LocalLedger::in_memory();
//! let sync = ListSynchronizer::new(Arc::new(LocalIdentity::new("local", ledger)));
//! sync.connect().await?;
//! sync.append("buy milk").await?;
//! let view = sync.view();
//! ```
//!
//! # Modules
//!
//! - `sync`: `ListSynchronizer`, phases and events
//! - `store`: store traits and the local/JSON-RPC backends
//! - `identity`: identity providers and sessions
//! - `view`: view state projection and drafts
//! - `models`: entries, snapshots and handles
//! - `config`: application configuration

pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod store;
pub mod sync;
pub mod view;

pub use config::{Backend, Config};
pub use error::{AccessError, StoreError, SyncError};
pub use identity::{IdentityProvider, LocalIdentity, RpcIdentity, Session};
pub use models::{abbreviate_identity, Counts, Entry, EntryHandle, Row, Snapshot};
pub use store::{ListStore, LocalLedger, MutationKind, Receipt, RpcLedger, Transaction};
pub use sync::{ListSynchronizer, Outcome, SyncEvent, SyncPhase};
pub use view::{Drafts, EditDraft, ViewState};
