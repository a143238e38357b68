//! In-process ledger
//!
//! Behaves like the TodoList contract: a submitted mutation does nothing
//! until it finalizes, toggles and deletes past the end of the list revert at
//! finalization, and deletes shift every later entry down by one.
//!
//! The ledger can be persisted to a JSON file (atomic write: temp file, then
//! rename) so the CLI has something to talk to without a node. For tests it
//! exposes fault injection, a finality hold, and per-operation call counters.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

use super::{ListStore, MutationKind, Receipt, Transaction};
use crate::error::StoreError;
use crate::models::Entry;

/// A failure to inject into the next matching call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Refuse the submission of the next mutation of this kind
    RejectSubmit(MutationKind),
    /// Let the next mutation of this kind submit, then revert at finalization
    Revert(MutationKind),
    /// Fail the next read
    FailRead,
}

/// How many times each store operation has been called
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCalls {
    pub appends: usize,
    pub toggles: usize,
    pub deletes: usize,
    pub reads: usize,
}

impl LedgerCalls {
    pub fn mutations(&self) -> usize {
        self.appends + self.toggles + self.deletes
    }

    pub fn total(&self) -> usize {
        self.mutations() + self.reads
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct LedgerState {
    height: u64,
    entries: Vec<Entry>,
}

#[derive(Debug, Clone)]
enum Op {
    Append(String),
    Toggle(usize),
    Delete(usize),
}

impl Op {
    fn kind(&self) -> MutationKind {
        match self {
            Op::Append(_) => MutationKind::Append,
            Op::Toggle(_) => MutationKind::Toggle,
            Op::Delete(_) => MutationKind::Delete,
        }
    }
}

struct Shared {
    state: Mutex<LedgerState>,
    faults: Mutex<Vec<Fault>>,
    calls: Mutex<LedgerCalls>,
    /// `true` while finalization is held back
    hold: watch::Sender<bool>,
    path: Option<PathBuf>,
}

/// In-process stand-in for the TodoList contract
#[derive(Clone)]
pub struct LocalLedger {
    shared: Arc<Shared>,
    finality_delay: Duration,
}

impl LocalLedger {
    /// An empty ledger that lives only in memory
    pub fn in_memory() -> Self {
        Self::with_entries(Vec::new())
    }

    /// An in-memory ledger pre-filled with entries
    pub fn with_entries(entries: Vec<Entry>) -> Self {
        Self::from_state(LedgerState { height: 0, entries }, None)
    }

    /// Open a file-backed ledger, creating an empty one if the file is missing
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let state = if path.exists() {
            let json = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read ledger from {:?}", path))?;
            serde_json::from_str(&json)
                .with_context(|| format!("Failed to parse ledger from {:?}", path))?
        } else {
            LedgerState::default()
        };
        Ok(Self::from_state(state, Some(path)))
    }

    fn from_state(state: LedgerState, path: Option<PathBuf>) -> Self {
        let (hold, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                faults: Mutex::new(Vec::new()),
                calls: Mutex::new(LedgerCalls::default()),
                hold,
                path,
            }),
            finality_delay: Duration::ZERO,
        }
    }

    /// Make every transaction take at least `delay` to finalize
    pub fn with_finality_delay(mut self, delay: Duration) -> Self {
        self.finality_delay = delay;
        self
    }

    /// Current entries, read directly (not counted as a store call)
    pub fn entries(&self) -> Vec<Entry> {
        lock(&self.shared.state).entries.clone()
    }

    /// Number of finalized mutations so far
    pub fn height(&self) -> u64 {
        lock(&self.shared.state).height
    }

    pub fn calls(&self) -> LedgerCalls {
        *lock(&self.shared.calls)
    }

    /// Queue a fault; each fault fires once, on the first matching call
    pub fn inject(&self, fault: Fault) {
        lock(&self.shared.faults).push(fault);
    }

    /// Hold back finalization of every transaction until the hold is released
    pub fn hold_finality(&self) -> FinalityHold {
        self.shared.hold.send_replace(true);
        FinalityHold {
            shared: Arc::clone(&self.shared),
        }
    }

    fn take_fault(&self, wanted: &Fault) -> bool {
        let mut faults = lock(&self.shared.faults);
        match faults.iter().position(|f| f == wanted) {
            Some(pos) => {
                faults.remove(pos);
                true
            }
            None => false,
        }
    }

    fn submit(&self, op: Op) -> Result<Box<dyn Transaction>, StoreError> {
        let kind = op.kind();
        {
            let mut calls = lock(&self.shared.calls);
            match kind {
                MutationKind::Append => calls.appends += 1,
                MutationKind::Toggle => calls.toggles += 1,
                MutationKind::Delete => calls.deletes += 1,
            }
        }

        if self.take_fault(&Fault::RejectSubmit(kind)) {
            return Err(StoreError::Rejected(format!("{} refused by ledger", kind)));
        }

        let id = format!("local-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
        debug!(tx = %id, ?op, "Local ledger accepted transaction");

        Ok(Box::new(LocalTransaction {
            ledger: self.clone(),
            id,
            op,
        }))
    }

    /// Apply a finalized mutation and persist the result
    fn apply(&self, op: &Op) -> Result<u64, StoreError> {
        let mut state = lock(&self.shared.state);
        let mut next = state.clone();

        match op {
            Op::Append(text) => next.entries.push(Entry::new(text.clone())),
            Op::Toggle(index) => {
                let entry = next
                    .entries
                    .get_mut(*index)
                    .ok_or_else(|| out_of_bounds(*index, state.entries.len()))?;
                entry.completed = !entry.completed;
            }
            Op::Delete(index) => {
                if *index >= next.entries.len() {
                    return Err(out_of_bounds(*index, state.entries.len()));
                }
                next.entries.remove(*index);
            }
        }
        next.height += 1;

        if let Some(ref path) = self.shared.path {
            let json = serde_json::to_vec_pretty(&next)
                .map_err(|e| StoreError::Transport(format!("Failed to encode ledger: {}", e)))?;
            atomic_write(path, &json).map_err(|e| StoreError::Transport(format!("{:#}", e)))?;
        }

        *state = next;
        Ok(state.height)
    }
}

#[async_trait]
impl ListStore for LocalLedger {
    async fn append(&self, text: &str) -> Result<Box<dyn Transaction>, StoreError> {
        self.submit(Op::Append(text.to_string()))
    }

    async fn toggle_at(&self, index: usize) -> Result<Box<dyn Transaction>, StoreError> {
        self.submit(Op::Toggle(index))
    }

    async fn delete_at(&self, index: usize) -> Result<Box<dyn Transaction>, StoreError> {
        self.submit(Op::Delete(index))
    }

    async fn read_all(&self) -> Result<Vec<Entry>, StoreError> {
        lock(&self.shared.calls).reads += 1;

        if self.take_fault(&Fault::FailRead) {
            return Err(StoreError::Transport("ledger unavailable".to_string()));
        }
        Ok(self.entries())
    }
}

struct LocalTransaction {
    ledger: LocalLedger,
    id: String,
    op: Op,
}

#[async_trait]
impl Transaction for LocalTransaction {
    fn id(&self) -> &str {
        &self.id
    }

    async fn wait_finalized(self: Box<Self>) -> Result<Receipt, StoreError> {
        let mut hold = self.ledger.shared.hold.subscribe();
        // The sender lives in the ledger we hold, so this only ends on release
        let _ = hold.wait_for(|held| !*held).await;

        if !self.ledger.finality_delay.is_zero() {
            tokio::time::sleep(self.ledger.finality_delay).await;
        }

        if self.ledger.take_fault(&Fault::Revert(self.op.kind())) {
            return Err(StoreError::Reverted(format!(
                "{} reverted by ledger",
                self.op.kind()
            )));
        }

        let block = self.ledger.apply(&self.op)?;
        debug!(tx = %self.id, block, "Local ledger finalized transaction");

        Ok(Receipt {
            tx_id: self.id,
            block: Some(block),
        })
    }
}

/// Keeps finalization held until released or dropped
pub struct FinalityHold {
    shared: Arc<Shared>,
}

impl FinalityHold {
    pub fn release(self) {}
}

impl Drop for FinalityHold {
    fn drop(&mut self) {
        self.shared.hold.send_replace(false);
    }
}

fn out_of_bounds(index: usize, len: usize) -> StoreError {
    StoreError::Reverted(format!("index {} out of bounds for {} entries", index, len))
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file = File::create(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(data)
        .with_context(|| format!("Failed to write to temp file {:?}", temp_path))?;

    file.sync_all()
        .with_context(|| format!("Failed to sync temp file {:?}", temp_path))?;

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn finalize(tx: Box<dyn Transaction>) -> Result<Receipt, StoreError> {
        tx.wait_finalized().await
    }

    #[tokio::test]
    async fn test_mutation_applies_only_at_finalization() {
        let ledger = LocalLedger::in_memory();

        let tx = ledger.append("buy milk").await.unwrap();
        assert!(ledger.entries().is_empty());

        let receipt = finalize(tx).await.unwrap();
        assert_eq!(receipt.block, Some(1));
        assert_eq!(ledger.entries(), vec![Entry::new("buy milk")]);
    }

    #[tokio::test]
    async fn test_delete_shifts_later_entries() {
        let ledger = LocalLedger::with_entries(vec![
            Entry::new("a"),
            Entry::new("b"),
            Entry::new("c"),
        ]);

        finalize(ledger.delete_at(0).await.unwrap()).await.unwrap();
        assert_eq!(ledger.entries(), vec![Entry::new("b"), Entry::new("c")]);
    }

    #[tokio::test]
    async fn test_out_of_range_reverts_at_finalization() {
        let ledger = LocalLedger::with_entries(vec![Entry::new("only")]);

        // Submission is accepted, the ledger only checks when it executes
        let tx = ledger.toggle_at(5).await.unwrap();
        let err = finalize(tx).await.unwrap_err();
        assert!(matches!(err, StoreError::Reverted(_)));
        assert_eq!(ledger.height(), 0);
    }

    #[tokio::test]
    async fn test_faults_fire_once() {
        let ledger = LocalLedger::in_memory();
        ledger.inject(Fault::RejectSubmit(MutationKind::Append));
        ledger.inject(Fault::FailRead);

        assert!(matches!(
            ledger.append("x").await.err(),
            Some(StoreError::Rejected(_))
        ));
        assert!(ledger.read_all().await.is_err());

        finalize(ledger.append("x").await.unwrap()).await.unwrap();
        assert_eq!(ledger.read_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_revert_fault_leaves_state_alone() {
        let ledger = LocalLedger::with_entries(vec![Entry::new("a")]);
        ledger.inject(Fault::Revert(MutationKind::Toggle));

        let err = finalize(ledger.toggle_at(0).await.unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Reverted(_)));
        assert_eq!(ledger.entries(), vec![Entry::new("a")]);
    }

    #[tokio::test]
    async fn test_calls_are_counted() {
        let ledger = LocalLedger::with_entries(vec![Entry::new("a")]);
        let _ = ledger.read_all().await;
        let _ = ledger.toggle_at(0).await;
        let _ = ledger.delete_at(0).await;

        let calls = ledger.calls();
        assert_eq!(calls.reads, 1);
        assert_eq!(calls.toggles, 1);
        assert_eq!(calls.deletes, 1);
        assert_eq!(calls.appends, 0);
        assert_eq!(calls.total(), 3);
    }

    #[tokio::test]
    async fn test_hold_blocks_finalization_until_released() {
        let ledger = LocalLedger::in_memory();
        let hold = ledger.hold_finality();

        let tx = ledger.append("held").await.unwrap();
        let pending = tokio::spawn(finalize(tx));

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!pending.is_finished());
        assert!(ledger.entries().is_empty());

        hold.release();
        pending.await.unwrap().unwrap();
        assert_eq!(ledger.entries().len(), 1);
    }

    #[tokio::test]
    async fn test_file_backed_ledger_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");

        {
            let ledger = LocalLedger::open(&path).unwrap();
            finalize(ledger.append("persisted").await.unwrap())
                .await
                .unwrap();
            finalize(ledger.toggle_at(0).await.unwrap()).await.unwrap();
        }

        let reopened = LocalLedger::open(&path).unwrap();
        assert_eq!(reopened.entries(), vec![Entry::done("persisted")]);
        assert_eq!(reopened.height(), 2);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_open_rejects_corrupt_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("ledger.json");
        fs::write(&path, "not json").unwrap();

        let err = LocalLedger::open(&path).err().unwrap();
        assert!(format!("{:#}", err).contains("Failed to parse ledger"));
    }
}
