//! The list synchronizer

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::batch::completed_positions;
use super::phase::{SyncEvent, SyncPhase};
use super::Outcome;
use crate::error::{StoreError, SyncError};
use crate::identity::{IdentityProvider, Session};
use crate::models::{Entry, EntryHandle, Row, Snapshot};
use crate::store::{ListStore, MutationKind, Receipt};
use crate::view::{Drafts, EditDraft, ViewState};

/// One call to the store
#[derive(Debug, Clone, Copy)]
enum Mutation<'a> {
    Append(&'a str),
    Toggle(usize),
    Delete(usize),
}

impl Mutation<'_> {
    fn kind(&self) -> MutationKind {
        match self {
            Mutation::Append(_) => MutationKind::Append,
            Mutation::Toggle(_) => MutationKind::Toggle,
            Mutation::Delete(_) => MutationKind::Delete,
        }
    }
}

struct Inner {
    phase: SyncPhase,
    /// Bumped on every connect and disconnect; work started under an older
    /// epoch never touches state again
    epoch: u64,
    session: Option<Session>,
    snapshot: Arc<Snapshot>,
    /// Snapshot versions are never reused, not even across sessions
    next_version: u64,
    drafts: Drafts,
}

impl Inner {
    fn empty_snapshot(&mut self) -> Arc<Snapshot> {
        let version = self.take_version();
        Arc::new(Snapshot::empty(version))
    }

    fn take_version(&mut self) -> u64 {
        let version = self.next_version;
        self.next_version += 1;
        version
    }
}

/// Keeps the local snapshot in step with the remote list
///
/// All methods take `&self`; share it behind an `Arc` to drive it from
/// spawned tasks.
pub struct ListSynchronizer {
    provider: Arc<dyn IdentityProvider>,
    inner: Mutex<Inner>,
    phase_tx: watch::Sender<SyncPhase>,
    phase_rx: watch::Receiver<SyncPhase>,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<SyncEvent>>>,
}

/// Holds the single mutation slot; returns the phase to `Idle` when dropped
struct BusyGuard<'a> {
    sync: &'a ListSynchronizer,
    epoch: u64,
}

impl BusyGuard<'_> {
    fn advance(&self, phase: SyncPhase) {
        let mut inner = self.sync.lock();
        if inner.epoch == self.epoch {
            self.sync.set_phase(&mut inner, phase);
        }
    }

    fn fail(&self) {
        self.advance(SyncPhase::Failed);
    }

    fn is_current(&self) -> bool {
        self.sync.lock().epoch == self.epoch
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.sync.lock();
        if inner.epoch == self.epoch {
            self.sync.set_phase(&mut inner, SyncPhase::Idle);
        }
    }
}

impl ListSynchronizer {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (phase_tx, phase_rx) = watch::channel(SyncPhase::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Self {
            provider,
            inner: Mutex::new(Inner {
                phase: SyncPhase::Idle,
                epoch: 0,
                session: None,
                snapshot: Arc::new(Snapshot::empty(0)),
                next_version: 1,
                drafts: Drafts::default(),
            }),
            phase_tx,
            phase_rx,
            event_tx,
            event_rx: Mutex::new(Some(event_rx)),
        }
    }

    /// Get the current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase_rx.borrow()
    }

    /// Subscribe to phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase_rx.clone()
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// The current snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.lock().snapshot)
    }

    pub fn identity(&self) -> Option<String> {
        self.lock().session.as_ref().map(|s| s.identity.clone())
    }

    pub fn is_connected(&self) -> bool {
        self.lock().session.is_some()
    }

    /// Project the current state for display
    pub fn view(&self) -> ViewState {
        let inner = self.lock();
        ViewState::project(
            inner.session.as_ref().map(|s| s.identity.as_str()),
            Arc::clone(&inner.snapshot),
            inner.phase,
            &inner.drafts,
        )
    }

    /// Ask the identity provider for access and load the list
    ///
    /// Reconnecting replaces the session and discards the old snapshot once
    /// access is granted. A declined reconnect leaves the current session as is.
    pub async fn connect(&self) -> Result<Outcome, SyncError> {
        // Any current session stays in place until access is granted
        let pending = {
            let mut inner = self.lock();
            if inner.phase.is_busy() {
                return Err(SyncError::Busy(inner.phase));
            }
            self.set_phase(&mut inner, SyncPhase::Connecting);
            BusyGuard {
                sync: self,
                epoch: inner.epoch,
            }
        };

        let session = match self.provider.request_access().await {
            Ok(session) => session,
            Err(e) => {
                warn!("Access request failed: {}", e);
                pending.fail();
                return Err(SyncError::AccessDenied(e));
            }
        };

        let store = Arc::clone(&session.store);
        let guard = {
            let mut inner = self.lock();
            if inner.epoch != pending.epoch {
                return Err(SyncError::SessionEnded);
            }
            self.reset(&mut inner);
            info!(identity = %session.identity, "Connected");
            self.emit(SyncEvent::Connected(session.identity.clone()));
            inner.session = Some(session);
            BusyGuard {
                sync: self,
                epoch: inner.epoch,
            }
        };
        // Stale after the reset, so dropping it leaves the phase alone
        drop(pending);

        self.settle(&guard, &store).await
    }

    /// Drop the session, its snapshot and all drafts
    ///
    /// Allowed while busy: the operation in flight keeps running against the
    /// store but its result is discarded.
    pub fn disconnect(&self) {
        let mut inner = self.lock();
        if inner.phase.is_busy() {
            debug!(phase = %inner.phase, "Disconnecting with an operation in flight");
        }
        self.reset(&mut inner);
        self.set_phase(&mut inner, SyncPhase::Idle);
    }

    /// Read the whole list and replace the snapshot
    ///
    /// On failure the last good snapshot stays in place.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, SyncError> {
        let (guard, store, ()) = self.begin(SyncPhase::Refreshing, |_| Ok(()))?;
        let result = self.reload(&guard, &store).await;
        if result.is_err() {
            guard.fail();
        }
        result
    }

    /// Append an entry; blank text is a no-op
    pub async fn append(&self, text: &str) -> Result<Outcome, SyncError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(Outcome::Noop);
        }

        let (guard, store, ()) = self.begin(SyncPhase::Submitting, |_| Ok(()))?;
        self.run(&guard, &store, Mutation::Append(text)).await?;
        self.with_current(&guard, |inner| inner.drafts.new_item.clear());
        self.settle(&guard, &store).await
    }

    /// Flip the completed flag of the entry a handle points at
    pub async fn toggle_at(&self, handle: EntryHandle) -> Result<Outcome, SyncError> {
        let (guard, store, _) = self.begin_at(handle)?;
        self.run(&guard, &store, Mutation::Toggle(handle.index()))
            .await?;
        self.settle(&guard, &store).await
    }

    /// Delete the entry a handle points at
    pub async fn delete_at(&self, handle: EntryHandle) -> Result<Outcome, SyncError> {
        let (guard, store, _) = self.begin_at(handle)?;
        self.run(&guard, &store, Mutation::Delete(handle.index()))
            .await?;
        self.settle(&guard, &store).await
    }

    /// Replace an entry's text by deleting it and appending the new text
    ///
    /// The edited entry moves to the end of the list and loses its completed
    /// flag. If the delete commits and the append does not, the old text is
    /// gone: that is reported as `CompositeFailure`.
    pub async fn edit_at(
        &self,
        handle: EntryHandle,
        new_text: &str,
    ) -> Result<Outcome, SyncError> {
        let new_text = new_text.trim();
        if new_text.is_empty() {
            return Err(SyncError::EmptyText);
        }

        let (guard, store, old) = self.begin_at(handle)?;
        self.run(&guard, &store, Mutation::Delete(handle.index()))
            .await?;

        match self.commit(&guard, &store, Mutation::Append(new_text)).await {
            Ok(_) if guard.is_current() => self.settle(&guard, &store).await,
            Ok(_) => Err(SyncError::SessionEnded),
            Err(source) => {
                warn!(
                    old = %old.text,
                    new = %new_text,
                    "Edit deleted the entry but the append failed: {}",
                    source
                );
                if guard.is_current() {
                    if let Err(e) = self.reload(&guard, &store).await {
                        warn!("Could not re-read the list after a failed edit: {}", e);
                    }
                }
                guard.fail();
                Err(SyncError::CompositeFailure {
                    old_text: old.text,
                    new_text: new_text.to_string(),
                    source,
                })
            }
        }
    }

    /// Delete every completed entry, highest position first
    pub async fn clear_completed(&self) -> Result<Outcome, SyncError> {
        let (guard, store, positions) =
            self.begin(SyncPhase::Submitting, |snapshot| Ok(completed_positions(snapshot)))?;
        if positions.is_empty() {
            return Ok(Outcome::Noop);
        }

        let planned = positions.len();
        debug!(?positions, "Clearing completed entries");
        for (deleted, index) in positions.into_iter().enumerate() {
            if let Err(source) = self.commit(&guard, &store, Mutation::Delete(index)).await {
                if !guard.is_current() {
                    return Err(SyncError::SessionEnded);
                }
                warn!(deleted, planned, "Clear completed interrupted: {}", source);
                if let Err(e) = self.reload(&guard, &store).await {
                    warn!("Could not re-read the list after an interrupted clear: {}", e);
                }
                guard.fail();
                return Err(SyncError::BatchInterrupted {
                    deleted,
                    planned,
                    source,
                });
            }
            if !guard.is_current() {
                return Err(SyncError::SessionEnded);
            }
        }

        self.settle(&guard, &store).await
    }

    pub fn new_draft(&self) -> String {
        self.lock().drafts.new_item.clone()
    }

    pub fn set_new_draft(&self, text: impl Into<String>) {
        self.lock().drafts.new_item = text.into();
    }

    /// Append the new-item draft; it is cleared once the append finalizes
    pub async fn submit_draft(&self) -> Result<Outcome, SyncError> {
        let text = self.new_draft();
        self.append(&text).await
    }

    /// Start editing the entry a handle points at, prefilled with its text
    pub fn begin_edit(&self, handle: EntryHandle) -> Result<(), SyncError> {
        let mut inner = self.lock();
        let row = resolve(&inner.snapshot, handle)?;
        inner.drafts.edit = Some(EditDraft {
            target: handle,
            text: row.text,
        });
        Ok(())
    }

    /// Replace the edit draft's text; false when nothing is being edited
    pub fn set_edit_text(&self, text: impl Into<String>) -> bool {
        match self.lock().drafts.edit.as_mut() {
            Some(draft) => {
                draft.text = text.into();
                true
            }
            None => false,
        }
    }

    pub fn cancel_edit(&self) {
        self.lock().drafts.edit = None;
    }

    /// Apply the edit draft
    pub async fn submit_edit(&self) -> Result<Outcome, SyncError> {
        let draft = self.lock().drafts.edit.clone();
        match draft {
            Some(draft) => self.edit_at(draft.target, &draft.text).await,
            None => Ok(Outcome::Noop),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.event_tx.send(event);
    }

    fn set_phase(&self, inner: &mut Inner, phase: SyncPhase) {
        if inner.phase == phase {
            return;
        }
        inner.phase = phase;
        self.phase_tx.send_replace(phase);
        self.emit(SyncEvent::PhaseChanged(phase));
    }

    /// Forget the session; anything still running under it is orphaned
    fn reset(&self, inner: &mut Inner) {
        inner.epoch += 1;
        if let Some(session) = inner.session.take() {
            info!(identity = %session.identity, "Disconnected");
            self.emit(SyncEvent::Disconnected);
        }
        inner.snapshot = inner.empty_snapshot();
        inner.drafts = Drafts::default();
    }

    /// Claim the mutation slot
    ///
    /// `plan` sees the snapshot under the same lock that claims the slot, so
    /// anything it derives is consistent with the snapshot the operation
    /// starts from.
    fn begin<T>(
        &self,
        phase: SyncPhase,
        plan: impl FnOnce(&Snapshot) -> Result<T, SyncError>,
    ) -> Result<(BusyGuard<'_>, Arc<dyn ListStore>, T), SyncError> {
        let mut inner = self.lock();
        if inner.phase.is_busy() {
            debug!(phase = %inner.phase, "Rejected: another operation is in progress");
            return Err(SyncError::Busy(inner.phase));
        }
        let store = inner
            .session
            .as_ref()
            .map(|s| Arc::clone(&s.store))
            .ok_or(SyncError::NotConnected)?;
        let planned = plan(&inner.snapshot)?;

        self.set_phase(&mut inner, phase);
        let guard = BusyGuard {
            sync: self,
            epoch: inner.epoch,
        };
        drop(inner);
        Ok((guard, store, planned))
    }

    fn begin_at(
        &self,
        handle: EntryHandle,
    ) -> Result<(BusyGuard<'_>, Arc<dyn ListStore>, Row), SyncError> {
        self.begin(SyncPhase::Submitting, |snapshot| resolve(snapshot, handle))
    }

    /// Submit one mutation and wait for it to finalize
    async fn commit(
        &self,
        guard: &BusyGuard<'_>,
        store: &Arc<dyn ListStore>,
        mutation: Mutation<'_>,
    ) -> Result<Receipt, StoreError> {
        guard.advance(SyncPhase::Submitting);
        let tx = match mutation {
            Mutation::Append(text) => store.append(text).await?,
            Mutation::Toggle(index) => store.toggle_at(index).await?,
            Mutation::Delete(index) => store.delete_at(index).await?,
        };
        debug!(kind = %mutation.kind(), tx = %tx.id(), "Submitted");

        guard.advance(SyncPhase::Finalizing);
        let receipt = tx.wait_finalized().await?;
        debug!(kind = %mutation.kind(), tx = %receipt.tx_id, block = ?receipt.block, "Finalized");
        Ok(receipt)
    }

    /// `commit`, with failures turned into `SyncError`
    async fn run(
        &self,
        guard: &BusyGuard<'_>,
        store: &Arc<dyn ListStore>,
        mutation: Mutation<'_>,
    ) -> Result<Receipt, SyncError> {
        let kind = mutation.kind();
        match self.commit(guard, store, mutation).await {
            Ok(_) if !guard.is_current() => Err(SyncError::SessionEnded),
            Ok(receipt) => Ok(receipt),
            Err(_) if !guard.is_current() => Err(SyncError::SessionEnded),
            Err(source) => {
                warn!("{} failed: {}", kind, source);
                guard.fail();
                Err(SyncError::MutationRejected { kind, source })
            }
        }
    }

    /// Refresh after a committed mutation
    async fn settle(
        &self,
        guard: &BusyGuard<'_>,
        store: &Arc<dyn ListStore>,
    ) -> Result<Outcome, SyncError> {
        match self.reload(guard, store).await {
            Ok(snapshot) => Ok(Outcome::Applied { snapshot }),
            Err(SyncError::SessionEnded) => Err(SyncError::SessionEnded),
            Err(e) => {
                guard.fail();
                Ok(Outcome::Unrefreshed(e))
            }
        }
    }

    async fn reload(
        &self,
        guard: &BusyGuard<'_>,
        store: &Arc<dyn ListStore>,
    ) -> Result<Arc<Snapshot>, SyncError> {
        guard.advance(SyncPhase::Refreshing);
        match store.read_all().await {
            Ok(entries) => self.install(guard.epoch, entries),
            Err(_) if !guard.is_current() => Err(SyncError::SessionEnded),
            Err(e) => {
                warn!("Failed to read the list: {}", e);
                Err(SyncError::ReadFailure(e))
            }
        }
    }

    /// Swap in a freshly read snapshot
    fn install(&self, epoch: u64, entries: Vec<Entry>) -> Result<Arc<Snapshot>, SyncError> {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            debug!("Discarding a read from an ended session");
            return Err(SyncError::SessionEnded);
        }

        let version = inner.take_version();
        let snapshot = Arc::new(Snapshot::from_entries(version, entries));
        inner.snapshot = Arc::clone(&snapshot);
        inner.drafts.edit = None;

        info!(version, rows = snapshot.len(), "List refreshed");
        self.emit(SyncEvent::SnapshotReplaced {
            version,
            len: snapshot.len(),
        });
        Ok(snapshot)
    }

    fn with_current(&self, guard: &BusyGuard<'_>, f: impl FnOnce(&mut Inner)) {
        let mut inner = self.lock();
        if inner.epoch == guard.epoch {
            f(&mut inner);
        }
    }
}

fn resolve(snapshot: &Snapshot, handle: EntryHandle) -> Result<Row, SyncError> {
    snapshot
        .resolve(handle)
        .cloned()
        .ok_or(SyncError::StaleHandle {
            handle,
            current_version: snapshot.version(),
        })
}
