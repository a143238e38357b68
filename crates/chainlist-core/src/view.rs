//! View state projection
//!
//! `ViewState` is everything a presentation layer needs to draw the list. It
//! is derived from the current snapshot on every projection; the counts are
//! never cached or maintained incrementally.

use std::sync::Arc;

use crate::models::{abbreviate_identity, EntryHandle, Row, Snapshot};
use crate::sync::SyncPhase;

/// Text being edited for an existing entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub target: EntryHandle,
    pub text: String,
}

/// User input that has not been submitted yet
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Drafts {
    /// Text for the next new entry
    pub new_item: String,
    /// At most one entry being edited
    pub edit: Option<EditDraft>,
}

/// Snapshot of everything the UI shows
#[derive(Debug, Clone)]
pub struct ViewState {
    pub connected: bool,
    pub identity: Option<String>,
    pub snapshot: Arc<Snapshot>,
    pub phase: SyncPhase,
    pub busy: bool,
    pub active_count: usize,
    pub completed_count: usize,
    pub drafts: Drafts,
}

impl ViewState {
    /// Derive the view from the synchronizer's state
    pub fn project(
        identity: Option<&str>,
        snapshot: Arc<Snapshot>,
        phase: SyncPhase,
        drafts: &Drafts,
    ) -> Self {
        let counts = snapshot.counts();
        Self {
            connected: identity.is_some(),
            identity: identity.map(str::to_string),
            phase,
            busy: phase.is_busy(),
            active_count: counts.active,
            completed_count: counts.completed,
            drafts: drafts.clone(),
            snapshot,
        }
    }

    pub fn rows(&self) -> &[Row] {
        self.snapshot.rows()
    }

    /// Identity shortened for display, e.g. `0x1234...abcd`
    pub fn short_identity(&self) -> Option<String> {
        self.identity.as_deref().map(abbreviate_identity)
    }

    /// Whether the row at `index` is the one being edited
    pub fn is_editing(&self, index: usize) -> bool {
        self.drafts
            .edit
            .as_ref()
            .is_some_and(|d| d.target.version() == self.snapshot.version() && d.target.index() == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;

    #[test]
    fn test_counts_follow_snapshot() {
        let snapshot = Arc::new(Snapshot::from_entries(
            2,
            vec![Entry::new("a"), Entry::done("b"), Entry::done("c")],
        ));
        let view = ViewState::project(Some("local"), snapshot, SyncPhase::Idle, &Drafts::default());

        assert!(view.connected);
        assert!(!view.busy);
        assert_eq!(view.active_count, 1);
        assert_eq!(view.completed_count, 2);
        assert_eq!(view.rows().len(), 3);
    }

    #[test]
    fn test_disconnected_view() {
        let view = ViewState::project(
            None,
            Arc::new(Snapshot::empty(0)),
            SyncPhase::Idle,
            &Drafts::default(),
        );

        assert!(!view.connected);
        assert_eq!(view.short_identity(), None);
        assert_eq!(view.active_count + view.completed_count, 0);
    }

    #[test]
    fn test_busy_follows_phase() {
        let view = ViewState::project(
            Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            Arc::new(Snapshot::empty(1)),
            SyncPhase::Finalizing,
            &Drafts::default(),
        );

        assert!(view.busy);
        assert_eq!(view.short_identity().as_deref(), Some("0xf39F...2266"));
    }

    #[test]
    fn test_is_editing_matches_current_snapshot_only() {
        let snapshot = Arc::new(Snapshot::from_entries(4, vec![Entry::new("a"), Entry::new("b")]));
        let drafts = Drafts {
            new_item: String::new(),
            edit: Some(EditDraft {
                target: snapshot.handle(1).unwrap(),
                text: "b2".to_string(),
            }),
        };

        let view = ViewState::project(Some("local"), snapshot, SyncPhase::Idle, &drafts);
        assert!(view.is_editing(1));
        assert!(!view.is_editing(0));

        let newer = Arc::new(Snapshot::from_entries(5, vec![Entry::new("a"), Entry::new("b")]));
        let view = ViewState::project(Some("local"), newer, SyncPhase::Idle, &drafts);
        assert!(!view.is_editing(1));
    }
}
