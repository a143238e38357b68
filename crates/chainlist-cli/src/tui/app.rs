//! Application state and logic

use std::time::{Duration, Instant};

use chainlist_core::{EntryHandle, Outcome, Row, SyncError, ViewState};

/// Input mode for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    /// Normal navigation mode
    Normal,
    /// Typing a new entry
    Add,
    /// Typing replacement text for the selected entry
    Edit,
}

/// A blocking error shown until the user dismisses it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorModal {
    pub message: String,
    pub notice: Option<String>,
    pub data_loss: bool,
}

/// Result of a spawned synchronizer call
#[derive(Debug)]
pub struct TaskDone {
    /// What to report on success
    pub label: String,
    pub result: Result<Outcome, SyncError>,
}

/// Application state
pub struct App {
    /// Whether the app should exit
    pub should_quit: bool,
    /// Current input mode
    pub input_mode: InputMode,
    /// Latest projection from the synchronizer
    pub view: ViewState,
    /// Currently selected row
    pub selected: usize,
    /// Status message to display temporarily
    pub status_message: Option<String>,
    /// When the status message was set (for auto-dismiss)
    pub status_message_time: Option<Instant>,
    /// Blocking error, if any
    pub error: Option<ErrorModal>,
    /// Whether help overlay is visible
    pub show_help: bool,
}

impl App {
    pub fn new(view: ViewState) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Normal,
            view,
            selected: 0,
            status_message: None,
            status_message_time: None,
            error: None,
            show_help: false,
        }
    }

    /// Take a new projection and keep the selection in range
    ///
    /// Leaves edit mode if the entry being edited is no longer targeted.
    pub fn update_view(&mut self, view: ViewState) {
        self.view = view;
        self.selected = self.selected.min(self.view.rows().len().saturating_sub(1));

        if self.input_mode == InputMode::Edit && self.view.drafts.edit.is_none() {
            self.input_mode = InputMode::Normal;
            self.set_status("Edit cancelled: the list changed");
        }
    }

    /// Set a status message (will auto-dismiss after 3 seconds)
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some(message.into());
        self.status_message_time = Some(Instant::now());
    }

    /// Check and clear expired status message
    pub fn check_status_timeout(&mut self) {
        if let Some(time) = self.status_message_time {
            if time.elapsed() > Duration::from_secs(3) {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Report the result of a spawned call
    pub fn finish_task(&mut self, done: TaskDone) {
        match done.result {
            Ok(Outcome::Applied { .. }) => self.set_status(done.label),
            Ok(Outcome::Noop) => {}
            Ok(Outcome::Unrefreshed(e)) => {
                self.set_status(format!("{}, but the list could not be re-read: {}", done.label, e))
            }
            Err(SyncError::SessionEnded) => {}
            Err(e) if e.is_user_blocking() => {
                self.error = Some(ErrorModal {
                    message: e.to_string(),
                    notice: e.notice().map(str::to_string),
                    data_loss: e.is_data_loss(),
                });
            }
            Err(e) => match e.notice() {
                Some(notice) => self.set_status(format!("{} ({})", e, notice)),
                None => self.set_status(e.to_string()),
            },
        }
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.view.rows().get(self.selected)
    }

    /// Handle for the selected row in the snapshot on screen
    pub fn current_handle(&self) -> Option<EntryHandle> {
        self.view.snapshot.handle(self.selected)
    }

    /// Refuse to start anything while the synchronizer is busy
    pub fn check_idle(&mut self) -> bool {
        if self.view.busy {
            self.set_status(format!("Busy ({}), try again in a moment", self.view.phase));
            return false;
        }
        if !self.view.connected {
            self.set_status("Not connected (press o to connect)");
            return false;
        }
        true
    }

    pub fn move_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        if self.selected < self.view.rows().len().saturating_sub(1) {
            self.selected += 1;
        }
    }

    pub fn move_to_first(&mut self) {
        self.selected = 0;
    }

    pub fn move_to_last(&mut self) {
        self.selected = self.view.rows().len().saturating_sub(1);
    }

    /// Text of the input line in the current mode
    pub fn input_text(&self) -> &str {
        match self.input_mode {
            InputMode::Normal => "",
            InputMode::Add => &self.view.drafts.new_item,
            InputMode::Edit => self
                .view
                .drafts
                .edit
                .as_ref()
                .map(|d| d.text.as_str())
                .unwrap_or(""),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlist_core::{Drafts, EditDraft, Entry, Snapshot, StoreError, SyncPhase};
    use std::sync::Arc;

    fn view(entries: Vec<Entry>, phase: SyncPhase) -> ViewState {
        ViewState::project(
            Some("local"),
            Arc::new(Snapshot::from_entries(1, entries)),
            phase,
            &Drafts::default(),
        )
    }

    fn three() -> Vec<Entry> {
        vec![Entry::new("a"), Entry::done("b"), Entry::new("c")]
    }

    #[test]
    fn test_navigation_stays_in_bounds() {
        let mut app = App::new(view(three(), SyncPhase::Idle));

        app.move_up();
        assert_eq!(app.selected, 0);
        app.move_down();
        app.move_down();
        app.move_down();
        assert_eq!(app.selected, 2);
        app.move_to_first();
        assert_eq!(app.current_row().unwrap().text, "a");
        app.move_to_last();
        assert_eq!(app.current_row().unwrap().text, "c");
    }

    #[test]
    fn test_selection_clamped_when_list_shrinks() {
        let mut app = App::new(view(three(), SyncPhase::Idle));
        app.move_to_last();

        app.update_view(view(vec![Entry::new("a")], SyncPhase::Idle));
        assert_eq!(app.selected, 0);

        app.update_view(view(Vec::new(), SyncPhase::Idle));
        assert_eq!(app.selected, 0);
        assert!(app.current_handle().is_none());
    }

    #[test]
    fn test_busy_refuses_actions() {
        let mut app = App::new(view(three(), SyncPhase::Finalizing));
        assert!(!app.check_idle());
        assert!(app.status_message.as_deref().unwrap().contains("finalizing"));

        app.update_view(view(three(), SyncPhase::Idle));
        assert!(app.check_idle());
    }

    #[test]
    fn test_edit_mode_left_when_draft_cleared() {
        let snapshot = Arc::new(Snapshot::from_entries(1, three()));
        let drafts = Drafts {
            new_item: String::new(),
            edit: Some(EditDraft {
                target: snapshot.handle(0).unwrap(),
                text: "a2".to_string(),
            }),
        };
        let mut app = App::new(ViewState::project(
            Some("local"),
            snapshot,
            SyncPhase::Idle,
            &drafts,
        ));
        app.input_mode = InputMode::Edit;
        assert_eq!(app.input_text(), "a2");

        app.update_view(view(three(), SyncPhase::Idle));
        assert_eq!(app.input_mode, InputMode::Normal);
    }

    #[test]
    fn test_blocking_errors_open_modal() {
        let mut app = App::new(view(three(), SyncPhase::Idle));

        app.finish_task(TaskDone {
            label: "Edited".to_string(),
            result: Err(SyncError::CompositeFailure {
                old_text: "a".to_string(),
                new_text: "a2".to_string(),
                source: StoreError::Reverted("out of gas".to_string()),
            }),
        });
        let modal = app.error.clone().unwrap();
        assert!(modal.data_loss);
        assert!(modal.notice.is_some());

        app.clear_error();
        app.finish_task(TaskDone {
            label: "Refreshed".to_string(),
            result: Err(SyncError::ReadFailure(StoreError::Transport(
                "connection refused".to_string(),
            ))),
        });
        assert!(!app.has_error());
        assert!(app.status_message.is_some());
    }
}
