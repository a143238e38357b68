//! chainlist TUI
//!
//! Terminal user interface over a `ListSynchronizer`.
//!
//! ## Layout
//!
//! - Top: identity, active/completed counts, current phase
//! - Middle: the list, one row per entry
//! - Bottom: status messages or the input line
//!
//! ## Keys
//!
//! - j/k or ↑/↓: Move selection up/down
//! - g/G: First/last entry
//! - a: Add entry
//! - e: Edit entry
//! - space/Enter: Toggle completed
//! - d: Delete entry
//! - c: Clear completed
//! - r: Refresh
//! - o/x: Connect/disconnect
//! - q: Quit
//!
//! Mutations run as spawned tasks; their results come back over a channel.
//! While one is in flight every other mutating key is refused.

mod app;
mod ui;

use std::fs::File;
use std::future::Future;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chainlist_core::{Config, ListSynchronizer, Outcome, SyncError, SyncEvent};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use app::{App, InputMode, TaskDone};

use crate::backend;

/// Run the TUI application
pub async fn run(config: Config) -> Result<()> {
    // Initialize TUI logging (file-based, only if CHAINLIST_LOG is set)
    init_tui_logging(&config);

    let sync = backend::synchronizer(&config)?;
    let mut sync_events = sync.take_events();
    let sync = Arc::new(sync);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = App::new(sync.view());

    // Connect right away; the header shows the phase meanwhile
    spawn_task(&done_tx, "Connected", {
        let sync = Arc::clone(&sync);
        async move { sync.connect().await }
    });

    // Run app
    let result = run_app(
        &mut terminal,
        &mut app,
        &sync,
        &mut sync_events,
        &done_tx,
        &mut done_rx,
    )
    .await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    sync: &Arc<ListSynchronizer>,
    sync_events: &mut Option<mpsc::UnboundedReceiver<SyncEvent>>,
    done_tx: &mpsc::UnboundedSender<TaskDone>,
    done_rx: &mut mpsc::UnboundedReceiver<TaskDone>,
) -> Result<()> {
    loop {
        // Check for status message timeout
        app.check_status_timeout();

        app.update_view(sync.view());
        terminal.draw(|frame| ui::draw(frame, app))?;

        tokio::select! {
            biased;

            // Synchronizer events
            sync_event = async {
                if let Some(ref mut rx) = sync_events {
                    rx.recv().await
                } else {
                    std::future::pending::<Option<SyncEvent>>().await
                }
            } => {
                match sync_event {
                    Some(SyncEvent::Connected(identity)) => {
                        info!("Connected as {}", identity);
                    }
                    Some(SyncEvent::Disconnected) => {
                        app.set_status("Disconnected");
                    }
                    Some(event) => debug!(?event, "Sync event"),
                    // Sender lives in the synchronizer; stop listening if it is gone
                    None => *sync_events = None,
                }
            }

            // Results of spawned operations
            Some(done) = done_rx.recv() => {
                app.finish_task(done);
            }

            // Poll for terminal events
            _ = tokio::time::sleep(Duration::from_millis(50)) => {
                // Check for terminal events (non-blocking)
                if event::poll(Duration::from_millis(0))? {
                    if let Event::Key(key) = event::read()? {
                        // Only handle key press events (not release)
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }

                        // If error modal is showing, any key dismisses it
                        if app.has_error() {
                            app.clear_error();
                            continue;
                        }

                        // If help is showing, any key dismisses it
                        if app.show_help {
                            app.show_help = false;
                            continue;
                        }

                        match app.input_mode {
                            InputMode::Normal => {
                                handle_normal_mode(app, sync, done_tx, key.code, key.modifiers)
                            }
                            InputMode::Add | InputMode::Edit => {
                                handle_input_mode(app, sync, done_tx, key.code)
                            }
                        }
                    }
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Handle key events in normal mode
fn handle_normal_mode(
    app: &mut App,
    sync: &Arc<ListSynchronizer>,
    done_tx: &mpsc::UnboundedSender<TaskDone>,
    code: KeyCode,
    modifiers: KeyModifiers,
) {
    // Clear status message on navigation keys
    if matches!(
        code,
        KeyCode::Char('j' | 'k' | 'g' | 'G') | KeyCode::Up | KeyCode::Down
    ) {
        app.status_message = None;
    }

    match code {
        KeyCode::Char('q') | KeyCode::Esc => app.should_quit = true,
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true
        }
        KeyCode::Char('?') => app.show_help = true,

        KeyCode::Char('j') | KeyCode::Down => app.move_down(),
        KeyCode::Char('k') | KeyCode::Up => app.move_up(),
        KeyCode::Char('g') => app.move_to_first(),
        KeyCode::Char('G') => app.move_to_last(),

        KeyCode::Char('a') => {
            if app.check_idle() {
                app.input_mode = InputMode::Add;
            }
        }
        KeyCode::Char('e') => {
            if !app.check_idle() {
                return;
            }
            let Some(handle) = app.current_handle() else {
                return;
            };
            match sync.begin_edit(handle) {
                Ok(()) => {
                    app.input_mode = InputMode::Edit;
                    app.update_view(sync.view());
                }
                Err(e) => app.set_status(e.to_string()),
            }
        }
        KeyCode::Char(' ') | KeyCode::Enter => {
            if !app.check_idle() {
                return;
            }
            let Some(handle) = app.current_handle() else {
                return;
            };
            let label = match app.current_row() {
                Some(row) if row.completed => format!("Reopened '{}'", row.text),
                Some(row) => format!("Completed '{}'", row.text),
                None => return,
            };
            let sync = Arc::clone(sync);
            spawn_task(done_tx, label, async move { sync.toggle_at(handle).await });
        }
        KeyCode::Char('d') => {
            if !app.check_idle() {
                return;
            }
            let (Some(handle), Some(row)) = (app.current_handle(), app.current_row()) else {
                return;
            };
            let label = format!("Deleted '{}'", row.text);
            let sync = Arc::clone(sync);
            spawn_task(done_tx, label, async move { sync.delete_at(handle).await });
        }
        KeyCode::Char('c') => {
            if !app.check_idle() {
                return;
            }
            if app.view.completed_count == 0 {
                app.set_status("No completed entries");
                return;
            }
            let label = format!("Cleared {} completed", app.view.completed_count);
            let sync = Arc::clone(sync);
            spawn_task(done_tx, label, async move { sync.clear_completed().await });
        }
        KeyCode::Char('r') => {
            if !app.check_idle() {
                return;
            }
            let sync = Arc::clone(sync);
            spawn_task(done_tx, "Refreshed", async move {
                sync.refresh()
                    .await
                    .map(|snapshot| Outcome::Applied { snapshot })
            });
        }
        KeyCode::Char('o') => {
            if app.view.busy {
                app.check_idle();
                return;
            }
            let sync = Arc::clone(sync);
            spawn_task(done_tx, "Connected", async move { sync.connect().await });
        }
        KeyCode::Char('x') => {
            if app.view.connected {
                sync.disconnect();
                app.input_mode = InputMode::Normal;
            }
        }
        _ => {}
    }
}

/// Handle key events while typing a new entry or an edit
fn handle_input_mode(
    app: &mut App,
    sync: &Arc<ListSynchronizer>,
    done_tx: &mpsc::UnboundedSender<TaskDone>,
    code: KeyCode,
) {
    let editing = app.input_mode == InputMode::Edit;

    match code {
        KeyCode::Esc => {
            // The new-item draft is kept for next time; an edit is dropped
            if editing {
                sync.cancel_edit();
            }
            app.input_mode = InputMode::Normal;
        }
        KeyCode::Enter => {
            if !app.check_idle() {
                return;
            }
            let text = app.input_text().trim().to_string();
            app.input_mode = InputMode::Normal;
            let sync = Arc::clone(sync);
            if editing {
                let label = format!("Edited: '{}' moved to the end", text);
                spawn_task(done_tx, label, async move { sync.submit_edit().await });
            } else {
                let label = format!("Added '{}'", text);
                spawn_task(done_tx, label, async move { sync.submit_draft().await });
            }
        }
        KeyCode::Backspace => {
            let mut text = app.input_text().to_string();
            text.pop();
            set_input(sync, editing, text);
        }
        KeyCode::Char(c) => {
            let mut text = app.input_text().to_string();
            text.push(c);
            set_input(sync, editing, text);
        }
        _ => {}
    }

    app.update_view(sync.view());
}

fn set_input(sync: &ListSynchronizer, editing: bool, text: String) {
    if editing {
        sync.set_edit_text(text);
    } else {
        sync.set_new_draft(text);
    }
}

/// Run a synchronizer call in the background and report back when done
fn spawn_task<F>(done_tx: &mpsc::UnboundedSender<TaskDone>, label: impl Into<String>, task: F)
where
    F: Future<Output = Result<Outcome, SyncError>> + Send + 'static,
{
    let done_tx = done_tx.clone();
    let label = label.into();
    tokio::spawn(async move {
        let result = task.await;
        let _ = done_tx.send(TaskDone { label, result });
    });
}

/// Initialize file-based logging for TUI mode
///
/// Only initializes if CHAINLIST_LOG environment variable is set.
/// Logs go to the configured log_file or {data_dir}/debug.log so the
/// terminal is not corrupted.
fn init_tui_logging(config: &Config) {
    let Ok(log_level) = std::env::var("CHAINLIST_LOG") else {
        return;
    };

    let log_path = config.log_path();

    let log_file = match File::create(&log_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not create log file {:?}: {}", log_path, e);
            return;
        }
    };

    let env_filter = EnvFilter::new(format!(
        "chainlist_core={},chainlist_cli={}",
        log_level, log_level
    ));

    // Initialize file-based logging (ignore error if already initialized)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .try_init();

    info!("TUI logging initialized to {:?}", log_path);
}
