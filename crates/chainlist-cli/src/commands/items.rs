//! List command handlers
//!
//! Each command connects, loads the list, binds the position the user gave
//! to that snapshot, and runs one operation.

use anyhow::{anyhow, Result};

use chainlist_core::{Config, EntryHandle, ListSynchronizer, Outcome, SyncError};

use crate::backend;
use crate::output::Output;

/// List all entries
pub async fn list(config: &Config, output: &Output) -> Result<()> {
    let sync = connect(config, output).await?;
    output.print_snapshot(&sync.snapshot());
    Ok(())
}

/// Add an entry
pub async fn add(config: &Config, text: &str, output: &Output) -> Result<()> {
    let sync = connect(config, output).await?;
    let outcome = sync.append(text).await.map_err(|e| report(e, output))?;

    if matches!(outcome, Outcome::Noop) {
        output.message("Nothing to add: text is empty.");
        return Ok(());
    }
    finish(&sync, outcome, &format!("Added '{}'", text.trim()), output)
}

/// Toggle an entry
pub async fn toggle(config: &Config, index: usize, output: &Output) -> Result<()> {
    let sync = connect(config, output).await?;
    let handle = bind(&sync, index)?;
    let was_completed = sync
        .snapshot()
        .resolve(handle)
        .is_some_and(|row| row.completed);

    let outcome = sync.toggle_at(handle).await.map_err(|e| report(e, output))?;
    let verb = if was_completed { "reopened" } else { "completed" };
    finish(&sync, outcome, &format!("Marked entry {} {}", index, verb), output)
}

/// Delete an entry
pub async fn delete(config: &Config, index: usize, output: &Output) -> Result<()> {
    let sync = connect(config, output).await?;
    let handle = bind(&sync, index)?;
    let text = row_text(&sync, handle);

    let outcome = sync.delete_at(handle).await.map_err(|e| report(e, output))?;
    finish(&sync, outcome, &format!("Deleted '{}'", text), output)
}

/// Replace an entry's text
pub async fn edit(config: &Config, index: usize, text: &str, output: &Output) -> Result<()> {
    let sync = connect(config, output).await?;
    let handle = bind(&sync, index)?;
    let old = row_text(&sync, handle);

    let outcome = sync
        .edit_at(handle, text)
        .await
        .map_err(|e| report(e, output))?;
    finish(
        &sync,
        outcome,
        &format!("Replaced '{}' with '{}'", old, text.trim()),
        output,
    )
}

/// Delete every completed entry
pub async fn clear_completed(config: &Config, output: &Output) -> Result<()> {
    let sync = connect(config, output).await?;
    let planned = sync.snapshot().counts().completed;

    let outcome = sync
        .clear_completed()
        .await
        .map_err(|e| report(e, output))?;

    if matches!(outcome, Outcome::Noop) {
        output.message("No completed entries.");
        return Ok(());
    }
    finish(
        &sync,
        outcome,
        &format!("Cleared {} completed entr{}", planned, if planned == 1 { "y" } else { "ies" }),
        output,
    )
}

/// Connect and load the list
///
/// A failed initial read is an error here: there is nothing to act on.
pub(crate) async fn connect(config: &Config, output: &Output) -> Result<ListSynchronizer> {
    let sync = backend::synchronizer(config)?;
    match sync.connect().await.map_err(|e| report(e, output))? {
        Outcome::Unrefreshed(e) => Err(report(e, output)),
        _ => Ok(sync),
    }
}

/// Bind a user-supplied position to the current snapshot
fn bind(sync: &ListSynchronizer, index: usize) -> Result<EntryHandle> {
    let snapshot = sync.snapshot();
    snapshot.handle(index).ok_or_else(|| {
        anyhow!(
            "No entry at position {} (the list has {} entr{})",
            index,
            snapshot.len(),
            if snapshot.len() == 1 { "y" } else { "ies" }
        )
    })
}

fn row_text(sync: &ListSynchronizer, handle: EntryHandle) -> String {
    sync.snapshot()
        .resolve(handle)
        .map(|row| row.text.clone())
        .unwrap_or_default()
}

fn finish(
    sync: &ListSynchronizer,
    outcome: Outcome,
    message: &str,
    output: &Output,
) -> Result<()> {
    match outcome {
        Outcome::Unrefreshed(e) => {
            output.success_unrefreshed(
                message,
                &format!("The change committed but the list could not be re-read: {}", e),
            );
        }
        _ => {
            output.success(message);
            if !output.is_quiet() && !output.is_json() {
                println!();
                output.print_snapshot(&sync.snapshot());
            }
        }
    }
    Ok(())
}

/// Turn a synchronizer error into a command error, printing its notice
fn report(err: SyncError, output: &Output) -> anyhow::Error {
    if let Some(notice) = err.notice() {
        output.warn(notice);
    }
    if err.is_data_loss() {
        output.warn("Data may have been lost.");
    }
    anyhow::Error::new(err)
}
