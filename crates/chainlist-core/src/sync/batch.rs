//! Planning batch deletes
//!
//! Deleting shifts every later entry down by one, so positions planned from a
//! single snapshot stay valid only if they are deleted from the highest to
//! the lowest.

use crate::models::Snapshot;

/// Positions of completed rows, highest first
pub fn completed_positions(snapshot: &Snapshot) -> Vec<usize> {
    snapshot
        .rows()
        .iter()
        .rev()
        .filter(|row| row.completed)
        .map(|row| row.index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entry;
    use crate::store::{ListStore, LocalLedger};

    fn mixed() -> Vec<Entry> {
        vec![
            Entry::done("a"),
            Entry::new("b"),
            Entry::done("c"),
            Entry::done("d"),
            Entry::new("e"),
        ]
    }

    async fn delete_in_order(ledger: &LocalLedger, positions: &[usize]) {
        for &index in positions {
            let tx = ledger.delete_at(index).await.unwrap();
            // Positions past the end revert; a naive plan hits that too
            let _ = tx.wait_finalized().await;
        }
    }

    #[test]
    fn test_positions_are_descending() {
        let snapshot = Snapshot::from_entries(1, mixed());
        assert_eq!(completed_positions(&snapshot), vec![3, 2, 0]);
    }

    #[test]
    fn test_nothing_completed() {
        let snapshot = Snapshot::from_entries(1, vec![Entry::new("a")]);
        assert!(completed_positions(&snapshot).is_empty());
        assert!(completed_positions(&Snapshot::empty(0)).is_empty());
    }

    #[tokio::test]
    async fn test_descending_plan_removes_exactly_the_completed_rows() {
        let ledger = LocalLedger::with_entries(mixed());
        let snapshot = Snapshot::from_entries(1, ledger.entries());

        delete_in_order(&ledger, &completed_positions(&snapshot)).await;

        assert_eq!(ledger.entries(), vec![Entry::new("b"), Entry::new("e")]);
    }

    #[tokio::test]
    async fn test_ascending_plan_deletes_the_wrong_rows() {
        let ledger = LocalLedger::with_entries(vec![
            Entry::done("a"),
            Entry::new("b"),
            Entry::done("c"),
        ]);
        let snapshot = Snapshot::from_entries(1, ledger.entries());

        let mut ascending = completed_positions(&snapshot);
        ascending.reverse();
        delete_in_order(&ledger, &ascending).await;

        // Deleting 0 shifts "c" to 1 and the stale position 2 is gone
        assert_eq!(ledger.entries(), vec![Entry::new("b"), Entry::done("c")]);
    }

    #[tokio::test]
    async fn test_descending_plan_on_done_open_done() {
        let ledger = LocalLedger::with_entries(vec![
            Entry::done("a"),
            Entry::new("b"),
            Entry::done("c"),
        ]);
        let snapshot = Snapshot::from_entries(1, ledger.entries());

        delete_in_order(&ledger, &completed_positions(&snapshot)).await;

        assert_eq!(ledger.entries(), vec![Entry::new("b")]);
    }
}
