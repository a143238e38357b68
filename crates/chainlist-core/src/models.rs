//! Data models for chainlist
//!
//! `Entry` is what the remote store holds. `Snapshot` is the local, read-only
//! copy of the whole list, replaced wholesale on every reload. Entries have no
//! stable identifier: they are addressed by position, and positions are only
//! meaningful relative to the snapshot they were read from. `EntryHandle`
//! binds a position to that snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A list entry as stored remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub text: String,
    pub completed: bool,
}

impl Entry {
    /// Create an open (not completed) entry
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: false,
        }
    }

    /// Create an entry already marked completed
    pub fn done(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            completed: true,
        }
    }
}

/// One row of a snapshot: an entry together with its position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub index: usize,
    pub text: String,
    pub completed: bool,
}

/// A position bound to the snapshot version it was taken from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    version: u64,
    index: usize,
}

impl EntryHandle {
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

/// Active/completed tallies derived from a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub active: usize,
    pub completed: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.active + self.completed
    }
}

/// Full local copy of the remote list at one point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    version: u64,
    rows: Vec<Row>,
    fetched_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// The empty snapshot a fresh session starts with
    pub fn empty(version: u64) -> Self {
        Self {
            version,
            rows: Vec::new(),
            fetched_at: None,
        }
    }

    /// Build a snapshot from a full read of the store
    pub fn from_entries(version: u64, entries: Vec<Entry>) -> Self {
        let rows = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Row {
                index,
                text: entry.text,
                completed: entry.completed,
            })
            .collect();

        Self {
            version,
            rows,
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// When the rows were read (`None` until the first successful read)
    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Handle for the row at `index`, if there is one
    pub fn handle(&self, index: usize) -> Option<EntryHandle> {
        (index < self.rows.len()).then_some(EntryHandle {
            version: self.version,
            index,
        })
    }

    /// Look up the row a handle points at, if the handle belongs to this snapshot
    pub fn resolve(&self, handle: EntryHandle) -> Option<&Row> {
        if handle.version != self.version {
            return None;
        }
        self.rows.get(handle.index)
    }

    /// Texts in order, mostly useful for assertions and plain output
    pub fn texts(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn counts(&self) -> Counts {
        let completed = self.rows.iter().filter(|r| r.completed).count();
        Counts {
            active: self.rows.len() - completed,
            completed,
        }
    }
}

/// Shorten an account address for display: `0x1234...abcd`
pub fn abbreviate_identity(identity: &str) -> String {
    let chars: Vec<char> = identity.chars().collect();
    if chars.len() <= 10 {
        return identity.to_string();
    }
    let head: String = chars[..6].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Snapshot {
        Snapshot::from_entries(
            7,
            vec![Entry::new("a"), Entry::done("b"), Entry::new("c")],
        )
    }

    #[test]
    fn test_rows_are_indexed_in_order() {
        let snapshot = sample();
        let indices: Vec<usize> = snapshot.rows().iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(snapshot.texts(), vec!["a", "b", "c"]);
        assert!(snapshot.fetched_at().is_some());
    }

    #[test]
    fn test_counts() {
        let counts = sample().counts();
        assert_eq!(counts.active, 2);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.total(), 3);

        assert_eq!(Snapshot::empty(0).counts(), Counts::default());
    }

    #[test]
    fn test_handle_bounds() {
        let snapshot = sample();
        assert!(snapshot.handle(2).is_some());
        assert!(snapshot.handle(3).is_none());
    }

    #[test]
    fn test_resolve_rejects_other_versions() {
        let old = sample();
        let handle = old.handle(1).unwrap();
        assert_eq!(old.resolve(handle).unwrap().text, "b");

        let newer = Snapshot::from_entries(8, vec![Entry::new("a"), Entry::done("b")]);
        assert!(newer.resolve(handle).is_none());
    }

    #[test]
    fn test_abbreviate_identity() {
        assert_eq!(
            abbreviate_identity("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"),
            "0xf39F...2266"
        );
        assert_eq!(abbreviate_identity("local"), "local");
    }
}
