//! Command history: an arena-backed doubly-linked list with bounded
//! queries, arrow-key navigation and file round-tripping.
//!
//! Nodes live in a grow-only arena and link to each other through
//! optional indices, so the list needs no shared ownership. The walk
//! cursor used by the line editor's up/down keys is itself an optional
//! index into the arena.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history empty")]
    Empty,
    #[error("no new records")]
    NoNewRecords,
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
struct Node {
    line: String,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Default)]
struct Inner {
    arena: Vec<Node>,
    head: Option<usize>,
    tail: Option<usize>,
    /// Total number of entries ever pushed.
    counter: usize,
    /// Entries pushed since the last successful append-to-file.
    new_since_flush: usize,
    /// Walk cursor for up/down navigation; `None` means "below tail".
    cursor: Option<usize>,
}

/// Shared command history. Every accessor takes the one mutex; the walk
/// methods are called from the line editor's key handlers and do no more
/// than a pointer move per key event.
#[derive(Debug, Default)]
pub struct History {
    inner: Mutex<Inner>,
}

impl History {
    /// Append one line at the tail. Empty lines are ignored. Clears the
    /// walk cursor so the next Up starts from the newest entry.
    pub fn push_back(&self, line: &str) {
        if line.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let idx = inner.arena.len();
        let prev = inner.tail;
        inner.arena.push(Node {
            line: line.to_string(),
            prev,
            next: None,
        });
        match prev {
            Some(tail) => inner.arena[tail].next = Some(idx),
            None => inner.head = Some(idx),
        }
        inner.tail = Some(idx);
        inner.counter += 1;
        inner.new_since_flush += 1;
        inner.cursor = None;
    }

    /// Prepend one line at the head. Empty lines are ignored.
    pub fn push_front(&self, line: &str) {
        if line.is_empty() {
            return;
        }
        let mut inner = self.inner.lock().unwrap();
        let idx = inner.arena.len();
        let next = inner.head;
        inner.arena.push(Node {
            line: line.to_string(),
            prev: None,
            next,
        });
        match next {
            Some(head) => inner.arena[head].prev = Some(idx),
            None => inner.tail = Some(idx),
        }
        inner.head = Some(idx);
        inner.counter += 1;
        inner.new_since_flush += 1;
        inner.cursor = None;
    }

    /// Append a block of text line-by-line, split on LF.
    pub fn push_back_block(&self, block: &str) {
        for line in block.split('\n') {
            self.push_back(line);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().counter
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry with its 1-based global position, oldest first.
    pub fn entries(&self) -> Vec<(usize, String)> {
        let inner = self.inner.lock().unwrap();
        inner.collect_forward(inner.head, 1)
    }

    /// The last `min(n, len)` entries with their original positions.
    pub fn last_n(&self, n: usize) -> Vec<(usize, String)> {
        let inner = self.inner.lock().unwrap();
        if n == 0 || inner.tail.is_none() {
            return Vec::new();
        }
        if n >= inner.counter {
            return inner.collect_forward(inner.head, 1);
        }
        // step back n-1 links from the tail, then read forward
        let mut start = inner.tail;
        for _ in 1..n {
            let Some(idx) = start else { break };
            match inner.arena[idx].prev {
                Some(prev) => start = Some(prev),
                None => break,
            }
        }
        inner.collect_forward(start, inner.counter - n + 1)
    }

    /// Up-arrow hook: enter the list at the tail, then keep moving toward
    /// the head; at the head, stay. Returns the line the editor should
    /// show, or `None` when there is nothing to navigate.
    pub fn walk_up(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let next_cursor = match inner.cursor {
            None => inner.tail?,
            Some(idx) => inner.arena[idx].prev.unwrap_or(idx),
        };
        inner.cursor = Some(next_cursor);
        Some(inner.arena[next_cursor].line.clone())
    }

    /// Down-arrow hook: move toward the tail; stepping past it clears the
    /// cursor and hands the editor an empty line.
    pub fn walk_down(&self) -> Option<String> {
        let mut inner = self.inner.lock().unwrap();
        let idx = inner.cursor?;
        match inner.arena[idx].next {
            Some(next) => {
                inner.cursor = Some(next);
                Some(inner.arena[next].line.clone())
            }
            None => {
                inner.cursor = None;
                Some(String::new())
            }
        }
    }

    /// Load a file and append its lines at the tail.
    pub fn read_from_file(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let text = fs::read_to_string(path)?;
        self.push_back_block(&text);
        Ok(())
    }

    /// Overwrite a file with the entire history, one line per entry.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let inner = self.inner.lock().unwrap();
        if inner.head.is_none() {
            return Err(HistoryError::Empty);
        }
        let mut file = fs::File::create(path)?;
        for (_, line) in inner.collect_forward(inner.head, 1) {
            writeln!(file, "{line}")?;
        }
        Ok(())
    }

    /// Append only the entries added since the last successful append (or
    /// since startup); resets the new-records counter on success.
    pub fn append_to_file(&self, path: impl AsRef<Path>) -> Result<(), HistoryError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.new_since_flush == 0 {
            return Err(HistoryError::NoNewRecords);
        }

        // step back to the first unflushed entry
        let fresh = inner.new_since_flush;
        let mut start = inner.tail;
        for _ in 1..fresh {
            let Some(idx) = start else { break };
            match inner.arena[idx].prev {
                Some(prev) => start = Some(prev),
                None => break,
            }
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let first_pos = inner.counter - fresh + 1;
        for (_, line) in inner.collect_forward(start, first_pos) {
            writeln!(file, "{line}")?;
        }
        inner.new_since_flush = 0;
        Ok(())
    }

    /// Forget unflushed entries without writing them; the startup read of
    /// a history file must not be re-appended at shutdown.
    pub fn mark_flushed(&self) {
        self.inner.lock().unwrap().new_since_flush = 0;
    }
}

impl Inner {
    fn collect_forward(&self, from: Option<usize>, first_pos: usize) -> Vec<(usize, String)> {
        let mut out = Vec::new();
        let mut current = from;
        let mut pos = first_pos;
        while let Some(idx) = current {
            out.push((pos, self.arena[idx].line.clone()));
            current = self.arena[idx].next;
            pos += 1;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(lines: &[&str]) -> History {
        let history = History::default();
        for line in lines {
            history.push_back(line);
        }
        history
    }

    #[test]
    fn push_back_is_monotonic_and_ordered() {
        let history = seeded(&["one", "two", "three"]);
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.entries(),
            vec![(1, "one".into()), (2, "two".into()), (3, "three".into())]
        );
    }

    #[test]
    fn empty_lines_are_ignored() {
        let history = seeded(&["one", "", "two"]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn push_front_prepends() {
        let history = seeded(&["b", "c"]);
        history.push_front("a");
        assert_eq!(
            history.entries(),
            vec![(1, "a".into()), (2, "b".into()), (3, "c".into())]
        );
    }

    #[test]
    fn last_n_clamps_to_length() {
        let history = seeded(&["one", "two", "three", "four"]);
        assert_eq!(
            history.last_n(2),
            vec![(3, "three".into()), (4, "four".into())]
        );
        assert_eq!(history.last_n(0), Vec::new());
        assert_eq!(history.last_n(100), history.entries());
    }

    #[test]
    fn walk_up_enters_at_tail_and_stops_at_head() {
        let history = seeded(&["one", "two"]);
        assert_eq!(history.walk_up().as_deref(), Some("two"));
        assert_eq!(history.walk_up().as_deref(), Some("one"));
        assert_eq!(history.walk_up().as_deref(), Some("one"));
    }

    #[test]
    fn walk_down_past_tail_clears_to_empty_line() {
        let history = seeded(&["one", "two"]);
        assert_eq!(history.walk_down(), None);
        history.walk_up();
        history.walk_up();
        assert_eq!(history.walk_down().as_deref(), Some("two"));
        assert_eq!(history.walk_down().as_deref(), Some(""));
        // cursor cleared: the next Up starts at the tail again
        assert_eq!(history.walk_up().as_deref(), Some("two"));
    }

    #[test]
    fn push_resets_the_walk_cursor() {
        let history = seeded(&["one", "two"]);
        history.walk_up();
        history.push_back("three");
        assert_eq!(history.walk_up().as_deref(), Some("three"));
    }

    #[test]
    fn file_round_trip_preserves_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histfile");
        seeded(&["one", "two"]).write_to_file(&path).unwrap();

        let reloaded = History::default();
        reloaded.read_from_file(&path).unwrap();
        assert_eq!(
            reloaded.entries(),
            vec![(1, "one".into()), (2, "two".into())]
        );
    }

    #[test]
    fn write_to_file_refuses_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histfile");
        let err = History::default().write_to_file(&path).unwrap_err();
        assert!(matches!(err, HistoryError::Empty));
        assert!(!path.exists());
    }

    #[test]
    fn append_flushes_only_new_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histfile");
        let history = seeded(&["one", "two"]);

        history.append_to_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");

        // nothing new: the second append is a signalled no-op
        let err = history.append_to_file(&path).unwrap_err();
        assert!(matches!(err, HistoryError::NoNewRecords));
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");

        history.push_back("three");
        history.append_to_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\nthree\n");
    }

    #[test]
    fn mark_flushed_forgets_pending_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("histfile");
        let history = seeded(&["one"]);
        history.mark_flushed();
        assert!(matches!(
            history.append_to_file(&path).unwrap_err(),
            HistoryError::NoNewRecords
        ));
    }
}
