/// Dialogue history — the rewindable log of displayed lines.
///
/// Works like an undo stack with branching: moving the cursor back never
/// mutates the log, and recording a line that diverges from the entry after
/// the cursor discards the abandoned future before appending.

use crate::schema::snapshot::HistoryEntry;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    entries: Vec<HistoryEntry>,
    /// `None` plays the role of index -1: nothing displayed yet.
    cursor: Option<usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts. An out-of-range cursor is clamped to
    /// the last entry.
    pub fn restore(entries: Vec<HistoryEntry>, cursor: Option<usize>) -> Self {
        let last = entries.len().checked_sub(1);
        let cursor = match cursor {
            Some(c) if c < entries.len() => Some(c),
            Some(_) => last,
            None => None,
        };
        Self { entries, cursor }
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    /// The entry under the cursor.
    pub fn current(&self) -> Option<&HistoryEntry> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    pub fn get(&self, idx: usize) -> Option<&HistoryEntry> {
        self.entries.get(idx)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
    }

    /// Record a newly displayed line and move the cursor onto it.
    ///
    /// If the cursor sits before the end of the log and the following entry
    /// is the same scene line, the log is left untouched and the cursor just
    /// steps forward: replaying a recorded path must not fork it. The cursor
    /// then lands on the entry actually shown, not the end of the log (see
    /// "Replaying a recorded line after rewind" in DESIGN.md).
    pub fn record(&mut self, entry: HistoryEntry) -> usize {
        let next = self.cursor.map_or(0, |c| c + 1);

        match self.entries.get(next) {
            Some(existing) if existing.same_position(&entry) => {}
            Some(_) => {
                self.entries.truncate(next);
                self.entries.push(entry);
            }
            None => self.entries.push(entry),
        }

        self.cursor = Some(next);
        next
    }

    /// Step the cursor back one entry. `None` means already at the start.
    pub fn rewind(&mut self) -> Option<&HistoryEntry> {
        match self.cursor {
            Some(c) if c > 0 => {
                self.cursor = Some(c - 1);
                self.entries.get(c - 1)
            }
            _ => None,
        }
    }

    /// Move the cursor to an arbitrary entry. Invalid indices are ignored.
    pub fn jump(&mut self, idx: usize) -> Option<&HistoryEntry> {
        if idx >= self.entries.len() {
            return None;
        }
        self.cursor = Some(idx);
        self.entries.get(idx)
    }
}
