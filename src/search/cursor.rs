use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How far the current query has scanned through the document.
///
/// The cursor is a plain value so a session can be inspected or persisted
/// between passes. It only moves forward until [`ScanCursor::reset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ScanCursor {
    /// Number of segments fully scanned
    position: usize,
    /// Document length in segments
    len: usize,
    exhausted: bool,
}

impl ScanCursor {
    /// Fresh cursor at the start of a document of `len` segments
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            len,
            exhausted: len == 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Segments not scanned yet
    pub fn remaining(&self) -> usize {
        self.len.saturating_sub(self.position)
    }

    /// Range the next pass of `window_size` segments covers, without moving
    pub fn next_window(&self, window_size: usize) -> Range<usize> {
        let start = self.position.min(self.len);
        let end = start.saturating_add(window_size.max(1)).min(self.len);
        start..end
    }

    /// Move past the next window. Returns the new position and whether the
    /// end of the document has been reached.
    pub fn advance(&mut self, window_size: usize) -> (usize, bool) {
        self.position = self.next_window(window_size).end;
        self.exhausted = self.position >= self.len;
        (self.position, self.exhausted)
    }

    /// Jump to the end of the document
    pub fn finish(&mut self) {
        self.position = self.len;
        self.exhausted = true;
    }

    /// Back to the start, for a new query or a changed document
    pub fn reset(&mut self, len: usize) {
        *self = Self::new(len);
    }
}
