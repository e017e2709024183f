use crate::document::SegmentId;
use crate::search::types::Match;
use rustc_hash::FxHashSet;

/// Matches found so far for the active query, in document order, plus the
/// focused match.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    matches: Vec<Match>,
    seen: FxHashSet<(SegmentId, usize)>,
    /// 0-based index of the focused match
    current: Option<usize>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add matches, dropping any whose `(segment_id, start)` is already
    /// present. Returns how many were added.
    pub fn append(&mut self, matches: impl IntoIterator<Item = Match>) -> usize {
        let mut added = 0;
        for m in matches {
            if !self.seen.insert(m.key()) {
                continue;
            }

            if self.matches.last().is_none_or(|last| last.key() < m.key()) {
                self.matches.push(m);
            } else {
                let at = self.matches.partition_point(|existing| existing.key() < m.key());
                self.matches.insert(at, m);
                // Keep focus on the same match
                if let Some(current) = self.current.as_mut() {
                    if at <= *current {
                        *current += 1;
                    }
                }
            }
            added += 1;
        }

        if self.current.is_none() && !self.matches.is_empty() {
            self.current = Some(0);
        }
        added
    }

    pub fn total(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// 1-based index of the focused match, 0 when there are none
    pub fn current_index(&self) -> usize {
        self.current.map_or(0, |i| i + 1)
    }

    pub fn current(&self) -> Option<&Match> {
        self.current.and_then(|i| self.matches.get(i))
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    /// Focus the next match, wrapping to the first
    pub fn next(&mut self) -> Option<&Match> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        self.current = Some(self.current.map_or(0, |i| (i + 1) % total));
        self.current()
    }

    /// Focus the previous match, wrapping to the last
    pub fn prev(&mut self) -> Option<&Match> {
        let total = self.matches.len();
        if total == 0 {
            return None;
        }
        self.current = Some(self.current.map_or(total - 1, |i| (i + total - 1) % total));
        self.current()
    }

    /// Focus a match by 1-based index. Out of range indexes change nothing.
    pub fn focus(&mut self, index: usize) -> Option<&Match> {
        if index == 0 || index > self.matches.len() {
            return None;
        }
        self.current = Some(index - 1);
        self.current()
    }

    pub fn clear(&mut self) {
        self.matches.clear();
        self.seen.clear();
        self.current = None;
    }
}
