//! Query debouncer
//!
//! Collects query changes arriving within a configurable time window and
//! releases only the latest one. Typing "the" issues three queries; the
//! worker only needs to scan for the last.

use crate::search::Query;
use std::time::{Duration, Instant};

/// Default debounce window in milliseconds
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// A query waiting for the window to elapse
#[derive(Debug, Clone)]
pub struct PendingQuery {
    pub query: Query,
    /// Generation the query was issued under
    pub generation: u64,
}

/// Debouncer that keeps the most recent query within a time window
pub struct QueryDebouncer {
    window: Duration,
    pending: Option<PendingQuery>,
    /// Time of the last query
    last_event: Option<Instant>,
    /// Queries replaced before they were released
    superseded: u64,
}

impl QueryDebouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: None,
            last_event: None,
            superseded: 0,
        }
    }

    /// Record a query, replacing any pending one
    pub fn add(&mut self, query: Query, generation: u64) {
        self.last_event = Some(Instant::now());
        if self.pending.replace(PendingQuery { query, generation }).is_some() {
            self.superseded += 1;
        }
    }

    /// Check if the debounce window has elapsed since the last query
    pub fn is_ready(&self) -> bool {
        self.pending.is_some() && self.last_event.is_some_and(|last| last.elapsed() >= self.window)
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Time until the pending query is released (None if nothing is pending)
    pub fn time_until_ready(&self) -> Option<Duration> {
        self.pending.as_ref()?;
        self.last_event
            .map(|last| self.window.saturating_sub(last.elapsed()))
    }

    /// Release the pending query regardless of the window
    pub fn flush(&mut self) -> Option<PendingQuery> {
        self.last_event = None;
        self.pending.take()
    }

    /// Drop the pending query without releasing it
    pub fn clear(&mut self) {
        self.pending = None;
        self.last_event = None;
    }

    /// Number of queries dropped because a newer one arrived in the window
    pub fn superseded_count(&self) -> u64 {
        self.superseded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchMode;
    use std::thread::sleep;

    fn q(text: &str) -> Query {
        Query::new(text, SearchMode::Deep)
    }

    #[test]
    fn test_debouncer_single_query() {
        let mut debouncer = QueryDebouncer::new(Duration::from_millis(50));
        debouncer.add(q("the"), 1);
        assert!(debouncer.has_pending());
        assert!(!debouncer.is_ready());

        sleep(Duration::from_millis(60));
        assert!(debouncer.is_ready());

        let pending = debouncer.flush().unwrap();
        assert_eq!(pending.query.text, "the");
        assert_eq!(pending.generation, 1);
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn test_debouncer_keeps_latest() {
        let mut debouncer = QueryDebouncer::new(Duration::from_millis(50));
        debouncer.add(q("t"), 1);
        debouncer.add(q("th"), 2);
        debouncer.add(q("the"), 3);

        let pending = debouncer.flush().unwrap();
        assert_eq!(pending.query.text, "the");
        assert_eq!(pending.generation, 3);
        assert_eq!(debouncer.superseded_count(), 2);
    }

    #[test]
    fn test_debouncer_zero_window_is_ready_immediately() {
        let mut debouncer = QueryDebouncer::new(Duration::ZERO);
        debouncer.add(q("the"), 1);
        assert!(debouncer.is_ready());
        assert_eq!(debouncer.time_until_ready(), Some(Duration::ZERO));
    }

    #[test]
    fn test_debouncer_not_ready_immediately() {
        let mut debouncer = QueryDebouncer::new(Duration::from_millis(50));
        assert!(debouncer.time_until_ready().is_none());
        debouncer.add(q("the"), 1);
        assert!(!debouncer.is_ready());
        assert!(debouncer.time_until_ready().unwrap() > Duration::ZERO);
    }

    #[test]
    fn test_debouncer_clear() {
        let mut debouncer = QueryDebouncer::new(Duration::from_millis(50));
        debouncer.add(q("the"), 1);
        debouncer.clear();
        assert!(!debouncer.has_pending());
        assert!(debouncer.flush().is_none());
    }
}
