use crate::document::Document;
use crate::search::cancel::CancelToken;
use crate::search::cursor::ScanCursor;
use crate::search::error::SearchError;
use crate::search::matcher::{
    CompiledPattern, DEFAULT_PARALLEL_THRESHOLD, DEFAULT_PATTERN_CACHE_SIZE, MatchEngine,
};
use crate::search::results::ResultStore;
use crate::search::types::{Match, Query, SearchMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Default number of segments covered by one scan pass
pub const DEFAULT_WINDOW_SEGMENTS: usize = 200;

/// Which kind of pass is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    Initial,
    More,
}

/// Session lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No pass has completed for the current query
    Idle,
    /// A pass is in flight
    Scanning(ScanPhase),
    /// Unscanned segments remain
    AwaitingMore,
    /// The whole document has been scanned
    Exhausted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Scanning(ScanPhase::Initial) => f.write_str("scanning (initial)"),
            SessionState::Scanning(ScanPhase::More) => f.write_str("scanning (more)"),
            SessionState::AwaitingMore => f.write_str("awaiting more"),
            SessionState::Exhausted => f.write_str("exhausted"),
        }
    }
}

/// Scan sizing for a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Segments per pass in shallow mode
    #[serde(default = "default_window")]
    pub shallow_window: usize,
    /// Segments per pass in deep mode
    #[serde(default = "default_window")]
    pub deep_window: usize,
    /// Documents with at most this many segments are scanned whole on the
    /// first pass. 0 disables the shortcut.
    #[serde(default)]
    pub full_scan_below: usize,
    /// Passes over at least this many segments run on the rayon pool (0 = never)
    #[serde(default = "default_parallel_threshold")]
    pub parallel_scan_threshold: usize,
    #[serde(default = "default_pattern_cache_size")]
    pub pattern_cache_size: usize,
}

fn default_window() -> usize {
    DEFAULT_WINDOW_SEGMENTS
}

fn default_parallel_threshold() -> usize {
    DEFAULT_PARALLEL_THRESHOLD
}

fn default_pattern_cache_size() -> usize {
    DEFAULT_PATTERN_CACHE_SIZE
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            shallow_window: default_window(),
            deep_window: default_window(),
            full_scan_below: 0,
            parallel_scan_threshold: default_parallel_threshold(),
            pattern_cache_size: default_pattern_cache_size(),
        }
    }
}

impl SessionConfig {
    /// Same window for both modes
    pub fn with_window(window: usize) -> Self {
        Self {
            shallow_window: window,
            deep_window: window,
            ..Self::default()
        }
    }

    pub fn window_for(&self, mode: SearchMode) -> usize {
        match mode {
            SearchMode::Shallow => self.shallow_window,
            SearchMode::Deep => self.deep_window,
        }
    }
}

/// What the host UI renders: "current / total" and the scan-more button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultsView {
    pub total: usize,
    /// 1-based, 0 when there are no matches
    pub current_index: usize,
    pub state: SessionState,
    pub mode: Option<SearchMode>,
    pub can_scan_more: bool,
    pub scanned_segments: usize,
    pub total_segments: usize,
}

impl fmt::Display for ResultsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.current_index, self.total)
    }
}

/// Serialisable picture of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub query: Option<Query>,
    pub cursor: ScanCursor,
    pub state: SessionState,
    pub total: usize,
    pub current_index: usize,
}

/// Search session controller.
///
/// Owns the scan cursor and result store for one document view. A query or
/// mode change restarts from the top of the document; `scan_more` resumes
/// from the cursor.
pub struct SearchSession {
    document: Arc<Document>,
    config: SessionConfig,
    engine: MatchEngine,
    query: Option<Query>,
    pattern: Option<Arc<CompiledPattern>>,
    cursor: ScanCursor,
    results: ResultStore,
    state: SessionState,
}

impl SearchSession {
    pub fn new(document: Arc<Document>, config: SessionConfig) -> Self {
        let engine = MatchEngine::new(config.pattern_cache_size, config.parallel_scan_threshold);
        let cursor = ScanCursor::new(document.len());
        Self {
            document,
            config,
            engine,
            query: None,
            pattern: None,
            cursor,
            results: ResultStore::new(),
            state: SessionState::Idle,
        }
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    pub fn mode(&self) -> Option<SearchMode> {
        self.query.as_ref().map(|q| q.mode)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cursor(&self) -> &ScanCursor {
        &self.cursor
    }

    pub fn results(&self) -> &ResultStore {
        &self.results
    }

    pub fn matches(&self) -> &[Match] {
        self.results.matches()
    }

    /// Whether the "Scan More" affordance is shown
    pub fn can_scan_more(&self) -> bool {
        self.mode() == Some(SearchMode::Deep) && self.state == SessionState::AwaitingMore
    }

    pub fn view(&self) -> ResultsView {
        ResultsView {
            total: self.results.total(),
            current_index: self.results.current_index(),
            state: self.state,
            mode: self.mode(),
            can_scan_more: self.can_scan_more(),
            scanned_segments: self.cursor.position(),
            total_segments: self.cursor.len(),
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            query: self.query.clone(),
            cursor: self.cursor,
            state: self.state,
            total: self.results.total(),
            current_index: self.results.current_index(),
        }
    }

    /// Rebuild a session from a snapshot by re-running its query up to the
    /// snapshot's cursor and restoring the focus.
    ///
    /// When the document no longer has the snapshot's length only the initial
    /// pass is run.
    pub fn restore(
        document: Arc<Document>,
        config: SessionConfig,
        snapshot: SessionSnapshot,
    ) -> Result<Self, SearchError> {
        let mut session = Self::new(document, config);
        let Some(query) = snapshot.query else {
            return Ok(session);
        };
        session.set_query(query)?;

        if snapshot.cursor.len() != session.document.len() {
            tracing::warn!(
                snapshot_segments = snapshot.cursor.len(),
                segments = session.document.len(),
                "document changed since snapshot, restarting query"
            );
            return Ok(session);
        }

        let target = snapshot.cursor.position().min(session.document.len());
        if session.cursor.position() < target && session.state == SessionState::AwaitingMore {
            if let Some(pattern) = session.pattern.clone() {
                let window = target - session.cursor.position();
                session.run_pass(&pattern, window, &CancelToken::never())?;
            }
        }
        if snapshot.current_index > 0 {
            session.focus(snapshot.current_index);
        }

        tracing::debug!(
            scanned = session.cursor.position(),
            total = session.results.total(),
            "session restored"
        );
        Ok(session)
    }

    /// Replace the query and run the initial pass
    pub fn set_query(&mut self, query: Query) -> Result<ResultsView, SearchError> {
        self.set_query_with(query, &CancelToken::never())
    }

    /// Replace the query and run the initial pass under `cancel`.
    ///
    /// A cancelled pass leaves the session `Idle` with no results.
    pub fn set_query_with(
        &mut self,
        query: Query,
        cancel: &CancelToken,
    ) -> Result<ResultsView, SearchError> {
        // Compile first so a bad pattern leaves the previous results alone
        let pattern = self.engine.compile(&query)?;

        self.reset();
        tracing::debug!(query = query.term(), mode = %query.mode, "query set");
        let mode = query.mode;
        self.query = Some(query);
        self.pattern = pattern.clone();

        let Some(pattern) = pattern else {
            self.cursor.finish();
            self.state = SessionState::Exhausted;
            return Ok(self.view());
        };

        let window = if self.document.len() <= self.config.full_scan_below {
            self.document.len()
        } else {
            self.config.window_for(mode)
        };

        self.state = SessionState::Scanning(ScanPhase::Initial);
        match self.run_pass(&pattern, window, cancel) {
            Ok(_) => Ok(self.view()),
            Err(err) => {
                self.results.clear();
                self.cursor.reset(self.document.len());
                self.state = SessionState::Idle;
                Err(err)
            }
        }
    }

    /// Switch mode, restarting the current query
    pub fn set_mode(&mut self, mode: SearchMode) -> Result<ResultsView, SearchError> {
        match self.query.clone() {
            Some(query) => self.set_query(Query { mode, ..query }),
            None => Ok(self.view()),
        }
    }

    /// Scan one more window of the document
    pub fn scan_more(&mut self) -> Result<ResultsView, SearchError> {
        self.scan_more_with(&CancelToken::never())
    }

    /// Scan one more window under `cancel`.
    ///
    /// Only valid in deep mode while awaiting more; anything else fails with
    /// `ScanMoreNotAvailable` and changes nothing. A cancelled pass appends
    /// nothing and does not move the cursor.
    pub fn scan_more_with(&mut self, cancel: &CancelToken) -> Result<ResultsView, SearchError> {
        let unavailable = SearchError::ScanMoreNotAvailable {
            state: self.state,
            mode: self.mode().unwrap_or_default(),
        };
        if !self.can_scan_more() {
            return Err(unavailable);
        }
        let Some(pattern) = self.pattern.clone() else {
            return Err(unavailable);
        };

        let window = self.config.window_for(SearchMode::Deep);
        self.state = SessionState::Scanning(ScanPhase::More);
        match self.run_pass(&pattern, window, cancel) {
            Ok(_) => Ok(self.view()),
            Err(err) => {
                self.state = SessionState::AwaitingMore;
                Err(err)
            }
        }
    }

    /// Keep scanning until the document is exhausted. Does nothing unless
    /// scan more is available.
    pub fn scan_to_end(&mut self) -> Result<ResultsView, SearchError> {
        self.scan_to_end_with(&CancelToken::never(), |_| {})
    }

    /// Like [`SearchSession::scan_to_end`], reporting after every pass
    pub fn scan_to_end_with(
        &mut self,
        cancel: &CancelToken,
        mut on_pass: impl FnMut(&ResultsView),
    ) -> Result<ResultsView, SearchError> {
        while self.can_scan_more() {
            let view = self.scan_more_with(cancel)?;
            on_pass(&view);
        }
        Ok(self.view())
    }

    pub fn next_match(&mut self) -> ResultsView {
        self.results.next();
        self.view()
    }

    pub fn prev_match(&mut self) -> ResultsView {
        self.results.prev();
        self.view()
    }

    /// Focus a match by 1-based index
    pub fn focus(&mut self, index: usize) -> ResultsView {
        self.results.focus(index);
        self.view()
    }

    /// Drop the query and all results
    pub fn clear(&mut self) -> ResultsView {
        self.reset();
        self.query = None;
        self.pattern = None;
        self.view()
    }

    fn reset(&mut self) {
        self.results.clear();
        self.cursor.reset(self.document.len());
        self.state = SessionState::Idle;
    }

    fn run_pass(
        &mut self,
        pattern: &CompiledPattern,
        window: usize,
        cancel: &CancelToken,
    ) -> Result<usize, SearchError> {
        let started = Instant::now();
        let range = self.cursor.next_window(window);
        let found = self
            .engine
            .scan_with(pattern, self.document.window(range.clone()), cancel)?;

        let added = self.results.append(found);
        let (position, exhausted) = self.cursor.advance(window);
        self.state = if exhausted {
            SessionState::Exhausted
        } else {
            SessionState::AwaitingMore
        };

        tracing::debug!(
            from = range.start,
            to = position,
            added,
            total = self.results.total(),
            exhausted,
            elapsed_us = started.elapsed().as_micros() as u64,
            "scan pass complete"
        );
        Ok(added)
    }
}
