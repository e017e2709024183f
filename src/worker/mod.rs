//! Background session worker.
//!
//! A [`SearchWorker`] owns one [`SearchSession`] on a dedicated thread.
//! Commands are applied strictly in order, so two passes never interleave.
//! Query changes bump the session generation *before* they are queued, which
//! cancels any pass still running for the previous query; its partial results
//! are discarded and never reach the host.
//!
//! ## Modules
//!
//! - [`debouncer`] - Coalesces bursts of query changes
//! - [`protocol`] - Command and event messages, newline-delimited JSON framing

pub mod debouncer;
pub mod protocol;

pub use debouncer::{DEFAULT_DEBOUNCE_MS, PendingQuery, QueryDebouncer};
pub use protocol::{Command, Event, read_message, write_message};

use crate::document::Document;
use crate::search::{
    Match, Query, ResultsView, ScanGeneration, ScanPhase, SearchError, SearchSession,
    SessionConfig,
};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A command tagged with the generation it was issued under
struct Request {
    command: Command,
    generation: u64,
}

/// Handle to a session running on its own thread
pub struct SearchWorker {
    requests: Sender<Request>,
    events: Receiver<Event>,
    generation: ScanGeneration,
    handle: Option<JoinHandle<()>>,
}

impl SearchWorker {
    /// Start a worker for `document`
    pub fn spawn(document: Arc<Document>, config: SessionConfig, debounce: Duration) -> Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let generation = ScanGeneration::new();

        let worker = WorkerLoop {
            session: SearchSession::new(document, config),
            generation: generation.clone(),
            debouncer: QueryDebouncer::new(debounce),
            events: event_tx,
        };

        let handle = thread::Builder::new()
            .name("findable-session".to_string())
            .spawn(move || worker.run(request_rx))
            .context("Failed to spawn search worker thread")?;

        Ok(Self {
            requests: request_tx,
            events: event_rx,
            generation,
            handle: Some(handle),
        })
    }

    /// Queue a command. Query changes and clears cancel any pass in flight.
    pub fn send(&self, command: Command) -> Result<()> {
        let generation = match command {
            Command::SetQuery { .. } | Command::Clear => self.generation.bump(),
            _ => self.generation.current(),
        };
        self.requests
            .send(Request {
                command,
                generation,
            })
            .ok()
            .context("Search worker has stopped")
    }

    pub fn set_query(&self, query: Query) -> Result<()> {
        self.send(Command::set_query(query))
    }

    pub fn scan_more(&self) -> Result<()> {
        self.send(Command::ScanMore)
    }

    pub fn next(&self) -> Result<()> {
        self.send(Command::Next)
    }

    pub fn prev(&self) -> Result<()> {
        self.send(Command::Prev)
    }

    pub fn clear(&self) -> Result<()> {
        self.send(Command::Clear)
    }

    /// Current generation as seen by the host
    pub fn generation(&self) -> u64 {
        self.generation.current()
    }

    /// Event stream from the worker
    pub fn events(&self) -> &Receiver<Event> {
        &self.events
    }

    /// Block for the next event, `None` once the worker is gone
    pub fn recv(&self) -> Option<Event> {
        self.events.recv().ok()
    }

    /// Wait for the next event, `None` on timeout or once the worker is gone
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Stop the worker and wait for its thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.requests.send(Request {
            command: Command::Shutdown,
            generation: self.generation.current(),
        });
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("search worker thread panicked");
            }
        }
    }
}

impl Drop for SearchWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// State living on the worker thread
struct WorkerLoop {
    session: SearchSession,
    generation: ScanGeneration,
    debouncer: QueryDebouncer,
    events: Sender<Event>,
}

impl WorkerLoop {
    fn run(mut self, requests: Receiver<Request>) {
        tracing::debug!(segments = self.session.document().len(), "search worker started");

        loop {
            let request = match self.debouncer.time_until_ready() {
                Some(wait) => match requests.recv_timeout(wait) {
                    Ok(request) => Some(request),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match requests.recv() {
                    Ok(request) => Some(request),
                    Err(_) => break,
                },
            };

            if let Some(request) = request {
                if !self.handle(request) {
                    break;
                }
            }

            if self.debouncer.is_ready() {
                self.apply_pending();
            }
        }

        // A query still inside its debounce window was accepted and gets its pass
        self.apply_pending();
        tracing::debug!(
            superseded = self.debouncer.superseded_count(),
            "search worker stopped"
        );
        self.emit(Event::ShuttingDown);
    }

    /// Returns false once the worker should stop
    fn handle(&mut self, request: Request) -> bool {
        let Request {
            command,
            generation,
        } = request;

        match command {
            Command::SetQuery {
                text,
                mode,
                related,
            } => {
                let query = Query::new(text, mode).with_related(related);
                self.debouncer.add(query, generation);
            }
            Command::ScanMore => {
                self.apply_pending();
                self.scan_more(generation);
            }
            Command::Next => {
                self.apply_pending();
                let view = self.session.next_match();
                self.emit_view(generation, false, view, Vec::new());
            }
            Command::Prev => {
                self.apply_pending();
                let view = self.session.prev_match();
                self.emit_view(generation, false, view, Vec::new());
            }
            Command::Focus { index } => {
                self.apply_pending();
                let view = self.session.focus(index);
                self.emit_view(generation, false, view, Vec::new());
            }
            Command::Clear => {
                self.debouncer.clear();
                let view = self.session.clear();
                self.emit_view(generation, true, view, Vec::new());
            }
            Command::Snapshot => {
                self.apply_pending();
                self.emit(Event::Snapshot {
                    snapshot: self.session.snapshot(),
                });
            }
            Command::Shutdown => return false,
        }
        true
    }

    /// Run the initial pass for the pending query, if it is still current
    fn apply_pending(&mut self) {
        let Some(PendingQuery { query, generation }) = self.debouncer.flush() else {
            return;
        };

        let token = self.generation.token_for(generation);
        if token.is_cancelled() {
            tracing::debug!(generation, "dropping stale query");
            return;
        }

        self.emit(Event::Scanning {
            generation,
            phase: ScanPhase::Initial,
        });
        match self.session.set_query_with(query, &token) {
            Ok(view) => {
                let added = self.session.matches().to_vec();
                self.emit_view(generation, true, view, added);
            }
            Err(err) => self.emit_error(err),
        }
    }

    fn scan_more(&mut self, generation: u64) {
        let token = self.generation.token_for(generation);
        if token.is_cancelled() {
            tracing::debug!(generation, "dropping stale scan more");
            self.emit(Event::Cancelled { generation });
            return;
        }

        let before = self.session.results().total();
        if self.session.can_scan_more() {
            self.emit(Event::Scanning {
                generation,
                phase: ScanPhase::More,
            });
        }
        match self.session.scan_more_with(&token) {
            Ok(view) => {
                // Passes move forward through the document, so new matches sort last
                let added = self.session.matches()[before..].to_vec();
                self.emit_view(generation, false, view, added);
            }
            Err(err) => self.emit_error(err),
        }
    }

    fn emit_view(
        &self,
        generation: u64,
        reset: bool,
        view: ResultsView,
        added: Vec<Match>,
    ) {
        self.emit(Event::Results {
            generation,
            reset,
            view,
            added,
        });
    }

    fn emit_error(&self, err: SearchError) {
        let event = match err {
            SearchError::ScanMoreNotAvailable { state, mode } => {
                tracing::debug!(%state, %mode, "scan more not available");
                Event::Unavailable { state, mode }
            }
            SearchError::Cancelled { generation } => {
                tracing::debug!(generation, "scan pass cancelled");
                Event::Cancelled { generation }
            }
            err => {
                tracing::warn!(error = %err, "search command failed");
                Event::Error {
                    message: err.to_string(),
                }
            }
        };
        self.emit(event);
    }

    fn emit(&self, event: Event) {
        // The host may have dropped its receiver; there is nobody left to tell
        let _ = self.events.send(event);
    }
}
