//! # Findable - incremental in-document search
//!
//! Findable searches a single loaded document (plain text or HTML) the way a
//! reader's search bar does: a query scans a bounded window of the document
//! first, and in deep mode the user can ask to "scan more" until the end is
//! reached. Results are always in document order and the counter reads
//! `current / total`.
//!
//! ## Architecture
//!
//! The crate is organized into these main modules:
//!
//! - [`document`] - Loading and segmenting documents into searchable units
//! - [`search`] - Queries, the match engine, and the incremental search session
//! - [`worker`] - A session on its own thread, with cancellation and debouncing
//! - [`output`] - Result formatting (ripgrep-like and JSON)
//! - [`utils`] - Configuration, logging and progress bars
//!
//! ## Quick Start
//!
//! ```
//! use findable::document::{Document, SegmenterConfig, SourceFormat};
//! use findable::search::{Query, SearchMode, SearchSession, SessionConfig};
//! use std::sync::Arc;
//!
//! let doc = Document::parse(
//!     "the quick fox\nbathe daily\nover the hill",
//!     SourceFormat::Text,
//!     &SegmenterConfig::default(),
//! )
//! .unwrap();
//!
//! let mut session = SearchSession::new(Arc::new(doc), SessionConfig::with_window(2));
//! let view = session.set_query(Query::new("the", SearchMode::Deep)).unwrap();
//! assert_eq!(view.to_string(), "1 / 2");
//! assert!(view.can_scan_more);
//!
//! let view = session.scan_more().unwrap();
//! assert_eq!(view.total, 3);
//! assert!(!view.can_scan_more);
//! ```
//!
//! ## Performance
//!
//! Documents are memory-mapped on load and segmented once. Compiled query
//! patterns are kept in an LRU cache, and large windows are scanned in
//! parallel chunks with rayon while keeping document order.

pub mod document;
pub mod output;
pub mod search;
pub mod utils;
pub mod worker;
