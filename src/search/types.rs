use crate::document::SegmentId;
use crate::search::error::SearchError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Search mode selected in the settings panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// One bounded scan of the start of the document, no continuation
    #[default]
    Shallow,
    /// Bounded scans that the user can continue with "scan more"
    Deep,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Shallow => "shallow",
            SearchMode::Deep => "deep",
        }
    }
}

impl FromStr for SearchMode {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shallow" => Ok(SearchMode::Shallow),
            "deep" => Ok(SearchMode::Deep),
            _ => Err(SearchError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Extra term searched alongside the query, e.g. a synonym
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelatedTerm {
    pub word: String,
    /// Relevance between 0.0 and 1.0, carried through to the host for styling
    #[serde(default = "default_score")]
    pub score: f32,
}

fn default_score() -> f32 {
    1.0
}

impl RelatedTerm {
    pub fn new(word: impl Into<String>, score: f32) -> Self {
        Self {
            word: word.into(),
            score,
        }
    }
}

/// The active search: text, mode and optional related terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    #[serde(default)]
    pub mode: SearchMode,
    #[serde(default)]
    pub related: Vec<RelatedTerm>,
}

impl Query {
    pub fn new(text: impl Into<String>, mode: SearchMode) -> Self {
        Self {
            text: text.into(),
            mode,
            related: Vec::new(),
        }
    }

    pub fn with_related(mut self, related: impl IntoIterator<Item = RelatedTerm>) -> Self {
        self.related.extend(related);
        self
    }

    /// Query text as it is matched
    pub fn term(&self) -> &str {
        self.text.trim()
    }

    pub fn is_blank(&self) -> bool {
        self.term().is_empty()
    }

    /// How matches of the query text itself are classified
    pub fn term_kind(&self) -> MatchKind {
        if self.term().contains(char::is_whitespace) {
            MatchKind::Phrase
        } else {
            MatchKind::Term
        }
    }
}

/// What a match was found for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// The query text, a single word
    Term,
    /// The query text, several words
    Phrase,
    /// One of the query's related terms
    Related,
}

/// A located occurrence of the query inside a segment.
///
/// `start` and `len` are byte offsets into the segment text. Two matches are
/// the same match when they share `(segment_id, start)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Match {
    pub segment_id: SegmentId,
    pub start: usize,
    pub len: usize,
    pub kind: MatchKind,
}

impl Match {
    pub fn new(segment_id: SegmentId, start: usize, len: usize, kind: MatchKind) -> Self {
        Self {
            segment_id,
            start,
            len,
            kind,
        }
    }

    /// Identity and document-order key
    pub fn key(&self) -> (SegmentId, usize) {
        (self.segment_id, self.start)
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

impl PartialOrd for Match {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Match {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(&other.key())
            .then(self.len.cmp(&other.len))
            .then(self.kind.cmp(&other.kind))
    }
}
