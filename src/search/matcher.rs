use crate::document::Segment;
use crate::search::cancel::CancelToken;
use crate::search::error::SearchError;
use crate::search::types::{Match, MatchKind, Query};
use lru::LruCache;
use rayon::prelude::*;
use regex::{Regex, RegexBuilder};
use rustc_hash::FxHashSet;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Segments scanned between two cancellation checks
pub const SCAN_CHUNK_SEGMENTS: usize = 64;

/// Windows at least this long are scanned on the rayon pool
pub const DEFAULT_PARALLEL_THRESHOLD: usize = 2048;

/// Compiled patterns kept around for repeated queries
pub const DEFAULT_PATTERN_CACHE_SIZE: usize = 32;

/// Upper bound on compiled regex size; very long related-term lists hit this
const PATTERN_SIZE_LIMIT: usize = 8 * (1 << 20);

/// Case-insensitive literal pattern for one query
#[derive(Debug)]
pub struct CompiledPattern {
    regex: Regex,
    /// Kind of each alternative, in alternation order
    kinds: Vec<MatchKind>,
}

impl CompiledPattern {
    /// Compile terms into one alternation, query text first
    fn from_terms(terms: &[(String, MatchKind)]) -> Result<Self, SearchError> {
        let pattern = if terms.len() == 1 {
            regex::escape(&terms[0].0)
        } else {
            terms
                .iter()
                .map(|(term, _)| format!("({})", regex::escape(term)))
                .collect::<Vec<_>>()
                .join("|")
        };

        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .size_limit(PATTERN_SIZE_LIMIT)
            .build()?;

        Ok(Self {
            regex,
            kinds: terms.iter().map(|(_, kind)| *kind).collect(),
        })
    }

    /// Number of alternatives in the pattern
    pub fn term_count(&self) -> usize {
        self.kinds.len()
    }

    /// Append the matches of one segment, left to right, non-overlapping
    fn find_in(&self, segment: &Segment, out: &mut Vec<Match>) {
        if self.kinds.len() == 1 {
            let kind = self.kinds[0];
            out.extend(
                self.regex
                    .find_iter(&segment.text)
                    .map(|m| Match::new(segment.id, m.start(), m.len(), kind)),
            );
            return;
        }

        for caps in self.regex.captures_iter(&segment.text) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            let kind = (1..caps.len())
                .find(|&i| caps.get(i).is_some())
                .and_then(|i| self.kinds.get(i - 1).copied())
                .unwrap_or(self.kinds[0]);
            out.push(Match::new(segment.id, whole.start(), whole.len(), kind));
        }
    }

    fn scan_chunk(&self, chunk: &[Segment]) -> Vec<Match> {
        let mut out = Vec::new();
        for segment in chunk {
            self.find_in(segment, &mut out);
        }
        out
    }
}

/// Terms searched for a query: the trimmed query text first, then every
/// distinct non-blank related term.
fn pattern_terms(query: &Query) -> Vec<(String, MatchKind)> {
    if query.is_blank() {
        return Vec::new();
    }

    let mut seen = FxHashSet::default();
    let mut terms = Vec::with_capacity(1 + query.related.len());
    let primary = query.term();
    seen.insert(primary.to_lowercase());
    terms.push((primary.to_string(), query.term_kind()));

    for related in &query.related {
        let word = related.word.trim();
        if word.is_empty() || !seen.insert(word.to_lowercase()) {
            continue;
        }
        terms.push((word.to_string(), MatchKind::Related));
    }

    terms
}

fn cache_key(terms: &[(String, MatchKind)]) -> String {
    terms
        .iter()
        .map(|(term, kind)| format!("{:?}\u{1f}{}", kind, term.to_lowercase()))
        .collect::<Vec<_>>()
        .join("\u{1e}")
}

/// Finds query matches in a window of segments.
///
/// Scanning is a pure function of the query and the window; the engine only
/// memoises compiled patterns.
pub struct MatchEngine {
    patterns: LruCache<String, Arc<CompiledPattern>, ahash::RandomState>,
    parallel_threshold: usize,
}

impl MatchEngine {
    /// `parallel_threshold` of 0 keeps every scan on the calling thread
    pub fn new(cache_size: usize, parallel_threshold: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            patterns: LruCache::with_hasher(capacity, ahash::RandomState::new()),
            parallel_threshold,
        }
    }

    /// Compiled pattern for a query, `None` when the query is blank
    pub fn compile(&mut self, query: &Query) -> Result<Option<Arc<CompiledPattern>>, SearchError> {
        let terms = pattern_terms(query);
        if terms.is_empty() {
            return Ok(None);
        }

        let key = cache_key(&terms);
        if let Some(pattern) = self.patterns.get(&key) {
            return Ok(Some(Arc::clone(pattern)));
        }

        let pattern = Arc::new(CompiledPattern::from_terms(&terms)?);
        tracing::trace!(terms = terms.len(), "compiled search pattern");
        self.patterns.put(key, Arc::clone(&pattern));
        Ok(Some(pattern))
    }

    /// Scan a window for a query
    pub fn scan(&mut self, query: &Query, window: &[Segment]) -> Result<Vec<Match>, SearchError> {
        self.scan_cancellable(query, window, &CancelToken::never())
    }

    /// Scan a window, giving up with `Cancelled` once `cancel` fires
    pub fn scan_cancellable(
        &mut self,
        query: &Query,
        window: &[Segment],
        cancel: &CancelToken,
    ) -> Result<Vec<Match>, SearchError> {
        match self.compile(query)? {
            Some(pattern) => self.scan_with(&pattern, window, cancel),
            None => Ok(Vec::new()),
        }
    }

    /// Scan a window with an already compiled pattern
    pub fn scan_with(
        &self,
        pattern: &CompiledPattern,
        window: &[Segment],
        cancel: &CancelToken,
    ) -> Result<Vec<Match>, SearchError> {
        let cancelled = || SearchError::Cancelled {
            generation: cancel.generation(),
        };

        let mut matches = Vec::new();
        if self.parallel_threshold > 0 && window.len() >= self.parallel_threshold {
            // Chunk results are collected by index, so concatenation keeps document order
            let chunks: Vec<Option<Vec<Match>>> = window
                .par_chunks(SCAN_CHUNK_SEGMENTS)
                .map(|chunk| (!cancel.is_cancelled()).then(|| pattern.scan_chunk(chunk)))
                .collect();
            for chunk in chunks {
                matches.extend(chunk.ok_or_else(cancelled)?);
            }
        } else {
            for chunk in window.chunks(SCAN_CHUNK_SEGMENTS) {
                if cancel.is_cancelled() {
                    return Err(cancelled());
                }
                matches.extend(pattern.scan_chunk(chunk));
            }
        }

        tracing::trace!(segments = window.len(), matches = matches.len(), "scanned window");
        Ok(matches)
    }
}

impl Default for MatchEngine {
    fn default() -> Self {
        Self::new(DEFAULT_PATTERN_CACHE_SIZE, DEFAULT_PARALLEL_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, SegmenterConfig, SourceFormat};
    use crate::search::cancel::ScanGeneration;
    use crate::search::types::{RelatedTerm, SearchMode};

    fn doc(text: &str) -> Document {
        Document::parse(text, SourceFormat::Text, &SegmenterConfig::default()).unwrap()
    }

    fn query(text: &str) -> Query {
        Query::new(text, SearchMode::Deep)
    }

    #[test]
    fn test_case_insensitive_substring() {
        let doc = doc("The cat\nbathe in THE sun\nnothing here");
        let matches = MatchEngine::default().scan(&query("the"), doc.segments()).unwrap();
        let keys: Vec<_> = matches.iter().map(Match::key).collect();
        assert_eq!(keys, vec![(0, 0), (1, 2), (1, 9)]);
        assert!(matches.iter().all(|m| m.len == 3 && m.kind == MatchKind::Term));
    }

    #[test]
    fn test_non_overlapping_leftmost_first() {
        let doc = doc("aaaa");
        let matches = MatchEngine::default().scan(&query("aa"), doc.segments()).unwrap();
        let starts: Vec<_> = matches.iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 2]);
    }

    #[test]
    fn test_blank_query_yields_nothing() {
        let doc = doc("anything at all");
        let mut engine = MatchEngine::default();
        assert!(engine.scan(&query(""), doc.segments()).unwrap().is_empty());
        assert!(engine.scan(&query("  \t"), doc.segments()).unwrap().is_empty());
    }

    #[test]
    fn test_query_is_literal() {
        let doc = doc("cost is $5.00 (approx)\ncost is $5x00");
        let matches = MatchEngine::default().scan(&query("$5.00 ("), doc.segments()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].kind, MatchKind::Phrase);
    }

    #[test]
    fn test_related_terms_are_classified() {
        let doc = doc("a big and large house");
        let q = query("big").with_related([
            RelatedTerm::new("large", 0.8),
            RelatedTerm::new("BIG", 0.5),
            RelatedTerm::new("  ", 0.1),
        ]);
        let mut engine = MatchEngine::default();
        let pattern = engine.compile(&q).unwrap().unwrap();
        assert_eq!(pattern.term_count(), 2);

        let matches = engine.scan(&q, doc.segments()).unwrap();
        let kinds: Vec<_> = matches.iter().map(|m| (m.start, m.kind)).collect();
        assert_eq!(kinds, vec![(2, MatchKind::Term), (10, MatchKind::Related)]);
    }

    #[test]
    fn test_query_text_wins_at_same_position() {
        let doc = doc("therefore");
        let q = query("the").with_related([RelatedTerm::new("therefore", 1.0)]);
        let matches = MatchEngine::default().scan(&q, doc.segments()).unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].len, 3);
        assert_eq!(matches[0].kind, MatchKind::Term);
    }

    #[test]
    fn test_unicode_offsets_are_bytes() {
        let doc = doc("café CAFÉ");
        let matches = MatchEngine::default().scan(&query("café"), doc.segments()).unwrap();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[1].start, "café ".len());
        assert_eq!(matches[1].len, "CAFÉ".len());
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let text: String = (0..500).map(|i| format!("line {i} has the word\n")).collect();
        let doc = doc(&text);
        let sequential = MatchEngine::new(4, 0).scan(&query("the"), doc.segments()).unwrap();
        let parallel = MatchEngine::new(4, 1).scan(&query("the"), doc.segments()).unwrap();
        assert_eq!(sequential.len(), 500);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_cancelled_scan_returns_error() {
        let doc = doc("the\nthe\nthe");
        let generation = ScanGeneration::new();
        let token = generation.token();
        generation.bump();

        let mut engine = MatchEngine::default();
        let err = engine.scan_cancellable(&query("the"), doc.segments(), &token).unwrap_err();
        assert!(matches!(err, SearchError::Cancelled { generation: 0 }));

        let mut parallel = MatchEngine::new(4, 1);
        let err = parallel.scan_cancellable(&query("the"), doc.segments(), &token).unwrap_err();
        assert!(matches!(err, SearchError::Cancelled { .. }));
    }

    #[test]
    fn test_pattern_cache_reuses_compiled_pattern() {
        let mut engine = MatchEngine::new(2, 0);
        let first = engine.compile(&query("The")).unwrap().unwrap();
        let second = engine.compile(&query(" the ")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }
}
