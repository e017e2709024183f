#![no_main]

use arbitrary::Arbitrary;
use findable::document::{Document, SegmenterConfig, SourceFormat};
use findable::search::{Query, RelatedTerm, SearchMode, SearchSession, SessionConfig};
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;

#[derive(Debug, Arbitrary)]
struct Input {
    content: String,
    query: String,
    related: Vec<String>,
    window: u8,
    deep: bool,
}

fuzz_target!(|input: Input| {
    let Ok(doc) = Document::parse(&input.content, SourceFormat::Text, &SegmenterConfig::default())
    else {
        return;
    };
    let doc = Arc::new(doc);

    let mode = if input.deep { SearchMode::Deep } else { SearchMode::Shallow };
    let query = Query::new(input.query, mode).with_related(
        input
            .related
            .into_iter()
            .take(8)
            .map(|word| RelatedTerm::new(word, 1.0)),
    );

    let mut session = SearchSession::new(doc.clone(), SessionConfig::with_window(input.window.max(1) as usize));
    if session.set_query(query).is_err() {
        return;
    }
    let _ = session.scan_to_end();

    // Matches stay in document order, in bounds, on char boundaries
    let matches = session.matches();
    for pair in matches.windows(2) {
        assert!(pair[0].key() < pair[1].key());
    }
    for m in matches {
        let text = &doc.get(m.segment_id).unwrap().text;
        assert!(m.end() <= text.len());
        assert!(text.is_char_boundary(m.start) && text.is_char_boundary(m.end()));
    }
});
