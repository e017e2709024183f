#![no_main]

use findable::document::{Document, SegmenterConfig, SourceFormat};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Segment arbitrary input both ways; ids must stay dense and text
    // must never be blank
    let content = String::from_utf8_lossy(data);
    let config = SegmenterConfig::default();

    for format in [SourceFormat::Text, SourceFormat::Html] {
        let Ok(doc) = Document::parse(&content, format, &config) else {
            continue;
        };
        for (i, segment) in doc.segments().iter().enumerate() {
            assert_eq!(segment.id as usize, i);
            assert!(!segment.text.trim().is_empty());
        }
    }
});
