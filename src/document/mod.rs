//! Host document loading and segmentation.
//!
//! A [`Document`] is the ordered list of [`Segment`]s a search runs over.
//! Segment ids are assigned in document order starting at zero, so a scan
//! window is just a range of segment indexes.
//!
//! ```
//! use findable::document::{Document, SegmenterConfig, SourceFormat};
//!
//! let doc = Document::parse("<p>hello</p><p>world</p>", SourceFormat::Html, &SegmenterConfig::default()).unwrap();
//! assert_eq!(doc.len(), 2);
//! ```

pub mod segmenter;
pub mod types;

pub use segmenter::{HtmlSegmenter, Segmenter, SegmenterConfig, TextSegmenter};
pub use types::*;

use anyhow::{Context, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;

impl Document {
    /// Segment in-memory content
    pub fn parse(
        content: &str,
        format: SourceFormat,
        config: &SegmenterConfig,
    ) -> Result<Self, regex::Error> {
        let segments = match format {
            SourceFormat::Text => TextSegmenter.segment_all(content),
            SourceFormat::Html => HtmlSegmenter::new(config)?.segment_all(content),
        };
        tracing::debug!(?format, segments = segments.len(), "segmented document");
        Ok(Self::from_segments(segments, format))
    }

    /// Load and segment a file, choosing the segmenter from its extension
    pub fn open(path: &Path, config: &SegmenterConfig) -> Result<Self> {
        Self::open_as(path, SourceFormat::from_path(path), config)
    }

    /// Load and segment a file with an explicit format
    pub fn open_as(path: &Path, format: SourceFormat, config: &SegmenterConfig) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open document {}", path.display()))?;
        let len = file
            .metadata()
            .with_context(|| format!("Failed to stat document {}", path.display()))?
            .len();

        if len == 0 {
            return Ok(Self::from_segments(Vec::new(), format));
        }

        let mmap = unsafe { Mmap::map(&file)? };
        let content = String::from_utf8_lossy(&mmap);
        Self::parse(&content, format, config)
            .with_context(|| format!("Failed to segment document {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_open_picks_format_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let html = dir.path().join("page.html");
        fs::write(&html, "<p>alpha</p><script>beta</script>").unwrap();
        let doc = Document::open(&html, &SegmenterConfig::default()).unwrap();
        assert_eq!(doc.format(), SourceFormat::Html);
        assert_eq!(doc.len(), 1);

        let text = dir.path().join("notes.txt");
        fs::write(&text, "alpha\n<script>beta</script>\n").unwrap();
        let doc = Document::open(&text, &SegmenterConfig::default()).unwrap();
        assert_eq!(doc.format(), SourceFormat::Text);
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_open_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "").unwrap();
        let doc = Document::open(&path, &SegmenterConfig::default()).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn test_open_missing_file_fails() {
        let err = Document::open(Path::new("/definitely/not/here.txt"), &SegmenterConfig::default());
        assert!(err.is_err());
    }

    #[test]
    fn test_window_is_clamped() {
        let doc = Document::parse("a\nb\nc", SourceFormat::Text, &SegmenterConfig::default()).unwrap();
        assert_eq!(doc.window(1..10).len(), 2);
        assert!(doc.window(5..10).is_empty());
        assert_eq!(doc.get(2).map(|s| s.text.as_str()), Some("c"));
    }
}
