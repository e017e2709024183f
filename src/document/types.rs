use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::Path;

/// Identifier of a segment inside its document. Equal to the segment's index.
pub type SegmentId = u32;

/// Where a segment starts in the source content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct SegmentPosition {
    /// Byte offset of the first character of the segment text
    pub byte_offset: usize,
    /// 1-based line number of that byte
    pub line: u32,
}

/// An atomic unit of searchable text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub text: String,
    pub position: SegmentPosition,
}

impl Segment {
    pub fn new(id: SegmentId, text: impl Into<String>, position: SegmentPosition) -> Self {
        Self {
            id,
            text: text.into(),
            position,
        }
    }
}

/// Format of the host content, which picks the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Text,
    Html,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "html" | "htm" | "xhtml" => SourceFormat::Html,
            _ => SourceFormat::Text,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or_default()
    }
}

/// A segmented document. Segments are stored in document order and
/// `segments[i].id == i`.
#[derive(Debug, Clone, Default)]
pub struct Document {
    segments: Vec<Segment>,
    format: SourceFormat,
}

impl Document {
    pub(crate) fn from_segments(segments: Vec<Segment>, format: SourceFormat) -> Self {
        debug_assert!(
            segments
                .iter()
                .enumerate()
                .all(|(i, s)| s.id as usize == i)
        );
        Self { segments, format }
    }

    pub fn format(&self) -> SourceFormat {
        self.format
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, id: SegmentId) -> Option<&Segment> {
        self.segments.get(id as usize)
    }

    /// Slice of segments covered by `range`, clamped to the document length
    pub fn window(&self, range: Range<usize>) -> &[Segment] {
        let end = range.end.min(self.segments.len());
        let start = range.start.min(end);
        &self.segments[start..end]
    }

    /// Total bytes of segment text
    pub fn text_len(&self) -> usize {
        self.segments.iter().map(|s| s.text.len()).sum()
    }
}
