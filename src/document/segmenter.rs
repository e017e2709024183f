use crate::document::types::{Segment, SegmentId, SegmentPosition};
use memchr::memchr_iter;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ops::Range;

/// Tags whose contents are never searchable
pub const DEFAULT_EXCLUDED_TAGS: &[&str] = &["script", "style", "noscript", "template"];

/// Splits host content into an ordered sequence of segments
pub trait Segmenter {
    fn segment_all(&self, content: &str) -> Vec<Segment>;
}

/// Segmenter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmenterConfig {
    /// HTML elements skipped together with everything inside them
    #[serde(default = "default_exclude_tags")]
    pub exclude_tags: Vec<String>,
}

fn default_exclude_tags() -> Vec<String> {
    DEFAULT_EXCLUDED_TAGS.iter().map(|t| t.to_string()).collect()
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            exclude_tags: default_exclude_tags(),
        }
    }
}

/// Maps increasing byte offsets to 1-based line numbers without rescanning
/// from the start of the content each time.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: u32,
}

impl<'a> LineCounter<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            bytes: content.as_bytes(),
            offset: 0,
            line: 1,
        }
    }

    fn line_at(&mut self, offset: usize) -> u32 {
        let offset = offset.min(self.bytes.len());
        if offset < self.offset {
            // Out-of-order lookup, recount from the top
            self.offset = 0;
            self.line = 1;
        }
        self.line += memchr_iter(b'\n', &self.bytes[self.offset..offset]).count() as u32;
        self.offset = offset;
        self.line
    }
}

/// One segment per non-blank line
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSegmenter;

impl Segmenter for TextSegmenter {
    fn segment_all(&self, content: &str) -> Vec<Segment> {
        let bytes = content.as_bytes();
        let mut segments = Vec::new();
        let mut line_start = 0;
        let mut line_number: u32 = 1;

        let ends = memchr_iter(b'\n', bytes).chain(std::iter::once(bytes.len()));
        for line_end in ends {
            if line_start > bytes.len() {
                break;
            }
            let mut text = &content[line_start..line_end];
            if let Some(stripped) = text.strip_suffix('\r') {
                text = stripped;
            }

            if !text.trim().is_empty() {
                segments.push(Segment::new(
                    segments.len() as SegmentId,
                    text,
                    SegmentPosition {
                        byte_offset: line_start,
                        line: line_number,
                    },
                ));
            }

            line_start = line_end + 1;
            line_number += 1;
        }

        segments
    }
}

/// One segment per visible text run of an HTML document.
///
/// Markup is dropped, excluded elements and comments are skipped entirely,
/// character references are decoded and whitespace runs collapse to a single
/// space the way a browser renders them.
#[derive(Debug, Clone)]
pub struct HtmlSegmenter {
    excluded: Regex,
    tag: Regex,
    entity: Regex,
}

impl HtmlSegmenter {
    pub fn new(config: &SegmenterConfig) -> Result<Self, regex::Error> {
        let mut alternatives = vec![r"<!--(?:.*?-->|.*)".to_string()];
        for tag in &config.exclude_tags {
            let tag = tag.trim();
            if tag.is_empty() || !tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                tracing::warn!(tag, "ignoring invalid excluded tag name");
                continue;
            }
            let tag = regex::escape(tag);
            alternatives.push(format!(r"<{tag}(?:[\s/][^>]*)?>(?:.*?</{tag}\s*>|.*)"));
        }

        Ok(Self {
            excluded: Regex::new(&format!("(?is){}", alternatives.join("|")))?,
            tag: Regex::new(r"</?[A-Za-z!?][^>]*>")?,
            entity: Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z]{2,8});")?,
        })
    }

    fn push_text_runs(
        &self,
        content: &str,
        span: Range<usize>,
        lines: &mut LineCounter<'_>,
        segments: &mut Vec<Segment>,
    ) {
        let slice = &content[span.clone()];
        let mut last = 0;
        for tag in self.tag.find_iter(slice) {
            self.push_run(content, span.start + last..span.start + tag.start(), lines, segments);
            last = tag.end();
        }
        self.push_run(content, span.start + last..span.end, lines, segments);
    }

    fn push_run(
        &self,
        content: &str,
        run: Range<usize>,
        lines: &mut LineCounter<'_>,
        segments: &mut Vec<Segment>,
    ) {
        let raw = &content[run.clone()];
        let leading = raw.len() - raw.trim_start().len();
        let decoded = self.decode_entities(raw);
        let text = decoded.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            return;
        }

        let byte_offset = run.start + leading;
        segments.push(Segment::new(
            segments.len() as SegmentId,
            text,
            SegmentPosition {
                byte_offset,
                line: lines.line_at(byte_offset),
            },
        ));
    }

    fn decode_entities<'a>(&self, raw: &'a str) -> Cow<'a, str> {
        self.entity.replace_all(raw, |caps: &Captures<'_>| {
            let name = &caps[1];
            decode_entity(name).map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
    }
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse::<u32>().ok().and_then(char::from_u32);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => None,
    }
}

impl Segmenter for HtmlSegmenter {
    fn segment_all(&self, content: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut lines = LineCounter::new(content);
        let mut cursor = 0;

        for excluded in self.excluded.find_iter(content) {
            self.push_text_runs(content, cursor..excluded.start(), &mut lines, &mut segments);
            cursor = excluded.end();
        }
        self.push_text_runs(content, cursor..content.len(), &mut lines, &mut segments);

        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn html(content: &str) -> Vec<Segment> {
        HtmlSegmenter::new(&SegmenterConfig::default())
            .unwrap()
            .segment_all(content)
    }

    fn texts(segments: &[Segment]) -> Vec<&str> {
        segments.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_text_segments_skip_blank_lines() {
        let segments = TextSegmenter.segment_all("first line\n\n   \nsecond line\r\nthird");
        assert_eq!(texts(&segments), vec!["first line", "second line", "third"]);
        assert_eq!(segments[1].position.line, 4);
        assert_eq!(segments[1].position.byte_offset, 16);
        assert_eq!(segments[2].id, 2);
    }

    #[test]
    fn test_text_empty_document() {
        assert!(TextSegmenter.segment_all("").is_empty());
        assert!(TextSegmenter.segment_all("\n\n  \n").is_empty());
    }

    #[test]
    fn test_text_trailing_newline() {
        let segments = TextSegmenter.segment_all("only\n");
        assert_eq!(texts(&segments), vec!["only"]);
    }

    #[test]
    fn test_html_text_runs() {
        let segments = html("<html><body><h1>Title</h1>\n<p>Some <b>bold</b> text</p></body></html>");
        assert_eq!(texts(&segments), vec!["Title", "Some", "bold", "text"]);
        assert_eq!(segments[0].position.line, 1);
        assert_eq!(segments[1].position.line, 2);
    }

    #[test]
    fn test_html_skips_scripts_styles_and_comments() {
        let segments = html(
            "<p>before</p><script>var the = 1;</script><!-- the comment -->\
             <style>.the { }</style><p>after</p>",
        );
        assert_eq!(texts(&segments), vec!["before", "after"]);
    }

    #[test]
    fn test_html_unterminated_script_runs_to_end() {
        let segments = html("<p>kept</p><script>never closed <p>hidden</p>");
        assert_eq!(texts(&segments), vec!["kept"]);
    }

    #[test]
    fn test_html_custom_elements_are_not_excluded() {
        let segments = html(
            "<style-guide>Visible</style-guide><style>x</style>\
             <script type=\"module\">hidden</script><template-row>row</template-row>",
        );
        assert_eq!(texts(&segments), vec!["Visible", "row"]);
    }

    #[test]
    fn test_html_decodes_entities_and_collapses_whitespace() {
        let segments = html("<p>Fish &amp; chips\n   &lt;tasty&gt; &#65;&#x42;&nbsp;c &bogus;</p>");
        assert_eq!(texts(&segments), vec!["Fish & chips <tasty> AB c &bogus;"]);
    }

    #[test]
    fn test_html_lone_angle_bracket_is_text() {
        let segments = html("<p>a < b</p>");
        assert_eq!(texts(&segments), vec!["a < b"]);
    }

    #[test]
    fn test_custom_excluded_tags() {
        let config = SegmenterConfig {
            exclude_tags: vec!["aside".to_string(), "bad tag".to_string()],
        };
        let segments = HtmlSegmenter::new(&config)
            .unwrap()
            .segment_all("<aside>skip</aside><main>keep</main><script>x</script>");
        assert_eq!(texts(&segments), vec!["keep", "x"]);
    }

    #[test]
    fn test_segmentation_is_stable() {
        let content = "<div>one</div><div>two</div>";
        assert_eq!(html(content), html(content));
    }
}
