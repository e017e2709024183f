//! Output formatting for search results, ripgrep-like

use crate::document::{Document, Segment};
use crate::search::{Match, MatchKind, ResultsView};
use serde::Serialize;
use std::io::{self, IsTerminal, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Machine-readable result of a `search` run
#[derive(Debug, Clone, Serialize)]
pub struct SearchReport<'a> {
    pub view: ResultsView,
    pub matches: Vec<MatchLine<'a>>,
}

/// A match with the segment context needed to show it
#[derive(Debug, Clone, Serialize)]
pub struct MatchLine<'a> {
    #[serde(flatten)]
    pub found: Match,
    pub line: u32,
    /// Byte offset of the match in the source content
    pub byte_offset: usize,
    pub text: &'a str,
}

impl<'a> SearchReport<'a> {
    pub fn new(document: &'a Document, view: ResultsView, matches: &[Match]) -> Self {
        let matches = matches
            .iter()
            .filter_map(|m| {
                let segment = document.get(m.segment_id)?;
                Some(MatchLine {
                    found: *m,
                    line: segment.position.line,
                    byte_offset: segment.position.byte_offset + m.start,
                    text: &segment.text[m.start..m.end()],
                })
            })
            .collect();
        Self { view, matches }
    }
}

/// Stdout stream; `Auto` only colors when stdout is a terminal
pub fn stdout(choice: ColorChoice) -> StandardStream {
    let choice = match choice {
        ColorChoice::Auto if !io::stdout().is_terminal() => ColorChoice::Never,
        choice => choice,
    };
    StandardStream::stdout(choice)
}

/// Print every segment holding a match, with the matches highlighted.
/// The segment holding the focused match is marked with `>`.
pub fn print_matches<W: WriteColor>(
    out: &mut W,
    document: &Document,
    matches: &[Match],
    focused: Option<&Match>,
) -> io::Result<()> {
    let mut start = 0;
    while start < matches.len() {
        let segment_id = matches[start].segment_id;
        let end = start
            + matches[start..]
                .iter()
                .take_while(|m| m.segment_id == segment_id)
                .count();

        if let Some(segment) = document.get(segment_id) {
            let focus = focused.filter(|f| f.segment_id == segment_id);
            print_segment_matches(out, segment, &matches[start..end], focus)?;
        }
        start = end;
    }
    Ok(())
}

fn print_segment_matches<W: WriteColor>(
    out: &mut W,
    segment: &Segment,
    matches: &[Match],
    focused: Option<&Match>,
) -> io::Result<()> {
    write!(out, "{}", if focused.is_some() { "> " } else { "  " })?;

    // Line number and column of the first match
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(out, "{}", segment.position.line)?;
    out.reset()?;
    write!(out, ":")?;
    out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(out, "{}", matches.first().map_or(1, |m| m.start + 1))?;
    out.reset()?;
    write!(out, ":")?;

    let text = &segment.text;
    let mut last = 0;
    for m in matches {
        let safe_start = m.start.min(text.len()).max(last);
        let safe_end = m.end().min(text.len());
        if safe_start > last {
            write!(out, "{}", &text[last..safe_start])?;
        }
        if safe_end > safe_start {
            let mut spec = match_color(m.kind);
            if focused.is_some_and(|f| f.key() == m.key()) {
                spec.set_underline(true);
            }
            out.set_color(&spec)?;
            write!(out, "{}", &text[safe_start..safe_end])?;
            out.reset()?;
            last = safe_end;
        }
    }
    if last < text.len() {
        write!(out, "{}", &text[last..])?;
    }

    writeln!(out)?;
    Ok(())
}

fn match_color(kind: MatchKind) -> ColorSpec {
    let color = match kind {
        MatchKind::Term => Color::Red,
        MatchKind::Phrase => Color::Blue,
        MatchKind::Related => Color::Yellow,
    };
    let mut spec = ColorSpec::new();
    spec.set_fg(Some(color)).set_bold(true);
    spec
}

/// Print the counter line the search bar shows
pub fn print_count<W: WriteColor>(out: &mut W, view: &ResultsView) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_bold(true))?;
    write!(out, "{view}")?;
    out.reset()?;
    write!(
        out,
        " ({}/{} segments scanned",
        view.scanned_segments, view.total_segments
    )?;
    if let Some(mode) = view.mode {
        write!(out, ", {mode}")?;
    }
    write!(out, ")")?;
    if view.can_scan_more {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)))?;
        write!(out, " [scan more available]")?;
        out.reset()?;
    }
    writeln!(out)?;
    Ok(())
}

/// Print segments, one per line (for the `segments` command)
pub fn print_segments<W: WriteColor>(out: &mut W, segments: &[Segment]) -> io::Result<()> {
    for segment in segments {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Magenta)))?;
        write!(out, "#{}", segment.id)?;
        out.reset()?;
        write!(out, " ")?;
        out.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
        write!(out, "{}", segment.position.line)?;
        out.reset()?;
        writeln!(out, ":{}", segment.text)?;
    }
    Ok(())
}

/// Write a value as one JSON document
pub fn print_json<W: Write>(out: &mut W, value: &impl Serialize) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{SegmenterConfig, SourceFormat};
    use crate::search::{Query, SearchMode, SearchSession, SessionConfig};
    use std::sync::Arc;
    use termcolor::NoColor;

    fn render(f: impl FnOnce(&mut NoColor<Vec<u8>>) -> io::Result<()>) -> String {
        let mut out = NoColor::new(Vec::new());
        f(&mut out).unwrap();
        String::from_utf8(out.into_inner()).unwrap()
    }

    fn searched(text: &str, window: usize) -> SearchSession {
        let doc = Document::parse(text, SourceFormat::Text, &SegmenterConfig::default()).unwrap();
        let mut session = SearchSession::new(Arc::new(doc), SessionConfig::with_window(window));
        session.set_query(Query::new("the", SearchMode::Deep)).unwrap();
        session
    }

    #[test]
    fn test_print_matches_groups_by_segment() {
        let session = searched("the cat and the dog\nnone\nbathe", 10);
        let text = render(|out| {
            print_matches(
                out,
                session.document(),
                session.matches(),
                session.results().current(),
            )
        });
        assert_eq!(text, "> 1:1:the cat and the dog\n  3:3:bathe\n");
    }

    #[test]
    fn test_print_count() {
        let session = searched("the\nx\nthe", 1);
        let text = render(|out| print_count(out, &session.view()));
        assert_eq!(text, "1 / 1 (1/3 segments scanned, deep) [scan more available]\n");
    }

    #[test]
    fn test_report_carries_offsets() {
        let session = searched("x\nsay THE word", 10);
        let report = SearchReport::new(session.document(), session.view(), session.matches());
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].line, 2);
        assert_eq!(report.matches[0].byte_offset, 6);
        assert_eq!(report.matches[0].text, "THE");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["matches"][0]["segment_id"], 1);
        assert_eq!(json["view"]["total"], 1);
    }

    #[test]
    fn test_print_segments() {
        let doc = Document::parse("a\n\nb", SourceFormat::Text, &SegmenterConfig::default()).unwrap();
        let text = render(|out| print_segments(out, doc.segments()));
        assert_eq!(text, "#0 1:a\n#1 3:b\n");
    }
}
