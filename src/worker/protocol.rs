//! Messages exchanged between a host UI and a session worker
//!
//! Uses newline-delimited JSON, one message per line, tagged by `type`:
//!
//! ```text
//! {"type":"SetQuery","text":"the","mode":"deep"}
//! {"type":"Results","generation":1,"reset":true,"view":{...},"added":[...]}
//! ```

use crate::search::{
    Match, Query, RelatedTerm, ResultsView, ScanPhase, SearchMode, SessionSnapshot, SessionState,
};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Read, Write};

/// Longest accepted line
const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Request from the host to the worker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Replace the query (typing, or a mode change in the settings panel)
    SetQuery {
        text: String,
        #[serde(default)]
        mode: SearchMode,
        #[serde(default)]
        related: Vec<RelatedTerm>,
    },

    /// The "Scan More" button
    ScanMore,

    /// Focus the next match
    Next,

    /// Focus the previous match
    Prev,

    /// Focus a match by 1-based index
    Focus { index: usize },

    /// Close the search bar
    Clear,

    /// Ask for a session snapshot
    Snapshot,

    /// Stop the worker
    Shutdown,
}

impl Command {
    pub fn set_query(query: Query) -> Self {
        Command::SetQuery {
            text: query.text,
            mode: query.mode,
            related: query.related,
        }
    }
}

/// Notification from the worker to the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A scan pass started
    Scanning { generation: u64, phase: ScanPhase },

    /// Counters changed
    Results {
        generation: u64,
        /// The host should drop every match it holds before applying `added`
        reset: bool,
        view: ResultsView,
        /// Matches appended by this step, in document order
        added: Vec<Match>,
    },

    /// Scan more was requested while not available; nothing changed
    Unavailable { state: SessionState, mode: SearchMode },

    /// An in-flight pass was discarded because the query changed
    Cancelled { generation: u64 },

    Snapshot { snapshot: SessionSnapshot },

    /// The worker stopped
    ShuttingDown,

    Error { message: String },
}

/// Write one message followed by a newline
pub fn write_message<W: Write>(writer: &mut W, msg: &impl Serialize) -> std::io::Result<()> {
    serde_json::to_writer(&mut *writer, msg)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read the next non-empty line as a message. Returns `None` at end of input.
///
/// A line longer than the limit is skipped up to its newline and reported as
/// `InvalidData`, so the following message can still be read.
pub fn read_message<R: BufRead, T: for<'de> Deserialize<'de>>(
    reader: &mut R,
) -> std::io::Result<Option<T>> {
    let mut line = Vec::new();
    loop {
        line.clear();
        let read = reader
            .by_ref()
            .take(MAX_MESSAGE_BYTES as u64 + 1)
            .read_until(b'\n', &mut line)?;
        if read == 0 {
            return Ok(None);
        }
        if line.len() > MAX_MESSAGE_BYTES && !line.ends_with(b"\n") {
            skip_line(reader)?;
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "Message too large",
            ));
        }
        if !line.iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }

    serde_json::from_slice(&line)
        .map(Some)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

/// Consume input up to and including the next newline
fn skip_line<R: BufRead>(reader: &mut R) -> std::io::Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match memchr::memchr(b'\n', available) {
            Some(end) => {
                reader.consume(end + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_commands_from_lines() {
        let input = "{\"type\":\"SetQuery\",\"text\":\"the\",\"mode\":\"deep\"}\n\n{\"type\":\"ScanMore\"}\n";
        let mut reader = Cursor::new(input);

        let first: Option<Command> = read_message(&mut reader).unwrap();
        assert_eq!(
            first,
            Some(Command::SetQuery {
                text: "the".to_string(),
                mode: SearchMode::Deep,
                related: Vec::new(),
            })
        );
        let second: Option<Command> = read_message(&mut reader).unwrap();
        assert_eq!(second, Some(Command::ScanMore));
        let end: Option<Command> = read_message(&mut reader).unwrap();
        assert_eq!(end, None);
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let mut reader = Cursor::new("{\"type\":\"SetQuery\",\"text\":\"x\",\"mode\":\"fuzzy\"}\n");
        let result: std::io::Result<Option<Command>> = read_message(&mut reader);
        assert_eq!(result.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_event_is_one_line() {
        let mut buf = Vec::new();
        write_message(&mut buf, &Event::Cancelled { generation: 3 }).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "{\"type\":\"Cancelled\",\"generation\":3}\n");
    }

    #[test]
    fn test_oversized_line_is_skipped() {
        let mut input = format!(
            "{{\"type\":\"SetQuery\",\"text\":\"{}\"}}\n",
            "x".repeat(MAX_MESSAGE_BYTES)
        );
        input.push_str("{\"type\":\"Next\"}\n");
        let mut reader = Cursor::new(input);

        let first: std::io::Result<Option<Command>> = read_message(&mut reader);
        assert_eq!(first.unwrap_err().kind(), std::io::ErrorKind::InvalidData);
        let second: Option<Command> = read_message(&mut reader).unwrap();
        assert_eq!(second, Some(Command::Next));
    }
}
