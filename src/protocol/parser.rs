//! Incremental Line Parser
//!
//! TCP is a stream, so a read may deliver half a command or several
//! commands at once. The parser looks at the buffered bytes and returns
//! either:
//! - `Ok(Some((line, consumed)))` - a complete line, `consumed` bytes were used
//! - `Ok(None)` - no newline yet, wait for more data
//! - `Err(ParseError)` - the line can never be valid
//!
//! The caller advances its buffer by `consumed` and tries again.
//!
//! ## Line Handling
//!
//! 1. Split at the first `\n`
//! 2. Trim surrounding whitespace (this also drops a trailing `\r`)
//! 3. `exit` (exact, case-sensitive) ends the session
//! 4. A blank line is skipped
//! 5. Anything else becomes a [`Request`]

use crate::protocol::types::{Request, LF};
use thiserror::Error;

/// Errors that can occur while parsing a line.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The line is not valid UTF-8
    #[error("invalid UTF-8: {0}")]
    InvalidUtf8(String),

    /// The line exceeds the maximum allowed size
    #[error("line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// Default maximum length of a single command line (64 KB)
pub const DEFAULT_MAX_LINE: usize = 64 * 1024;

/// The literal line that closes a connection.
pub const EXIT: &str = "exit";

/// One complete line read from a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    /// A command to execute
    Command(Request),
    /// The client asked to close the connection
    Exit,
    /// Nothing but whitespace
    Blank,
}

/// An incremental parser for newline-terminated commands.
///
/// # Example
///
/// ```
/// use cachekv::protocol::{Line, LineParser};
///
/// let parser = LineParser::new();
/// let (line, consumed) = parser.parse(b"GET name\nGET other").unwrap().unwrap();
///
/// assert_eq!(consumed, 9);
/// assert!(matches!(line, Line::Command(req) if req.command == "GET"));
/// ```
#[derive(Debug, Clone)]
pub struct LineParser {
    /// Longest accepted line, terminator excluded
    max_line: usize,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl LineParser {
    /// Creates a parser with the default line limit.
    pub fn new() -> Self {
        Self::with_max_line(DEFAULT_MAX_LINE)
    }

    /// Creates a parser that rejects lines longer than `max_line` bytes.
    pub fn with_max_line(max_line: usize) -> Self {
        Self { max_line }
    }

    /// Attempts to parse one line from the buffer.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Line, usize)>> {
        let Some(lf_pos) = find_lf(buf) else {
            if buf.len() > self.max_line {
                return Err(ParseError::LineTooLong {
                    size: buf.len(),
                    max: self.max_line,
                });
            }
            return Ok(None);
        };

        if lf_pos > self.max_line {
            return Err(ParseError::LineTooLong {
                size: lf_pos,
                max: self.max_line,
            });
        }

        let line = std::str::from_utf8(&buf[..lf_pos])
            .map_err(|e| ParseError::InvalidUtf8(e.to_string()))?
            .trim();

        let parsed = match line {
            EXIT => Line::Exit,
            "" => Line::Blank,
            _ => Line::Command(Request::from_line(line)),
        };

        Ok(Some((parsed, lf_pos + 1)))
    }
}

/// Finds the position of the first `\n` in the buffer.
#[inline]
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == LF)
}
