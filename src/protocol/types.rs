//! Line Protocol Data Types
//!
//! Requests and responses are single text lines terminated by `\n`.
//!
//! ## Request Format
//!
//! ```text
//! COMMAND arg1 arg2 ...\n
//! ```
//!
//! The command token is case-insensitive; arguments are separated by single
//! spaces and taken verbatim (no quoting).
//!
//! ## Response Format
//!
//! ```text
//! OK                       successful mutation
//! none                     absent key
//! PONG / string            simple status text
//! (integer) 2              counts and lengths
//! (string) hello           GET of a value, tagged with its type
//! ["hello", "world"]       sequences
//! ERR [code 4] list is empty
//! ```

use crate::storage::{StorageError, Value};
use std::fmt;

/// The line terminator used for responses
pub const LF: u8 = b'\n';

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Upper-cased command token
    pub command: String,
    /// Arguments, verbatim
    pub args: Vec<String>,
}

impl Request {
    /// Builds a request from a trimmed, non-empty line.
    ///
    /// # Example
    /// ```
    /// use cachekv::protocol::Request;
    /// let req = Request::from_line("lpush L a b");
    /// assert_eq!(req.command, "LPUSH");
    /// assert_eq!(req.args, vec!["L", "a", "b"]);
    /// ```
    pub fn from_line(line: &str) -> Self {
        let mut parts = line.split(' ');
        let command = parts.next().unwrap_or_default().to_uppercase();
        let args = parts.map(str::to_string).collect();

        Self { command, args }
    }
}

/// A response sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Successful mutation: `OK`
    Ok,
    /// Absent key: `none`
    None,
    /// Bare status text such as a type tag or `PONG`
    Simple(String),
    /// A count or length: `(integer) N`
    Integer(i64),
    /// A full stored value, tagged with its type
    Value(Value),
    /// A sequence of strings
    Array(Vec<String>),
    /// An error: `ERR message`
    Error(String),
}

impl Response {
    /// Creates a new error response.
    ///
    /// # Example
    /// ```
    /// use cachekv::protocol::Response;
    /// let err = Response::error("unknown command 'FOO'");
    /// assert_eq!(err.serialize(), b"ERR unknown command 'FOO'\n");
    /// ```
    pub fn error(message: impl Into<String>) -> Self {
        Response::Error(message.into())
    }

    /// Creates a new simple status response.
    pub fn simple(text: impl Into<String>) -> Self {
        Response::Simple(text.into())
    }

    /// Creates a new integer response.
    pub fn integer(n: i64) -> Self {
        Response::Integer(n)
    }

    /// Common response for PING
    pub fn pong() -> Self {
        Response::Simple("PONG".to_string())
    }

    /// Serializes the response to one `\n`-terminated line.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.serialize_into(&mut buf);
        buf
    }

    /// Serializes the response into an existing buffer.
    pub fn serialize_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self.to_string().as_bytes());
        buf.push(LF);
    }

    /// Returns true if this response is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Response::Error(_))
    }
}

impl From<StorageError> for Response {
    fn from(err: StorageError) -> Self {
        Response::Error(format!("[code {}] {}", err.code(), err))
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ok => write!(f, "OK"),
            Response::None => write!(f, "none"),
            Response::Simple(s) => write!(f, "{}", s),
            Response::Integer(n) => write!(f, "(integer) {}", n),
            Response::Value(value) => write!(f, "{}", value),
            Response::Array(items) => write!(f, "{:?}", items),
            Response::Error(s) => write!(f, "ERR {}", s),
        }
    }
}
