//! Line Protocol Implementation
//!
//! Clients talk to cachekv with plain text lines, one command per line,
//! which makes a telnet or `nc` session a usable client.
//!
//! ## Modules
//!
//! - `types`: Defines `Request`, `Response` and response serialization
//! - `parser`: Incremental parser for buffered incoming lines
//!
//! ## Example
//!
//! ```
//! use cachekv::protocol::{Line, LineParser, Response};
//!
//! // Parsing incoming data
//! let (line, consumed) = LineParser::new().parse(b"TYPE name\n").unwrap().unwrap();
//! assert_eq!(consumed, 10);
//! assert!(matches!(line, Line::Command(_)));
//!
//! // Creating responses
//! assert_eq!(Response::None.serialize(), b"none\n");
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{Line, LineParser, ParseError, ParseResult};
pub use types::{Request, Response};
