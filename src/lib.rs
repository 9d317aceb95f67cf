//! # cachekv - An In-Memory Key-Value Store
//!
//! cachekv is a small Redis-like store written in Rust. Keys map to one of
//! four value types (string, integer, list, dictionary) and any key can be
//! given a time to live after which it is deleted.
//!
//! ## Features
//!
//! - **Typed values**: strings, integers, lists and dictionaries
//! - **Per-key expiration**: one timer per key, cancelled by any rewrite
//! - **Line protocol**: plain text commands, usable from `nc` or telnet
//! - **Async I/O**: built on Tokio, one task per connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                             cachekv                             │
//! │                                                                 │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐          │
//! │  │ TCP Server  │───>│ Connection  │───>│  Command    │          │
//! │  │ (Listener)  │    │  Handler    │    │  Handler    │          │
//! │  └─────────────┘    └──────┬──────┘    └──────┬──────┘          │
//! │                            │                  │                 │
//! │                            ▼                  ▼                 │
//! │                     ┌─────────────┐    ┌──────────────────────┐ │
//! │                     │ Line Parser │    │    StorageEngine     │ │
//! │                     └─────────────┘    │  RwLock<HashMap>     │ │
//! │                                        └──────────▲───────────┘ │
//! │                                                   │             │
//! │                                  ┌────────────────┴──────────┐  │
//! │                                  │  Expiry timers (one Tokio │  │
//! │                                  │  task per expiring key)   │  │
//! │                                  └───────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use cachekv::commands::CommandHandler;
//! use cachekv::connection::{handle_connection, ConnectionStats};
//! use cachekv::protocol::LineParser;
//! use cachekv::storage::StorageEngine;
//! use std::sync::Arc;
//! use tokio::net::TcpListener;
//!
//! #[tokio::main]
//! async fn main() {
//!     let handler = CommandHandler::new(Arc::new(StorageEngine::new()));
//!     let stats = Arc::new(ConnectionStats::new());
//!
//!     let listener = TcpListener::bind("127.0.0.1:4000").await.unwrap();
//!
//!     loop {
//!         let (stream, addr) = listener.accept().await.unwrap();
//!         let stats = Arc::clone(&stats);
//!
//!         tokio::spawn(handle_connection(stream, addr, handler.clone(), LineParser::new(), stats));
//!     }
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: Line parser, requests and responses
//! - [`storage`]: Thread-safe storage engine with expiration timers
//! - [`commands`]: Maps each request to one storage operation
//! - [`connection`]: Client connection management
//!
//! ## Expiration
//!
//! `EXPIRE` arms a timer that deletes the key once it fires, but only if
//! the key was not rewritten in the meantime. Every write to a key
//! cancels its armed timer, so a rewritten key keeps its new value.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{handle_connection, ConnectionStats};
pub use protocol::{LineParser, ParseError, Request, Response};
pub use storage::{StorageEngine, StorageError, Value};

/// The default address cachekv listens on
pub const DEFAULT_ADDR: &str = ":4000";

/// Host used when an address omits it (`:4000`)
pub const ANY_HOST: &str = "0.0.0.0";

/// Version of cachekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Expands a listening address, filling in all interfaces when the host
/// is omitted.
///
/// # Example
/// ```
/// assert_eq!(cachekv::bind_address(":4000"), "0.0.0.0:4000");
/// assert_eq!(cachekv::bind_address("127.0.0.1:4000"), "127.0.0.1:4000");
/// ```
pub fn bind_address(addr: &str) -> String {
    match addr.strip_prefix(':') {
        Some(port) => format!("{}:{}", ANY_HOST, port),
        None => addr.to_string(),
    }
}
