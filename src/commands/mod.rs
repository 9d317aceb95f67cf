//! Command Handler Module
//!
//! This module implements the command processing layer for cachekv.
//! It receives parsed requests, executes exactly one storage engine
//! operation per request, and returns the response line.
//!
//! ## Architecture
//!
//! ```text
//! Client Request
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Line Parser    │  (protocol module)
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ CommandHandler  │  (this module)
//! │                 │
//! │  - Dispatch     │
//! │  - Validate     │
//! │  - Execute      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ StorageEngine   │  (storage module)
//! └─────────────────┘
//! ```
//!
//! ## Supported Commands
//!
//! - Values: `SET`, `GET`, `TYPE`
//! - Expiration: `EXPIRE`, `PEXPIRE`, `TTL`, `PERSIST`
//! - Lists: `LPUSH`, `RPUSH`, `LRANGE`, `RPOP`, `LLEN`
//! - Dictionaries: `HMSET`, `HMGET`, `HGETALL`
//! - Server: `PING`, `DBSIZE`, `INFO`

pub mod handler;

// Re-export the main command handler
pub use handler::CommandHandler;
