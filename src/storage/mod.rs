//! Storage Engine Module
//!
//! This module provides the core storage functionality for cachekv:
//! a thread-safe key-value table holding strings, integers, lists and
//! dictionaries, with per-key expiration timers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │   one RwLock ── HashMap<String, Entry>                      │
//! │                     Entry = Value + version + timer         │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │ compare-and-delete
//!              ┌─────────────┴─────────────┐
//!              │  ExpiryHandle per key      │
//!              │  (Tokio task)              │
//!              └───────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use cachekv::storage::{StorageEngine, StorageError, Value};
//!
//! let engine = StorageEngine::new();
//!
//! engine.set("name", "alice");
//! assert_eq!(engine.get("name"), Some(Value::from("alice")));
//!
//! engine.hmset("user", &["id", "7", "role", "admin"]).unwrap();
//! assert_eq!(engine.hmget("user", &["role", "email"]).unwrap(), vec!["admin", ""]);
//!
//! assert_eq!(engine.rpop("nothing"), Err(StorageError::EmptyList));
//! ```

pub mod engine;
pub mod error;
mod expiry;
pub mod value;

// Re-export commonly used types
pub use engine::{StorageEngine, StorageStats};
pub use error::{StorageError, StorageResult};
pub use value::{Value, ValueKind};
