//! Storage engine errors.
//!
//! Every failure the engine can produce is a variant of [`StorageError`].
//! Errors are returned to the immediate caller; an operation that fails
//! leaves the table exactly as it found it.

use thiserror::Error;

/// Errors returned by [`StorageEngine`](crate::storage::StorageEngine) operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The value handed to SET is not one of the four supported variants.
    #[error("value has unsupported type {0}")]
    UnsupportedType(String),

    /// EXPIRE target does not exist.
    #[error("key {0} does not exist")]
    KeyNotFound(String),

    /// A list operation found a non-list value.
    #[error("could not convert value into a list")]
    CorruptedList,

    /// A dictionary operation found a non-dictionary value after a presence check.
    #[error("internal representation of dictionary is corrupted")]
    CorruptedDictionary,

    /// A list read or pop found no list (or no elements) at the key.
    #[error("list is empty")]
    EmptyList,

    /// LRANGE bounds are invalid after negative-end resolution.
    #[error("index out of range: [{start}, {end}) for list of length {len}")]
    IndexOutOfRange { start: i64, end: i64, len: usize },

    /// HMSET received a dangling field with no value.
    #[error("wrong number of arguments for {command}: got {got}")]
    WrongArgumentCount { command: &'static str, got: usize },

    /// A dictionary read found no dictionary at the key.
    #[error("dictionary does not exist")]
    DictionaryNotExist,

    /// EXPIRE was called with no Tokio runtime available to host the timer.
    #[error("no async runtime available to schedule expiration")]
    TimerUnavailable,
}

impl StorageError {
    /// Returns the stable numeric code of this error kind.
    pub fn code(&self) -> u8 {
        match self {
            StorageError::UnsupportedType(_) => 0,
            StorageError::KeyNotFound(_) => 1,
            StorageError::CorruptedList => 2,
            StorageError::CorruptedDictionary => 3,
            StorageError::EmptyList => 4,
            StorageError::IndexOutOfRange { .. } => 5,
            StorageError::WrongArgumentCount { .. } => 6,
            StorageError::DictionaryNotExist => 7,
            StorageError::TimerUnavailable => 8,
        }
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
