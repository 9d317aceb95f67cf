//! Thread-Safe Storage Engine with Per-Key Expiration
//!
//! This module implements the core storage engine for cachekv: one table
//! mapping keys to tagged values, guarded by one reader/writer lock.
//!
//! ## Design Decisions
//!
//! 1. **One Lock for the Whole Table**: Every mutation takes the write lock,
//!    every read takes the read lock. All writes are totally ordered.
//! 2. **Closed Value Model**: Values are a [`Value`] enum; every operation
//!    matches it exhaustively and never coerces between variants.
//! 3. **Copies Out, Never Aliases**: Reads clone what they return, so no
//!    caller ever holds a reference into a stored list or dictionary.
//! 4. **All-or-Nothing**: Every check happens before the first write, so
//!    a failed operation leaves the table untouched.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │  RwLock<HashMap<String, Entry>>                       │  │
//! │  │    Entry { value, version, expiry: Option<Handle> }   │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! └──────────────────────────────▲──────────────────────────────┘
//!                                │ write lock, compare-and-delete
//!                  ┌─────────────┴─────────────┐
//!                  │  Expiry timers (1 per key) │
//!                  │  (Tokio tasks)             │
//!                  └───────────────────────────┘
//! ```
//!
//! The single lock is the scalability ceiling of this design. Striping the
//! table into independently locked shards keyed by hash is the natural
//! extension point; the public API would not change.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::expiry::{self, ExpiryHandle};
use crate::storage::value::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

/// A stored value plus its bookkeeping.
#[derive(Debug)]
pub(crate) struct Entry {
    /// The actual value stored
    value: Value,
    /// Identity of this exact value; changes on every write to the key
    version: u64,
    /// Armed expiration timer, if any. Dropping it cancels the timer.
    expiry: Option<ExpiryHandle>,
}

impl Entry {
    fn new(value: Value, version: u64) -> Self {
        Self {
            value,
            version,
            expiry: None,
        }
    }

    /// Returns the version assigned by the last write.
    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    /// Returns the id of the armed timer, if any.
    pub(crate) fn expiry_id(&self) -> Option<u64> {
        self.expiry.as_ref().map(ExpiryHandle::id)
    }

    /// Records an in-place write: new version, pending timer cancelled.
    fn touch(&mut self, key: &str, version: u64) {
        self.version = version;
        if let Some(handle) = self.expiry.take() {
            debug!(key, id = handle.id(), "Expiration cancelled by write");
        }
    }
}

/// The table shared between the engine and its expiry timers.
#[derive(Debug, Default)]
pub(crate) struct Table {
    entries: RwLock<HashMap<String, Entry>>,

    /// Source of entry versions and timer ids
    next_id: AtomicU64,

    /// Statistics: total read operations
    reads: AtomicU64,

    /// Statistics: total write operations
    writes: AtomicU64,

    /// Statistics: number of keys removed by expiration timers
    expired: AtomicU64,
}

impl Table {
    /// Takes the lock in shared mode. A poisoned lock is still usable
    /// because no operation leaves an entry half-written.
    pub(crate) fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Entry>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Takes the lock exclusively.
    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Entry>> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }
}

/// The main storage engine for cachekv.
///
/// All operations are synchronous and complete within one critical section
/// of the table lock. The engine is meant to be wrapped in an `Arc` and
/// shared by every connection task.
///
/// # Example
///
/// ```
/// use cachekv::storage::StorageEngine;
///
/// let engine = StorageEngine::new();
///
/// engine.set("greeting", "hello");
/// assert_eq!(engine.key_type("greeting"), "string");
///
/// engine.rpush("letters", vec!["a".into(), "b".into()]).unwrap();
/// assert_eq!(engine.lrange("letters", 0, -1).unwrap(), vec!["a", "b"]);
/// ```
pub struct StorageEngine {
    table: Arc<Table>,

    /// Runtime used for expiry timers when EXPIRE is called off-runtime
    runtime: Option<Handle>,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("keys", &self.len())
            .field("has_runtime", &self.runtime.is_some())
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates an empty engine.
    ///
    /// If called inside a Tokio runtime, that runtime is remembered for
    /// expiry timers armed later from threads outside it.
    pub fn new() -> Self {
        Self {
            table: Arc::new(Table::default()),
            runtime: Handle::try_current().ok(),
        }
    }

    /// Creates an empty engine whose expiry timers run on `runtime`.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            table: Arc::new(Table::default()),
            runtime: Some(runtime),
        }
    }

    /// Replaces whatever is stored at `key` with `value`.
    ///
    /// Last write wins, across variant changes too. Any armed timer for the
    /// key is cancelled. Returns the stored value; its tag is `value.kind()`.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Value {
        let value = value.into();
        let mut entries = self.table.write();
        let version = self.table.next_id();

        let previous = entries.insert(key.to_string(), Entry::new(value.clone(), version));
        if let Some(handle) = previous.and_then(|entry| entry.expiry) {
            debug!(key, id = handle.id(), "Expiration cancelled by SET");
        }

        value
    }

    /// Classifies a wire token with [`Value::from_literal`] and stores it.
    pub fn set_literal(&self, key: &str, token: &str) -> Value {
        self.set(key, Value::from_literal(token))
    }

    /// Returns a copy of the value at `key`, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<Value> {
        let entries = self.table.read();
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Returns the tag of the value at `key`, or `"none"` if absent.
    pub fn key_type(&self, key: &str) -> &'static str {
        let entries = self.table.read();
        entries
            .get(key)
            .map(|entry| entry.value.kind().as_str())
            .unwrap_or("none")
    }

    /// Arms a one-shot timer that deletes `key` after `ttl`, unless the key
    /// is written in the meantime.
    ///
    /// Returns immediately. A timer already armed for the key is cancelled
    /// and replaced.
    pub fn expire(&self, key: &str, ttl: Duration) -> StorageResult<()> {
        let mut entries = self.table.write();
        let entry = entries
            .get_mut(key)
            .ok_or_else(|| StorageError::KeyNotFound(key.to_string()))?;

        let runtime = Handle::try_current()
            .ok()
            .or_else(|| self.runtime.clone())
            .ok_or(StorageError::TimerUnavailable)?;

        let handle = expiry::schedule(
            &runtime,
            Arc::downgrade(&self.table),
            key.to_string(),
            entry.version,
            self.table.next_id(),
            ttl,
        );

        if let Some(previous) = entry.expiry.replace(handle) {
            debug!(key, id = previous.id(), "Expiration replaced");
        }

        Ok(())
    }

    /// Returns the remaining time to live of `key`.
    ///
    /// - `None` if the key is absent
    /// - `Some(None)` if no timer is armed
    /// - `Some(Some(remaining))` otherwise
    pub fn ttl(&self, key: &str) -> Option<Option<Duration>> {
        let entries = self.table.read();
        entries
            .get(key)
            .map(|entry| entry.expiry.as_ref().map(ExpiryHandle::remaining))
    }

    /// Cancels the armed timer of `key`.
    ///
    /// Returns `true` if a timer was cancelled, `false` if the key is absent
    /// or had none.
    pub fn persist(&self, key: &str) -> bool {
        let mut entries = self.table.write();
        match entries.get_mut(key).and_then(|entry| entry.expiry.take()) {
            Some(handle) => {
                debug!(key, id = handle.id(), "Expiration cancelled by PERSIST");
                true
            }
            None => false,
        }
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns engine statistics.
    pub fn stats(&self) -> StorageStats {
        let (keys, timers) = {
            let entries = self.table.read();
            let timers = entries.values().filter(|e| e.expiry.is_some()).count();
            (entries.len(), timers)
        };

        StorageStats {
            keys: keys as u64,
            armed_timers: timers as u64,
            reads: self.table.reads.load(Ordering::Relaxed),
            writes: self.table.writes.load(Ordering::Relaxed),
            expired: self.table.expired.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Pushes `values` to the head of the list at `key`, keeping their order.
    ///
    /// `LPUSH k a b` on `[x]` gives `[a, b, x]`. Creates the list if absent.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn lpush(&self, key: &str, values: Vec<String>) -> StorageResult<usize> {
        self.push(key, values, |list, values| {
            for value in values.into_iter().rev() {
                list.push_front(value);
            }
        })
    }

    /// Pushes `values` to the tail of the list at `key`, keeping their order.
    ///
    /// # Returns
    /// The length of the list after the push.
    pub fn rpush(&self, key: &str, values: Vec<String>) -> StorageResult<usize> {
        self.push(key, values, |list, values| list.extend(values))
    }

    fn push(
        &self,
        key: &str,
        values: Vec<String>,
        insert: impl FnOnce(&mut VecDeque<String>, Vec<String>),
    ) -> StorageResult<usize> {
        let mut entries = self.table.write();
        let version = self.table.next_id();

        match entries.get_mut(key) {
            Some(entry) => {
                let Value::List(list) = &mut entry.value else {
                    return Err(StorageError::CorruptedList);
                };
                insert(list, values);
                let len = list.len();
                entry.touch(key, version);
                Ok(len)
            }
            None => {
                let len = values.len();
                entries.insert(key.to_string(), Entry::new(Value::from(values), version));
                Ok(len)
            }
        }
    }

    /// Returns the elements `[start, end)` of the list at `key`.
    ///
    /// A negative `end` is resolved as `len + 1 + end`, so `-1` reaches the
    /// last element inclusive. Bounds that are negative, reversed or past
    /// the end after resolution fail with `IndexOutOfRange`.
    pub fn lrange(&self, key: &str, start: i64, end: i64) -> StorageResult<Vec<String>> {
        let entries = self.table.read();
        let entry = entries.get(key).ok_or(StorageError::EmptyList)?;
        let Value::List(list) = &entry.value else {
            return Err(StorageError::CorruptedList);
        };

        let len = list.len();
        let end = if end < 0 { len as i64 + 1 + end } else { end };

        if start < 0 || end < 0 || start > end || end > len as i64 {
            return Err(StorageError::IndexOutOfRange { start, end, len });
        }

        Ok(list.range(start as usize..end as usize).cloned().collect())
    }

    /// Removes and returns the last element of the list at `key`.
    ///
    /// Popping the only element leaves an empty list behind; the key is
    /// not deleted.
    pub fn rpop(&self, key: &str) -> StorageResult<String> {
        let mut entries = self.table.write();
        let version = self.table.next_id();

        let entry = entries.get_mut(key).ok_or(StorageError::EmptyList)?;
        let Value::List(list) = &mut entry.value else {
            return Err(StorageError::CorruptedList);
        };

        let item = list.pop_back().ok_or(StorageError::EmptyList)?;
        entry.touch(key, version);
        Ok(item)
    }

    /// Returns the length of the list at `key`, or 0 if absent.
    pub fn llen(&self, key: &str) -> StorageResult<usize> {
        let entries = self.table.read();
        match entries.get(key).map(|entry| &entry.value) {
            None => Ok(0),
            Some(Value::List(list)) => Ok(list.len()),
            Some(_) => Err(StorageError::CorruptedList),
        }
    }

    // ========================================================================
    // DICTIONARY OPERATIONS
    // ========================================================================

    /// Builds a new dictionary from consecutive field/value pairs and stores
    /// it at `key`, replacing any previous value of any variant.
    ///
    /// A later duplicate field overrides an earlier one. An odd number of
    /// arguments fails with `WrongArgumentCount` and stores nothing.
    pub fn hmset<S: AsRef<str>>(&self, key: &str, args: &[S]) -> StorageResult<()> {
        if args.len() % 2 != 0 {
            return Err(StorageError::WrongArgumentCount {
                command: "HMSET",
                got: args.len(),
            });
        }

        let dict: HashMap<String, String> = args
            .chunks_exact(2)
            .map(|pair| (pair[0].as_ref().to_string(), pair[1].as_ref().to_string()))
            .collect();

        self.set(key, dict);
        Ok(())
    }

    /// Returns the values of `fields` in request order.
    ///
    /// A field missing from the dictionary yields an empty string.
    pub fn hmget<S: AsRef<str>>(&self, key: &str, fields: &[S]) -> StorageResult<Vec<String>> {
        let entries = self.table.read();
        let Some(Value::Dict(dict)) = entries.get(key).map(|entry| &entry.value) else {
            return Err(StorageError::DictionaryNotExist);
        };

        Ok(fields
            .iter()
            .map(|field| dict.get(field.as_ref()).cloned().unwrap_or_default())
            .collect())
    }

    /// Returns every field/value pair of the dictionary at `key`, flattened
    /// as `field, value, field, value, ...` in no particular order.
    pub fn hgetall(&self, key: &str) -> StorageResult<Vec<String>> {
        let entries = self.table.read();
        let entry = entries.get(key).ok_or(StorageError::DictionaryNotExist)?;
        let Value::Dict(dict) = &entry.value else {
            return Err(StorageError::CorruptedDictionary);
        };

        Ok(dict
            .iter()
            .flat_map(|(field, value)| [field.clone(), value.clone()])
            .collect())
    }
}

/// Engine statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Keys with an armed expiration timer
    pub armed_timers: u64,
    /// Total shared-lock acquisitions
    pub reads: u64,
    /// Total exclusive-lock acquisitions
    pub writes: u64,
    /// Keys removed by expiration timers
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_get_and_type_on_missing_key() {
        let engine = StorageEngine::new();

        assert_eq!(engine.get("nonexistent"), None);
        assert_eq!(engine.key_type("nonexistent"), "none");
    }

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        let stored = engine.set("k", "hello");
        assert_eq!(stored.kind().as_str(), "string");
        assert_eq!(engine.get("k"), Some(Value::from("hello")));
        assert_eq!(engine.key_type("k"), "string");

        let stored = engine.set("k", 10i64);
        assert_eq!(stored, Value::Integer(10));
        assert_eq!(engine.key_type("k"), "integer");
    }

    #[test]
    fn test_set_replaces_across_variants() {
        let engine = StorageEngine::new();

        assert_ok!(engine.rpush("k", strings(&["a", "b"])));
        engine.set("k", "plain");
        assert_eq!(engine.get("k"), Some(Value::from("plain")));

        assert_ok!(engine.hmset("k", &["f", "v"]));
        assert_eq!(engine.key_type("k"), "dict");

        engine.set("k", strings(&["x"]));
        assert_eq!(engine.key_type("k"), "lists");
    }

    #[test]
    fn test_set_literal() {
        let engine = StorageEngine::new();

        assert_eq!(engine.set_literal("n", "42"), Value::Integer(42));
        assert_eq!(engine.key_type("n"), "integer");

        // Number-shaped text that is not an i64 is still stored, as a string
        assert_eq!(engine.set_literal("n", "3.14"), Value::String("3.14".into()));
        assert_eq!(engine.key_type("n"), "string");

        engine.set_literal("big", "99999999999999999999");
        assert_eq!(engine.get("big"), Some(Value::String("99999999999999999999".into())));
    }

    #[test]
    fn test_get_returns_a_copy() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", strings(&["a"])));

        if let Some(Value::List(mut copy)) = engine.get("L") {
            copy.push_back("mutated".to_string());
        }

        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["a"])));
    }

    // ========================================================================
    // List Operation Tests
    // ========================================================================

    #[test]
    fn test_lpush_prepends() {
        let engine = StorageEngine::new();

        assert_eq!(engine.lpush("L", strings(&["world"])), Ok(1));
        assert_eq!(engine.lpush("L", strings(&["hello"])), Ok(2));
        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["hello", "world"])));
    }

    #[test]
    fn test_lpush_keeps_argument_order() {
        let engine = StorageEngine::new();

        assert_ok!(engine.rpush("L", strings(&["x"])));
        assert_eq!(engine.lpush("L", strings(&["a", "b"])), Ok(3));
        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["a", "b", "x"])));
    }

    #[test]
    fn test_rpush_appends() {
        let engine = StorageEngine::new();

        assert_eq!(engine.rpush("L", strings(&["hello"])), Ok(1));
        assert_eq!(engine.rpush("L", strings(&["world"])), Ok(2));
        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["hello", "world"])));
        assert_eq!(engine.lrange("L", 0, -2), Ok(strings(&["hello"])));
    }

    #[test]
    fn test_push_on_non_list() {
        let engine = StorageEngine::new();
        engine.set("s", "text");

        assert_eq!(engine.lpush("s", strings(&["a"])), Err(StorageError::CorruptedList));
        assert_eq!(engine.rpush("s", strings(&["a"])), Err(StorageError::CorruptedList));
        assert_eq!(engine.get("s"), Some(Value::from("text")));
    }

    #[test]
    fn test_lrange_errors() {
        let engine = StorageEngine::new();

        assert_eq!(engine.lrange("missing", 0, -1), Err(StorageError::EmptyList));

        engine.set("s", 1i64);
        assert_eq!(engine.lrange("s", 0, -1), Err(StorageError::CorruptedList));
    }

    #[test]
    fn test_lrange_bounds() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", strings(&["a", "b", "c"])));

        assert_eq!(engine.lrange("L", 1, 3), Ok(strings(&["b", "c"])));
        assert_eq!(engine.lrange("L", 1, 1), Ok(Vec::new()));
        assert_eq!(engine.lrange("L", 3, 3), Ok(Vec::new()));
        assert_eq!(engine.lrange("L", 0, -4), Ok(Vec::new()));

        // Past the end
        assert_eq!(
            engine.lrange("L", 0, 4),
            Err(StorageError::IndexOutOfRange { start: 0, end: 4, len: 3 })
        );
        // Reversed
        assert_err!(engine.lrange("L", 2, 1));
        // Negative start is not resolved
        assert_err!(engine.lrange("L", -1, 3));
        // Negative end resolving below zero
        assert_err!(engine.lrange("L", 0, -5));
    }

    #[test]
    fn test_lrange_empty_list() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", Vec::new()));

        assert_eq!(engine.lrange("L", 0, -1), Ok(Vec::new()));
        assert_err!(engine.lrange("L", 0, 1));
    }

    #[test]
    fn test_rpop() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", strings(&["a", "b"])));

        assert_eq!(engine.rpop("L"), Ok("b".to_string()));
        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["a"])));

        assert_eq!(engine.rpop("L"), Ok("a".to_string()));
        // The key stays, bound to an empty list
        assert_eq!(engine.key_type("L"), "lists");
        assert_eq!(engine.lrange("L", 0, -1), Ok(Vec::new()));

        assert_eq!(engine.rpop("L"), Err(StorageError::EmptyList));
    }

    #[test]
    fn test_rpop_errors() {
        let engine = StorageEngine::new();

        assert_eq!(engine.rpop("missing"), Err(StorageError::EmptyList));

        assert_ok!(engine.hmset("d", &["a", "1"]));
        assert_eq!(engine.rpop("d"), Err(StorageError::CorruptedList));
    }

    #[test]
    fn test_llen() {
        let engine = StorageEngine::new();

        assert_eq!(engine.llen("L"), Ok(0));
        assert_ok!(engine.rpush("L", strings(&["a", "b", "c"])));
        assert_eq!(engine.llen("L"), Ok(3));

        engine.set("s", "x");
        assert_eq!(engine.llen("s"), Err(StorageError::CorruptedList));
    }

    // ========================================================================
    // Dictionary Operation Tests
    // ========================================================================

    #[test]
    fn test_hmset_hmget() {
        let engine = StorageEngine::new();

        assert_ok!(engine.hmset("d", &["a", "1", "b", "2"]));
        assert_eq!(engine.hmget("d", &["a", "c"]), Ok(strings(&["1", ""])));
        assert_eq!(engine.hmget("d", &["b", "a", "b"]), Ok(strings(&["2", "1", "2"])));
    }

    #[test]
    fn test_hmset_odd_arguments_keeps_prior_value() {
        let engine = StorageEngine::new();
        assert_ok!(engine.hmset("d", &["a", "1"]));

        assert_eq!(
            engine.hmset("d", &["x", "1", "y"]),
            Err(StorageError::WrongArgumentCount { command: "HMSET", got: 3 })
        );
        assert_eq!(engine.hmget("d", &["a", "x"]), Ok(strings(&["1", ""])));

        assert_err!(engine.hmset("fresh", &["only-field"]));
        assert_eq!(engine.get("fresh"), None);
    }

    #[test]
    fn test_hmset_uses_every_pair() {
        let engine = StorageEngine::new();
        let args = strings(&["f1", "v1", "f2", "v2", "f3", "v3", "f4", "v4"]);

        assert_ok!(engine.hmset("d", &args));

        let mut all = engine.hgetall("d").unwrap();
        assert_eq!(all.len(), 8);
        all.sort();
        assert_eq!(all, strings(&["f1", "f2", "f3", "f4", "v1", "v2", "v3", "v4"]));
    }

    #[test]
    fn test_hmset_duplicate_field_last_wins() {
        let engine = StorageEngine::new();

        assert_ok!(engine.hmset("d", &["a", "1", "a", "2"]));
        assert_eq!(engine.hmget("d", &["a"]), Ok(strings(&["2"])));
        assert_eq!(engine.hgetall("d").map(|all| all.len()), Ok(2));
    }

    #[test]
    fn test_hmset_replaces_instead_of_merging() {
        let engine = StorageEngine::new();

        assert_ok!(engine.hmset("d", &["a", "1"]));
        assert_ok!(engine.hmset("d", &["b", "2"]));
        assert_eq!(engine.hmget("d", &["a", "b"]), Ok(strings(&["", "2"])));

        assert_ok!(engine.rpush("L", strings(&["x"])));
        assert_ok!(engine.hmset("L", &["f", "v"]));
        assert_eq!(engine.key_type("L"), "dict");
    }

    #[test]
    fn test_dict_errors() {
        let engine = StorageEngine::new();

        assert_eq!(engine.hmget("missing", &["a"]), Err(StorageError::DictionaryNotExist));
        assert_eq!(engine.hgetall("missing"), Err(StorageError::DictionaryNotExist));

        engine.set("s", "text");
        assert_eq!(engine.hmget("s", &["a"]), Err(StorageError::DictionaryNotExist));
        assert_eq!(engine.hgetall("s"), Err(StorageError::CorruptedDictionary));
    }

    #[test]
    fn test_hgetall_pairs() {
        let engine = StorageEngine::new();
        assert_ok!(engine.hmset("d", &["a", "1", "b", "2"]));

        let all = engine.hgetall("d").unwrap();
        let pairs: HashMap<_, _> = all
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs["a"], "1");
        assert_eq!(pairs["b"], "2");
    }

    // ========================================================================
    // Expiration Tests
    // ========================================================================

    #[test]
    fn test_expire_missing_key() {
        let engine = StorageEngine::new();

        assert_eq!(
            engine.expire("missing", Duration::from_secs(1)),
            Err(StorageError::KeyNotFound("missing".to_string()))
        );
    }

    #[test]
    fn test_expire_without_runtime() {
        let engine = StorageEngine::new();
        engine.set("k", "v");

        assert_eq!(
            engine.expire("k", Duration::from_secs(1)),
            Err(StorageError::TimerUnavailable)
        );
        assert_eq!(engine.ttl("k"), Some(None));
    }

    #[tokio::test]
    async fn test_expire_deletes_key() {
        let engine = StorageEngine::new();
        engine.set("k", "hello world");

        assert_ok!(engine.expire("k", Duration::from_millis(50)));
        assert!(engine.get("k").is_some());

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.get("k"), None);
        assert_eq!(engine.key_type("k"), "none");
        assert_eq!(engine.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_expire_spares_rewritten_key() {
        let engine = StorageEngine::new();
        engine.set("k", "old");

        assert_ok!(engine.expire("k", Duration::from_millis(50)));
        engine.set("k", "new");

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.get("k"), Some(Value::from("new")));
        assert_eq!(engine.ttl("k"), Some(None));
    }

    #[tokio::test]
    async fn test_expire_spares_list_mutated_in_place() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", strings(&["a"])));

        assert_ok!(engine.expire("L", Duration::from_millis(50)));
        assert_ok!(engine.rpush("L", strings(&["b"])));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["a", "b"])));
    }

    #[tokio::test]
    async fn test_expire_spares_list_after_lpush() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", strings(&["b"])));

        assert_ok!(engine.expire("L", Duration::from_millis(50)));
        assert_ok!(engine.lpush("L", strings(&["a"])));
        assert_eq!(engine.ttl("L"), Some(None));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["a", "b"])));
    }

    #[tokio::test]
    async fn test_expire_spares_list_after_rpop() {
        let engine = StorageEngine::new();
        assert_ok!(engine.rpush("L", strings(&["a", "b"])));

        assert_ok!(engine.expire("L", Duration::from_millis(50)));
        assert_eq!(engine.rpop("L"), Ok("b".to_string()));
        assert_eq!(engine.ttl("L"), Some(None));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.lrange("L", 0, -1), Ok(strings(&["a"])));
    }

    #[tokio::test]
    async fn test_expire_spares_dict_after_hmset() {
        let engine = StorageEngine::new();
        assert_ok!(engine.hmset("d", &["f", "old"]));

        assert_ok!(engine.expire("d", Duration::from_millis(50)));
        assert_ok!(engine.hmset("d", &["f", "new"]));
        assert_eq!(engine.ttl("d"), Some(None));

        tokio::time::sleep(Duration::from_millis(150)).await;

        assert_eq!(engine.hmget("d", &["f"]), Ok(strings(&["new"])));
    }

    #[tokio::test]
    async fn test_expire_rearm_replaces_timer() {
        let engine = StorageEngine::new();
        engine.set("k", "v");

        assert_ok!(engine.expire("k", Duration::from_millis(50)));
        assert_ok!(engine.expire("k", Duration::from_millis(400)));
        assert_eq!(engine.stats().armed_timers, 1);

        tokio::time::sleep(Duration::from_millis(150)).await;
        // The first timer was cancelled
        assert!(engine.get("k").is_some());

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(engine.get("k"), None);
    }

    #[tokio::test]
    async fn test_stale_timer_is_a_no_op() {
        let engine = StorageEngine::new();
        engine.set("k", "v");
        assert_ok!(engine.expire("k", Duration::from_secs(60)));

        let (version, id) = {
            let entries = engine.table.read();
            let entry = &entries["k"];
            (entry.version(), entry.expiry_id().unwrap())
        };

        // Wrong timer id, wrong version
        assert!(!expiry::expire_if_unchanged(&engine.table, "k", version, id + 1));
        assert!(!expiry::expire_if_unchanged(&engine.table, "k", version + 1, id));
        assert!(!expiry::expire_if_unchanged(&engine.table, "missing", version, id));
        assert!(engine.get("k").is_some());

        assert!(expiry::expire_if_unchanged(&engine.table, "k", version, id));
        assert_eq!(engine.get("k"), None);
        // Firing twice is harmless
        assert!(!expiry::expire_if_unchanged(&engine.table, "k", version, id));
    }

    #[tokio::test]
    async fn test_persist_cancels_timer() {
        let engine = StorageEngine::new();
        engine.set("k", "v");

        assert!(!engine.persist("k"));
        assert_ok!(engine.expire("k", Duration::from_millis(50)));
        assert!(engine.persist("k"));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(engine.get("k").is_some());
    }

    #[tokio::test]
    async fn test_ttl() {
        let engine = StorageEngine::new();

        assert_eq!(engine.ttl("missing"), None);

        engine.set("k", "v");
        assert_eq!(engine.ttl("k"), Some(None));

        assert_ok!(engine.expire("k", Duration::from_secs(100)));
        let remaining = engine.ttl("k").flatten().unwrap();
        assert!(remaining > Duration::from_secs(99) && remaining <= Duration::from_secs(100));
    }

    #[test]
    fn test_expire_from_thread_uses_captured_runtime() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_time()
            .build()
            .unwrap();

        let engine = StorageEngine::with_runtime(runtime.handle().clone());
        engine.set("k", "v");

        assert_ok!(engine.expire("k", Duration::from_millis(20)));
        std::thread::sleep(Duration::from_millis(200));

        assert_eq!(engine.get("k"), None);
    }

    // ========================================================================
    // Concurrency Tests
    // ========================================================================

    #[test]
    fn test_concurrent_set_same_key() {
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                let value = format!("writer-{}-", i).repeat(64);
                for _ in 0..200 {
                    engine.set("shared", value.clone());
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let Some(Value::String(stored)) = engine.get("shared") else {
            panic!("expected a string value");
        };
        let written: Vec<String> = (0..10).map(|i| format!("writer-{}-", i).repeat(64)).collect();
        assert!(written.contains(&stored));
    }

    #[test]
    fn test_concurrent_pushes() {
        use std::thread;

        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    engine.rpush("L", vec![format!("{}-{}", i, j)]).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.llen("L"), Ok(800));
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();
        engine.set("a", 1i64);
        engine.set("b", 2i64);

        let stats = engine.stats();
        assert_eq!(stats.keys, 2);
        assert_eq!(stats.armed_timers, 0);
        assert!(stats.writes >= 2);
        assert_eq!(engine.len(), 2);
        assert!(!engine.is_empty());
    }
}
