//! Stored Value Model
//!
//! Every key in the store is bound to exactly one [`Value`]. The set of
//! variants is closed: there is no "any" container and no implicit coercion
//! between variants. Writing a different variant to a key replaces the old
//! value wholesale.
//!
//! ```text
//! Value ─┬─ String(String)           TYPE -> "string"
//!        ├─ Integer(i64)             TYPE -> "integer"
//!        ├─ List(VecDeque<String>)   TYPE -> "lists"
//!        └─ Dict(HashMap<..>)        TYPE -> "dict"
//! ```

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

/// The tag of a [`Value`], as reported by the TYPE command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    Integer,
    List,
    Dict,
}

impl ValueKind {
    /// Returns the wire name of this tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::Integer => "integer",
            ValueKind::List => "lists",
            ValueKind::Dict => "dict",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value stored under a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Plain text.
    String(String),
    /// 64-bit signed integer.
    Integer(i64),
    /// Ordered sequence of strings, duplicates allowed.
    /// Stored as a deque so pushes on either end are O(1).
    List(VecDeque<String>),
    /// Field to value mapping with no ordering guarantee.
    Dict(HashMap<String, String>),
}

impl Value {
    /// Returns the variant tag.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::Integer(_) => ValueKind::Integer,
            Value::List(_) => ValueKind::List,
            Value::Dict(_) => ValueKind::Dict,
        }
    }

    /// Classifies a single wire token as a value.
    ///
    /// An optional sign followed by digits that fits in an `i64` becomes an
    /// `Integer`. Every other token, including `3.14` or an integer too
    /// large for `i64`, is stored as text.
    ///
    /// # Example
    ///
    /// ```
    /// use cachekv::storage::Value;
    ///
    /// assert_eq!(Value::from_literal("10"), Value::Integer(10));
    /// assert_eq!(Value::from_literal("1.0"), Value::String("1.0".into()));
    /// ```
    pub fn from_literal(token: &str) -> Value {
        let digits = token.strip_prefix(['-', '+']).unwrap_or(token);

        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = token.parse::<i64>() {
                return Value::Integer(n);
            }
        }

        Value::String(token.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<Vec<String>> for Value {
    fn from(items: Vec<String>) -> Self {
        Value::List(items.into())
    }
}

impl From<VecDeque<String>> for Value {
    fn from(items: VecDeque<String>) -> Self {
        Value::List(items)
    }
}

impl From<HashMap<String, String>> for Value {
    fn from(fields: HashMap<String, String>) -> Self {
        Value::Dict(fields)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "({}) {}", self.kind(), s),
            Value::Integer(n) => write!(f, "({}) {}", self.kind(), n),
            Value::List(items) => write!(f, "({}) {:?}", self.kind(), items),
            Value::Dict(fields) => {
                // Sorted so the rendering is stable across calls.
                let sorted: BTreeMap<_, _> = fields.iter().collect();
                write!(f, "({}) {:?}", self.kind(), sorted)
            }
        }
    }
}
