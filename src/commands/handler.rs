//! Command Handler Module
//!
//! This module maps each parsed [`Request`] to exactly one storage engine
//! operation and turns the outcome into a [`Response`].
//!
//! ## Supported Commands
//!
//! ### Value Commands
//! - `SET key value` - Store an integer if the token fits in an i64, else a string
//! - `GET key` - Get a key's value, tagged with its type
//! - `TYPE key` - Get the type tag ("string", "integer", "lists", "dict" or "none")
//!
//! ### Expiration Commands
//! - `EXPIRE key seconds` - Delete the key after a delay unless rewritten
//! - `PEXPIRE key milliseconds` - Same, in milliseconds
//! - `TTL key` - Remaining seconds (-1 without expiry, -2 if absent)
//! - `PERSIST key` - Cancel a pending expiry
//!
//! ### List Commands
//! - `LPUSH key value [value ...]` - Prepend values, keeping their order
//! - `RPUSH key value [value ...]` - Append values
//! - `LRANGE key start end` - Elements `[start, end)`, negative end from the tail
//! - `RPOP key` - Remove and return the last element
//! - `LLEN key` - Length of a list
//!
//! ### Dictionary Commands
//! - `HMSET key field value [field value ...]` - Replace with a new dictionary
//! - `HMGET key field [field ...]` - Values of fields ("" when missing)
//! - `HGETALL key` - All fields and values, flattened
//!
//! ### Server Commands
//! - `PING [message]` - Test connection
//! - `DBSIZE` - Number of keys
//! - `INFO` - Engine statistics

use crate::protocol::{Request, Response};
use crate::storage::StorageEngine;
use std::sync::Arc;
use std::time::Duration;

/// Handles commands by dispatching them to the storage engine.
///
/// Build one handler per server and clone it for each connection; clones
/// share the engine and the start time reported by INFO.
#[derive(Clone)]
pub struct CommandHandler {
    /// The storage engine
    storage: Arc<StorageEngine>,
    /// Server start time for INFO command
    start_time: std::time::Instant,
}

impl CommandHandler {
    /// Creates a new command handler with the given storage engine.
    pub fn new(storage: Arc<StorageEngine>) -> Self {
        Self {
            storage,
            start_time: std::time::Instant::now(),
        }
    }

    /// Time since this handler (or the one it was cloned from) was created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Executes a command and returns the response.
    pub fn execute(&self, request: Request) -> Response {
        self.dispatch(&request.command, &request.args)
    }

    /// Dispatches a command to its handler.
    fn dispatch(&self, cmd: &str, args: &[String]) -> Response {
        match cmd {
            // Value commands
            "SET" => self.cmd_set(args),
            "GET" => self.cmd_get(args),
            "TYPE" => self.cmd_type(args),

            // Expiration commands
            "EXPIRE" => self.cmd_expire(args, Duration::from_secs, "EXPIRE"),
            "PEXPIRE" => self.cmd_expire(args, Duration::from_millis, "PEXPIRE"),
            "TTL" => self.cmd_ttl(args),
            "PERSIST" => self.cmd_persist(args),

            // List commands
            "LPUSH" => self.cmd_push(args, "LPUSH"),
            "RPUSH" => self.cmd_push(args, "RPUSH"),
            "LRANGE" => self.cmd_lrange(args),
            "RPOP" => self.cmd_rpop(args),
            "LLEN" => self.cmd_llen(args),

            // Dictionary commands
            "HMSET" => self.cmd_hmset(args),
            "HMGET" => self.cmd_hmget(args),
            "HGETALL" => self.cmd_hgetall(args),

            // Server commands
            "PING" => self.cmd_ping(args),
            "DBSIZE" => self.cmd_dbsize(args),
            "INFO" => self.cmd_info(args),

            // Unknown command
            _ => Response::error(format!("unknown command '{}'", cmd)),
        }
    }

    // ========================================================================
    // Helper functions
    // ========================================================================

    fn wrong_arity(cmd: &str) -> Response {
        Response::error(format!("wrong number of arguments for '{}' command", cmd))
    }

    /// Extracts the key argument, rejecting empty keys.
    fn get_key<'a>(&self, args: &'a [String]) -> Result<&'a str, Response> {
        match args.first().map(String::as_str) {
            Some("") => Err(Response::error("empty key")),
            Some(key) => Ok(key),
            None => Err(Response::error("missing key")),
        }
    }

    /// Parses an integer argument.
    fn get_integer(&self, value: &str) -> Result<i64, Response> {
        value
            .parse()
            .map_err(|_| Response::error("value is not an integer or out of range"))
    }

    // ========================================================================
    // Value Commands
    // ========================================================================

    /// SET key value
    fn cmd_set(&self, args: &[String]) -> Response {
        if args.len() != 2 {
            return Self::wrong_arity("SET");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        self.storage.set_literal(key, &args[1]);
        Response::Ok
    }

    /// GET key
    fn cmd_get(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("GET");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        match self.storage.get(key) {
            Some(value) => Response::Value(value),
            None => Response::None,
        }
    }

    /// TYPE key
    fn cmd_type(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("TYPE");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        Response::simple(self.storage.key_type(key))
    }

    // ========================================================================
    // Expiration Commands
    // ========================================================================

    /// EXPIRE key seconds / PEXPIRE key milliseconds
    fn cmd_expire(&self, args: &[String], unit: fn(u64) -> Duration, name: &str) -> Response {
        if args.len() != 2 {
            return Self::wrong_arity(name);
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        let ttl = match self.get_integer(&args[1]) {
            Ok(n) if n >= 0 => unit(n as u64),
            Ok(_) => return Response::error("invalid expire time"),
            Err(e) => return e,
        };

        match self.storage.expire(key, ttl) {
            Ok(()) => Response::Ok,
            Err(e) => e.into(),
        }
    }

    /// TTL key
    fn cmd_ttl(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("TTL");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        match self.storage.ttl(key) {
            None => Response::integer(-2),
            Some(None) => Response::integer(-1),
            // Round up so a key that is still present never reports 0
            Some(Some(remaining)) => {
                Response::integer(remaining.as_millis().div_ceil(1000) as i64)
            }
        }
    }

    /// PERSIST key
    fn cmd_persist(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("PERSIST");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        Response::integer(self.storage.persist(key) as i64)
    }

    // ========================================================================
    // List Commands
    // ========================================================================

    /// LPUSH key value [value ...] / RPUSH key value [value ...]
    fn cmd_push(&self, args: &[String], name: &str) -> Response {
        if args.len() < 2 {
            return Self::wrong_arity(name);
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        let values = args[1..].to_vec();
        let result = if name == "LPUSH" {
            self.storage.lpush(key, values)
        } else {
            self.storage.rpush(key, values)
        };

        match result {
            Ok(len) => Response::integer(len as i64),
            Err(e) => e.into(),
        }
    }

    /// LRANGE key start end
    fn cmd_lrange(&self, args: &[String]) -> Response {
        if args.len() != 3 {
            return Self::wrong_arity("LRANGE");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        let (start, end) = match (self.get_integer(&args[1]), self.get_integer(&args[2])) {
            (Ok(start), Ok(end)) => (start, end),
            (Err(e), _) | (_, Err(e)) => return e,
        };

        match self.storage.lrange(key, start, end) {
            Ok(items) => Response::Array(items),
            Err(e) => e.into(),
        }
    }

    /// RPOP key
    fn cmd_rpop(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("RPOP");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        match self.storage.rpop(key) {
            Ok(item) => Response::Simple(item),
            Err(e) => e.into(),
        }
    }

    /// LLEN key
    fn cmd_llen(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("LLEN");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        match self.storage.llen(key) {
            Ok(len) => Response::integer(len as i64),
            Err(e) => e.into(),
        }
    }

    // ========================================================================
    // Dictionary Commands
    // ========================================================================

    /// HMSET key field value [field value ...]
    fn cmd_hmset(&self, args: &[String]) -> Response {
        if args.is_empty() {
            return Self::wrong_arity("HMSET");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        // An odd pair count is reported by the engine
        match self.storage.hmset(key, &args[1..]) {
            Ok(()) => Response::Ok,
            Err(e) => e.into(),
        }
    }

    /// HMGET key field [field ...]
    fn cmd_hmget(&self, args: &[String]) -> Response {
        if args.len() < 2 {
            return Self::wrong_arity("HMGET");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        match self.storage.hmget(key, &args[1..]) {
            Ok(values) => Response::Array(values),
            Err(e) => e.into(),
        }
    }

    /// HGETALL key
    fn cmd_hgetall(&self, args: &[String]) -> Response {
        if args.len() != 1 {
            return Self::wrong_arity("HGETALL");
        }

        let key = match self.get_key(args) {
            Ok(k) => k,
            Err(e) => return e,
        };

        match self.storage.hgetall(key) {
            Ok(pairs) => Response::Array(pairs),
            Err(e) => e.into(),
        }
    }

    // ========================================================================
    // Server Commands
    // ========================================================================

    /// PING [message]
    fn cmd_ping(&self, args: &[String]) -> Response {
        match args {
            [] => Response::pong(),
            [msg] => Response::simple(msg.clone()),
            _ => Self::wrong_arity("PING"),
        }
    }

    /// DBSIZE
    fn cmd_dbsize(&self, _args: &[String]) -> Response {
        Response::integer(self.storage.len() as i64)
    }

    /// INFO
    fn cmd_info(&self, _args: &[String]) -> Response {
        let stats = self.storage.stats();
        let uptime = self.uptime().as_secs();

        Response::simple(format!(
            "version:{} uptime_in_seconds:{} keys:{} expires:{} expired_keys:{} reads:{} writes:{}",
            crate::VERSION,
            uptime,
            stats.keys,
            stats.armed_timers,
            stats.expired,
            stats.reads,
            stats.writes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_handler() -> CommandHandler {
        let storage = Arc::new(StorageEngine::new());
        CommandHandler::new(storage)
    }

    fn run(handler: &CommandHandler, line: &str) -> Response {
        handler.execute(Request::from_line(line))
    }

    fn array(items: &[&str]) -> Response {
        Response::Array(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_ping() {
        let handler = create_handler();

        assert_eq!(run(&handler, "PING"), Response::pong());
        assert_eq!(run(&handler, "ping hello"), Response::simple("hello"));
    }

    #[test]
    fn test_get_and_type_missing() {
        let handler = create_handler();

        assert_eq!(run(&handler, "GET nonexistent"), Response::None);
        assert_eq!(run(&handler, "TYPE nonexistent"), Response::simple("none"));
    }

    #[test]
    fn test_set_get() {
        let handler = create_handler();

        assert_eq!(run(&handler, "SET k hello"), Response::Ok);
        assert_eq!(run(&handler, "GET k").to_string(), "(string) hello");
        assert_eq!(run(&handler, "TYPE k"), Response::simple("string"));

        assert_eq!(run(&handler, "set k 10"), Response::Ok);
        assert_eq!(run(&handler, "GET k").to_string(), "(integer) 10");
        assert_eq!(run(&handler, "TYPE k"), Response::simple("integer"));
    }

    #[test]
    fn test_set_number_shaped_text() {
        let handler = create_handler();

        assert_eq!(run(&handler, "SET version 1.0"), Response::Ok);
        assert_eq!(run(&handler, "GET version").to_string(), "(string) 1.0");

        assert_eq!(run(&handler, "SET big 99999999999999999999"), Response::Ok);
        assert_eq!(run(&handler, "TYPE big"), Response::simple("string"));

        // Same token accepted by SET and by list pushes
        assert_eq!(run(&handler, "RPUSH L 1e9"), Response::integer(1));
        assert_eq!(run(&handler, "SET f 1e9"), Response::Ok);
    }

    #[test]
    fn test_arity_and_empty_key() {
        let handler = create_handler();

        assert!(run(&handler, "SET k").is_error());
        assert!(run(&handler, "SET k a b").is_error());
        assert!(run(&handler, "GET").is_error());
        assert!(run(&handler, "LPUSH L").is_error());
        assert_eq!(run(&handler, "GET  k"), Response::error("wrong number of arguments for 'GET' command"));
        assert_eq!(run(&handler, "SET  v"), Response::error("empty key"));
    }

    #[test]
    fn test_lists() {
        let handler = create_handler();

        assert_eq!(run(&handler, "LPUSH L world"), Response::integer(1));
        assert_eq!(run(&handler, "LPUSH L hello"), Response::integer(2));
        assert_eq!(run(&handler, "LRANGE L 0 -1"), array(&["hello", "world"]));
        assert_eq!(run(&handler, "TYPE L"), Response::simple("lists"));

        assert_eq!(run(&handler, "RPUSH R hello"), Response::integer(1));
        assert_eq!(run(&handler, "RPUSH R world"), Response::integer(2));
        assert_eq!(run(&handler, "LRANGE R 0 -2"), array(&["hello"]));

        assert_eq!(run(&handler, "RPOP R"), Response::simple("world"));
        assert_eq!(run(&handler, "LLEN R"), Response::integer(1));
        assert_eq!(run(&handler, "RPOP R"), Response::simple("hello"));
        assert_eq!(run(&handler, "LRANGE R 0 -1"), array(&[]));
        assert_eq!(run(&handler, "TYPE R"), Response::simple("lists"));
    }

    #[test]
    fn test_list_errors() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, "LRANGE L 0 -1").to_string(),
            "ERR [code 4] list is empty"
        );
        assert_eq!(run(&handler, "RPOP L").to_string(), "ERR [code 4] list is empty");

        run(&handler, "RPUSH L a");
        assert_eq!(
            run(&handler, "LRANGE L 0 5").to_string(),
            "ERR [code 5] index out of range: [0, 5) for list of length 1"
        );
        assert!(run(&handler, "LRANGE L zero -1").is_error());

        run(&handler, "SET s text");
        assert_eq!(
            run(&handler, "LPUSH s a").to_string(),
            "ERR [code 2] could not convert value into a list"
        );
    }

    #[test]
    fn test_dicts() {
        let handler = create_handler();

        assert_eq!(run(&handler, "HMSET d a 1 b 2"), Response::Ok);
        assert_eq!(run(&handler, "HMGET d a c"), array(&["1", ""]));
        assert_eq!(run(&handler, "TYPE d"), Response::simple("dict"));
        assert_eq!(run(&handler, "GET d").to_string(), r#"(dict) {"a": "1", "b": "2"}"#);

        let Response::Array(mut all) = run(&handler, "HGETALL d") else {
            panic!("expected an array");
        };
        all.sort();
        assert_eq!(all, vec!["1", "2", "a", "b"]);
    }

    #[test]
    fn test_dict_errors() {
        let handler = create_handler();

        run(&handler, "HMSET d a 1");
        assert_eq!(
            run(&handler, "HMSET d x 1 y").to_string(),
            "ERR [code 6] wrong number of arguments for HMSET: got 3"
        );
        assert_eq!(run(&handler, "HMGET d a"), array(&["1"]));

        assert_eq!(
            run(&handler, "HMGET missing a").to_string(),
            "ERR [code 7] dictionary does not exist"
        );

        run(&handler, "SET s 1");
        assert_eq!(
            run(&handler, "HGETALL s").to_string(),
            "ERR [code 3] internal representation of dictionary is corrupted"
        );
    }

    #[test]
    fn test_expire_missing_key() {
        let handler = create_handler();

        assert_eq!(
            run(&handler, "EXPIRE missing 10").to_string(),
            "ERR [code 1] key missing does not exist"
        );
        assert!(run(&handler, "EXPIRE k -1").is_error());
    }

    #[tokio::test]
    async fn test_expire_and_ttl() {
        let handler = create_handler();

        assert_eq!(run(&handler, "TTL k"), Response::integer(-2));
        run(&handler, "SET k v");
        assert_eq!(run(&handler, "TTL k"), Response::integer(-1));

        assert_eq!(run(&handler, "EXPIRE k 100"), Response::Ok);
        assert_eq!(run(&handler, "TTL k"), Response::integer(100));

        assert_eq!(run(&handler, "PERSIST k"), Response::integer(1));
        assert_eq!(run(&handler, "PERSIST k"), Response::integer(0));

        assert_eq!(run(&handler, "PEXPIRE k 30"), Response::Ok);
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(run(&handler, "GET k"), Response::None);
    }

    #[test]
    fn test_dbsize_and_info() {
        let handler = create_handler();

        assert_eq!(run(&handler, "DBSIZE"), Response::integer(0));
        run(&handler, "SET a 1");
        run(&handler, "RPUSH b x");
        assert_eq!(run(&handler, "DBSIZE"), Response::integer(2));

        let info = run(&handler, "INFO").to_string();
        assert!(info.contains("keys:2"));
        assert!(info.contains("expires:0"));
    }

    #[test]
    fn test_clones_share_start_time() {
        let handler = create_handler();
        std::thread::sleep(Duration::from_millis(50));

        let per_connection = handler.clone();
        assert!(per_connection.uptime() >= Duration::from_millis(50));
    }

    #[test]
    fn test_unknown_command() {
        let handler = create_handler();

        let response = run(&handler, "UNKNOWN");
        assert!(matches!(response, Response::Error(_)));
        assert_eq!(response.to_string(), "ERR unknown command 'UNKNOWN'");
    }
}
