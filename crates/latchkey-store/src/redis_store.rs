//! Redis-backed key-value store
//!
//! Every trait method maps to a single Redis command or a single Lua script, so
//! each one is atomic on the server. `SET key value NX PX ttl` is the
//! create-with-expiry primitive; ownership checks run as scripts.

use std::time::Duration;

use async_trait::async_trait;
use latchkey_common::{LatchError, Result};
use redis::aio::ConnectionManager;
use redis::{Client, RedisError, Script};
use tracing::info;

use super::{KeyValueStore, TtlState, ttl_millis};

const COMPARE_AND_DELETE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const COMPARE_AND_EXPIRE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

const SET_TTL_IF_PERSISTENT_SCRIPT: &str = r#"
if redis.call("PTTL", KEYS[1]) == -1 then
    return redis.call("PEXPIRE", KEYS[1], ARGV[1])
else
    return 0
end
"#;

/// Store backed by a Redis connection manager.
///
/// The manager reconnects on its own; a command issued while the connection is
/// down fails with [`LatchError::StoreUnavailable`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    compare_and_delete: Script,
    compare_and_expire: Script,
    set_ttl_if_persistent: Script,
}

impl RedisStore {
    /// Connect to the Redis server at `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Client::open(url).map_err(map_redis_error)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(map_redis_error)?;

        info!(url = %url, "Connected to Redis store");
        Ok(Self::from_manager(conn))
    }

    /// Wrap an existing connection manager
    pub fn from_manager(conn: ConnectionManager) -> Self {
        Self {
            conn,
            compare_and_delete: Script::new(COMPARE_AND_DELETE_SCRIPT),
            compare_and_expire: Script::new(COMPARE_AND_EXPIRE_SCRIPT),
            set_ttl_if_persistent: Script::new(SET_TTL_IF_PERSISTENT_SCRIPT),
        }
    }
}

/// Transport-level failures leave the command's outcome unknown
fn map_redis_error(e: RedisError) -> LatchError {
    if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
    {
        LatchError::StoreUnavailable(e.to_string())
    } else {
        LatchError::Store(e.to_string())
    }
}

/// Interpret a `PTTL` reply
fn ttl_state_from_pttl(pttl: i64) -> TtlState {
    match pttl {
        -2 => TtlState::Missing,
        n if n < 0 => TtlState::Persistent,
        n => TtlState::Expiring(Duration::from_millis(n.unsigned_abs())),
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn create_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply.is_some())
    }

    async fn create_if_absent_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(count > 0)
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    async fn get_ttl(&self, key: &str) -> Result<TtlState> {
        let mut conn = self.conn.clone();
        let pttl: i64 = redis::cmd("PTTL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(ttl_state_from_pttl(pttl))
    }

    async fn set_ttl(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let applied: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(applied == 1)
    }

    async fn set_ttl_if_persistent(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let applied: i64 = self
            .set_ttl_if_persistent
            .key(key)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(applied == 1)
    }

    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(removed > 0)
    }

    async fn compare_and_expire(&self, key: &str, expected: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let applied: i64 = self
            .compare_and_expire
            .key(key)
            .arg(expected)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(map_redis_error)?;
        Ok(applied == 1)
    }
}
