use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, RedisError};
use tracing::{info, info_span, Instrument};

use super::{CodeCheck, KeyValueStore, StoreError};

const SCAN_BATCH: u64 = 100;

// INCR and EXPIRE in one round trip so two concurrent failures can never both
// observe a pre-increment count or leave the counter without a TTL.
const INCR_WITH_TTL_SCRIPT: &str = r"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
";

// Lock check, comparison and counter update as one script over both keys.
// Replies -1 when locked, -2 when no code is live, 0 on a match and the new
// failure count on a mismatch.
const CHECK_CODE_SCRIPT: &str = r"
local failures = tonumber(redis.call('GET', KEYS[2]) or '0')
if not failures then
    return redis.error_reply('attempt counter is not an integer')
end
if failures >= tonumber(ARGV[2]) then
    return -1
end
local code = redis.call('GET', KEYS[1])
if not code then
    return -2
end
if code == ARGV[1] then
    redis.call('DEL', KEYS[1], KEYS[2])
    return 0
end
local count = redis.call('INCR', KEYS[2])
if count == 1 then
    redis.call('EXPIRE', KEYS[2], ARGV[3])
end
return count
";

const CHECK_LOCKED: i64 = -1;
const CHECK_MISSING: i64 = -2;
const CHECK_MATCHED: i64 = 0;

impl From<RedisError> for StoreError {
    fn from(err: RedisError) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Backend(err.to_string())
        }
    }
}

/// Redis-backed store with automatic reconnection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis. Supports `redis://` and `rediss://` URLs.
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the server is unreachable.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to Redis");
        Ok(Self { conn })
    }
}

fn span(operation: &'static str) -> tracing::Span {
    info_span!("db.query", db.system = "redis", db.operation = operation)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key).instrument(span("GET")).await?;
        Ok(value)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let () = conn
            .set_ex(key, value, ttl_seconds)
            .instrument(span("SET"))
            .await?;
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64, StoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let removed: u64 = conn.del(keys).instrument(span("DEL")).await?;
        Ok(removed)
    }

    async fn incr_with_ttl(&self, key: &str, ttl_seconds: u64) -> Result<i64, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = redis::Script::new(INCR_WITH_TTL_SCRIPT)
            .key(key)
            .arg(ttl_seconds)
            .invoke_async(&mut conn)
            .instrument(span("EVAL"))
            .await?;
        Ok(count)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .instrument(span("SCAN"))
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn check_code(
        &self,
        code_key: &str,
        counter_key: &str,
        candidate: &str,
        max_failures: u32,
        lockout_seconds: u64,
    ) -> Result<CodeCheck, StoreError> {
        let mut conn = self.conn.clone();
        let reply: i64 = redis::Script::new(CHECK_CODE_SCRIPT)
            .key(code_key)
            .key(counter_key)
            .arg(candidate)
            .arg(max_failures)
            .arg(lockout_seconds)
            .invoke_async(&mut conn)
            .instrument(span("EVAL"))
            .await?;

        Ok(match reply {
            CHECK_LOCKED => CodeCheck::Locked,
            CHECK_MISSING => CodeCheck::Missing,
            CHECK_MATCHED => CodeCheck::Matched,
            count => CodeCheck::Mismatched(count),
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .instrument(span("PING"))
            .await?;
        Ok(())
    }
}
