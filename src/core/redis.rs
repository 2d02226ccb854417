use std::sync::Arc;

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError, Script};
use time::PrimitiveDateTime;
use tokio::sync::RwLock;

use crate::core::time::utc_day_key;

const FIXED_WINDOW_SCRIPT: &str = r#"
local current = redis.call("INCR", KEYS[1])
if current == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return current
"#;

const REFUND_SCRIPT: &str = r#"
local current = tonumber(redis.call("GET", KEYS[1]) or "0")
if current > 0 then
    return redis.call("DECR", KEYS[1])
end
return 0
"#;

#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

/// A fixed-window counter: at most `limit` hits per `window_seconds` for `key`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RateLimit {
    pub(crate) key: String,
    pub(crate) limit: u64,
    pub(crate) window_seconds: u64,
}

impl RateLimit {
    pub(crate) fn chapter_submissions(owner_id: &str, per_hour: u64) -> Self {
        Self { key: format!("rl:chapters:{owner_id}"), limit: per_hour, window_seconds: 3_600 }
    }

    /// Keyed by UTC calendar day so the allowance resets at midnight.
    pub(crate) fn daily_spin(student_id: &str, per_day: u64, now: PrimitiveDateTime) -> Self {
        Self {
            key: format!("rl:spin:{student_id}:{}", utc_day_key(now)),
            limit: per_day,
            window_seconds: 86_400,
        }
    }
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::new(RwLock::new(None)) }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let client = Client::open(self.url.as_str())?;
        let manager = ConnectionManager::new(client).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        self.manager.write().await.take();
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut manager) = self.connection().await else {
            return RedisHealth::Disconnected;
        };

        match cmd("PING").query_async::<_, String>(&mut manager).await {
            Ok(_) => RedisHealth::Healthy,
            Err(err) => RedisHealth::Unhealthy(err.to_string()),
        }
    }

    /// Counts one hit against `limit`. Fails open: a missing or broken Redis
    /// never blocks a request.
    pub(crate) async fn allow(&self, limit: &RateLimit) -> bool {
        let Some(mut manager) = self.connection().await else {
            return true;
        };

        let hits: Result<u64, RedisError> = Script::new(FIXED_WINDOW_SCRIPT)
            .key(&limit.key)
            .arg(limit.window_seconds)
            .invoke_async(&mut manager)
            .await;

        match hits {
            Ok(hits) => hits <= limit.limit,
            Err(err) => {
                tracing::warn!(error = %err, key = %limit.key, "Rate limit check failed; allowing");
                true
            }
        }
    }

    /// Gives back one hit counted by `allow` when the guarded action failed.
    pub(crate) async fn refund(&self, limit: &RateLimit) {
        let Some(mut manager) = self.connection().await else {
            return;
        };

        let refunded: Result<i64, RedisError> =
            Script::new(REFUND_SCRIPT).key(&limit.key).invoke_async(&mut manager).await;
        if let Err(err) = refunded {
            tracing::warn!(error = %err, key = %limit.key, "Rate limit refund failed");
        }
    }
}
