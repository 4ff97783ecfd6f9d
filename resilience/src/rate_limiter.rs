//! Distributed rate limiting for settlement-class operations
//!
//! Bounds operations per key (e.g. per relayer identity) per rolling window,
//! guarding against a bug or compromised key causing runaway fund movement.
//! Counters live in Redis so the limit holds cluster-wide; access is a single
//! atomic INCR, never read-then-write.
//!
//! When the backing store is unreachable the limiter degrades to a
//! permissive pass-through with a logged warning instead of blocking all
//! settlement traffic. Fail-open here is a deliberate
//! availability-over-strictness trade-off, not a gap to close.

use parking_lot::Mutex;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Rate limiter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum operations per key per window
    pub max_operations: u64,
    /// Window length in seconds
    pub window_seconds: u64,
    /// Key prefix namespacing this limiter's counters in the shared store
    pub key_prefix: String,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_operations: 30,
            window_seconds: 60,
            key_prefix: "ratelimit".to_string(),
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Operation admitted; `count` is the window total so far (0 when the
    /// store was unreachable and the limiter passed through)
    Allowed {
        /// Operations counted in the current window
        count: u64,
    },
    /// Operation rejected until the window or block expires
    Limited {
        /// Time until the key frees up
        retry_after: Duration,
    },
}

impl Decision {
    /// True when the operation was admitted
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// In-memory counter state (single-process backend)
#[derive(Debug, Default)]
struct MemoryCounters {
    windows: HashMap<String, (u64, Instant)>,
    blocks: HashMap<String, Instant>,
}

enum Backend {
    /// Shared store; the limit holds across all service instances
    Redis(ConnectionManager),
    /// Process-local counters; used by tests and single-node deployments
    Memory(Mutex<MemoryCounters>),
}

/// Rolling-window rate limiter
pub struct RateLimiter {
    backend: Backend,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a limiter backed by a shared Redis store
    pub fn new_redis(connection: ConnectionManager, config: RateLimiterConfig) -> Self {
        Self {
            backend: Backend::Redis(connection),
            config,
        }
    }

    /// Create a process-local limiter
    pub fn new_in_memory(config: RateLimiterConfig) -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(MemoryCounters::default())),
            config,
        }
    }

    /// Count one attempted operation against `key` and decide
    pub async fn check(&self, key: &str) -> Decision {
        let counter_key = format!("{}:{}", self.config.key_prefix, key);
        let block_key = format!("{}:block:{}", self.config.key_prefix, key);

        match &self.backend {
            Backend::Redis(connection) => {
                self.check_redis(connection.clone(), &counter_key, &block_key)
                    .await
            }
            Backend::Memory(counters) => self.check_memory(counters, &counter_key, &block_key),
        }
    }

    /// Explicitly block a key for `duration` (e.g. operational kill switch)
    pub async fn block(&self, key: &str, duration: Duration) {
        let block_key = format!("{}:block:{}", self.config.key_prefix, key);
        info!(key, ?duration, "Rate limiter blocking key");

        match &self.backend {
            Backend::Redis(connection) => {
                let mut conn = connection.clone();
                let result: redis::RedisResult<()> = conn
                    .set_ex(&block_key, 1u8, duration.as_secs().max(1))
                    .await;
                if let Err(e) = result {
                    warn!("Rate limit store unreachable, block not recorded: {e}");
                }
            }
            Backend::Memory(counters) => {
                counters
                    .lock()
                    .blocks
                    .insert(block_key, Instant::now() + duration);
            }
        }
    }

    /// Whether a key is currently explicitly blocked
    pub async fn is_blocked(&self, key: &str) -> bool {
        let block_key = format!("{}:block:{}", self.config.key_prefix, key);
        match &self.backend {
            Backend::Redis(connection) => {
                let mut conn = connection.clone();
                match conn.exists::<_, bool>(&block_key).await {
                    Ok(blocked) => blocked,
                    Err(e) => {
                        warn!("Rate limit store unreachable, treating {key} as unblocked: {e}");
                        false
                    }
                }
            }
            Backend::Memory(counters) => {
                let mut counters = counters.lock();
                match counters.blocks.get(&block_key) {
                    Some(until) if *until > Instant::now() => true,
                    Some(_) => {
                        counters.blocks.remove(&block_key);
                        false
                    }
                    None => false,
                }
            }
        }
    }

    async fn check_redis(
        &self,
        mut conn: ConnectionManager,
        counter_key: &str,
        block_key: &str,
    ) -> Decision {
        // Explicit block wins over the window counter
        match conn.ttl::<_, i64>(block_key).await {
            Ok(ttl) if ttl > 0 => {
                return Decision::Limited {
                    retry_after: Duration::from_secs(ttl as u64),
                };
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Rate limit store unreachable, passing through: {e}");
                return Decision::Allowed { count: 0 };
            }
        }

        let count: u64 = match conn.incr(counter_key, 1u64).await {
            Ok(count) => count,
            Err(e) => {
                warn!("Rate limit store unreachable, passing through: {e}");
                return Decision::Allowed { count: 0 };
            }
        };

        // First increment creates the key; give it the window TTL
        if count == 1 {
            let result: redis::RedisResult<()> =
                conn.expire(counter_key, self.config.window_seconds as i64).await;
            if let Err(e) = result {
                warn!("Failed to set rate limit window TTL: {e}");
            }
        }

        if count > self.config.max_operations {
            let retry_after = match conn.ttl::<_, i64>(counter_key).await {
                Ok(ttl) if ttl > 0 => Duration::from_secs(ttl as u64),
                _ => Duration::from_secs(self.config.window_seconds),
            };
            Decision::Limited { retry_after }
        } else {
            Decision::Allowed { count }
        }
    }

    fn check_memory(
        &self,
        counters: &Mutex<MemoryCounters>,
        counter_key: &str,
        block_key: &str,
    ) -> Decision {
        let mut counters = counters.lock();
        let now = Instant::now();

        if let Some(until) = counters.blocks.get(block_key) {
            if *until > now {
                return Decision::Limited {
                    retry_after: *until - now,
                };
            }
            counters.blocks.remove(block_key);
        }

        let window = Duration::from_secs(self.config.window_seconds);
        let entry = counters
            .windows
            .entry(counter_key.to_string())
            .or_insert((0, now + window));

        if entry.1 <= now {
            *entry = (0, now + window);
        }
        entry.0 += 1;

        if entry.0 > self.config.max_operations {
            Decision::Limited {
                retry_after: entry.1.saturating_duration_since(now),
            }
        } else {
            Decision::Allowed { count: entry.0 }
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Redis(_) => "redis",
            Backend::Memory(_) => "memory",
        };
        f.debug_struct("RateLimiter")
            .field("backend", &backend)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_operations: u64) -> RateLimiter {
        RateLimiter::new_in_memory(RateLimiterConfig {
            max_operations,
            window_seconds: 60,
            key_prefix: "test".to_string(),
        })
    }

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let limiter = limiter(3);
        for expected in 1..=3 {
            assert_eq!(
                limiter.check("relayer-1").await,
                Decision::Allowed { count: expected }
            );
        }
        assert!(!limiter.check("relayer-1").await.is_allowed());
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let limiter = limiter(1);
        assert!(limiter.check("relayer-1").await.is_allowed());
        assert!(!limiter.check("relayer-1").await.is_allowed());
        assert!(limiter.check("relayer-2").await.is_allowed());
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new_in_memory(RateLimiterConfig {
            max_operations: 1,
            window_seconds: 0,
            key_prefix: "test".to_string(),
        });
        assert!(limiter.check("relayer-1").await.is_allowed());
        // Zero-second window expires immediately; counter restarts
        assert!(limiter.check("relayer-1").await.is_allowed());
    }

    #[tokio::test]
    async fn test_explicit_block() {
        let limiter = limiter(100);
        assert!(!limiter.is_blocked("relayer-1").await);

        limiter.block("relayer-1", Duration::from_secs(60)).await;
        assert!(limiter.is_blocked("relayer-1").await);
        match limiter.check("relayer-1").await {
            Decision::Limited { retry_after } => assert!(retry_after <= Duration::from_secs(60)),
            other => panic!("expected Limited, got {other:?}"),
        }

        // Other keys unaffected
        assert!(limiter.check("relayer-2").await.is_allowed());
    }

    #[tokio::test]
    async fn test_block_expires() {
        let limiter = limiter(100);
        limiter.block("relayer-1", Duration::from_millis(10)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!limiter.is_blocked("relayer-1").await);
        assert!(limiter.check("relayer-1").await.is_allowed());
    }
}
