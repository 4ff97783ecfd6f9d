//! Circuit breaker pattern per external dependency
//!
//! `Closed -> Open` after `failure_threshold` consecutive failures;
//! `Open -> HalfOpen` once `reset_timeout_ms` has elapsed since the last
//! failure; `HalfOpen -> Closed` after `half_open_success_threshold`
//! consecutive successes; `HalfOpen -> Open` on any single failure. A success
//! in `Closed` resets the failure counter, so isolated blips never accumulate
//! toward tripping.
//!
//! Breaker state is not persisted beyond the process: it protects liveness,
//! not correctness.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CircuitState {
    /// Closed (normal operation)
    Closed,
    /// Open (rejecting requests)
    Open,
    /// Half-open (testing recovery)
    HalfOpen,
}

/// Error returned by [`CircuitBreaker::execute`]
///
/// The open-state error is distinguishable from a genuine dependency failure
/// so callers can apply a longer backoff.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// Breaker is open; the call was not attempted
    #[error("circuit breaker '{dependency}' is open, retry in {retry_in_ms}ms")]
    Open {
        /// Dependency name
        dependency: String,
        /// Milliseconds until the breaker half-opens
        retry_in_ms: u64,
    },

    /// The call exceeded the dependency's timeout
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The dependency itself failed
    #[error("{0}")]
    Inner(E),
}

impl<E> CallError<E> {
    /// True when the breaker short-circuited without attempting the call
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open { .. })
    }
}

/// Circuit breaker configuration
///
/// Each dependency gets thresholds matching its expected flakiness and
/// criticality; a payment-adjacent dependency trips faster and resets slower
/// than a best-effort one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Open after N consecutive failures
    pub failure_threshold: u32,
    /// Milliseconds before an open breaker half-opens
    pub reset_timeout_ms: u64,
    /// Close after N consecutive successes in half-open
    pub half_open_success_threshold: u32,
    /// Per-call timeout (milliseconds); a timeout counts as a failure
    pub call_timeout_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
            half_open_success_threshold: 2,
            call_timeout_ms: 10_000,
        }
    }
}

/// Mutable breaker state, guarded by the breaker's lock
#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    half_open_successes: u32,
    last_failure_at: Option<DateTime<Utc>>,
    calls_total: u64,
    successes_total: u64,
    failures_total: u64,
}

/// Point-in-time breaker statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CircuitBreakerStats {
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures since last success
    pub consecutive_failures: u32,
    /// Cumulative calls admitted
    pub calls_total: u64,
    /// Cumulative successes
    pub successes_total: u64,
    /// Cumulative failures (including timeouts)
    pub failures_total: u64,
}

/// Circuit breaker for one named dependency
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    state: RwLock<BreakerState>,
}

impl CircuitBreaker {
    /// Create new circuit breaker for a named dependency
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: RwLock::new(BreakerState {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                last_failure_at: None,
                calls_total: 0,
                successes_total: 0,
                failures_total: 0,
            }),
        }
    }

    /// Dependency name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Execute a call through the breaker
    ///
    /// In `Open` state before the reset timeout the future is never polled
    /// and a [`CallError::Open`] is returned. Otherwise the call runs under
    /// the configured timeout and its outcome drives the state transitions.
    pub async fn execute<T, E, Fut>(&self, fut: Fut) -> Result<T, CallError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        if let Err(retry_in_ms) = self.admit().await {
            return Err(CallError::Open {
                dependency: self.name.clone(),
                retry_in_ms,
            });
        }

        let call_timeout = Duration::from_millis(self.config.call_timeout_ms);
        match tokio::time::timeout(call_timeout, fut).await {
            Ok(Ok(value)) => {
                self.record_success().await;
                Ok(value)
            }
            Ok(Err(err)) => {
                self.record_failure().await;
                Err(CallError::Inner(err))
            }
            Err(_) => {
                self.record_failure().await;
                Err(CallError::Timeout(call_timeout))
            }
        }
    }

    /// Execute with a fallback used when the breaker is open
    ///
    /// Timeouts and dependency failures still surface as errors; only the
    /// open-state short-circuit is replaced by `fallback()`.
    pub async fn execute_with_fallback<T, E, Fut>(
        &self,
        fut: Fut,
        fallback: impl FnOnce() -> T,
    ) -> Result<T, CallError<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        match self.execute(fut).await {
            Err(err) if err.is_open() => Ok(fallback()),
            other => other,
        }
    }

    /// Current state (Open may lazily report HalfOpen eligibility on execute)
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    /// Point-in-time statistics
    pub async fn stats(&self) -> CircuitBreakerStats {
        let s = self.state.read().await;
        CircuitBreakerStats {
            state: s.state,
            consecutive_failures: s.consecutive_failures,
            calls_total: s.calls_total,
            successes_total: s.successes_total,
            failures_total: s.failures_total,
        }
    }

    /// Reset to closed (manual intervention)
    pub async fn reset(&self) {
        info!("Manually resetting circuit breaker '{}'", self.name);
        let mut s = self.state.write().await;
        s.state = CircuitState::Closed;
        s.consecutive_failures = 0;
        s.half_open_successes = 0;
        s.last_failure_at = None;
    }

    /// Admission check; handles the Open -> HalfOpen timeout transition.
    /// The error is the remaining open time in milliseconds; `execute`
    /// rebuilds the typed [`CallError::Open`] from it.
    async fn admit(&self) -> Result<(), u64> {
        let mut s = self.state.write().await;
        match s.state {
            CircuitState::Closed | CircuitState::HalfOpen => {
                s.calls_total += 1;
                Ok(())
            }
            CircuitState::Open => {
                let elapsed_ms = s
                    .last_failure_at
                    .map(|at| {
                        Utc::now()
                            .signed_duration_since(at)
                            .num_milliseconds()
                            .max(0) as u64
                    })
                    .unwrap_or(u64::MAX);

                if elapsed_ms >= self.config.reset_timeout_ms {
                    info!("Circuit breaker '{}' half-opening", self.name);
                    s.state = CircuitState::HalfOpen;
                    s.half_open_successes = 0;
                    s.calls_total += 1;
                    Ok(())
                } else {
                    Err(self.config.reset_timeout_ms - elapsed_ms)
                }
            }
        }
    }

    async fn record_success(&self) {
        let mut s = self.state.write().await;
        s.successes_total += 1;
        match s.state {
            CircuitState::Closed => {
                s.consecutive_failures = 0;
            }
            CircuitState::HalfOpen => {
                s.half_open_successes += 1;
                if s.half_open_successes >= self.config.half_open_success_threshold {
                    info!("Circuit breaker '{}' closing", self.name);
                    s.state = CircuitState::Closed;
                    s.consecutive_failures = 0;
                    s.half_open_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    async fn record_failure(&self) {
        let mut s = self.state.write().await;
        s.failures_total += 1;
        s.consecutive_failures += 1;
        s.last_failure_at = Some(Utc::now());
        match s.state {
            CircuitState::Closed => {
                if s.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        "Circuit breaker '{}' opening after {} failures",
                        self.name, s.consecutive_failures
                    );
                    s.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!("Circuit breaker '{}' re-opening", self.name);
                s.state = CircuitState::Open;
                s.half_open_successes = 0;
            }
            CircuitState::Open => {}
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Registry of named breakers, owned by the orchestrator
///
/// Replaces module-level singletons: each dependency is registered with its
/// own config and looked up by name.
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create new registry with a default config for unregistered names
    pub fn new(default_config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config,
        }
    }

    /// Register a breaker with a dependency-specific config
    pub async fn register(&self, name: impl Into<String>, config: CircuitBreakerConfig) {
        let name = name.into();
        let breaker = Arc::new(CircuitBreaker::new(name.clone(), config));
        self.breakers.write().await.insert(name, breaker);
    }

    /// Get the breaker for a dependency, creating one with the default
    /// config if it was never registered
    pub async fn breaker(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().await.get(name) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write().await;
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(CircuitBreaker::new(name, self.default_config.clone()))
            })
            .clone()
    }
}

impl std::fmt::Debug for CircuitBreakerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("default_config", &self.default_config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout_ms: 50,
            half_open_success_threshold: 2,
            call_timeout_ms: 1_000,
        }
    }

    async fn fail(cb: &CircuitBreaker) -> Result<(), CallError<&'static str>> {
        cb.execute(async { Err::<(), &'static str>("boom") }).await
    }

    async fn succeed(cb: &CircuitBreaker) -> Result<(), CallError<&'static str>> {
        cb.execute(async { Ok::<_, &'static str>(()) }).await
    }

    #[tokio::test]
    async fn test_opens_after_threshold_and_short_circuits() {
        let cb = CircuitBreaker::new("escrow", fast_config());
        assert_eq!(cb.state().await, CircuitState::Closed);

        for _ in 0..3 {
            assert!(matches!(fail(&cb).await, Err(CallError::Inner(_))));
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        // Short-circuits without invoking the underlying function
        let calls = AtomicU32::new(0);
        let result: Result<(), CallError<&'static str>> = cb
            .execute(async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CallError::Open { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_half_open_then_closes_after_successes() {
        let cb = CircuitBreaker::new("escrow", fast_config());
        for _ in 0..3 {
            let _ = fail(&cb).await;
        }
        assert_eq!(cb.state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;

        // First call after the timeout is allowed through
        succeed(&cb).await.unwrap();
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_single_half_open_failure_reopens() {
        let cb = CircuitBreaker::new("escrow", fast_config());
        for _ in 0..3 {
            let _ = fail(&cb).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        succeed(&cb).await.unwrap();
        assert_eq!(cb.state().await, CircuitState::HalfOpen);

        let _ = fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_closed_success_resets_failure_count() {
        let cb = CircuitBreaker::new("escrow", fast_config());
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        succeed(&cb).await.unwrap();

        // Two more failures do not trip a threshold of 3
        let _ = fail(&cb).await;
        let _ = fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Closed);

        let _ = fail(&cb).await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failure() {
        let config = CircuitBreakerConfig {
            failure_threshold: 1,
            call_timeout_ms: 20,
            ..fast_config()
        };
        let cb = CircuitBreaker::new("slow-dep", config);

        let result: Result<(), CallError<&'static str>> = cb
            .execute(async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(CallError::Timeout(_))));
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_fallback_replaces_open_error_only() {
        let cb = CircuitBreaker::new("escrow", fast_config());
        for _ in 0..3 {
            let _ = fail(&cb).await;
        }

        let value = cb
            .execute_with_fallback(async { Ok::<_, &'static str>(1) }, || 42)
            .await
            .unwrap();
        assert_eq!(value, 42);

        // A genuine failure still surfaces
        tokio::time::sleep(Duration::from_millis(60)).await;
        let result = cb
            .execute_with_fallback(async { Err::<u32, _>("boom") }, || 42)
            .await;
        assert!(matches!(result, Err(CallError::Inner("boom"))));
    }

    #[tokio::test]
    async fn test_boxed_error_types_pass_through() {
        let cb = CircuitBreaker::new("escrow", fast_config());

        let result: Result<(), CallError<anyhow::Error>> = cb
            .execute(async { Err(anyhow::anyhow!("connection reset")) })
            .await;
        match result {
            Err(CallError::Inner(e)) => assert!(e.to_string().contains("connection reset")),
            other => panic!("expected inner error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stats_accumulate() {
        let cb = CircuitBreaker::new("escrow", fast_config());
        succeed(&cb).await.unwrap();
        let _ = fail(&cb).await;

        let stats = cb.stats().await;
        assert_eq!(stats.calls_total, 2);
        assert_eq!(stats.successes_total, 1);
        assert_eq!(stats.failures_total, 1);
        assert_eq!(stats.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_registry_isolates_dependencies() {
        let registry = CircuitBreakerRegistry::new(fast_config());
        registry
            .register(
                "escrow",
                CircuitBreakerConfig {
                    failure_threshold: 1,
                    ..fast_config()
                },
            )
            .await;

        let escrow = registry.breaker("escrow").await;
        let _ = fail(&escrow).await;
        assert_eq!(escrow.state().await, CircuitState::Open);

        // Other dependencies unaffected; unregistered names get defaults
        let notify = registry.breaker("notifications").await;
        assert_eq!(notify.state().await, CircuitState::Closed);
    }
}
