//! Bookpay Resilience Primitives
//!
//! Reusable circuit breaker and distributed rate limiter protecting calls
//! into the escrow ledger and other unreliable dependencies. No dependency
//! on the rest of the workspace; instances are explicitly constructed and
//! injected (no module-level singletons), so each dependency gets its own
//! thresholds and tests get isolation.

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod circuit_breaker;
pub mod rate_limiter;

pub use circuit_breaker::{
    CallError, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStats,
    CircuitState,
};
pub use rate_limiter::{Decision, RateLimiter, RateLimiterConfig};
