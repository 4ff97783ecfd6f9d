//! Configuration for the settlement orchestrator

use booking_core::Address;
use resilience::{CircuitBreakerConfig, RateLimiterConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settlement orchestrator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Relayer identity used for ledger release/refund calls
    pub relayer: Address,

    /// Platform account receiving fees on release
    pub platform_account: Address,

    /// Breaker protecting the escrow ledger; payment-adjacent, so it trips
    /// fast and resets slow relative to best-effort dependencies
    pub escrow_breaker: CircuitBreakerConfig,

    /// Rate limits on settlement-class ledger operations per relayer
    pub rate_limiter: RateLimiterConfig,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            relayer: Address::new("settlement-relayer"),
            platform_account: Address::new("platform-fees"),
            escrow_breaker: CircuitBreakerConfig {
                failure_threshold: 3,
                reset_timeout_ms: 60_000,
                half_open_success_threshold: 2,
                call_timeout_ms: 5_000,
            },
            rate_limiter: RateLimiterConfig {
                max_operations: 30,
                window_seconds: 60,
                key_prefix: "escrow-release".to_string(),
            },
        }
    }
}

impl SettlementConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("read failed: {e}")))?;
        toml::from_str(&contents).map_err(|e| crate::Error::Config(format!("parse failed: {e}")))
    }
}
