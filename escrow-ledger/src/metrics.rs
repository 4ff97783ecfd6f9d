//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `escrow_locks_total` - Successful fund locks
//! - `escrow_releases_total` - Successful releases
//! - `escrow_refunds_total` - Successful refunds
//! - `escrow_rejected_ops_total` - Mutating operations rejected
//! - `escrow_locked_value_cents` - Value currently held in custody

use prometheus::{IntCounter, IntGauge, Registry};
use std::sync::Arc;

/// Metrics collector
///
/// Counters are created against a per-instance registry rather than the
/// process-global one, so multiple ledgers (and tests) can coexist.
#[derive(Clone)]
pub struct Metrics {
    /// Successful fund locks
    pub locks_total: IntCounter,

    /// Successful releases
    pub releases_total: IntCounter,

    /// Successful refunds
    pub refunds_total: IntCounter,

    /// Rejected mutating operations
    pub rejected_ops_total: IntCounter,

    /// Value currently in custody (cents)
    pub locked_value_cents: IntGauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let locks_total = IntCounter::new("escrow_locks_total", "Successful fund locks")?;
        registry.register(Box::new(locks_total.clone()))?;

        let releases_total = IntCounter::new("escrow_releases_total", "Successful releases")?;
        registry.register(Box::new(releases_total.clone()))?;

        let refunds_total = IntCounter::new("escrow_refunds_total", "Successful refunds")?;
        registry.register(Box::new(refunds_total.clone()))?;

        let rejected_ops_total = IntCounter::new(
            "escrow_rejected_ops_total",
            "Mutating operations rejected",
        )?;
        registry.register(Box::new(rejected_ops_total.clone()))?;

        let locked_value_cents = IntGauge::new(
            "escrow_locked_value_cents",
            "Value currently held in custody (cents)",
        )?;
        registry.register(Box::new(locked_value_cents.clone()))?;

        Ok(Self {
            locks_total,
            releases_total,
            refunds_total,
            rejected_ops_total,
            locked_value_cents,
            registry,
        })
    }
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("locks_total", &self.locks_total.get())
            .field("releases_total", &self.releases_total.get())
            .field("refunds_total", &self.refunds_total.get())
            .field("rejected_ops_total", &self.rejected_ops_total.get())
            .field("locked_value_cents", &self.locked_value_cents.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_instances_are_independent() {
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();

        a.locks_total.inc();
        a.locked_value_cents.add(500);

        assert_eq!(a.locks_total.get(), 1);
        assert_eq!(b.locks_total.get(), 0);
        assert_eq!(a.locked_value_cents.get(), 500);
    }
}
