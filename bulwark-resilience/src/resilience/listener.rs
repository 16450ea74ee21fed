//! Diagnostic channel for recovery outcomes.
//!
//! A strategy reports exactly one signal per recovered failure:
//! [`RecoveryListener::recovered`] when obliteration succeeded, or
//! [`RecoveryListener::inconsistent`] when it failed and the tier may still
//! hold stale entries. Listeners observe; they cannot change the outcome of
//! the cache operation.

use bulwark_core::{RecoveryEvent, ResilienceConfig, StoreAccessError};
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Receives recovery diagnostics.
pub trait RecoveryListener<K>: Send + Sync {
    /// Obliteration succeeded; the tier is consistent again.
    fn recovered(&self, event: &RecoveryEvent<K>);

    /// Obliteration failed; entries in `event.scope` may be stale.
    fn inconsistent(&self, event: &RecoveryEvent<K>, cleanup_error: &StoreAccessError);
}

impl<K, L: RecoveryListener<K> + ?Sized> RecoveryListener<K> for Arc<L> {
    fn recovered(&self, event: &RecoveryEvent<K>) {
        (**self).recovered(event)
    }

    fn inconsistent(&self, event: &RecoveryEvent<K>, cleanup_error: &StoreAccessError) {
        (**self).inconsistent(event, cleanup_error)
    }
}

/// Rate limiter for ERROR-level reports.
///
/// Grants at most one permit per interval. Lock free: the next permitted
/// instant is a single atomic, and racing callers that lose the exchange
/// are simply denied.
#[derive(Debug)]
pub struct LogPacer {
    interval_ms: i64,
    next_permit_ms: AtomicI64,
}

impl LogPacer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms: i64::try_from(interval_ms).unwrap_or(i64::MAX),
            next_permit_ms: AtomicI64::new(i64::MIN),
        }
    }

    /// Whether a report at `now_ms` (unix millis) may be logged loudly.
    pub fn permit(&self, now_ms: i64) -> bool {
        let next = self.next_permit_ms.load(Ordering::Relaxed);
        if now_ms < next {
            return false;
        }
        self.next_permit_ms
            .compare_exchange(
                next,
                now_ms.saturating_add(self.interval_ms),
                Ordering::AcqRel,
                Ordering::Relaxed,
            )
            .is_ok()
    }
}

/// Default listener: reports through `tracing`.
///
/// Recoveries go to DEBUG. Inconsistencies go to ERROR, paced so that a
/// persistently failing tier does not flood the log; reports inside the
/// pacing window are demoted to DEBUG.
#[derive(Debug)]
pub struct TracingRecoveryListener {
    log_recoveries: bool,
    pacer: LogPacer,
}

impl TracingRecoveryListener {
    pub fn new(config: &ResilienceConfig) -> Self {
        Self {
            log_recoveries: config.log_recoveries,
            pacer: LogPacer::new(config.inconsistency_log_interval_ms),
        }
    }
}

impl Default for TracingRecoveryListener {
    fn default() -> Self {
        Self::new(&ResilienceConfig::default())
    }
}

impl<K: Debug> RecoveryListener<K> for TracingRecoveryListener {
    fn recovered(&self, event: &RecoveryEvent<K>) {
        if !self.log_recoveries {
            return;
        }
        tracing::debug!(
            operation = %event.operation,
            scope = ?event.scope,
            key_count = ?event.key_count,
            cause = %event.cause,
            "Recovered from storage failure"
        );
    }

    fn inconsistent(&self, event: &RecoveryEvent<K>, cleanup_error: &StoreAccessError) {
        if self.pacer.permit(event.occurred_at.timestamp_millis()) {
            tracing::error!(
                operation = %event.operation,
                scope = ?event.scope,
                cause = %event.cause,
                cleanup_error = %cleanup_error,
                "Cache entries left in possibly inconsistent state"
            );
        } else {
            tracing::debug!(
                operation = %event.operation,
                scope = ?event.scope,
                cause = %event.cause,
                cleanup_error = %cleanup_error,
                "Cache entries left in possibly inconsistent state (paced)"
            );
        }
    }
}
