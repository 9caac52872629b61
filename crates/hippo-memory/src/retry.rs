//! Bounded exponential backoff for lock contention.
//!
//! The store is shared with an external index process, so a write may find the
//! database locked even after SQLite's own `busy_timeout` has elapsed. Writes
//! run inside [`retry_blocking`], which re-runs the whole transaction while the
//! error is `StorageBusy` and gives up after `max_attempts`.
//!
//! Jitter is seeded from the clock's sub-second nanos.

use hippo_types::config::RetryPolicy;
use hippo_types::error::{HippoError, HippoResult};
use std::time::Duration;
use tracing::{debug, warn};

/// Compute the delay for a given attempt (0-indexed).
///
/// Formula: `min(min_delay * 2^attempt, max_delay) * (1 + random * jitter)`,
/// clamped to `max_delay`.
pub fn compute_backoff(policy: &RetryPolicy, attempt: u32) -> u64 {
    let base = policy
        .min_delay_ms
        .saturating_mul(1u64.checked_shl(attempt).unwrap_or(u64::MAX));
    let capped = base.min(policy.max_delay_ms);

    if policy.jitter <= 0.0 {
        return capped;
    }

    let frac = pseudo_random_fraction();
    let with_jitter = (capped as f64) + (capped as f64) * frac * policy.jitter;
    (with_jitter as u64).min(policy.max_delay_ms)
}

/// Pseudo-random fraction in `[0, 1)` from the clock. Not cryptographic.
fn pseudo_random_fraction() -> f64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let mixed = nanos.wrapping_mul(2654435761); // Knuth multiplicative hash
    (mixed as f64) / (u32::MAX as f64 + 1.0)
}

/// Run `operation` until it succeeds, fails with a non-busy error, or the
/// policy runs out of attempts. Exhaustion yields `StorageBusy` carrying the
/// real attempt count.
pub fn retry_blocking<T, F>(policy: &RetryPolicy, mut operation: F) -> HippoResult<T>
where
    F: FnMut() -> HippoResult<T>,
{
    let max = policy.max_attempts.max(1);

    for attempt in 0..max {
        match operation() {
            Ok(result) => {
                if attempt > 0 {
                    debug!(attempt = attempt + 1, "storage write succeeded after retry");
                }
                return Ok(result);
            }
            Err(err) if err.is_retryable() => {
                let reason = match &err {
                    HippoError::StorageBusy { reason, .. } => reason.clone(),
                    other => other.to_string(),
                };
                if attempt + 1 >= max {
                    warn!(attempts = max, %reason, "storage still locked, giving up");
                    return Err(HippoError::StorageBusy {
                        attempts: max,
                        reason,
                    });
                }
                let delay_ms = compute_backoff(policy, attempt);
                debug!(attempt = attempt + 1, delay_ms, %reason, "storage locked, backing off");
                std::thread::sleep(Duration::from_millis(delay_ms));
            }
            Err(err) => return Err(err),
        }
    }

    Err(HippoError::StorageBusy {
        attempts: max,
        reason: "no attempt made".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            min_delay_ms: 1,
            max_delay_ms: 4,
            jitter: 0.0,
        }
    }

    fn busy() -> HippoError {
        HippoError::StorageBusy {
            attempts: 1,
            reason: "database is locked".to_string(),
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            min_delay_ms: 50,
            max_delay_ms: 2_000,
            jitter: 0.0,
        };
        assert_eq!(compute_backoff(&policy, 0), 50);
        assert_eq!(compute_backoff(&policy, 1), 100);
        assert_eq!(compute_backoff(&policy, 3), 400);
        assert_eq!(compute_backoff(&policy, 10), 2_000);
        assert_eq!(compute_backoff(&policy, 80), 2_000);
    }

    #[test]
    fn test_backoff_jitter_stays_in_bounds() {
        let policy = RetryPolicy {
            max_attempts: 3,
            min_delay_ms: 100,
            max_delay_ms: 1_000,
            jitter: 1.0,
        };
        for _ in 0..20 {
            let d = compute_backoff(&policy, 0);
            assert!((100..=200).contains(&d), "delay {d} out of range");
        }
    }

    #[test]
    fn test_retry_succeeds_after_busy() {
        let calls = Cell::new(0);
        let result = retry_blocking(&fast_policy(5), || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(busy())
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_exhausted_reports_attempts() {
        let calls = Cell::new(0);
        let result: HippoResult<()> = retry_blocking(&fast_policy(4), || {
            calls.set(calls.get() + 1);
            Err(busy())
        });
        match result {
            Err(HippoError::StorageBusy { attempts, reason }) => {
                assert_eq!(attempts, 4);
                assert!(reason.contains("locked"));
            }
            other => panic!("expected StorageBusy, got {other:?}"),
        }
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_non_busy_error_not_retried() {
        let calls = Cell::new(0);
        let result: HippoResult<()> = retry_blocking(&fast_policy(5), || {
            calls.set(calls.get() + 1);
            Err(HippoError::StorageCorrupt("bad row".into()))
        });
        assert!(matches!(result, Err(HippoError::StorageCorrupt(_))));
        assert_eq!(calls.get(), 1);
    }
}
