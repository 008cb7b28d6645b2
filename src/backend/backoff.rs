//! Backoff policy: a pure mapping from retry number to wait duration.
//!
//! [`BackoffConfig`] bounds the whole attempt sequence of one generation
//! call: how many calls may be made in total, and how long to wait before
//! each retry. Waits grow geometrically from a base and are capped, so a
//! sustained outage cannot stretch a single request indefinitely. The
//! default profile is deterministic (no jitter), which keeps waits
//! monotonically increasing; jittered variants exist for fleets sharing a
//! rate limit.

use std::time::Duration;

/// Bounds and shape of the retry sequence for one generation call.
///
/// # Example
///
/// ```
/// use genqueue::backend::BackoffConfig;
///
/// let standard = BackoffConfig::standard();
/// assert_eq!(standard.attempts, 3);
///
/// let single_shot = BackoffConfig::disabled();
/// assert_eq!(single_shot.attempts, 1);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Total calls allowed, including the first. Values below 1 are
    /// treated as 1 by the retry driver.
    pub attempts: u32,

    /// Wait before the first retry.
    pub base: Duration,

    /// Growth factor per retry: the wait before retry n is
    /// `base * factor^(n-1)`.
    pub factor: f64,

    /// Ceiling on any single wait.
    pub cap: Duration,

    /// Randomization applied to the computed wait.
    pub jitter: Jitter,
}

/// Wait randomization, for spreading retries across callers that share a
/// rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Jitter {
    /// Deterministic waits, exactly as computed.
    None,

    /// Uniform draw from `[0, computed_wait]`.
    Full,

    /// Half the computed wait plus a uniform draw from the other half.
    Equal,
}

impl BackoffConfig {
    /// Single attempt, no retry. Errors surface immediately.
    pub fn disabled() -> Self {
        Self {
            attempts: 1,
            ..Self::standard()
        }
    }

    /// The default profile: 3 attempts total, waits of 1s then 2s,
    /// deterministic.
    pub fn standard() -> Self {
        Self {
            attempts: 3,
            base: Duration::from_secs(1),
            factor: 2.0,
            cap: Duration::from_secs(30),
            jitter: Jitter::None,
        }
    }

    /// For batch traffic sharing a rate limit: 5 attempts, 500ms base,
    /// full jitter, 60s ceiling.
    pub fn patient() -> Self {
        Self {
            attempts: 5,
            base: Duration::from_millis(500),
            factor: 2.0,
            cap: Duration::from_secs(60),
            jitter: Jitter::Full,
        }
    }

    /// The wait before retry `n` (1-based: retry 1 precedes the second
    /// attempt). Grows geometrically, capped, then jittered.
    pub fn wait_before(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let raw = self.base.as_secs_f64() * self.factor.powi(exponent as i32);
        let capped = raw.min(self.cap.as_secs_f64());

        let drawn = match self.jitter {
            Jitter::None => capped,
            Jitter::Full => fastrand::f64() * capped,
            Jitter::Equal => (capped / 2.0) * (1.0 + fastrand::f64()),
        };

        Duration::from_secs_f64(drawn)
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deterministic(base_ms: u64, cap_secs: u64) -> BackoffConfig {
        BackoffConfig {
            attempts: 6,
            base: Duration::from_millis(base_ms),
            factor: 2.0,
            cap: Duration::from_secs(cap_secs),
            jitter: Jitter::None,
        }
    }

    #[test]
    fn test_waits_grow_geometrically() {
        let config = deterministic(1000, 60);
        assert_eq!(config.wait_before(1), Duration::from_secs(1));
        assert_eq!(config.wait_before(2), Duration::from_secs(2));
        assert_eq!(config.wait_before(3), Duration::from_secs(4));
        assert_eq!(config.wait_before(4), Duration::from_secs(8));
    }

    #[test]
    fn test_waits_hit_the_ceiling() {
        let config = deterministic(1000, 5);
        // Retry 4 would be 8s raw; retry 11 would be over 17 minutes.
        assert_eq!(config.wait_before(4), Duration::from_secs(5));
        assert_eq!(config.wait_before(11), Duration::from_secs(5));
    }

    #[test]
    fn test_deterministic_waits_are_monotonic() {
        let config = BackoffConfig {
            jitter: Jitter::None,
            ..BackoffConfig::standard()
        };
        assert!(config.wait_before(2) > config.wait_before(1));
    }

    #[test]
    fn test_full_jitter_stays_below_computed_wait() {
        let config = BackoffConfig {
            jitter: Jitter::Full,
            ..deterministic(1000, 60)
        };
        for _ in 0..100 {
            assert!(config.wait_before(1) <= Duration::from_secs(1));
            assert!(config.wait_before(2) <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_equal_jitter_keeps_half_the_wait() {
        let config = BackoffConfig {
            jitter: Jitter::Equal,
            ..deterministic(2000, 60)
        };
        for _ in 0..100 {
            let wait = config.wait_before(1);
            assert!(wait >= Duration::from_secs(1), "{:?} below half base", wait);
            assert!(wait <= Duration::from_secs(2));
        }
    }

    #[test]
    fn test_profiles() {
        assert_eq!(BackoffConfig::disabled().attempts, 1);
        assert_eq!(BackoffConfig::standard().attempts, 3);
        assert_eq!(BackoffConfig::patient().attempts, 5);
        assert_eq!(BackoffConfig::default().attempts, 3);
    }
}
