//! Retry policies for reducer-driven retries.
//!
//! Reducers in this workspace do not loop or sleep. A failed attempt is an
//! action; the reducer asks the policy whether another attempt is allowed and
//! how long to wait, then schedules the next attempt as an `Effect::Delay`.
//!
//! # Example
//!
//! ```rust
//! use storefront_runtime::retry::RetryPolicy;
//! use std::time::Duration;
//!
//! // 3 total attempts, one second apart
//! let policy = RetryPolicy::fixed(3, Duration::from_secs(1));
//!
//! assert!(policy.should_retry(1));
//! assert!(policy.should_retry(2));
//! assert!(!policy.should_retry(3));
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
//! ```

use std::time::Duration;

/// Retry policy: how many attempts are allowed and how long to wait between them
///
/// # Default Values
///
/// - `max_attempts`: 3 (initial attempt included)
/// - `delay`: 1 second
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl RetryPolicy {
    /// Create a policy with default settings
    #[must_use]
    pub const fn new() -> Self {
        Self::fixed(3, Duration::from_secs(1))
    }

    /// `max_attempts` total attempts, `delay` between each
    #[must_use]
    pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Maximum number of attempts, initial attempt included
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempts_made` failed attempts
    #[must_use]
    pub const fn should_retry(&self, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
    }

    /// Delay to wait after the given failed attempt (1-based)
    #[must_use]
    pub const fn delay_for_attempt(&self, _attempt: u32) -> Duration {
        self.delay
    }
}
