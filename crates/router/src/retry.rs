//! Retry policy for live requests.
//!
//! Only decides *whether* a failed request is retried. The retry target is
//! chosen by the registry (see [`HostRegistry::record_failure`]).
//!
//! [`HostRegistry::record_failure`]: crate::HostRegistry::record_failure

use tomahawk_types::TomahawkError;

/// Retry budget for one logical request.
///
/// Retries only connection-refused failures, and only when another host
/// exists to take the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    remaining: u32,
    attempt: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RetryPolicy {
    /// Create a policy allowing up to `max_retries` retries.
    #[must_use]
    pub const fn new(max_retries: u32) -> Self {
        Self { remaining: max_retries, attempt: 0 }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new(0)
    }

    /// Zero-based index of the attempt this policy governs.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Whether this is the first physical attempt.
    #[must_use]
    pub const fn is_first_attempt(&self) -> bool {
        self.attempt == 0
    }

    /// Decide whether to retry after `error`.
    ///
    /// Returns the policy for the next attempt, or `None` to give up.
    #[must_use]
    pub fn retry(&self, error: &TomahawkError, multihost: bool) -> Option<Self> {
        (error.is_connection_refused() && multihost && self.remaining > 0)
            .then(|| Self { remaining: self.remaining - 1, attempt: self.attempt + 1 })
    }
}
