use std::time::Duration;

use crate::GatewayError;

/// Bounded retry policy for gateway lookups.
///
/// There used to be a temptation to sprinkle ad hoc retry loops wherever the gateway was called; instead every caller
/// goes through one policy object. Only transient "transaction not found" responses are retried, because the gateway
/// can report a transaction over its webhook channel before the lookup endpoint can see it.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 3, delay: Duration::from_secs(2) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self { max_attempts, delay }
    }

    /// Whether `attempt` (1-based) may be followed by another try for the given error.
    pub fn should_retry(&self, err: &GatewayError, attempt: u32) -> bool {
        attempt < self.max_attempts && err.is_transient_lookup_failure()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_not_found_is_retried() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(&GatewayError::TransactionNotFound("TX-1".into()), 1));
        assert!(policy.should_retry(&GatewayError::TransactionNotFound("TX-1".into()), 2));
        assert!(!policy.should_retry(&GatewayError::TransactionNotFound("TX-1".into()), 3));
        assert!(!policy.should_retry(&GatewayError::AuthenticationFailed("nope".into()), 1));
        assert!(!policy.should_retry(&GatewayError::MalformedRequest("bad".into()), 1));
        assert!(!policy.should_retry(&GatewayError::Unavailable("503".into()), 1));
    }
}
