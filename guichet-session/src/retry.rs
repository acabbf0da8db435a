//! Retry policy and the single-value retryable operation.
//!
//! Stateful sites fail mid-flow for reasons that resolve on a fresh
//! attempt (session hiccups, timeouts, transient error pages). The
//! policy bounds how many times an operation's factory may be invoked
//! and decides which errors count as transient; both are configuration,
//! not constants. Sequence-producing operations use
//! [`crate::resume::ResumableStream`], which shares this policy.

use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use crate::error::SessionError;

/// Default total attempts, matching observed flakiness of the target
/// sites rather than anything fundamental.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

// ============================================================================
// Retry Policy
// ============================================================================

/// Custom transient-error classifier.
pub type TransientClassifier = Arc<dyn Fn(&SessionError) -> bool + Send + Sync>;

/// Bounded-retry configuration for one logical operation.
#[derive(Clone)]
pub struct RetryPolicy {
    /// Maximum total invocations of the operation's factory.
    pub max_attempts: u32,
    classifier: Option<TransientClassifier>,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget and the default
    /// transient class ([`SessionError::is_transient`]).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            classifier: None,
        }
    }

    /// Disables retries: a single attempt only.
    pub fn no_retry() -> Self {
        Self::new(1)
    }

    /// Replaces the transient class with a custom classifier.
    #[must_use]
    pub fn with_classifier(
        mut self,
        classifier: impl Fn(&SessionError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.classifier = Some(Arc::new(classifier));
        self
    }

    /// Returns true if the error belongs to the retryable class.
    pub fn is_transient(&self, error: &SessionError) -> bool {
        match &self.classifier {
            Some(classify) => classify(error),
            None => error.is_transient(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("custom_classifier", &self.classifier.is_some())
            .finish()
    }
}

// ============================================================================
// Single-Value Retry
// ============================================================================

/// Invokes `factory` until it succeeds, a non-transient error occurs, or
/// the attempt budget is spent.
///
/// Transient failures are logged and retried; everything else propagates
/// immediately. Exhaustion surfaces as
/// [`SessionError::ExhaustedRetries`].
pub async fn retry_value<T, F, Fut>(policy: &RetryPolicy, mut factory: F) -> Result<T, SessionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SessionError>>,
{
    for attempt in 1..=policy.max_attempts {
        match factory().await {
            Ok(value) => return Ok(value),
            Err(error) if policy.is_transient(&error) => {
                debug!(attempt, error = %error, "Transient failure, retrying");
            }
            Err(error) => return Err(error),
        }
    }
    Err(SessionError::ExhaustedRetries {
        attempts: policy.max_attempts,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let value = retry_value(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 4 {
                    Err(SessionError::SessionExpired)
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 4);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_exhaustion_after_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let err = retry_value::<u32, _, _>(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SessionError::SessionExpired) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SessionError::ExhaustedRetries { attempts: 4 }));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let err = retry_value::<u32, _, _>(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SessionError::InvalidCredentials) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SessionError::InvalidCredentials));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_custom_classifier() {
        let calls = AtomicU32::new(0);
        // Treat nothing as transient: first failure is final.
        let policy = RetryPolicy::new(4).with_classifier(|_| false);

        let err = retry_value::<u32, _, _>(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(SessionError::SessionExpired) }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, SessionError::SessionExpired));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
