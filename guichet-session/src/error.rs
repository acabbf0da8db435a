//! Session and transport error types.

use thiserror::Error;

// ============================================================================
// Transport Error
// ============================================================================

/// Error type for transport round trips.
#[derive(Debug, Error)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timed out.
    #[error("Request timed out")]
    Timeout,

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Site answered with a temporary-unavailability page or status.
    #[error("Site unavailable: {0}")]
    Unavailable(String),
}

impl TransportError {
    /// Returns true for failures expected to resolve on a fresh attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Unavailable(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::InvalidUrl(_) => false,
        }
    }
}

// ============================================================================
// Session Error
// ============================================================================

/// Error type for session navigation and retryable operations.
///
/// The transient subset (see [`SessionError::is_transient`]) is the
/// designated retry class: a retryable operation re-invokes its factory on
/// these and only these. Everything else propagates immediately.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Login attempt ended back on the login page. Terminal, never retried.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// A navigation landed on a logged-out page outside an authentication
    /// flow. Transient: the operation restarts after re-authentication.
    #[error("Session expired")]
    SessionExpired,

    /// A navigation landed on a page kind the routine has no handler for.
    #[error("Unexpected page: expected {expected}, found {found}")]
    UnexpectedPage {
        /// The page kind the routine required.
        expected: String,
        /// The page kind actually observed ("unknown" when unclassified).
        found: String,
    },

    /// A known page could not be driven further (all entry points failed,
    /// missing form, ...). Treated as a systemic transient condition.
    #[error("Broken page: {0}")]
    BrokenPage(String),

    /// A replay produced a record that disagrees with one already emitted.
    /// Permanent: safety of the merged listing cannot be guaranteed.
    #[error("Site replied inconsistently between retries at position {position}: {expected} vs {found}")]
    InconsistentRetry {
        /// Zero-based position of the mismatch in the listing.
        position: usize,
        /// Debug rendering of the previously emitted record.
        expected: String,
        /// Debug rendering of the record produced by the replay.
        found: String,
    },

    /// A replay ended before re-deriving every already-emitted record.
    #[error("Site replied fewer elements ({replayed}) than last iteration ({expected})")]
    ShortReplay {
        /// Number of records the replay produced before ending.
        replayed: usize,
        /// Number of records already emitted to the consumer.
        expected: usize,
    },

    /// The retry budget reached zero without success.
    #[error("Site did not reply successfully after {attempts} tries")]
    ExhaustedRetries {
        /// Total number of producer invocations attempted.
        attempts: u32,
    },

    /// Transport-level failure.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Malformed record payload on an otherwise known page. Permanent.
    #[error("Parse error: {0}")]
    Parse(String),
}

impl SessionError {
    /// Returns true for the default transient class.
    ///
    /// Transient errors are eligible for retry; all other variants are
    /// surfaced to the caller immediately.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::SessionExpired | Self::UnexpectedPage { .. } | Self::BrokenPage(_) => true,
            Self::Transport(e) => e.is_transient(),
            Self::InvalidCredentials
            | Self::InconsistentRetry { .. }
            | Self::ShortReplay { .. }
            | Self::ExhaustedRetries { .. }
            | Self::Parse(_) => false,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SessionError::SessionExpired.is_transient());
        assert!(SessionError::BrokenPage("no form".into()).is_transient());
        assert!(SessionError::Transport(TransportError::Timeout).is_transient());

        assert!(!SessionError::InvalidCredentials.is_transient());
        assert!(!SessionError::ExhaustedRetries { attempts: 4 }.is_transient());
        assert!(
            !SessionError::ShortReplay {
                replayed: 1,
                expected: 3
            }
            .is_transient()
        );
        assert!(!SessionError::Transport(TransportError::InvalidUrl("x".into())).is_transient());
    }
}
