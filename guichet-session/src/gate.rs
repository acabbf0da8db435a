//! Login gate: authentication guard around session operations.
//!
//! Operations never call the login routine directly. They go through
//! [`LoginGate::ensure`], which re-authenticates an anonymous or expired
//! session and leaves an authenticated one untouched. An operation that
//! discovers mid-flight it was logged out surfaces
//! [`SessionError::SessionExpired`]; the retry layer restarts the whole
//! operation, and the gate re-authenticates at the top of the restart.

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::SessionError;
use crate::session::{AuthState, Session};

// ============================================================================
// Authenticator
// ============================================================================

/// Site-specific login routine.
///
/// Implementations drive the session through the site's login flow and
/// must end on a known authenticated page kind. Ending back on the login
/// page means the credentials were refused:
/// return [`SessionError::InvalidCredentials`], which is terminal and
/// never retried.
#[async_trait]
pub trait Authenticator<K>: Send + Sync {
    /// Performs the login flow.
    async fn login(&self, session: &mut Session<K>) -> Result<(), SessionError>;
}

// ============================================================================
// Login Gate
// ============================================================================

/// Guard ensuring an operation runs against a valid authenticated session.
pub struct LoginGate;

impl LoginGate {
    /// Re-authenticates the session if it is anonymous or expired.
    ///
    /// The login flow runs under a logout-suppression guard, because its
    /// intermediate pages legitimately resemble the logged-out state.
    /// On success the session is Authenticated; invalid credentials reset
    /// it to Anonymous and propagate; any other login failure leaves it
    /// Expired so the next guarded call tries again.
    #[instrument(skip(session, authenticator))]
    pub async fn ensure<K>(
        session: &mut Session<K>,
        authenticator: &dyn Authenticator<K>,
    ) -> Result<(), SessionError>
    where
        K: Copy + Eq + std::fmt::Debug + Send,
    {
        match session.auth_state() {
            AuthState::Authenticated => return Ok(()),
            // Re-entrant call from inside a login flow; nothing to do.
            AuthState::Authenticating => return Ok(()),
            AuthState::Anonymous | AuthState::Expired => {}
        }

        debug!("Session not authenticated, running login flow");
        session.set_auth_state(AuthState::Authenticating);

        let result = {
            let _guard = session.suppress_logout();
            authenticator.login(session).await
        };

        match result {
            Ok(()) => {
                session.set_auth_state(AuthState::Authenticated);
                Ok(())
            }
            Err(SessionError::InvalidCredentials) => {
                session.set_auth_state(AuthState::Anonymous);
                Err(SessionError::InvalidCredentials)
            }
            Err(error) => {
                session.set_auth_state(AuthState::Expired);
                Err(error)
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::PageMatcher;
    use crate::testing::ScriptedTransport;
    use crate::transport::Request;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        Login,
        Home,
    }

    fn matcher() -> PageMatcher<Kind> {
        PageMatcher::new()
            .rule(r"https://bank\.example/auth/.*", Kind::Login)
            .rule(r"https://bank\.example/home", Kind::Home)
    }

    struct FormAuthenticator {
        calls: AtomicU32,
    }

    impl FormAuthenticator {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Authenticator<Kind> for FormAuthenticator {
        async fn login(&self, session: &mut Session<Kind>) -> Result<(), SessionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // The site bounces through the login page before landing home;
            // the suppression guard keeps that from reading as a logout.
            session
                .navigate(&Request::get("https://bank.example/auth/Login"))
                .await?;
            session
                .navigate(&Request::post(
                    "https://bank.example/auth/submit",
                    vec![("user".into(), "u".into()), ("pass".into(), "p".into())],
                ))
                .await?;
            if session.is(Kind::Login) {
                return Err(SessionError::InvalidCredentials);
            }
            session.require(Kind::Home)
        }
    }

    fn accepting_transport() -> ScriptedTransport {
        ScriptedTransport::new()
            .on("https://bank.example/auth/Login", "login form")
            .on_to(
                "https://bank.example/auth/submit",
                "https://bank.example/home",
                "welcome",
            )
    }

    fn rejecting_transport() -> ScriptedTransport {
        ScriptedTransport::new()
            .on("https://bank.example/auth/Login", "login form")
            .on_to(
                "https://bank.example/auth/submit",
                "https://bank.example/auth/Login",
                "bad password",
            )
    }

    #[tokio::test]
    async fn test_login_from_anonymous() {
        let mut session = Session::new(Arc::new(accepting_transport()), matcher(), vec![Kind::Login]);
        let auth = FormAuthenticator::new();

        LoginGate::ensure(&mut session, &auth).await.unwrap();
        assert_eq!(session.auth_state(), AuthState::Authenticated);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_authenticated_session_is_noop() {
        let mut session = Session::new(Arc::new(accepting_transport()), matcher(), vec![Kind::Login]);
        let auth = FormAuthenticator::new();

        LoginGate::ensure(&mut session, &auth).await.unwrap();
        LoginGate::ensure(&mut session, &auth).await.unwrap();
        assert_eq!(auth.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_credentials_terminal() {
        let mut session = Session::new(Arc::new(rejecting_transport()), matcher(), vec![Kind::Login]);
        let auth = FormAuthenticator::new();

        let err = LoginGate::ensure(&mut session, &auth).await.unwrap_err();
        assert!(matches!(err, SessionError::InvalidCredentials));
        assert!(!err.is_transient());
        assert_eq!(session.auth_state(), AuthState::Anonymous);
    }

    #[tokio::test]
    async fn test_expired_session_relogs() {
        let mut session = Session::new(Arc::new(accepting_transport()), matcher(), vec![Kind::Login]);
        let auth = FormAuthenticator::new();

        LoginGate::ensure(&mut session, &auth).await.unwrap();
        session.set_auth_state(AuthState::Expired);
        LoginGate::ensure(&mut session, &auth).await.unwrap();
        assert_eq!(session.auth_state(), AuthState::Authenticated);
        assert_eq!(auth.calls.load(Ordering::SeqCst), 2);
    }
}
