//! Authenticated navigation state.
//!
//! A [`Session`] owns everything that makes the scraping flow stateful:
//! the transport, the page matcher, the last response and its classified
//! kind, the authentication state machine, and the logout-suppression
//! counter used while an authentication flow is in flight.
//!
//! One session serves one logical extraction flow at a time. The current
//! page is mutated in place by [`Session::navigate`], so concurrent
//! callers would observe an inconsistent view; parallelism belongs at
//! the granularity of independent sessions.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, instrument, warn};

use crate::error::SessionError;
use crate::page::PageMatcher;
use crate::transport::{Request, Response, Transport};

// ============================================================================
// Auth State
// ============================================================================

/// Authentication state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No login attempted yet.
    #[default]
    Anonymous,
    /// A login flow is in flight.
    Authenticating,
    /// Logged in; navigations expect authenticated pages.
    Authenticated,
    /// The site silently dropped the session; the next guarded call
    /// re-authenticates.
    Expired,
}

// ============================================================================
// Login Guard
// ============================================================================

/// Scoped suppression of logout detection.
///
/// Intermediate authentication steps legitimately render pages that look
/// logged out; while at least one guard is alive, such a landing is not
/// an error. The counter is only ever touched through this guard, which
/// releases on drop whether the login flow succeeds or fails.
pub struct LoginGuard {
    depth: Arc<AtomicU32>,
}

impl LoginGuard {
    fn new(depth: Arc<AtomicU32>) -> Self {
        depth.fetch_add(1, Ordering::SeqCst);
        Self { depth }
    }
}

impl Drop for LoginGuard {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Session
// ============================================================================

/// The last visited page: classified kind plus the raw response.
#[derive(Debug)]
pub struct VisitedPage<K> {
    /// Classified page kind; `None` for unknown pages.
    pub kind: Option<K>,
    /// The raw response.
    pub response: Response,
}

/// Authenticated navigation state over a transport.
pub struct Session<K> {
    transport: Arc<dyn Transport>,
    matcher: PageMatcher<K>,
    logout_kinds: Vec<K>,
    current: Option<VisitedPage<K>>,
    auth: AuthState,
    login_depth: Arc<AtomicU32>,
}

impl<K: Copy + Eq + std::fmt::Debug> Session<K> {
    /// Creates a session.
    ///
    /// `logout_kinds` are the page kinds whose appearance outside an
    /// authentication flow means the session silently expired.
    pub fn new(transport: Arc<dyn Transport>, matcher: PageMatcher<K>, logout_kinds: Vec<K>) -> Self {
        Self {
            transport,
            matcher,
            logout_kinds,
            current: None,
            auth: AuthState::Anonymous,
            login_depth: Arc::new(AtomicU32::new(0)),
        }
    }

    /// Performs one navigation, reclassifying the current page.
    ///
    /// Landing on a logout kind while no login flow is in flight flips
    /// the session to [`AuthState::Expired`] and surfaces
    /// [`SessionError::SessionExpired`]; retry machinery treats that as
    /// transient and restarts the operation after re-authentication.
    #[instrument(skip(self, req), fields(url = %req.url))]
    pub async fn navigate(&mut self, req: &Request) -> Result<&Response, SessionError> {
        let response = self.transport.send(req).await?;
        let kind = self.matcher.classify(&response.url, &response.body);
        debug!(kind = ?kind, status = response.status, "Page classified");

        let logged_out = kind.is_some_and(|k| self.logout_kinds.contains(&k));
        let suppressed = self.login_depth.load(Ordering::SeqCst) > 0;
        let visited = self.current.insert(VisitedPage { kind, response });

        if logged_out && !suppressed {
            warn!("Navigation landed on a logged-out page, session expired");
            self.auth = AuthState::Expired;
            return Err(SessionError::SessionExpired);
        }

        Ok(&visited.response)
    }

    /// Returns the classified kind of the current page, if any.
    pub fn page_kind(&self) -> Option<K> {
        self.current.as_ref().and_then(|p| p.kind)
    }

    /// Returns true if the current page is of the given kind.
    pub fn is(&self, kind: K) -> bool {
        self.page_kind() == Some(kind)
    }

    /// Fails with [`SessionError::UnexpectedPage`] unless the current
    /// page is of the given kind.
    pub fn require(&self, kind: K) -> Result<(), SessionError> {
        if self.is(kind) {
            Ok(())
        } else {
            Err(SessionError::UnexpectedPage {
                expected: format!("{kind:?}"),
                found: self
                    .page_kind()
                    .map_or_else(|| "unknown".to_string(), |k| format!("{k:?}")),
            })
        }
    }

    /// Returns the current response, if a navigation happened.
    pub fn response(&self) -> Option<&Response> {
        self.current.as_ref().map(|p| &p.response)
    }

    /// Returns the authentication state.
    pub fn auth_state(&self) -> AuthState {
        self.auth
    }

    /// Sets the authentication state. Reserved to the login gate.
    pub(crate) fn set_auth_state(&mut self, state: AuthState) {
        debug!(from = ?self.auth, to = ?state, "Auth state transition");
        self.auth = state;
    }

    /// Begins suppressing logout detection for the guard's lifetime.
    pub fn suppress_logout(&self) -> LoginGuard {
        LoginGuard::new(Arc::clone(&self.login_depth))
    }

    /// Returns true while an authentication flow is in flight.
    pub fn login_in_progress(&self) -> bool {
        self.login_depth.load(Ordering::SeqCst) > 0
    }

    /// Discards navigation and authentication state (explicit logout).
    pub fn reset(&mut self) {
        self.current = None;
        self.auth = AuthState::Anonymous;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::testing::ScriptedTransport;

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

    fn session(transport: ScriptedTransport) -> Session<Kind> {
        Session::new(Arc::new(transport), matcher(), vec![Kind::Login])
    }

    #[tokio::test]
    async fn test_navigate_classifies_current_page() {
        let transport = ScriptedTransport::new().on("https://bank.example/home", "welcome");
        let mut s = session(transport);

        s.navigate(&Request::get("https://bank.example/home")).await.unwrap();
        assert!(s.is(Kind::Home));
        assert!(s.require(Kind::Home).is_ok());
        assert_eq!(s.response().unwrap().body, "welcome");
    }

    #[tokio::test]
    async fn test_unknown_page_is_a_value() {
        let transport = ScriptedTransport::new().on("https://bank.example/other", "?");
        let mut s = session(transport);

        s.navigate(&Request::get("https://bank.example/other")).await.unwrap();
        assert_eq!(s.page_kind(), None);
        let err = s.require(Kind::Home).unwrap_err();
        assert!(matches!(err, SessionError::UnexpectedPage { .. }));
    }

    #[tokio::test]
    async fn test_logout_page_expires_session() {
        let transport = ScriptedTransport::new().on("https://bank.example/auth/Login", "login");
        let mut s = session(transport);
        s.set_auth_state(AuthState::Authenticated);

        let err = s
            .navigate(&Request::get("https://bank.example/auth/Login"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired));
        assert_eq!(s.auth_state(), AuthState::Expired);
    }

    #[tokio::test]
    async fn test_guard_suppresses_logout_detection() {
        let transport = ScriptedTransport::new().on("https://bank.example/auth/Login", "login");
        let mut s = session(transport);
        s.set_auth_state(AuthState::Authenticated);

        let guard = s.suppress_logout();
        assert!(s.login_in_progress());
        s.navigate(&Request::get("https://bank.example/auth/Login"))
            .await
            .expect("logged-out landing must not error during login");
        assert_eq!(s.auth_state(), AuthState::Authenticated);

        drop(guard);
        assert!(!s.login_in_progress());
        let err = s
            .navigate(&Request::get("https://bank.example/auth/Login"))
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionExpired));
    }

    #[tokio::test]
    async fn test_guard_releases_on_early_drop() {
        let transport = ScriptedTransport::new();
        let s = session(transport);
        {
            let _g1 = s.suppress_logout();
            let _g2 = s.suppress_logout();
            assert!(s.login_in_progress());
        }
        assert!(!s.login_in_progress());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let transport = ScriptedTransport::new()
            .fail_once("https://bank.example/home", || TransportError::Timeout);
        let mut s = session(transport);

        let err = s
            .navigate(&Request::get("https://bank.example/home"))
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }
}
