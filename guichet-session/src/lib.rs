// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # Guichet Session
//!
//! Stateful session navigation and retryable iteration for site adapters.
//!
//! Scraping a session-stateful site means driving one HTTP conversation
//! through a sequence of pages while extracting records along the way,
//! and surviving the site misbehaving mid-extraction. This crate is that
//! engine, independent of any particular site:
//!
//! - [`page::PageMatcher`] - ordered URL/content rules classifying each
//!   response into a page kind
//! - [`session::Session`] - current page, authentication state machine,
//!   and scoped logout-detection suppression
//! - [`gate::LoginGate`] - transparent re-authentication before guarded
//!   operations
//! - [`retry::RetryPolicy`] / [`retry::retry_value`] - bounded retry of
//!   single-value operations on the transient failure class
//! - [`resume::ResumableStream`] - retry-and-resume for multi-page record
//!   listings, with replay consistency checking
//! - [`nav::EntryPoints`] - prioritized entry candidates with winner
//!   pinning
//! - [`transport`] - the one-round-trip contract the engine navigates
//!   through, plus the reqwest implementation
//!
//! ## Example
//!
//! ```ignore
//! let mut session = Session::new(transport, matcher, vec![Kind::Login]);
//! LoginGate::ensure(&mut session, &authenticator).await?;
//!
//! let stream = ResumableStream::new(RetryPolicy::default(), move || {
//!     Box::new(AccountsProducer::new(session.clone()))
//! });
//! let accounts = stream.try_collect().await?;
//! ```

pub mod error;
pub mod gate;
pub mod nav;
pub mod page;
pub mod resume;
pub mod retry;
pub mod session;
pub mod testing;
pub mod transport;

// Re-export key types at crate root

// Errors
pub use error::{SessionError, TransportError};

// Session & navigation
pub use gate::{Authenticator, LoginGate};
pub use nav::EntryPoints;
pub use page::{PageMatcher, PageRule, PageToken};
pub use session::{AuthState, LoginGuard, Session, VisitedPage};

// Retry machinery
pub use resume::{Producer, ProducerFactory, ResumableStream};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy, retry_value};

// Transport
pub use transport::{HttpTransport, Method, Request, Response, Transport};
