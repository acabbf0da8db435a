//! Transport contract and the reqwest-backed implementation.
//!
//! The engine depends only on the [`Transport`] trait: one blocking round
//! trip per call, cookie persistence and redirect following behind it.
//! [`HttpTransport`] is the production implementation; tests substitute
//! scripted transports.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::TransportError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent string for Guichet.
const USER_AGENT: &str = concat!("Guichet/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Request & Response
// ============================================================================

/// HTTP method subset used by site adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET request.
    Get,
    /// POST request with form data.
    Post,
}

/// A navigation request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// HTTP method.
    pub method: Method,
    /// Absolute URL.
    pub url: String,
    /// Form parameters, sent as the body on POST and ignored on GET
    /// (adapters encode GET parameters into the URL).
    pub form: Vec<(String, String)>,
}

impl Request {
    /// Creates a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            form: Vec::new(),
        }
    }

    /// Creates a POST request with form data.
    pub fn post(url: impl Into<String>, form: Vec<(String, String)>) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            form,
        }
    }
}

/// A navigation response after redirects.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirect following.
    pub url: String,
    /// HTTP status code.
    pub status: u16,
    /// Response body as text.
    pub body: String,
}

// ============================================================================
// Transport Trait
// ============================================================================

/// One blocking round trip to the site.
///
/// Implementations must persist cookies across calls and follow
/// redirects; the session layer only ever sees the final response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the final response.
    async fn send(&self, req: &Request) -> Result<Response, TransportError>;
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Production transport backed by reqwest.
///
/// Carries a cookie store for session persistence and follows redirects,
/// which stateful banking sites rely on heavily during authentication.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    inner: Client,
}

impl HttpTransport {
    /// Creates a transport with the default timeout.
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a transport with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .cookie_store(true)
            .build()?;
        Ok(Self { inner: client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, req), fields(method = ?req.method, url = %req.url))]
    async fn send(&self, req: &Request) -> Result<Response, TransportError> {
        Url::parse(&req.url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        debug!("Sending request");

        let builder = match req.method {
            Method::Get => self.inner.get(&req.url),
            Method::Post => self.inner.post(&req.url).form(&req.form),
        };

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Http(e)
            }
        })?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;
        debug!(status, final_url = %url, "Response received");

        if status == 503 {
            return Err(TransportError::Unavailable(url));
        }

        Ok(Response { url, status, body })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_constructors() {
        let get = Request::get("https://example.com/a");
        assert_eq!(get.method, Method::Get);
        assert!(get.form.is_empty());

        let post = Request::post("https://example.com/b", vec![("k".into(), "v".into())]);
        assert_eq!(post.method, Method::Post);
        assert_eq!(post.form.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_url_rejected() {
        let transport = HttpTransport::new().unwrap();
        let err = transport.send(&Request::get("not a url")).await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidUrl(_)));
        assert!(!err.is_transient());
    }
}
