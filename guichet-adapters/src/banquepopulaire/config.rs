//! Adapter configuration.

use guichet_session::RetryPolicy;

/// Configuration for one Banque Populaire identity.
///
/// `website` is the regional bank host (each caisse runs its own copy of
/// the cyber application). Credential storage backends are out of scope;
/// callers hand the pair in directly.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Regional bank host, e.g. `www.ibps.alsace.banquepopulaire.fr`.
    pub website: String,
    /// Customer identifier.
    pub username: String,
    /// Password or access code.
    pub secret: String,
    /// Retry budget and transient class for every operation.
    pub retry: RetryPolicy,
}

impl AdapterConfig {
    /// Creates a configuration with the default retry policy.
    pub fn new(
        website: impl Into<String>,
        username: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            website: website.into(),
            username: username.into(),
            secret: secret.into(),
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the site base URL.
    pub fn base_url(&self) -> String {
        format!("https://{}", self.website)
    }
}
