//! Platform attribution token sources

use async_trait::async_trait;

/// Retrieves platform-level attribution tokens on demand.
#[async_trait]
pub trait AttributionFetcher: Send + Sync {
    /// The install's ad-services token, or `None` when the platform doesn't
    /// provide one. Absence is expected and not an error.
    async fn ad_services_token(&self) -> Option<String>;
}

/// Fetcher returning a token supplied by the host app.
#[derive(Debug, Clone, Default)]
pub struct StaticAttributionFetcher {
    token: Option<String>,
}

impl StaticAttributionFetcher {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl AttributionFetcher for StaticAttributionFetcher {
    async fn ad_services_token(&self) -> Option<String> {
        self.token.clone()
    }
}
