// ABOUTME: Configuration options for Vitrine: fallback policy, base URL, settle delay and fetch settings.
// ABOUTME: ExtractorBuilder provides a fluent API for constructing Extractor instances.

use std::collections::HashMap;
use std::time::Duration;

use url::Url;

use crate::extractor::Extractor;

/// Delay between thumbnail activations when none is configured.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Upper bound on the settle delay.
pub const MAX_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Configuration options for an [`Extractor`].
#[derive(Debug, Clone)]
pub struct Options {
    /// Run the DOM scan when the structured path finds nothing.
    pub allow_dom_fallback: bool,
    /// Base for resolving relative media URLs.
    pub base_url: Option<Url>,
    pub settle_delay: Duration,
    pub timeout: Duration,
    pub user_agent: String,
    pub allow_private_networks: bool,
    pub http_client: Option<reqwest::Client>,
    pub headers: HashMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            allow_dom_fallback: true,
            base_url: None,
            settle_delay: DEFAULT_SETTLE_DELAY,
            timeout: Duration::from_secs(30),
            user_agent: "Vitrine/0.1".to_string(),
            allow_private_networks: false,
            http_client: None,
            headers: HashMap::new(),
        }
    }
}

/// Builder for constructing Extractor instances with custom configuration.
#[derive(Debug, Clone)]
pub struct ExtractorBuilder {
    opts: Options,
}

impl ExtractorBuilder {
    /// Create a new ExtractorBuilder with default options.
    pub fn new() -> Self {
        Self {
            opts: Options::default(),
        }
    }

    /// Permit or forbid the DOM fallback scan.
    pub fn allow_dom_fallback(mut self, allow: bool) -> Self {
        self.opts.allow_dom_fallback = allow;
        self
    }

    /// Resolve relative media URLs against `base`.
    pub fn base_url(mut self, base: Url) -> Self {
        self.opts.base_url = Some(base);
        self
    }

    /// Set the delay between thumbnail activations, clamped to [`MAX_SETTLE_DELAY`].
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.opts.settle_delay = delay.min(MAX_SETTLE_DELAY);
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.opts.timeout = timeout;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.opts.user_agent = user_agent.into();
        self
    }

    /// Allow or disallow requests to private networks.
    pub fn allow_private_networks(mut self, allow: bool) -> Self {
        self.opts.allow_private_networks = allow;
        self
    }

    /// Use a custom HTTP client.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.opts.http_client = Some(client);
        self
    }

    /// Add a custom header to all requests.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.opts.headers.insert(key.into(), value.into());
        self
    }

    /// Build the Extractor with the configured options.
    pub fn build(self) -> Extractor {
        Extractor::new(self.opts)
    }
}

impl Default for ExtractorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_allow_fallback() {
        let opts = Options::default();
        assert!(opts.allow_dom_fallback);
        assert_eq!(opts.settle_delay, Duration::from_millis(500));
        assert!(opts.base_url.is_none());
    }

    #[test]
    fn settle_delay_is_clamped() {
        let extractor = ExtractorBuilder::new()
            .settle_delay(Duration::from_secs(30))
            .build();
        assert_eq!(extractor.options().settle_delay, MAX_SETTLE_DELAY);

        let extractor = ExtractorBuilder::new()
            .settle_delay(Duration::from_millis(5))
            .build();
        assert_eq!(extractor.options().settle_delay, Duration::from_millis(5));
    }

    #[test]
    fn builder_sets_fields() {
        let base = Url::parse("https://shop.example.com/").unwrap();
        let extractor = ExtractorBuilder::new()
            .allow_dom_fallback(false)
            .base_url(base.clone())
            .header("Accept-Language", "en-US")
            .build();
        let opts = extractor.options();
        assert!(!opts.allow_dom_fallback);
        assert_eq!(opts.base_url.as_ref(), Some(&base));
        assert_eq!(opts.headers.get("Accept-Language").map(String::as_str), Some("en-US"));
    }
}
