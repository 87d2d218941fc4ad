use std::collections::BTreeMap;

use crate::logger::LogConfig;
use crate::retry::RetrySpec;

/// Configures response caching for GET requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CacheConfig {
    /// Whether successful GET responses are cached and served within TTL.
    pub enabled: bool,
    /// Entry time-to-live in milliseconds.
    pub ttl_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl_ms: 300_000,
        }
    }
}

impl CacheConfig {
    /// Enabled cache with the given TTL.
    pub fn enabled(ttl_ms: u64) -> Self {
        Self {
            enabled: true,
            ttl_ms,
        }
    }

    /// Explicitly disabled cache (useful as a per-request override).
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Instance-level client configuration.
///
/// Per-request descriptor fields override the same-named fields here
/// individually; everything left unset on the descriptor falls back to
/// these values.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL joined with relative request URLs.
    pub base_url: Option<String>,
    /// Per-attempt timeout in milliseconds.
    pub timeout_ms: u64,
    /// Headers sent with every request; per-request headers win on conflict.
    pub headers: BTreeMap<String, String>,
    /// Whether the underlying transport keeps a cookie store.
    pub with_credentials: bool,
    /// Whether identical concurrent requests collapse onto one transport
    /// call. Instance-level only; descriptors cannot override it.
    pub deduplicate: bool,
    /// Default retry behavior.
    pub retry: RetrySpec,
    /// Default cache behavior.
    pub cache: CacheConfig,
    /// Logging collaborator configuration.
    pub logger: LogConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_ms: 10_000,
            headers: BTreeMap::new(),
            with_credentials: false,
            deduplicate: true,
            retry: RetrySpec::default(),
            cache: CacheConfig::default(),
            logger: LogConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL joined with relative request URLs.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the per-attempt timeout in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Adds a header sent with every request.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Enables or disables the transport cookie store.
    pub fn with_credentials(mut self, enabled: bool) -> Self {
        self.with_credentials = enabled;
        self
    }

    /// Enables or disables in-flight de-duplication.
    pub fn deduplicate(mut self, enabled: bool) -> Self {
        self.deduplicate = enabled;
        self
    }

    /// Sets the default retry behavior.
    pub fn retry(mut self, retry: RetrySpec) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the default cache behavior.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Sets the logging configuration.
    pub fn logger(mut self, logger: LogConfig) -> Self {
        self.logger = logger;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::ClientConfig;

    #[test]
    fn defaults_match_documented_values() {
        let config = ClientConfig::default();
        assert_eq!(config.timeout_ms, 10_000);
        assert!(config.deduplicate);
        assert!(!config.cache.enabled);
        assert_eq!(config.retry.count, 0);
        assert!(!config.logger.enabled);
    }

    #[test]
    fn builder_setters_chain() {
        let config = ClientConfig::new()
            .base_url("https://api.example.com")
            .timeout_ms(5_000)
            .header("x-api-key", "k")
            .deduplicate(false);
        assert_eq!(config.base_url.as_deref(), Some("https://api.example.com"));
        assert_eq!(config.timeout_ms, 5_000);
        assert_eq!(config.headers.get("x-api-key").map(String::as_str), Some("k"));
        assert!(!config.deduplicate);
    }
}
