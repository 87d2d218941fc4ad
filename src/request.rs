use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::{CacheConfig, ClientConfig};
use crate::retry::RetrySpec;

/// Download progress reported to a descriptor's progress hook.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Progress {
    /// Bytes received so far.
    pub received: u64,
    /// Total bytes expected, when the response advertises a length.
    pub total: Option<u64>,
}

/// Callback invoked per received body chunk.
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Declarative specification of one HTTP call.
///
/// Built with the chainable constructors ([`RequestDescriptor::get`] and
/// friends) and consumed by value on dispatch; the executor never mutates a
/// descriptor after it is handed over. Unset policy fields fall back to the
/// client's [`ClientConfig`] field-by-field.
#[derive(Clone)]
pub struct RequestDescriptor {
    /// Absolute URL, or a path joined with the client's base URL.
    pub url: String,
    /// HTTP method; defaults to GET.
    pub method: Method,
    /// Query parameters, keyed deterministically.
    pub query: BTreeMap<String, String>,
    /// Per-request headers; win over same-named instance headers.
    pub headers: BTreeMap<String, String>,
    /// JSON request body.
    pub body: Option<Value>,
    /// Per-attempt timeout override in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Retry policy override.
    pub retry: Option<RetrySpec>,
    /// Cache policy override.
    pub cache: Option<CacheConfig>,
    /// External cancellation token; composed with the executor's own.
    pub cancel: Option<CancellationToken>,
    /// Progress hook invoked per received body chunk.
    pub on_progress: Option<ProgressCallback>,
}

impl fmt::Debug for RequestDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDescriptor")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .field("timeout_ms", &self.timeout_ms)
            .field("retry", &self.retry)
            .field("cache", &self.cache)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}

impl RequestDescriptor {
    /// Creates a descriptor with an explicit method.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            query: BTreeMap::new(),
            headers: BTreeMap::new(),
            body: None,
            timeout_ms: None,
            retry: None,
            cache: None,
            cancel: None,
            on_progress: None,
        }
    }

    /// GET descriptor.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    /// POST descriptor.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// PUT descriptor.
    pub fn put(url: impl Into<String>) -> Self {
        Self::new(Method::PUT, url)
    }

    /// PATCH descriptor.
    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(Method::PATCH, url)
    }

    /// DELETE descriptor.
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Method::DELETE, url)
    }

    /// Adds a query parameter.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Adds a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets the JSON body.
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Overrides the per-attempt timeout.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Overrides the retry policy.
    pub fn retry(mut self, retry: RetrySpec) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Overrides the cache policy.
    pub fn cache(mut self, cache: CacheConfig) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Attaches an external cancellation token.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Registers a progress hook invoked per received body chunk.
    pub fn on_progress(mut self, callback: impl Fn(Progress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Arc::new(callback));
        self
    }
}

/// Policy fields merged from instance config and descriptor overrides,
/// computed once per dispatch. Descriptor fields win individually.
#[derive(Clone, Debug)]
pub(crate) struct EffectivePolicy {
    pub timeout: Duration,
    pub retry: RetrySpec,
    pub cache: CacheConfig,
    pub deduplicate: bool,
}

impl EffectivePolicy {
    pub(crate) fn resolve(config: &ClientConfig, descriptor: &RequestDescriptor) -> Self {
        Self {
            timeout: Duration::from_millis(descriptor.timeout_ms.unwrap_or(config.timeout_ms)),
            retry: descriptor.retry.clone().unwrap_or_else(|| config.retry.clone()),
            cache: descriptor.cache.clone().unwrap_or_else(|| config.cache.clone()),
            deduplicate: config.deduplicate,
        }
    }
}

/// Fully resolved dispatch target: joined URL, merged headers, and the
/// request parts the transport needs per attempt.
pub(crate) struct ResolvedRequest {
    pub method: Method,
    pub url: String,
    pub query: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub on_progress: Option<ProgressCallback>,
}

impl ResolvedRequest {
    pub(crate) fn build(config: &ClientConfig, descriptor: RequestDescriptor) -> Self {
        let url = join_url(config.base_url.as_deref(), &descriptor.url);
        let mut headers = config.headers.clone();
        headers.extend(descriptor.headers);
        Self {
            method: descriptor.method,
            url,
            query: descriptor.query,
            headers,
            body: descriptor.body,
            on_progress: descriptor.on_progress,
        }
    }

    /// Deterministic key derived from `(method, url, query, body)`.
    ///
    /// Descriptors equal by value yield identical keys: query parameters
    /// iterate in `BTreeMap` order and `serde_json` object keys serialize
    /// sorted. The same key drives cache lookups and in-flight
    /// de-duplication.
    pub(crate) fn cache_key(&self) -> String {
        let mut key = format!("{} {}", self.method, self.url);
        if !self.query.is_empty() {
            key.push('?');
            for (index, (name, value)) in self.query.iter().enumerate() {
                if index > 0 {
                    key.push('&');
                }
                key.push_str(name);
                key.push('=');
                key.push_str(value);
            }
        }
        if let Some(body) = &self.body {
            key.push('#');
            key.push_str(&body.to_string());
        }
        key
    }
}

fn join_url(base: Option<&str>, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_owned();
    }
    match base {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), url.trim_start_matches('/')),
        None => url.to_owned(),
    }
}
