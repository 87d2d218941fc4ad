use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{FutureExt, StreamExt};
use reqwest::Method;
use tokio_util::sync::CancellationToken;

use crate::cache::CacheStore;
use crate::config::ClientConfig;
use crate::error::InterceptorPhase;
use crate::inflight::InFlightTracker;
use crate::interceptor::InterceptorChain;
use crate::logger::Logger;
use crate::request::{
    EffectivePolicy, Progress, ProgressCallback, RequestDescriptor, ResolvedRequest,
};
use crate::response::ApiResponse;
use crate::util::lock_unpoisoned;
use crate::{retry, ApiError, Result};

/// Request execution engine: turns a [`RequestDescriptor`] into a single,
/// cached, retried, de-duplicated, cancellable network operation.
///
/// Cheap to clone; clones share the cache, the in-flight tracker, and both
/// interceptor chains. Independently constructed clients share nothing.
#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    cache: Mutex<CacheStore>,
    inflight: Mutex<InFlightTracker>,
    request_interceptors: InterceptorChain<RequestDescriptor>,
    response_interceptors: InterceptorChain<ApiResponse>,
    logger: Logger,
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

impl FetchClient {
    /// Creates a client, building the underlying transport from `config`.
    ///
    /// Panics only if the transport cannot be initialized, the same failure
    /// mode as `reqwest::Client::new()`.
    pub fn new(config: ClientConfig) -> Self {
        let mut builder = reqwest::Client::builder();
        if config.with_credentials {
            builder = builder.cookie_store(true);
        }
        let http = builder
            .build()
            .expect("failed to initialize the HTTP transport");
        Self::with_http(http, config)
    }

    /// Creates a client over a caller-supplied `reqwest::Client`.
    pub fn with_http(http: reqwest::Client, config: ClientConfig) -> Self {
        let logger = Logger::new(config.logger.clone());
        Self {
            inner: Arc::new(ClientInner {
                http,
                config,
                cache: Mutex::new(CacheStore::new()),
                inflight: Mutex::new(InFlightTracker::new()),
                request_interceptors: InterceptorChain::new(InterceptorPhase::Request),
                response_interceptors: InterceptorChain::new(InterceptorPhase::Response),
                logger,
            }),
        }
    }

    /// Instance configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Chain of descriptor-transforming handlers run before dispatch.
    pub fn request_interceptors(&self) -> &InterceptorChain<RequestDescriptor> {
        &self.inner.request_interceptors
    }

    /// Chain of response-transforming handlers run after transport success.
    pub fn response_interceptors(&self) -> &InterceptorChain<ApiResponse> {
        &self.inner.response_interceptors
    }

    /// Drops every cached response.
    pub fn clear_cache(&self) {
        lock_unpoisoned(&self.inner.cache).clear();
    }

    /// Executes one descriptor through the full pipeline: cache lookup,
    /// request interceptors, in-flight de-duplication, transport with
    /// per-attempt timeout and retry, cache write, response interceptors.
    pub async fn execute(&self, descriptor: RequestDescriptor) -> Result<ApiResponse> {
        lock_unpoisoned(&self.inner.cache).sweep();

        let policy = EffectivePolicy::resolve(&self.inner.config, &descriptor);
        let descriptor = self.inner.request_interceptors.run(descriptor).await?;

        let external = descriptor.cancel.clone();
        let target = ResolvedRequest::build(&self.inner.config, descriptor);
        let key = target.cache_key();
        let cacheable = target.method == Method::GET && policy.cache.enabled;

        // A live cache hit bypasses everything downstream: transport,
        // retries, de-duplication, and the response chain.
        if cacheable {
            if let Some(hit) = lock_unpoisoned(&self.inner.cache).get(&key) {
                self.inner.logger.debug(&key, "cache hit");
                return Ok(hit);
            }
        }

        // The operation runs under a child of the external token so that
        // external cancellation aborts it without the reverse being true.
        let op_token = match &external {
            Some(token) => token.child_token(),
            None => CancellationToken::new(),
        };
        self.inner.logger.debug(&key, "dispatching");

        if !policy.deduplicate {
            return Self::run_operation(self.inner.clone(), target, policy, key, cacheable, op_token)
                .await;
        }

        // Join an existing pending operation or register ours; check and
        // insert happen under one lock acquisition so at most one transport
        // sequence is live per key.
        let (op, owner) = {
            let mut inflight = lock_unpoisoned(&self.inner.inflight);
            match inflight.get(&key) {
                Some(existing) => (existing, false),
                None => {
                    let op = Self::run_operation(
                        self.inner.clone(),
                        target,
                        policy,
                        key.clone(),
                        cacheable,
                        op_token,
                    )
                    .boxed()
                    .shared();
                    inflight.register(key.clone(), op.clone());
                    (op, true)
                }
            }
        };

        if owner {
            op.await
        } else {
            self.inner.logger.debug(&key, "joining in-flight request");
            match external {
                // A joiner's token is not wired into the shared operation;
                // cancelling abandons this caller's wait only.
                Some(token) => tokio::select! {
                    _ = token.cancelled() => Err(ApiError::Cancelled),
                    result = op => result,
                },
                None => op.await,
            }
        }
    }

    async fn run_operation(
        inner: Arc<ClientInner>,
        target: ResolvedRequest,
        policy: EffectivePolicy,
        key: String,
        cacheable: bool,
        token: CancellationToken,
    ) -> Result<ApiResponse> {
        let result = match Self::run_attempts(&inner, &target, &policy, &token).await {
            Ok(response) => {
                if cacheable && !token.is_cancelled() {
                    lock_unpoisoned(&inner.cache).set(
                        key.clone(),
                        response.clone(),
                        policy.cache.ttl_ms,
                    );
                }
                // Response handlers may reject, turning transport success
                // into an executor-level failure.
                inner.response_interceptors.run(response).await
            }
            Err(err) => {
                inner.logger.error(&key, &format!("request failed: {err}"));
                Err(err)
            }
        };

        // Released at settlement, success and failure alike, by whichever
        // caller drove the operation to completion. Tying the release to
        // the registering caller instead would leak the entry when that
        // caller's future is dropped mid-flight, and a settled operation
        // must never satisfy a later dispatch.
        if policy.deduplicate {
            lock_unpoisoned(&inner.inflight).release(&key);
        }

        result
    }

    async fn run_attempts(
        inner: &ClientInner,
        target: &ResolvedRequest,
        policy: &EffectivePolicy,
        token: &CancellationToken,
    ) -> Result<ApiResponse> {
        // The initial try is attempt 0; retries are numbered from 1.
        let mut attempt: u32 = 0;
        loop {
            if token.is_cancelled() {
                return Err(ApiError::Cancelled);
            }

            let outcome = tokio::select! {
                _ = token.cancelled() => return Err(ApiError::Cancelled),
                outcome = Self::send_once(inner, target, policy.timeout) => outcome,
            };

            let err = match outcome {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            let next_attempt = attempt + 1;
            if !retry::should_retry(next_attempt, &err, &policy.retry) {
                return Err(err);
            }

            let delay = retry::delay_for(next_attempt, &policy.retry);
            inner.logger.warn(
                &target.url,
                &format!("retry {next_attempt} in {} ms: {err}", delay.as_millis()),
            );
            tokio::select! {
                _ = token.cancelled() => return Err(ApiError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt = next_attempt;
        }
    }

    async fn send_once(
        inner: &ClientInner,
        target: &ResolvedRequest,
        timeout: Duration,
    ) -> Result<ApiResponse> {
        let mut request = inner
            .http
            .request(target.method.clone(), &target.url)
            .timeout(timeout);
        if !target.query.is_empty() {
            request = request.query(&target.query);
        }
        for (name, value) in &target.headers {
            request = request.header(name, value);
        }
        if let Some(body) = &target.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| map_transport_error(err, timeout))?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = read_body(response, target.on_progress.as_ref(), timeout).await?;

        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|err| ApiError::Decode(format!("invalid JSON response: {err}")))?
        };

        Ok(ApiResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}

async fn read_body(
    response: reqwest::Response,
    on_progress: Option<&ProgressCallback>,
    timeout: Duration,
) -> Result<Vec<u8>> {
    let Some(callback) = on_progress else {
        return response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|err| map_transport_error(err, timeout));
    };

    let total = response.content_length();
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| map_transport_error(err, timeout))?;
        buffer.extend_from_slice(&chunk);
        callback(Progress {
            received: buffer.len() as u64,
            total,
        });
    }
    Ok(buffer)
}

fn map_transport_error(err: reqwest::Error, timeout: Duration) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        ApiError::Network {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::FetchClient;
    use crate::config::ClientConfig;

    #[test]
    fn debug_surfaces_configuration_only() {
        let client = FetchClient::new(ClientConfig::new().base_url("https://api.example.com"));
        let debug = format!("{client:?}");
        assert!(debug.contains("api.example.com"));
    }

    #[test]
    fn clones_share_interceptor_chains() {
        let client = FetchClient::new(ClientConfig::default());
        let clone = client.clone();
        let id = client.request_interceptors().add_fn(Ok);
        assert!(clone.request_interceptors().eject(id));
    }
}
