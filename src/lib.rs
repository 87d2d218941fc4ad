//! `fetchkit` is a client-side HTTP request orchestration engine.
//!
//! A declarative [`RequestDescriptor`] goes in; a single, cached, retried,
//! de-duplicated, cancellable network operation comes out:
//! - [`FetchClient::execute`] — the request executor
//! - [`InterceptorChain`] — request/response transform pipelines
//! - [`Binding`] — observable `{status, data, error}` over one descriptor
//!
//! ```no_run
//! use fetchkit::{CacheConfig, ClientConfig, FetchClient, RequestDescriptor, RetrySpec};
//!
//! # async fn run() -> fetchkit::Result<()> {
//! let client = FetchClient::new(
//!     ClientConfig::new()
//!         .base_url("https://api.example.com")
//!         .cache(CacheConfig::enabled(60_000))
//!         .retry(RetrySpec::with_count(2)),
//! );
//! let users = client.execute(RequestDescriptor::get("/users")).await?;
//! println!("{}", users.body);
//! # Ok(())
//! # }
//! ```

mod binding;
mod cache;
mod client;
mod config;
mod error;
mod inflight;
mod interceptor;
mod logger;
mod request;
mod response;
pub mod retry;
mod util;

pub use binding::{Binding, BindingState, BindingStatus, Debounced, Throttled};
pub use client::FetchClient;
pub use config::{CacheConfig, ClientConfig};
pub use error::{ApiError, InterceptorPhase};
pub use interceptor::{FulfilledHandler, InterceptorChain, InterceptorId, RejectedHandler};
pub use logger::{LogConfig, LogLevel};
pub use request::{Progress, ProgressCallback, RequestDescriptor};
pub use response::ApiResponse;
pub use retry::{Backoff, RetrySpec};

pub use reqwest::Method;
pub use tokio_util::sync::CancellationToken;

pub type Result<T> = std::result::Result<T, ApiError>;
