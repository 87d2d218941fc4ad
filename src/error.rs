use std::fmt;

/// Interceptor chain phase, used to attribute rejections.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InterceptorPhase {
    /// Descriptor-transforming chain, runs before dispatch.
    Request,
    /// Response-transforming chain, runs after a successful transport call.
    Response,
}

impl fmt::Display for InterceptorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// Error type returned by this crate.
///
/// Every failure origin — transport, HTTP status, timeout, cancellation,
/// interceptor rejection, body decoding — normalizes to one of these
/// variants before reaching the caller. The type is `Clone` because
/// de-duplicated concurrent callers share a single outcome.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ApiError {
    /// Network or request execution error from the transport.
    #[error("network error: {message}")]
    Network {
        /// Transport-reported failure description.
        message: String,
    },
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// The per-attempt timeout elapsed before the response completed.
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    /// The request was cancelled through its cancellation token.
    #[error("request cancelled")]
    Cancelled,
    /// An interceptor rejected at either phase.
    #[error("{phase} interceptor rejected: {message}")]
    Interceptor {
        /// Which chain the rejecting handler belonged to.
        phase: InterceptorPhase,
        /// Rejection reason text.
        message: String,
    },
    /// Response decoding error (non-JSON body or typed decode failure).
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status code, when the failure carries one.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure was a per-attempt timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the failure was an explicit cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Whether the retry policy is allowed to absorb this failure.
    ///
    /// Cancellations, interceptor rejections, and decode errors are never
    /// retried; re-attempting cannot change their outcome.
    pub(crate) fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Http { .. } | Self::Timeout { .. }
        )
    }
}
