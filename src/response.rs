use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ApiError, Result};

/// Successful response surfaced by the executor.
///
/// The body is held as decoded JSON; use [`ApiResponse::json`] for a typed
/// view. Cloneable so cached and de-duplicated callers can share it.
#[derive(Clone, Debug)]
pub struct ApiResponse {
    /// HTTP status code (always 2xx; non-2xx surfaces as [`ApiError::Http`]).
    pub status: u16,
    /// Response headers as received.
    pub headers: HeaderMap,
    /// Decoded JSON body; `Value::Null` for empty bodies.
    pub body: Value,
}

impl ApiResponse {
    /// Deserializes the body into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone())
            .map_err(|err| ApiError::Decode(format!("response body: {err}")))
    }
}
