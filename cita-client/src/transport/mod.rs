//! Transport seam between the gateway and the wire
//!
//! [`NetworkTransport`] talks HTTP through reqwest; [`OneshotTransport`]
//! calls an axum `Router` in-process (feature `in-process`).

mod network;
#[cfg(any(test, feature = "in-process"))]
mod oneshot;

pub use network::NetworkTransport;
#[cfg(any(test, feature = "in-process"))]
pub use oneshot::OneshotTransport;

use async_trait::async_trait;
use http::{Method, StatusCode};

use crate::ClientResult;

/// Request body
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded` pairs
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Encode for the wire, returning the content type and bytes
    pub fn encode(&self) -> ClientResult<(&'static str, Vec<u8>)> {
        match self {
            Self::Json(value) => Ok(("application/json", serde_json::to_vec(value)?)),
            Self::Form(pairs) => {
                let encoded = pairs
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&");
                Ok(("application/x-www-form-urlencoded", encoded.into_bytes()))
            }
        }
    }
}

/// One API call, relative to the API root
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path plus query, e.g. `/services/s1/availability?date=2025-03-14`
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            bearer: None,
            body: None,
        }
    }

    pub fn with_bearer(mut self, token: Option<String>) -> Self {
        self.bearer = token;
        self
    }

    pub fn with_body(mut self, body: Option<RequestBody>) -> Self {
        self.body = body;
        self
    }
}

/// Status and raw body of a completed call
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// Sends API requests
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ClientResult<RawResponse>;
}
