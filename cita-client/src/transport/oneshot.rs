//! In-process transport
//!
//! Calls an axum `Router` through `tower::ServiceExt::oneshot`, no sockets.
//! Used by the test suite as a fake backend.

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use http::Request;
use tower::ServiceExt;

use super::{ApiRequest, RawResponse, Transport};
use crate::{ClientError, ClientResult};

/// Oneshot transport (in-memory calls)
///
/// ```ignore
/// let router: Router = build_app().with_state(state);
/// let transport = OneshotTransport::new(router);
/// ```
#[derive(Debug, Clone)]
pub struct OneshotTransport {
    router: Router,
}

impl OneshotTransport {
    /// `router` must already have its state applied
    pub fn new(router: Router) -> Self {
        Self { router }
    }

    fn build_request(&self, request: &ApiRequest) -> ClientResult<Request<Body>> {
        let mut builder = Request::builder()
            .method(request.method.clone())
            .uri(request.path.as_str());

        if let Some(token) = &request.bearer {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let body = match &request.body {
            Some(body) => {
                let (content_type, bytes) = body.encode()?;
                builder = builder.header(http::header::CONTENT_TYPE, content_type);
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        builder
            .body(body)
            .map_err(|e| ClientError::Internal(format!("Failed to build request: {}", e)))
    }
}

#[async_trait]
impl Transport for OneshotTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<RawResponse> {
        let http_request = self.build_request(&request)?;

        let response = self
            .router
            .clone()
            .oneshot(http_request)
            .await
            .map_err(|e| ClientError::Internal(format!("Oneshot call failed: {}", e)))?;

        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| ClientError::Internal(format!("Failed to read body: {}", e)))?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}
