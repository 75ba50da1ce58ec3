//! HTTP transport over reqwest

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{ApiRequest, RawResponse, Transport};
use crate::{ClientConfig, ClientError, ClientResult};

/// Network transport
#[derive(Debug, Clone)]
pub struct NetworkTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl NetworkTransport {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            client,
            base_url: config.api_root().to_string(),
            timeout: config.request_timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for NetworkTransport {
    async fn send(&self, request: ApiRequest) -> ClientResult<RawResponse> {
        let mut req = self.client.request(request.method, self.url(&request.path));
        if let Some(token) = &request.bearer {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            let (content_type, bytes) = body.encode()?;
            req = req
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(bytes);
        }

        let response = req.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status();
        let body = response.bytes().await.map_err(|e| self.map_error(e))?;
        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}

impl NetworkTransport {
    fn map_error(&self, e: reqwest::Error) -> ClientError {
        if e.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Http(e)
        }
    }
}
