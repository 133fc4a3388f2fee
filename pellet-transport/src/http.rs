// reqwest-backed HTTP transport

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use pellet_core::MimeType;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: HttpClient,
}

impl ReqwestTransport {
    /// Create a transport whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Wrap an already configured client.
    pub fn with_client(http_client: HttpClient) -> Self {
        Self { http_client }
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() || err.is_request() {
        TransportError::Connection(err.to_string())
    } else {
        TransportError::Protocol(err.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, accept = %request.accept, "Sending request");

        let response = self
            .http_client
            .request(request.method.clone(), request.url.clone())
            .header(ACCEPT, request.accept.as_str())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<MimeType>().ok());
        let body = response.text().await.map_err(classify)?;

        debug!(status, content_type = ?content_type.as_ref().map(|t| t.essence()), "Received response");
        trace!("Response body:\n{}", body);

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }
}
