use async_trait::async_trait;
use pellet_core::{MimeType, Method, PelletError, Url};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("No response scripted for {method} {url}")]
    Unscripted { method: Method, url: String },
}

impl From<TransportError> for PelletError {
    fn from(err: TransportError) -> Self {
        PelletError::transport(err.to_string())
    }
}

/// One outgoing request: verb, fully expanded URL and `Accept` header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub accept: String,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url, accept: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url,
            accept: accept.into(),
        }
    }
}

impl fmt::Display for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} (Accept: {})", self.method, self.url, self.accept)
    }
}

/// Status, negotiated content type and body of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<MimeType>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, content_type: Option<MimeType>, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            content_type,
            body: body.into(),
        }
    }

    /// A 200 response with the given content type.
    pub fn ok(content_type: MimeType, body: impl Into<String>) -> Self {
        Self::new(200, Some(content_type), body)
    }

    /// Services answer `200 OK`; any other status is a failed call.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

/// Issues a single HTTP request and returns status and body.
#[async_trait]
pub trait HttpTransport: Send + Sync + fmt::Debug {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}
