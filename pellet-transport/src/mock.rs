// Scripted in-memory transport

use crate::transport::{HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use pellet_core::MimeType;
use std::collections::HashMap;
use std::sync::Mutex;

/// Answers requests from a table of canned responses and records every request.
///
/// A response registered for a URL matches that exact URL first, then any
/// request to the same URL with a different query string.
#[derive(Debug, Default)]
pub struct MockTransport {
    responses: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

fn without_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a response for `url`, replacing any earlier one.
    pub fn respond(&self, url: &str, response: HttpResponse) -> &Self {
        if let Ok(mut responses) = self.responses.lock() {
            responses.insert(url.to_string(), response);
        }
        self
    }

    /// Register a 200 response with a content type.
    pub fn respond_ok(&self, url: &str, content_type: MimeType, body: impl Into<String>) -> &Self {
        self.respond(url, HttpResponse::ok(content_type, body))
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        let url = request.url.as_str();
        let responses = self
            .responses
            .lock()
            .map_err(|_| TransportError::Protocol("Mock transport poisoned".to_string()))?;
        responses
            .get(url)
            .or_else(|| responses.get(without_query(url)))
            .cloned()
            .ok_or_else(|| TransportError::Unscripted {
                method: request.method.clone(),
                url: url.to_string(),
            })
    }
}
