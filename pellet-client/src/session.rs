// Per-connection context shared by the server, its knowledge bases and services

use crate::config::ClientConfig;
use crate::registry::CapabilityRegistry;
use async_trait::async_trait;
use pellet_core::{
    mime, Endpoint, ExecutorConfig, Method, MimeType, PelletError, ResponseDecoder,
    StandardDecoder, Task, TaskExecutor,
};
use pellet_transport::{HttpRequest, HttpResponse, HttpTransport};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, trace};

/// Everything a proxy needs to talk to the server: transport, decoders,
/// the capability registry, the preferred HTTP method and the executor.
pub struct Session {
    transport: Arc<dyn HttpTransport>,
    decoder: Arc<dyn ResponseDecoder>,
    registry: Arc<CapabilityRegistry>,
    preferred_method: Method,
    executor: TaskExecutor,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transport", &self.transport)
            .field("preferred_method", &self.preferred_method)
            .field("executor", &self.executor)
            .finish()
    }
}

impl Session {
    pub fn new(
        config: &ClientConfig,
        registry: Arc<CapabilityRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Arc<Self>, PelletError> {
        Self::with_decoder(config, registry, transport, Arc::new(StandardDecoder))
    }

    pub fn with_decoder(
        config: &ClientConfig,
        registry: Arc<CapabilityRegistry>,
        transport: Arc<dyn HttpTransport>,
        decoder: Arc<dyn ResponseDecoder>,
    ) -> Result<Arc<Self>, PelletError> {
        let executor = TaskExecutor::new(ExecutorConfig {
            worker_threads: config.worker_threads,
            max_in_flight: config.max_in_flight,
        })?;
        Ok(Arc::new(Self {
            transport,
            decoder,
            registry,
            preferred_method: config.preferred_method.clone(),
            executor,
        }))
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    pub fn decoder(&self) -> &dyn ResponseDecoder {
        self.decoder.as_ref()
    }

    pub fn preferred_method(&self) -> &Method {
        &self.preferred_method
    }

    pub fn executor(&self) -> &TaskExecutor {
        &self.executor
    }

    /// Send one negotiated request to `endpoint`.
    ///
    /// Uses the preferred method when the endpoint offers it, otherwise the
    /// endpoint's first method, and sends `accept` joined as the `Accept`
    /// header. Any status other than 200 is a transport error.
    pub async fn send_negotiated(
        &self,
        endpoint: &Endpoint,
        accept: &[MimeType],
    ) -> Result<HttpResponse, PelletError> {
        let method = endpoint.select_method(Some(&self.preferred_method))?.clone();
        let request = HttpRequest::new(method, endpoint.url().clone(), mime::accept_header(accept));
        debug!(%request, "Invoking endpoint");

        let response = self.transport.execute(request).await?;
        if !response.is_success() {
            debug!(status = response.status, url = %endpoint.url(), "Endpoint returned an error status");
            return Err(PelletError::status(response.status, response.body));
        }
        trace!(status = response.status, "Endpoint answered");
        Ok(response)
    }

    /// Build the task that sends one request and decodes its response.
    pub fn request<T, F>(
        self: &Arc<Self>,
        endpoint: Endpoint,
        accept: Vec<MimeType>,
        decode: F,
    ) -> RequestTask<T, F>
    where
        T: Send + 'static,
        F: Fn(&Session, HttpResponse) -> Result<T, PelletError> + Send + Sync + 'static,
    {
        RequestTask {
            session: Arc::clone(self),
            endpoint,
            accept,
            decode,
            _output: PhantomData,
        }
    }
}

/// A single request/decode round trip.
///
/// Every service operation is one of these; the synchronous form runs it
/// with `TaskExecutor::run_sync` and the asynchronous form with `run_async`,
/// so both call styles share the same request and decode logic.
pub struct RequestTask<T, F> {
    session: Arc<Session>,
    endpoint: Endpoint,
    accept: Vec<MimeType>,
    decode: F,
    _output: PhantomData<fn() -> T>,
}

impl<T, F> RequestTask<T, F> {
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl<T, F> fmt::Debug for RequestTask<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestTask")
            .field("endpoint", &self.endpoint)
            .field("accept", &self.accept)
            .finish()
    }
}

#[async_trait]
impl<T, F> Task for RequestTask<T, F>
where
    T: Send + 'static,
    F: Fn(&Session, HttpResponse) -> Result<T, PelletError> + Send + Sync + 'static,
{
    type Output = T;

    async fn execute(&self) -> Result<T, PelletError> {
        let response = self
            .session
            .send_negotiated(&self.endpoint, &self.accept)
            .await?;
        (self.decode)(&*self.session, response)
    }
}
