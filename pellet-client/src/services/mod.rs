// Capability proxies
//
// Each capability is a concrete type implementing `Service` (the object-safe
// view stored by servers and knowledge bases) and `Capability` (its tag, scope,
// required content types and constructor, used by the registry).

mod classify;
mod consistency;
mod discovery;
mod explain;
mod query;
mod realize;
mod search;

pub use classify::Classify;
pub use consistency::Consistency;
pub use discovery::{KbDiscovery, PsDiscovery};
pub use explain::Explain;
pub use query::Query;
pub use realize::Realize;
pub use search::Search;

use crate::registry::{CapabilityRegistry, Scope};
use crate::server::{Server, ServerInner};
use crate::session::Session;
use pellet_core::{
    mime, Callback, Endpoint, Graph, MimeType, PelletError, ResponseDecoder, ResultSet, Task,
    TaskHandle,
};
use pellet_transport::HttpResponse;
use serde::de::DeserializeOwned;
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Register every built-in capability.
pub fn register_builtins(registry: &mut CapabilityRegistry) {
    registry.register_capability::<Classify>();
    registry.register_capability::<Realize>();
    registry.register_capability::<Consistency>();
    registry.register_capability::<Explain>();
    registry.register_capability::<Query>();
    registry.register_capability::<Search>();
    registry.register_capability::<KbDiscovery>();
    registry.register_capability::<PsDiscovery>();
}

/// Conversion to `Arc<dyn Any>` for typed lookups of stored services.
pub trait IntoAnyArc {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: Any + Send + Sync> IntoAnyArc for T {
    fn into_any_arc(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// A capability proxy bound to one endpoint.
pub trait Service: IntoAnyArc + Send + Sync + fmt::Debug {
    /// The capability tag this proxy was registered under.
    fn name(&self) -> &str;

    fn scope(&self) -> Scope;

    fn endpoint(&self) -> &Endpoint;

    fn accepted_types(&self) -> &[MimeType];

    /// Owning knowledge base, `None` for server-scoped services.
    fn knowledge_base(&self) -> Option<&str>;
}

/// A concrete capability the registry can construct.
pub trait Capability: Service + Sized + 'static {
    const NAME: &'static str;
    const SCOPE: Scope;

    /// Content types the advertised list must be compatible with.
    fn required_types() -> Vec<MimeType>;

    fn create(
        context: ServiceContext,
        endpoint: Endpoint,
        accepted: Vec<MimeType>,
    ) -> Result<Self, PelletError>;
}

/// Typed view of a stored service, `None` if it is a different capability.
pub fn downcast<C: Capability>(service: &Arc<dyn Service>) -> Option<Arc<C>> {
    Arc::clone(service).into_any_arc().downcast::<C>().ok()
}

/// What a factory receives besides the endpoint: the connection and the owner.
#[derive(Clone)]
pub struct ServiceContext {
    session: Arc<Session>,
    server: Weak<ServerInner>,
    knowledge_base: Option<String>,
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("knowledge_base", &self.knowledge_base)
            .finish()
    }
}

impl ServiceContext {
    pub(crate) fn new(
        session: Arc<Session>,
        server: Weak<ServerInner>,
        knowledge_base: Option<String>,
    ) -> Self {
        Self {
            session,
            server,
            knowledge_base,
        }
    }

    /// A context with no owning server, for constructing proxies by hand.
    pub fn detached(session: Arc<Session>, knowledge_base: Option<&str>) -> Self {
        Self::new(session, Weak::new(), knowledge_base.map(str::to_string))
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// The owning server, if it is still alive.
    pub fn server(&self) -> Option<Server> {
        self.server.upgrade().map(Server::from_inner)
    }

    pub(crate) fn server_ref(&self) -> &Weak<ServerInner> {
        &self.server
    }

    pub fn knowledge_base(&self) -> Option<&str> {
        self.knowledge_base.as_deref()
    }
}

/// State shared by every capability proxy: tag, owner, endpoint and content types.
#[derive(Debug, Clone)]
pub struct ServiceCore {
    name: &'static str,
    scope: Scope,
    context: ServiceContext,
    endpoint: Endpoint,
    accepted: Vec<MimeType>,
}

impl ServiceCore {
    /// Validate `accepted` against `C`'s required types.
    pub fn new<C: Capability>(
        context: ServiceContext,
        endpoint: Endpoint,
        accepted: Vec<MimeType>,
    ) -> Result<Self, PelletError> {
        if endpoint.methods().is_empty() {
            return Err(PelletError::configuration(format!(
                "{} service at {} advertises no HTTP methods",
                C::NAME,
                endpoint.url()
            )));
        }
        for required in C::required_types() {
            if !mime::supports(&accepted, &required) {
                return Err(PelletError::configuration(format!(
                    "{} service must support {} (accepts: {})",
                    C::NAME,
                    required,
                    mime::accept_header(&accepted)
                )));
            }
        }
        Ok(Self {
            name: C::NAME,
            scope: C::SCOPE,
            context,
            endpoint,
            accepted,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn context(&self) -> &ServiceContext {
        &self.context
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.context.session
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn accepted(&self) -> &[MimeType] {
        &self.accepted
    }

    pub fn run_sync<T: Task>(&self, task: T) -> Result<T::Output, PelletError> {
        self.session().executor().run_sync(task)
    }

    pub fn run_async<T, C>(&self, task: T, callback: C) -> TaskHandle
    where
        T: Task,
        C: Callback<T::Output>,
    {
        self.session().executor().run_async(task, callback)
    }

    /// Request to `endpoint` decoded as a graph.
    pub fn graph_request(&self, endpoint: Endpoint) -> impl Task<Output = Graph> {
        let accepted = self.accepted.clone();
        self.session()
            .request(endpoint, self.accepted.clone(), move |session, response| {
                decode_graph(session.decoder(), &response, &accepted)
            })
    }
}

/// Media type a response is decoded as.
///
/// The response's `Content-Type` wins; without one, the first accepted type
/// that `usable` approves is assumed.
pub fn negotiated_type(
    response: &HttpResponse,
    accepted: &[MimeType],
    usable: impl Fn(&MimeType) -> bool,
) -> Result<MimeType, PelletError> {
    if let Some(content_type) = &response.content_type {
        return Ok(content_type.clone());
    }
    accepted
        .iter()
        .find(|t| usable(t))
        .cloned()
        .ok_or_else(|| {
            PelletError::decode_with_payload(
                "Response has no content type and no accepted type can be decoded",
                response.body.clone(),
            )
        })
}

pub(crate) fn decode_graph(
    decoder: &dyn ResponseDecoder,
    response: &HttpResponse,
    accepted: &[MimeType],
) -> Result<Graph, PelletError> {
    let media_type = negotiated_type(response, accepted, |t| decoder.decodes_graph(t))?;
    decoder.decode_graph(&response.body, &media_type)
}

pub(crate) fn decode_results(
    decoder: &dyn ResponseDecoder,
    response: &HttpResponse,
    accepted: &[MimeType],
) -> Result<ResultSet, PelletError> {
    let media_type = negotiated_type(response, accepted, |t| decoder.decodes_results(t))?;
    decoder.decode_results(&response.body, &media_type)
}

pub(crate) fn decode_json<T: DeserializeOwned>(response: &HttpResponse) -> Result<T, PelletError> {
    serde_json::from_str(&response.body).map_err(|e| {
        PelletError::decode_with_payload(format!("Problem parsing JSON content: {}", e), response.body.clone())
    })
}

/// Implements `Service` for a capability holding its state in a `core: ServiceCore` field.
macro_rules! impl_service {
    ($ty:ty) => {
        impl $crate::services::Service for $ty {
            fn name(&self) -> &str {
                self.core.name()
            }

            fn scope(&self) -> $crate::registry::Scope {
                self.core.scope()
            }

            fn endpoint(&self) -> &pellet_core::Endpoint {
                self.core.endpoint()
            }

            fn accepted_types(&self) -> &[pellet_core::MimeType] {
                self.core.accepted()
            }

            fn knowledge_base(&self) -> Option<&str> {
                self.core.context().knowledge_base()
            }
        }
    };
}
pub(crate) use impl_service;
