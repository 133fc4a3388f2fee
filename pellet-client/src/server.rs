// Server: root of the discovered topology

use crate::builder::{self, Discovered, ProxyBuilder};
use crate::config::ClientConfig;
use crate::knowledge_base::KnowledgeBase;
use crate::registry::CapabilityRegistry;
use crate::services::{downcast, Capability, Service};
use crate::session::Session;
use indexmap::IndexMap;
use pellet_core::{mime, Endpoint, Method, PelletError, Url};
use pellet_transport::{HttpTransport, ReqwestTransport};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

pub(crate) struct ServerInner {
    session: Arc<Session>,
    endpoint: Endpoint,
    state: RwLock<Discovered>,
}

/// A connected server and everything its discovery document advertised.
///
/// Cheap to clone; clones share the same discovered state. Knowledge bases
/// and services are replaced wholesale by each `discover()` call.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

impl fmt::Debug for Server {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("endpoint", &self.inner.endpoint)
            .field("knowledge_bases", &self.list_knowledge_bases())
            .field("services", &self.service_names())
            .finish()
    }
}

impl Server {
    /// Connect over HTTP with the built-in capabilities and run discovery.
    pub fn connect(config: ClientConfig) -> Result<Self, PelletError> {
        let transport = ReqwestTransport::new(Duration::from_millis(config.timeout_ms))?;
        Self::connect_with(config, CapabilityRegistry::global(), Arc::new(transport))
    }

    /// Connect through an explicit registry and transport, then run discovery.
    pub fn connect_with(
        config: ClientConfig,
        registry: Arc<CapabilityRegistry>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, PelletError> {
        let url = config.parsed_url()?;
        let session = Session::new(&config, registry, transport)?;
        Self::with_session(session, url)
    }

    /// Discover the server at `url` using an existing session.
    pub fn with_session(session: Arc<Session>, url: Url) -> Result<Self, PelletError> {
        let endpoint = Endpoint::new(url, [session.preferred_method().clone()]);
        let server = Self {
            inner: Arc::new(ServerInner {
                session,
                endpoint,
                state: RwLock::new(Discovered::default()),
            }),
        };
        server.discover()?;
        Ok(server)
    }

    pub(crate) fn from_inner(inner: Arc<ServerInner>) -> Self {
        Self { inner }
    }

    /// Fetch the discovery document and replace knowledge bases, services and info.
    ///
    /// On failure the previously discovered state is left untouched.
    pub fn discover(&self) -> Result<(), PelletError> {
        let session = &self.inner.session;
        info!(url = %self.inner.endpoint.url(), "Discovering server");

        let task = session.request(self.inner.endpoint.clone(), vec![mime::json()], |_, response| {
            Ok(response.body)
        });
        let body = session.executor().run_sync(task)?;
        let root = builder::parse_document(&body)?;
        let discovered = ProxyBuilder::new(session, Arc::downgrade(&self.inner)).build_server(&root)?;

        info!(
            knowledge_bases = discovered.knowledge_bases.len(),
            services = discovered.services.len(),
            "Discovery finished"
        );
        for (name, kb) in &discovered.knowledge_bases {
            debug!(knowledge_base = %name, services = ?kb.service_names(), "Discovered knowledge base");
        }

        *self.inner.state.write().unwrap_or_else(PoisonError::into_inner) = discovered;
        Ok(())
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    pub fn preferred_method(&self) -> &Method {
        self.inner.session.preferred_method()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    /// Free-form `server-information` entries.
    pub fn info(&self) -> IndexMap<String, String> {
        self.read(|state| state.info.clone())
    }

    /// Knowledge base names, sorted.
    pub fn list_knowledge_bases(&self) -> Vec<String> {
        let mut names = self.read(|state| state.knowledge_bases.keys().cloned().collect::<Vec<_>>());
        names.sort();
        names
    }

    /// Knowledge bases in discovery order.
    pub fn knowledge_bases(&self) -> Vec<Arc<KnowledgeBase>> {
        self.read(|state| state.knowledge_bases.values().cloned().collect())
    }

    pub fn get_knowledge_base(&self, name: &str) -> Option<Arc<KnowledgeBase>> {
        self.read(|state| state.knowledge_bases.get(name).cloned())
    }

    /// Root-level service by its capability tag.
    pub fn service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.read(|state| state.services.get(name).cloned())
    }

    pub fn get_service<C: Capability>(&self) -> Option<Arc<C>> {
        self.service(C::NAME).and_then(|s| downcast::<C>(&s))
    }

    pub fn require_service<C: Capability>(&self) -> Result<Arc<C>, PelletError> {
        self.get_service::<C>()
            .ok_or_else(|| PelletError::unresolved(C::NAME))
    }

    pub fn has_service<C: Capability>(&self) -> bool {
        self.get_service::<C>().is_some()
    }

    pub fn services(&self) -> Vec<Arc<dyn Service>> {
        self.read(|state| state.services.values().cloned().collect())
    }

    pub fn service_names(&self) -> Vec<String> {
        self.read(|state| state.services.keys().cloned().collect())
    }

    fn read<R>(&self, f: impl FnOnce(&Discovered) -> R) -> R {
        f(&self.inner.state.read().unwrap_or_else(PoisonError::into_inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{Consistency, PsDiscovery};
    use pellet_transport::{HttpResponse, MockTransport};

    const ROOT: &str = "http://localhost:8080/";

    const DOCUMENT: &str = r#"{
        "knowledge-bases": [
            { "name": "wine", "kb-services": {
                "consistency": { "endpoint": { "url": "http://localhost:8080/wine/consistency", "http-methods": ["GET"] },
                                 "response-mimetype": ["application/sparql-results+xml"] }
            } },
            { "name": "galen", "kb-services": {} }
        ],
        "server-information": { "version": "2.0" },
        "ps-discovery": { "endpoint": { "url": "http://localhost:8080/", "http-methods": ["GET"] },
                          "response-mimetype": ["text/json"] }
    }"#;

    fn connect(transport: Arc<MockTransport>) -> Result<Server, PelletError> {
        let config = ClientConfig {
            url: ROOT.to_string(),
            worker_threads: 1,
            ..ClientConfig::default()
        };
        Server::connect_with(config, Arc::new(CapabilityRegistry::with_builtins()), transport)
    }

    #[test]
    fn test_discovery_populates_server() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok(ROOT, mime::json(), DOCUMENT);
        let server = connect(Arc::clone(&transport)).unwrap();

        assert_eq!(server.list_knowledge_bases(), vec!["galen", "wine"]);
        assert_eq!(server.info()["version"], "2.0");
        assert!(server.has_service::<PsDiscovery>());
        assert_eq!(server.service_names(), vec!["ps-discovery"]);

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.accept, "text/json");
    }

    #[test]
    fn test_knowledge_base_points_back_to_server() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok(ROOT, mime::json(), DOCUMENT);
        let server = connect(transport).unwrap();

        let wine = server.get_knowledge_base("wine").unwrap();
        let owner = wine.server().unwrap();
        assert_eq!(owner.endpoint(), server.endpoint());

        drop(owner);
        drop(server);
        assert!(wine.server().is_none());
    }

    #[test]
    fn test_rediscovery_replaces_state() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok(ROOT, mime::json(), DOCUMENT);
        let server = connect(Arc::clone(&transport)).unwrap();
        assert!(server.get_knowledge_base("wine").unwrap().has_service::<Consistency>());

        transport.respond_ok(ROOT, mime::json(), r#"{"knowledge-bases": [{"name": "pizza", "kb-services": {}}]}"#);
        server.discover().unwrap();

        assert_eq!(server.list_knowledge_bases(), vec!["pizza"]);
        assert!(server.services().is_empty());
        assert!(server.info().is_empty());
        assert_eq!(transport.request_count(), 2);
    }

    #[test]
    fn test_failed_rediscovery_keeps_state() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok(ROOT, mime::json(), DOCUMENT);
        let server = connect(Arc::clone(&transport)).unwrap();

        transport.respond(ROOT, HttpResponse::new(500, None, "down"));
        let err = server.discover().unwrap_err();
        assert!(matches!(err, PelletError::Transport { status: Some(500), .. }));
        assert_eq!(server.list_knowledge_bases().len(), 2);
    }

    #[test]
    fn test_structural_error_fails_connect() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok(ROOT, mime::json(), r#"{"server-information": {}}"#);
        let err = connect(transport).unwrap_err();
        assert!(matches!(err, PelletError::Discovery { .. }));
        assert_eq!(err.payload(), Some(r#"{"server-information":{}}"#));
    }

    #[test]
    fn test_lookup_misses_are_none() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok(ROOT, mime::json(), DOCUMENT);
        let server = connect(transport).unwrap();

        assert!(server.get_knowledge_base("pizza").is_none());
        assert!(server.service("classify").is_none());
        assert!(server.get_service::<Consistency>().is_none());
        assert!(matches!(
            server.require_service::<Consistency>(),
            Err(PelletError::UnresolvedCapability { .. })
        ));
    }
}
