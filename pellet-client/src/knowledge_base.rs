use crate::server::{Server, ServerInner};
use crate::services::{downcast, Capability, Service};
use indexmap::IndexMap;
use pellet_core::{PelletError, Url};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tracing::debug;

/// A named collection hosted by a server, with its own capabilities.
///
/// Holds at most one service per capability tag. The link back to the server
/// is weak: a knowledge base never keeps its server alive.
pub struct KnowledgeBase {
    name: String,
    location: Option<Url>,
    server: Weak<ServerInner>,
    services: RwLock<IndexMap<String, Arc<dyn Service>>>,
}

impl fmt::Debug for KnowledgeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeBase")
            .field("name", &self.name)
            .field("location", &self.location)
            .field("services", &self.service_names())
            .finish()
    }
}

impl KnowledgeBase {
    pub(crate) fn new(name: String, location: Option<Url>, server: Weak<ServerInner>) -> Self {
        Self {
            name,
            location,
            server,
            services: RwLock::new(IndexMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> Option<&Url> {
        self.location.as_ref()
    }

    /// The owning server, `None` once it has been dropped.
    pub fn server(&self) -> Option<Server> {
        self.server.upgrade().map(Server::from_inner)
    }

    /// Add a service, replacing and returning any previous one with the same tag.
    pub fn add_service(&self, service: Arc<dyn Service>) -> Option<Arc<dyn Service>> {
        let name = service.name().to_string();
        debug!(knowledge_base = %self.name, service = %name, "Adding service");
        self.services
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name, service)
    }

    pub fn service(&self, name: &str) -> Option<Arc<dyn Service>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Typed lookup by the capability's tag.
    pub fn get_service<C: Capability>(&self) -> Option<Arc<C>> {
        self.service(C::NAME).and_then(|s| downcast::<C>(&s))
    }

    /// Like `get_service`, but a missing capability is an error.
    pub fn require_service<C: Capability>(&self) -> Result<Arc<C>, PelletError> {
        self.get_service::<C>()
            .ok_or_else(|| PelletError::unresolved(format!("{}/{}", self.name, C::NAME)))
    }

    pub fn has_service<C: Capability>(&self) -> bool {
        self.get_service::<C>().is_some()
    }

    /// Services in discovery order.
    pub fn services(&self) -> Vec<Arc<dyn Service>> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn service_names(&self) -> Vec<String> {
        self.services
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
