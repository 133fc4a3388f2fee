// Capability Registry: maps advertised capability names to proxy factories
//
// Populated by explicit registration before it is shared; once wrapped in an
// `Arc` it is read-only, so lookups from any thread need no locking.

use crate::services::{self, Capability, Service, ServiceContext};
use pellet_core::{Endpoint, MimeType, PelletError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Whether a capability hangs off the server root or off a knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    Server,
    KnowledgeBase,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Server => write!(f, "server"),
            Scope::KnowledgeBase => write!(f, "knowledge-base"),
        }
    }
}

/// Builds a proxy from its owner context, endpoint and advertised content types.
pub type ServiceFactory = Arc<
    dyn Fn(ServiceContext, Endpoint, Vec<MimeType>) -> Result<Arc<dyn Service>, PelletError>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct CapabilityRegistry {
    server: HashMap<String, ServiceFactory>,
    knowledge_base: HashMap<String, ServiceFactory>,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("server", &self.names(Scope::Server))
            .field("knowledge_base", &self.names(Scope::KnowledgeBase))
            .finish()
    }
}

static GLOBAL: OnceLock<Arc<CapabilityRegistry>> = OnceLock::new();

impl CapabilityRegistry {
    /// An empty registry; discovery against it skips every service.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in capability.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        services::register_builtins(&mut registry);
        registry
    }

    /// The process-wide registry of built-in capabilities, created on first use.
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let registry = Self::with_builtins();
            info!(
                server = registry.server.len(),
                knowledge_base = registry.knowledge_base.len(),
                "Capability registry initialized"
            );
            Arc::new(registry)
        }))
    }

    fn table(&self, scope: Scope) -> &HashMap<String, ServiceFactory> {
        match scope {
            Scope::Server => &self.server,
            Scope::KnowledgeBase => &self.knowledge_base,
        }
    }

    /// Add or replace the factory for `name`. A replaced entry is logged.
    pub fn register(&mut self, name: impl Into<String>, scope: Scope, factory: ServiceFactory) {
        let name = name.into();
        let table = match scope {
            Scope::Server => &mut self.server,
            Scope::KnowledgeBase => &mut self.knowledge_base,
        };
        if table.insert(name.clone(), factory).is_some() {
            warn!(capability = %name, %scope, "Capability registered twice, keeping the last one");
        } else {
            debug!(capability = %name, %scope, "Registered capability");
        }
    }

    /// Register `C` under its declared name and scope.
    pub fn register_capability<C: Capability>(&mut self) {
        let factory: ServiceFactory = Arc::new(
            |context: ServiceContext,
             endpoint: Endpoint,
             accepted: Vec<MimeType>|
             -> Result<Arc<dyn Service>, PelletError> {
                let service: Arc<dyn Service> = Arc::new(C::create(context, endpoint, accepted)?);
                Ok(service)
            },
        );
        self.register(C::NAME, C::SCOPE, factory);
    }

    pub fn resolve(&self, name: &str, scope: Scope) -> Option<&ServiceFactory> {
        self.table(scope).get(name)
    }

    pub fn contains(&self, name: &str, scope: Scope) -> bool {
        self.table(scope).contains_key(name)
    }

    /// Registered names for `scope`, sorted.
    pub fn names(&self, scope: Scope) -> Vec<&str> {
        let mut names: Vec<&str> = self.table(scope).keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.server.len() + self.knowledge_base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
