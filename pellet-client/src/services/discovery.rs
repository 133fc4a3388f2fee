// Scoped re-discovery: one knowledge base, or the server's knowledge base list

use super::{impl_service, Capability, ServiceContext, ServiceCore};
use crate::builder::{self, ProxyBuilder, KNOWLEDGE_BASES};
use crate::knowledge_base::KnowledgeBase;
use crate::registry::Scope;
use pellet_core::{mime, Callback, Endpoint, MimeType, PelletError, Task, TaskHandle};
use std::sync::Arc;

/// Re-reads the description of a single knowledge base.
#[derive(Debug)]
pub struct KbDiscovery {
    core: ServiceCore,
}

impl Capability for KbDiscovery {
    const NAME: &'static str = "kb-discovery";
    const SCOPE: Scope = Scope::KnowledgeBase;

    fn required_types() -> Vec<MimeType> {
        vec![mime::json()]
    }

    fn create(
        context: ServiceContext,
        endpoint: Endpoint,
        accepted: Vec<MimeType>,
    ) -> Result<Self, PelletError> {
        Ok(Self {
            core: ServiceCore::new::<Self>(context, endpoint, accepted)?,
        })
    }
}

impl_service!(KbDiscovery);

impl KbDiscovery {
    fn task(&self) -> impl Task<Output = Arc<KnowledgeBase>> {
        let session = Arc::clone(self.core.session());
        let server = self.core.context().server_ref().clone();
        self.core.session().request(
            self.core.endpoint().clone(),
            self.core.accepted().to_vec(),
            move |_, response| {
                let raw = builder::parse_document(&response.body)?;
                let kb = ProxyBuilder::new(&session, server.clone()).build_knowledge_base(&raw)?;
                Ok(Arc::new(kb))
            },
        )
    }

    /// Fetch and build a fresh copy of this knowledge base.
    ///
    /// The result is not merged into the owning server.
    pub fn discover(&self) -> Result<Arc<KnowledgeBase>, PelletError> {
        self.core.run_sync(self.task())
    }

    pub fn discover_async(&self, callback: impl Callback<Arc<KnowledgeBase>>) -> TaskHandle {
        self.core.run_async(self.task(), callback)
    }
}

/// Re-reads the server root for its list of knowledge bases.
#[derive(Debug)]
pub struct PsDiscovery {
    core: ServiceCore,
}

impl Capability for PsDiscovery {
    const NAME: &'static str = "ps-discovery";
    const SCOPE: Scope = Scope::Server;

    fn required_types() -> Vec<MimeType> {
        vec![mime::json()]
    }

    fn create(
        context: ServiceContext,
        endpoint: Endpoint,
        accepted: Vec<MimeType>,
    ) -> Result<Self, PelletError> {
        Ok(Self {
            core: ServiceCore::new::<Self>(context, endpoint, accepted)?,
        })
    }
}

impl_service!(PsDiscovery);

impl PsDiscovery {
    fn task(&self) -> impl Task<Output = Vec<Arc<KnowledgeBase>>> {
        let session = Arc::clone(self.core.session());
        let server = self.core.context().server_ref().clone();
        self.core.session().request(
            self.core.endpoint().clone(),
            self.core.accepted().to_vec(),
            move |_, response| {
                let root = builder::parse_document(&response.body)?;
                let raw_kbs = root.get(KNOWLEDGE_BASES).ok_or_else(|| {
                    PelletError::discovery_with_payload(
                        format!("Discovery document has no {}", KNOWLEDGE_BASES),
                        response.body.clone(),
                    )
                })?;
                let kbs: Vec<Arc<KnowledgeBase>> = ProxyBuilder::new(&session, server.clone())
                    .build_knowledge_bases(raw_kbs)?
                    .into_iter()
                    .map(Arc::new)
                    .collect();
                Ok(kbs)
            },
        )
    }

    /// The server's current knowledge bases, without touching the server's own state.
    pub fn discover(&self) -> Result<Vec<Arc<KnowledgeBase>>, PelletError> {
        self.core.run_sync(self.task())
    }

    pub fn discover_async(
        &self,
        callback: impl Callback<Vec<Arc<KnowledgeBase>>>,
    ) -> TaskHandle {
        self.core.run_async(self.task(), callback)
    }
}
