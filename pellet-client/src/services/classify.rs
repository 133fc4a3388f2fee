use super::{impl_service, Capability, ServiceContext, ServiceCore};
use crate::registry::Scope;
use pellet_core::{mime, Callback, Endpoint, Graph, MimeType, PelletError, Task, TaskHandle};

/// Class hierarchy of a knowledge base, computed by the reasoner.
#[derive(Debug)]
pub struct Classify {
    core: ServiceCore,
}

impl Capability for Classify {
    const NAME: &'static str = "classify";
    const SCOPE: Scope = Scope::KnowledgeBase;

    fn required_types() -> Vec<MimeType> {
        vec![mime::rdf_xml()]
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

impl_service!(Classify);

impl Classify {
    fn task(&self) -> impl Task<Output = Graph> {
        self.core.graph_request(self.core.endpoint().clone())
    }

    pub fn classify(&self) -> Result<Graph, PelletError> {
        self.core.run_sync(self.task())
    }

    pub fn classify_async(&self, callback: impl Callback<Graph>) -> TaskHandle {
        self.core.run_async(self.task(), callback)
    }
}
