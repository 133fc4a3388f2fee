use super::{impl_service, Capability, ServiceContext, ServiceCore};
use crate::registry::Scope;
use pellet_core::{mime, Callback, Endpoint, Graph, MimeType, PelletError, Task, TaskHandle};

/// Most specific types of every individual in a knowledge base.
#[derive(Debug)]
pub struct Realize {
    core: ServiceCore,
}

impl Capability for Realize {
    const NAME: &'static str = "realize";
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

impl_service!(Realize);

impl Realize {
    fn task(&self) -> impl Task<Output = Graph> {
        self.core.graph_request(self.core.endpoint().clone())
    }

    pub fn realize(&self) -> Result<Graph, PelletError> {
        self.core.run_sync(self.task())
    }

    pub fn realize_async(&self, callback: impl Callback<Graph>) -> TaskHandle {
        self.core.run_async(self.task(), callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use pellet_transport::{HttpResponse, MockTransport};
    use std::sync::Arc;

    #[test]
    fn test_malformed_document_is_decode_error() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "http://localhost/wine/realize",
            HttpResponse::new(200, None, "<html><body>oops</body></html>"),
        );
        let realize = test_support::build::<Realize>(
            transport,
            "http://localhost/wine/realize",
            &["text/html", "application/rdf+xml"],
        )
        .unwrap();

        // No Content-Type: decoded as the first accepted graph type, RDF/XML
        let err = realize.realize().unwrap_err();
        assert!(matches!(err, PelletError::Decode { .. }));
        assert_eq!(err.payload(), Some("<html><body>oops</body></html>"));
    }
}
