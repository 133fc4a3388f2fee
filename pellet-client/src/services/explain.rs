use super::{impl_service, Capability, ServiceContext, ServiceCore};
use crate::registry::Scope;
use pellet_core::{mime, Callback, Endpoint, Graph, MimeType, PelletError, Task, TaskHandle};

const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
const OWL_NOTHING: &str = "http://www.w3.org/2002/07/owl#Nothing";

/// Justifications for entailments, returned as RDF/XML graphs.
///
/// Every operation is a SPARQL query sent in the `query` parameter; the
/// convenience forms build a single-triple `SELECT` for the entailment.
#[derive(Debug)]
pub struct Explain {
    core: ServiceCore,
}

impl Capability for Explain {
    const NAME: &'static str = "explain";
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

impl_service!(Explain);

fn select_query(subject: &str, predicate: &str, object: &str) -> String {
    format!("SELECT * WHERE {{ <{}> <{}> <{}> }}", subject, predicate, object)
}

impl Explain {
    fn task(&self, query: &str) -> impl Task<Output = Graph> {
        let endpoint = self.core.endpoint().with_query(&[("query", Some(query))]);
        self.core.graph_request(endpoint)
    }

    /// Explain an arbitrary SPARQL query.
    pub fn query(&self, query: &str) -> Result<Graph, PelletError> {
        self.core.run_sync(self.task(query))
    }

    pub fn query_async(&self, query: &str, callback: impl Callback<Graph>) -> TaskHandle {
        self.core.run_async(self.task(query), callback)
    }

    /// Why `subclass` is a subclass of `superclass`.
    pub fn subclass(&self, subclass: &str, superclass: &str) -> Result<Graph, PelletError> {
        self.query(&select_query(subclass, RDFS_SUBCLASS_OF, superclass))
    }

    pub fn subclass_async(
        &self,
        subclass: &str,
        superclass: &str,
        callback: impl Callback<Graph>,
    ) -> TaskHandle {
        self.query_async(&select_query(subclass, RDFS_SUBCLASS_OF, superclass), callback)
    }

    /// Why `class` is unsatisfiable.
    pub fn unsat(&self, class: &str) -> Result<Graph, PelletError> {
        self.query(&select_query(class, RDFS_SUBCLASS_OF, OWL_NOTHING))
    }

    pub fn unsat_async(&self, class: &str, callback: impl Callback<Graph>) -> TaskHandle {
        self.query_async(&select_query(class, RDFS_SUBCLASS_OF, OWL_NOTHING), callback)
    }

    /// Why the knowledge base is inconsistent; sent as an empty query.
    pub fn inconsistent(&self) -> Result<Graph, PelletError> {
        self.query("")
    }

    pub fn inconsistent_async(&self, callback: impl Callback<Graph>) -> TaskHandle {
        self.query_async("", callback)
    }

    /// Why `subject predicate object` holds.
    pub fn property(&self, subject: &str, predicate: &str, object: &str) -> Result<Graph, PelletError> {
        self.query(&select_query(subject, predicate, object))
    }

    pub fn property_async(
        &self,
        subject: &str,
        predicate: &str,
        object: &str,
        callback: impl Callback<Graph>,
    ) -> TaskHandle {
        self.query_async(&select_query(subject, predicate, object), callback)
    }

    /// Why `individual` is an instance of `class`.
    pub fn instance(&self, individual: &str, class: &str) -> Result<Graph, PelletError> {
        self.query(&select_query(individual, RDF_TYPE, class))
    }

    pub fn instance_async(
        &self,
        individual: &str,
        class: &str,
        callback: impl Callback<Graph>,
    ) -> TaskHandle {
        self.query_async(&select_query(individual, RDF_TYPE, class), callback)
    }
}
