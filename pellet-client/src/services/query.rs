use super::{impl_service, negotiated_type, Capability, ServiceContext, ServiceCore};
use crate::registry::Scope;
use crate::session::Session;
use pellet_core::{
    mime, Callback, Endpoint, MimeType, PelletError, QueryResult, Task, TaskHandle,
};
use pellet_transport::HttpResponse;

/// SPARQL query endpoint of a knowledge base.
///
/// `SELECT`/`ASK` answers come back as SPARQL results and `CONSTRUCT`/`DESCRIBE`
/// answers as RDF; the response's content type decides which.
#[derive(Debug)]
pub struct Query {
    core: ServiceCore,
}

impl Capability for Query {
    const NAME: &'static str = "query";
    const SCOPE: Scope = Scope::KnowledgeBase;

    fn required_types() -> Vec<MimeType> {
        vec![mime::sparql_xml(), mime::rdf_xml()]
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

impl_service!(Query);

fn decode_query(
    session: &Session,
    response: &HttpResponse,
    accepted: &[MimeType],
) -> Result<QueryResult, PelletError> {
    let decoder = session.decoder();
    let media_type = negotiated_type(response, accepted, |t| {
        decoder.decodes_graph(t) || decoder.decodes_results(t)
    })?;
    if decoder.decodes_graph(&media_type) {
        decoder
            .decode_graph(&response.body, &media_type)
            .map(QueryResult::Graph)
    } else if decoder.decodes_results(&media_type) {
        decoder
            .decode_results(&response.body, &media_type)
            .map(QueryResult::Bindings)
    } else {
        Err(PelletError::decode_with_payload(
            format!("Query answered with undecodable type {}", media_type),
            response.body.clone(),
        ))
    }
}

impl Query {
    fn task(
        &self,
        query: &str,
        named_graph: Option<&str>,
        default_graph: Option<&str>,
    ) -> impl Task<Output = QueryResult> {
        let endpoint = self.core.endpoint().with_query(&[
            ("query", Some(query)),
            ("named-graph-uri", named_graph),
            ("default-graph-uri", default_graph),
        ]);
        let accepted = self.core.accepted().to_vec();
        self.core
            .session()
            .request(endpoint, accepted.clone(), move |session, response| {
                decode_query(session, &response, &accepted)
            })
    }

    pub fn query(&self, query: &str) -> Result<QueryResult, PelletError> {
        self.core.run_sync(self.task(query, None, None))
    }

    pub fn query_async(&self, query: &str, callback: impl Callback<QueryResult>) -> TaskHandle {
        self.core.run_async(self.task(query, None, None), callback)
    }

    /// Query against an explicit named graph and/or default graph.
    pub fn query_with_graphs(
        &self,
        query: &str,
        named_graph: Option<&str>,
        default_graph: Option<&str>,
    ) -> Result<QueryResult, PelletError> {
        self.core
            .run_sync(self.task(query, named_graph, default_graph))
    }

    pub fn query_with_graphs_async(
        &self,
        query: &str,
        named_graph: Option<&str>,
        default_graph: Option<&str>,
        callback: impl Callback<QueryResult>,
    ) -> TaskHandle {
        self.core
            .run_async(self.task(query, named_graph, default_graph), callback)
    }
}
