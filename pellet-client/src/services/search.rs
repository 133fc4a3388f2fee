use super::{decode_json, impl_service, Capability, ServiceContext, ServiceCore};
use crate::registry::Scope;
use pellet_core::{
    mime, Callback, Endpoint, MimeType, PelletError, SearchResult, Task, TaskHandle, Term,
};
use serde::Deserialize;

/// Full-text search over the literals of a knowledge base.
#[derive(Debug)]
pub struct Search {
    core: ServiceCore,
}

impl Capability for Search {
    const NAME: &'static str = "search";
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

impl_service!(Search);

#[derive(Debug, Deserialize)]
struct RawHit {
    hit: RawResource,
    score: f64,
}

#[derive(Debug, Deserialize)]
struct RawResource {
    #[serde(rename = "type")]
    kind: String,
    value: String,
}

impl From<RawHit> for SearchResult {
    fn from(raw: RawHit) -> Self {
        let resource = if raw.hit.kind.eq_ignore_ascii_case("uri") {
            Term::Iri(raw.hit.value)
        } else {
            Term::BlankNode(raw.hit.value)
        };
        SearchResult {
            resource,
            score: raw.score,
        }
    }
}

impl Search {
    fn task(&self, text: &str) -> impl Task<Output = Vec<SearchResult>> {
        let endpoint = self.core.endpoint().with_query(&[("search", Some(text))]);
        self.core
            .session()
            .request(endpoint, self.core.accepted().to_vec(), |_, response| {
                let hits: Vec<RawHit> = decode_json(&response)?;
                let results: Vec<SearchResult> = hits.into_iter().map(SearchResult::from).collect();
                Ok(results)
            })
    }

    pub fn search(&self, text: &str) -> Result<Vec<SearchResult>, PelletError> {
        self.core.run_sync(self.task(text))
    }

    pub fn search_async(
        &self,
        text: &str,
        callback: impl Callback<Vec<SearchResult>>,
    ) -> TaskHandle {
        self.core.run_async(self.task(text), callback)
    }
}
