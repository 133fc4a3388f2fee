use super::{decode_results, impl_service, Capability, ServiceContext, ServiceCore};
use crate::registry::Scope;
use pellet_core::{mime, Callback, Endpoint, MimeType, PelletError, ResultSet, Task, TaskHandle};

const CONSISTENT: &str = "Consistent";

/// Whether a knowledge base is logically consistent.
#[derive(Debug)]
pub struct Consistency {
    core: ServiceCore,
}

impl Capability for Consistency {
    const NAME: &'static str = "consistency";
    const SCOPE: Scope = Scope::KnowledgeBase;

    fn required_types() -> Vec<MimeType> {
        vec![mime::sparql_xml()]
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

impl_service!(Consistency);

/// Read the `Consistent` binding of the first solution.
///
/// A bound value that is not a boolean literal reads as `false`; a document
/// with no solutions falls back to an ASK boolean and is otherwise an error.
fn read_consistent(results: &ResultSet) -> Result<bool, PelletError> {
    match results.first() {
        Some(solution) => Ok(solution
            .get(CONSISTENT)
            .and_then(|term| term.as_bool())
            .unwrap_or(false)),
        None => results.boolean.ok_or_else(|| {
            PelletError::decode(format!("Result set has no {} solution", CONSISTENT))
        }),
    }
}

impl Consistency {
    fn task(&self) -> impl Task<Output = bool> {
        let accepted = self.core.accepted().to_vec();
        self.core.session().request(
            self.core.endpoint().clone(),
            accepted.clone(),
            move |session, response| {
                let results = decode_results(session.decoder(), &response, &accepted)?;
                read_consistent(&results)
            },
        )
    }

    pub fn consistency(&self) -> Result<bool, PelletError> {
        self.core.run_sync(self.task())
    }

    pub fn consistency_async(&self, callback: impl Callback<bool>) -> TaskHandle {
        self.core.run_async(self.task(), callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use pellet_core::{FnCallback, Solution, Term};
    use pellet_transport::MockTransport;
    use std::sync::{mpsc, Arc};

    fn sparql(value: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<sparql xmlns="http://www.w3.org/2005/sparql-results#">
  <head><variable name="Consistent"/></head>
  <results>
    <result><binding name="Consistent"><literal datatype="http://www.w3.org/2001/XMLSchema#boolean">{}</literal></binding></result>
  </results>
</sparql>"#,
            value
        )
    }

    fn service(transport: &Arc<MockTransport>) -> Consistency {
        test_support::build::<Consistency>(
            Arc::clone(transport),
            "http://localhost/wine/consistency",
            &["application/sparql-results+xml"],
        )
        .unwrap()
    }

    #[test]
    fn test_consistent_and_inconsistent() {
        let transport = Arc::new(MockTransport::new());
        transport.respond_ok("http://localhost/wine/consistency", mime::sparql_xml(), sparql("true"));
        assert!(service(&transport).consistency().unwrap());

        transport.respond_ok("http://localhost/wine/consistency", mime::sparql_xml(), sparql("false"));
        assert!(!service(&transport).consistency().unwrap());
    }

    #[test]
    fn test_non_boolean_binding_reads_false() {
        let mut row = Solution::new();
        row.insert(CONSISTENT.to_string(), Term::iri("http://example.org/yes"));
        let results = ResultSet {
            variables: vec![CONSISTENT.to_string()],
            solutions: vec![row],
            boolean: None,
        };
        assert!(!read_consistent(&results).unwrap());
    }

    #[test]
    fn test_empty_results_is_decode_error() {
        let err = read_consistent(&ResultSet::default()).unwrap_err();
        assert!(matches!(err, PelletError::Decode { .. }));

        let ask = ResultSet {
            boolean: Some(true),
            ..ResultSet::default()
        };
        assert!(read_consistent(&ask).unwrap());
    }

    #[test]
    fn test_requires_sparql_xml() {
        let transport = Arc::new(MockTransport::new());
        let err = test_support::build::<Consistency>(
            transport,
            "http://localhost/wine/consistency",
            &["application/rdf+xml", "text/json"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("consistency service must support"));
    }

    #[test]
    fn test_async_failure_goes_to_callback_only() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(
            "http://localhost/wine/consistency",
            pellet_transport::HttpResponse::new(503, None, "busy"),
        );
        let (tx, rx) = mpsc::channel::<&'static str>();
        let failure_tx = tx.clone();
        let callback = FnCallback::new(
            move |_: bool| {
                let _ = tx.send("success");
            },
            move |e: PelletError| {
                assert!(matches!(e, PelletError::Transport { status: Some(503), .. }));
                let _ = failure_tx.send("failure");
            },
        );

        service(&transport).consistency_async(callback).wait().unwrap();
        assert_eq!(rx.recv().unwrap(), "failure");
        assert!(rx.try_recv().is_err());
    }
}
