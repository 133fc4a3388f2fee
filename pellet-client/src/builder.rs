// Proxy Builder: turns a discovery document into knowledge bases and services
//
// `knowledge-bases` and `server-information` are structural: any error inside
// them aborts discovery. A single bad service entry is logged and skipped, as
// is a capability name the registry does not know.

use crate::knowledge_base::KnowledgeBase;
use crate::registry::Scope;
use crate::server::ServerInner;
use crate::services::{Service, ServiceContext};
use crate::session::Session;
use indexmap::IndexMap;
use pellet_core::{mime, strip_query_template, Endpoint, MimeType, PelletError, Url};
use serde_json::{Map, Value};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

pub const KNOWLEDGE_BASES: &str = "knowledge-bases";
pub const SERVER_INFORMATION: &str = "server-information";
pub const KB_SERVICES: &str = "kb-services";
pub const NAME: &str = "name";
pub const LOCATION: &str = "location";
pub const ENDPOINT: &str = "endpoint";
pub const URL: &str = "url";
pub const HTTP_METHODS: &str = "http-methods";
pub const RESPONSE_MIMETYPE: &str = "response-mimetype";

/// Parse a discovery response body, keeping key order.
pub fn parse_document(body: &str) -> Result<Value, PelletError> {
    serde_json::from_str(body).map_err(|e| {
        PelletError::discovery_with_payload(format!("Malformed discovery document: {}", e), body)
    })
}

fn malformed(message: impl Into<String>, raw: &Value) -> PelletError {
    PelletError::discovery_with_payload(message, raw.to_string())
}

fn as_object<'v>(raw: &'v Value, what: &str) -> Result<&'v Map<String, Value>, PelletError> {
    raw.as_object()
        .ok_or_else(|| malformed(format!("{} is not a JSON object", what), raw))
}

/// Endpoint and advertised content types of one service descriptor.
///
/// A URI template expression on the URL (`{?query}`) is dropped; services
/// append their parameters to the bare URL.
pub fn parse_descriptor(raw: &Value) -> Result<(Endpoint, Vec<MimeType>), PelletError> {
    let descriptor = as_object(raw, "Service descriptor")?;
    let endpoint = descriptor
        .get(ENDPOINT)
        .ok_or_else(|| malformed("Service descriptor has no endpoint", raw))?;
    let url = endpoint
        .get(URL)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("Endpoint has no url", raw))?;
    let methods = string_array(endpoint.get(HTTP_METHODS), HTTP_METHODS, raw)?;
    let types = string_array(descriptor.get(RESPONSE_MIMETYPE), RESPONSE_MIMETYPE, raw)?;

    let url = strip_query_template(url).map_err(|e| malformed(e.to_string(), raw))?;
    let endpoint = Endpoint::parse(&url, methods).map_err(|e| malformed(e.to_string(), raw))?;
    let types = mime::parse_all(types).map_err(|e| malformed(e.to_string(), raw))?;
    Ok((endpoint, types))
}

fn string_array<'v>(
    value: Option<&'v Value>,
    key: &str,
    raw: &Value,
) -> Result<Vec<&'v str>, PelletError> {
    let items = value
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(format!("Missing {} array", key), raw))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .ok_or_else(|| malformed(format!("Non-string entry in {}", key), raw))
        })
        .collect()
}

fn parse_info(raw: Option<&Value>) -> Result<IndexMap<String, String>, PelletError> {
    let Some(raw) = raw else {
        return Ok(IndexMap::new());
    };
    as_object(raw, SERVER_INFORMATION)?
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Number(_) | Value::Bool(_) => value.to_string(),
                _ => {
                    return Err(malformed(
                        format!("{} value for {} is not a scalar", SERVER_INFORMATION, key),
                        raw,
                    ))
                }
            };
            Ok((key.clone(), value))
        })
        .collect()
}

/// Everything one discovery call produces.
#[derive(Debug, Default)]
pub struct Discovered {
    pub knowledge_bases: IndexMap<String, Arc<KnowledgeBase>>,
    pub services: IndexMap<String, Arc<dyn Service>>,
    pub info: IndexMap<String, String>,
}

pub struct ProxyBuilder<'a> {
    session: &'a Arc<Session>,
    server: Weak<ServerInner>,
}

impl<'a> ProxyBuilder<'a> {
    pub(crate) fn new(session: &'a Arc<Session>, server: Weak<ServerInner>) -> Self {
        Self { session, server }
    }

    /// Build knowledge bases, root services and server information from the root document.
    pub fn build_server(&self, root: &Value) -> Result<Discovered, PelletError> {
        let object = as_object(root, "Discovery document")?;

        let raw_kbs = object
            .get(KNOWLEDGE_BASES)
            .ok_or_else(|| malformed(format!("Discovery document has no {}", KNOWLEDGE_BASES), root))?;
        let knowledge_bases = self.build_knowledge_bases(raw_kbs)?;
        let info = parse_info(object.get(SERVER_INFORMATION))?;

        let mut services: IndexMap<String, Arc<dyn Service>> = IndexMap::new();
        for (name, raw) in object {
            if name == KNOWLEDGE_BASES || name == SERVER_INFORMATION {
                continue;
            }
            match self.build_service(None, raw, name, Scope::Server) {
                Ok(Some(service)) => {
                    services.insert(name.clone(), service);
                }
                Ok(None) => {}
                Err(e) => warn!(service = %name, error = %e, "Skipping malformed server service"),
            }
        }

        let mut by_name = IndexMap::new();
        for kb in knowledge_bases {
            let name = kb.name().to_string();
            if by_name.insert(name.clone(), Arc::new(kb)).is_some() {
                warn!(knowledge_base = %name, "Duplicate knowledge base name, keeping the last one");
            }
        }

        Ok(Discovered {
            knowledge_bases: by_name,
            services,
            info,
        })
    }

    /// Build every entry of a `knowledge-bases` array, failing on the first bad one.
    pub fn build_knowledge_bases(&self, raw: &Value) -> Result<Vec<KnowledgeBase>, PelletError> {
        let items = raw
            .as_array()
            .ok_or_else(|| malformed(format!("{} is not an array", KNOWLEDGE_BASES), raw))?;
        debug!(count = items.len(), "Parsing knowledge bases");
        items.iter().map(|kb| self.build_knowledge_base(kb)).collect()
    }

    /// Build one knowledge base from `{name, location?, kb-services}`.
    pub fn build_knowledge_base(&self, raw: &Value) -> Result<KnowledgeBase, PelletError> {
        let object = as_object(raw, "Knowledge base")?;
        let name = object
            .get(NAME)
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("Knowledge base has no name", raw))?;
        let location = match object.get(LOCATION).and_then(Value::as_str) {
            Some(location) => Some(Url::parse(location).map_err(|e| malformed(e.to_string(), raw))?),
            None => None,
        };
        let raw_services = object
            .get(KB_SERVICES)
            .ok_or_else(|| malformed(format!("Knowledge base {} has no {}", name, KB_SERVICES), raw))?;
        let raw_services = as_object(raw_services, KB_SERVICES)?;

        debug!(knowledge_base = %name, "Parsing knowledge base");
        let kb = KnowledgeBase::new(name.to_string(), location, self.server.clone());
        for (service_name, raw_service) in raw_services {
            match self.build_service(Some(name), raw_service, service_name, Scope::KnowledgeBase) {
                Ok(Some(service)) => {
                    kb.add_service(service);
                }
                Ok(None) => {}
                Err(e) => warn!(
                    knowledge_base = %name,
                    service = %service_name,
                    error = %e,
                    "Skipping malformed knowledge base service"
                ),
            }
        }
        Ok(kb)
    }

    /// Build one service, or `None` when the registry has no factory for `name`.
    pub fn build_service(
        &self,
        knowledge_base: Option<&str>,
        raw: &Value,
        name: &str,
        scope: Scope,
    ) -> Result<Option<Arc<dyn Service>>, PelletError> {
        let Some(factory) = self.session.registry().resolve(name, scope) else {
            info!(error = %PelletError::unresolved(name), %scope, "Unable to create service");
            return Ok(None);
        };
        let (endpoint, types) = parse_descriptor(raw)?;
        let context = ServiceContext::new(
            Arc::clone(self.session),
            self.server.clone(),
            knowledge_base.map(str::to_string),
        );
        factory(context, endpoint, types).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support;
    use pellet_transport::MockTransport;
    use serde_json::json;

    fn descriptor(url: &str, types: &[&str]) -> Value {
        json!({
            "endpoint": { "url": url, "http-methods": ["GET", "POST"] },
            "response-mimetype": types,
        })
    }

    fn with_builder<R>(f: impl FnOnce(&ProxyBuilder<'_>) -> R) -> R {
        let session = test_support::session(Arc::new(MockTransport::new()));
        let builder = ProxyBuilder::new(&session, Weak::new());
        f(&builder)
    }

    #[test]
    fn test_descriptor_strips_template() {
        let (endpoint, types) = parse_descriptor(&descriptor(
            "http://localhost:8080/wine/explain{?query}",
            &["application/rdf+xml"],
        ))
        .unwrap();
        assert_eq!(endpoint.url().as_str(), "http://localhost:8080/wine/explain");
        assert_eq!(types, vec![mime::rdf_xml()]);
    }

    #[test]
    fn test_descriptor_errors_carry_payload() {
        let raw = json!({ "endpoint": { "url": "http://localhost/" } });
        let err = parse_descriptor(&raw).unwrap_err();
        assert!(matches!(err, PelletError::Discovery { .. }));
        assert!(err.payload().unwrap().contains("http://localhost/"));

        let raw = json!({ "endpoint": { "url": "http://localhost/", "http-methods": ["BREW"] },
                          "response-mimetype": [] });
        assert!(parse_descriptor(&raw).is_err());
    }

    #[test]
    fn test_unknown_capability_is_skipped() {
        with_builder(|builder| {
            let raw = descriptor("http://localhost/x", &["text/json"]);
            let service = builder
                .build_service(Some("wine"), &raw, "teleport", Scope::KnowledgeBase)
                .unwrap();
            assert!(service.is_none());
        });
    }

    #[test]
    fn test_scope_is_respected() {
        with_builder(|builder| {
            // consistency is knowledge-base scoped; at the root it is unknown
            let raw = descriptor("http://localhost/consistency", &["application/sparql-results+xml"]);
            assert!(builder
                .build_service(None, &raw, "consistency", Scope::Server)
                .unwrap()
                .is_none());
            assert!(builder
                .build_service(Some("wine"), &raw, "consistency", Scope::KnowledgeBase)
                .unwrap()
                .is_some());
        });
    }

    #[test]
    fn test_bad_service_entry_does_not_abort_knowledge_base() {
        let raw = json!({
            "name": "wine",
            "kb-services": {
                "classify": { "endpoint": "nowhere" },
                "consistency": descriptor("http://localhost/wine/consistency", &["application/sparql-results+xml"]),
                "realize": descriptor("http://localhost/wine/realize", &["text/json"]),
            }
        });
        with_builder(|builder| {
            let kb = builder.build_knowledge_base(&raw).unwrap();
            assert_eq!(kb.name(), "wine");
            assert_eq!(kb.service_names(), vec!["consistency".to_string()]);
        });
    }

    #[test]
    fn test_structural_errors_abort() {
        with_builder(|builder| {
            assert!(builder.build_server(&json!({ "server-information": {} })).is_err());
            assert!(builder.build_server(&json!({ "knowledge-bases": {} })).is_err());
            assert!(builder
                .build_server(&json!({ "knowledge-bases": [ { "kb-services": {} } ] }))
                .is_err());
            assert!(builder
                .build_server(&json!({ "knowledge-bases": [], "server-information": [1, 2] }))
                .is_err());
        });
    }

    #[test]
    fn test_server_information_and_duplicates() {
        let root = json!({
            "knowledge-bases": [
                { "name": "wine", "kb-services": {} },
                { "name": "wine", "location": "http://localhost/wine.owl", "kb-services": {} }
            ],
            "server-information": { "version": "2.0", "build": 17 }
        });
        with_builder(|builder| {
            let discovered = builder.build_server(&root).unwrap();
            assert_eq!(discovered.knowledge_bases.len(), 1);
            let wine = &discovered.knowledge_bases["wine"];
            assert_eq!(wine.location().map(Url::as_str), Some("http://localhost/wine.owl"));
            assert_eq!(discovered.info["version"], "2.0");
            assert_eq!(discovered.info["build"], "17");
            assert!(discovered.services.is_empty());
        });
    }

    #[test]
    fn test_parse_document_keeps_payload() {
        let err = parse_document("{ not json").unwrap_err();
        assert!(matches!(err, PelletError::Discovery { .. }));
        assert_eq!(err.payload(), Some("{ not json"));
    }
}
