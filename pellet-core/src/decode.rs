// Response decoders: turn a response body into a domain value
//
// Services pick a decoder by the content type the server actually answered
// with, never by trying formats one after another.

use crate::error::PelletError;
use crate::mime::{self, MimeType};
use crate::model::{Graph, ResultSet, Solution, Term};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// Pluggable decoding of graph and result-set payloads.
pub trait ResponseDecoder: Send + Sync + fmt::Debug {
    fn decodes_graph(&self, media_type: &MimeType) -> bool;

    fn decodes_results(&self, media_type: &MimeType) -> bool;

    fn decode_graph(&self, body: &str, media_type: &MimeType) -> Result<Graph, PelletError>;

    fn decode_results(&self, body: &str, media_type: &MimeType) -> Result<ResultSet, PelletError>;
}

/// Decoder for RDF/XML and Turtle graphs, and SPARQL XML/JSON results.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardDecoder;

impl ResponseDecoder for StandardDecoder {
    fn decodes_graph(&self, media_type: &MimeType) -> bool {
        media_type.matches(&mime::rdf_xml()) || media_type.matches(&mime::turtle())
    }

    fn decodes_results(&self, media_type: &MimeType) -> bool {
        media_type.matches(&mime::sparql_xml()) || media_type.matches(&mime::sparql_json())
    }

    fn decode_graph(&self, body: &str, media_type: &MimeType) -> Result<Graph, PelletError> {
        if media_type.matches(&mime::rdf_xml()) {
            let node_count = count_rdf_nodes(body).map_err(|e| e.with_payload(body))?;
            Ok(Graph {
                media_type: mime::rdf_xml(),
                document: body.to_string(),
                node_count: Some(node_count),
            })
        } else if media_type.matches(&mime::turtle()) {
            Ok(Graph {
                media_type: mime::turtle(),
                document: body.to_string(),
                node_count: None,
            })
        } else {
            Err(PelletError::decode(format!("No graph decoder for {}", media_type)))
        }
    }

    fn decode_results(&self, body: &str, media_type: &MimeType) -> Result<ResultSet, PelletError> {
        let decoded = if media_type.matches(&mime::sparql_xml()) {
            parse_sparql_xml(body)
        } else if media_type.matches(&mime::sparql_json()) {
            parse_sparql_json(body)
        } else {
            return Err(PelletError::decode(format!(
                "No result set decoder for {}",
                media_type
            )));
        };
        decoded.map_err(|e| e.with_payload(body))
    }
}

fn xml_error(err: impl fmt::Display) -> PelletError {
    PelletError::decode(format!("Malformed XML: {}", err))
}

fn attribute(element: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, PelletError> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == name {
            let value = attr.unescape_value().map_err(xml_error)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Validate an RDF/XML document and count the node elements under `rdf:RDF`.
fn count_rdf_nodes(body: &str) -> Result<usize, PelletError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut nodes = 0usize;
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"RDF" {
                        return Err(PelletError::decode("Root element is not rdf:RDF"));
                    }
                    saw_root = true;
                } else if depth == 1 {
                    nodes += 1;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if e.local_name().as_ref() != b"RDF" {
                        return Err(PelletError::decode("Root element is not rdf:RDF"));
                    }
                    saw_root = true;
                } else if depth == 1 {
                    nodes += 1;
                }
            }
            Event::End(_) => depth = depth.saturating_sub(1),
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(PelletError::decode("Empty RDF/XML document"));
    }
    Ok(nodes)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TermKind {
    Uri,
    Bnode,
    Literal,
}

#[derive(Debug, Default)]
struct PendingTerm {
    kind: Option<TermKind>,
    datatype: Option<String>,
    lang: Option<String>,
    text: String,
}

impl PendingTerm {
    fn start(kind: TermKind, element: &BytesStart<'_>) -> Result<Self, PelletError> {
        let (datatype, lang) = if kind == TermKind::Literal {
            (attribute(element, b"datatype")?, attribute(element, b"xml:lang")?)
        } else {
            (None, None)
        };
        Ok(PendingTerm {
            kind: Some(kind),
            datatype,
            lang,
            text: String::new(),
        })
    }

    fn finish(self) -> Option<Term> {
        match self.kind? {
            TermKind::Uri => Some(Term::Iri(self.text)),
            TermKind::Bnode => Some(Term::BlankNode(self.text)),
            TermKind::Literal => Some(Term::Literal {
                value: self.text,
                datatype: self.datatype,
                lang: self.lang,
            }),
        }
    }
}

fn term_kind(local: &[u8]) -> Option<TermKind> {
    match local {
        b"uri" => Some(TermKind::Uri),
        b"bnode" => Some(TermKind::Bnode),
        b"literal" => Some(TermKind::Literal),
        _ => None,
    }
}

/// Parse the SPARQL Query Results XML Format.
fn parse_sparql_xml(body: &str) -> Result<ResultSet, PelletError> {
    let mut reader = Reader::from_str(body);
    reader.config_mut().trim_text(true);

    let mut result = ResultSet::default();
    let mut row: Option<Solution> = None;
    let mut binding: Option<String> = None;
    let mut term: Option<PendingTerm> = None;
    let mut in_boolean = false;
    let mut saw_root = false;

    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"sparql" => saw_root = true,
                    b"variable" => {
                        if let Some(name) = attribute(&e, b"name")? {
                            result.variables.push(name);
                        }
                    }
                    b"result" => row = Some(Solution::new()),
                    b"binding" => binding = attribute(&e, b"name")?,
                    b"boolean" => in_boolean = true,
                    other => {
                        if let Some(kind) = term_kind(other) {
                            term = Some(PendingTerm::start(kind, &e)?);
                        }
                    }
                }
            }
            Event::Empty(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"sparql" => saw_root = true,
                    b"variable" => {
                        if let Some(name) = attribute(&e, b"name")? {
                            result.variables.push(name);
                        }
                    }
                    b"result" => result.solutions.push(Solution::new()),
                    other => {
                        // <literal/> is an empty string literal
                        if let Some(kind) = term_kind(other) {
                            let pending = PendingTerm::start(kind, &e)?;
                            if let (Some(row), Some(name), Some(value)) =
                                (row.as_mut(), binding.as_ref(), pending.finish())
                            {
                                row.insert(name.clone(), value);
                            }
                        }
                    }
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(xml_error)?;
                if let Some(pending) = term.as_mut() {
                    pending.text.push_str(&text);
                } else if in_boolean {
                    result.boolean = match text.trim() {
                        "true" => Some(true),
                        "false" => Some(false),
                        other => {
                            return Err(PelletError::decode(format!(
                                "Invalid boolean result: {:?}",
                                other
                            )))
                        }
                    };
                }
            }
            Event::CData(c) => {
                if let Some(pending) = term.as_mut() {
                    pending.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                match local.as_ref() {
                    b"result" => {
                        if let Some(done) = row.take() {
                            result.solutions.push(done);
                        }
                    }
                    b"binding" => binding = None,
                    b"boolean" => in_boolean = false,
                    other if term_kind(other).is_some() => {
                        let finished = term.take().and_then(PendingTerm::finish);
                        if let (Some(row), Some(name), Some(value)) =
                            (row.as_mut(), binding.as_ref(), finished)
                        {
                            row.insert(name.clone(), value);
                        }
                    }
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(PelletError::decode("Missing <sparql> root element"));
    }
    Ok(result)
}

#[derive(Debug, Deserialize)]
struct SparqlJson {
    #[serde(default)]
    head: SparqlJsonHead,
    #[serde(default)]
    results: Option<SparqlJsonResults>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct SparqlJsonHead {
    #[serde(default)]
    vars: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct SparqlJsonResults {
    bindings: Vec<BTreeMap<String, SparqlJsonTerm>>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum SparqlJsonTerm {
    Uri {
        value: String,
    },
    Bnode {
        value: String,
    },
    #[serde(alias = "typed-literal")]
    Literal {
        value: String,
        #[serde(default)]
        datatype: Option<String>,
        #[serde(default, rename = "xml:lang")]
        lang: Option<String>,
    },
}

impl From<SparqlJsonTerm> for Term {
    fn from(term: SparqlJsonTerm) -> Self {
        match term {
            SparqlJsonTerm::Uri { value } => Term::Iri(value),
            SparqlJsonTerm::Bnode { value } => Term::BlankNode(value),
            SparqlJsonTerm::Literal {
                value,
                datatype,
                lang,
            } => Term::Literal {
                value,
                datatype,
                lang,
            },
        }
    }
}

/// Parse the SPARQL 1.1 Query Results JSON Format.
fn parse_sparql_json(body: &str) -> Result<ResultSet, PelletError> {
    let doc: SparqlJson = serde_json::from_str(body)?;
    let solutions: Vec<Solution> = doc
        .results
        .map(|r| {
            r.bindings
                .into_iter()
                .map(|row| row.into_iter().map(|(k, v)| (k, Term::from(v))).collect())
                .collect()
        })
        .unwrap_or_default();
    Ok(ResultSet {
        variables: doc.head.vars,
        solutions,
        boolean: doc.boolean,
    })
}
