// Values returned by reasoning services

use crate::mime::MimeType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";

/// An RDF term as it appears in a result binding or a search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Term {
    Iri(String),
    BlankNode(String),
    Literal {
        value: String,
        datatype: Option<String>,
        lang: Option<String>,
    },
}

impl Term {
    pub fn iri(value: impl Into<String>) -> Self {
        Term::Iri(value.into())
    }

    pub fn blank(value: impl Into<String>) -> Self {
        Term::BlankNode(value.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: None,
            lang: None,
        }
    }

    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Term::Literal {
            value: value.into(),
            datatype: Some(datatype.into()),
            lang: None,
        }
    }

    /// Lexical value regardless of term kind.
    pub fn value(&self) -> &str {
        match self {
            Term::Iri(v) | Term::BlankNode(v) => v,
            Term::Literal { value, .. } => value,
        }
    }

    /// Boolean reading of a plain or `xsd:boolean` literal.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Term::Literal {
                value, datatype, ..
            } if datatype.as_deref().map_or(true, |d| d == XSD_BOOLEAN) => {
                match value.trim() {
                    "true" | "1" => Some(true),
                    "false" | "0" => Some(false),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Iri(v) => write!(f, "<{}>", v),
            Term::BlankNode(v) => write!(f, "_:{}", v),
            Term::Literal {
                value,
                datatype: Some(dt),
                ..
            } => write!(f, "\"{}\"^^<{}>", value, dt),
            Term::Literal {
                value,
                lang: Some(lang),
                ..
            } => write!(f, "\"{}\"@{}", value, lang),
            Term::Literal { value, .. } => write!(f, "\"{}\"", value),
        }
    }
}

/// One row of a SPARQL result set, keyed by variable name.
pub type Solution = BTreeMap<String, Term>;

/// A decoded SPARQL result document: either solutions or an ASK boolean.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    pub variables: Vec<String>,
    pub solutions: Vec<Solution>,
    pub boolean: Option<bool>,
}

impl ResultSet {
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn first(&self) -> Option<&Solution> {
        self.solutions.first()
    }

    /// Value of `variable` in the first solution.
    pub fn first_value(&self, variable: &str) -> Option<&Term> {
        self.first().and_then(|s| s.get(variable))
    }
}

/// An RDF document returned by a service, kept in its wire serialization.
#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    pub media_type: MimeType,
    pub document: String,
    /// Number of top-level node elements, when the serialization exposes it.
    pub node_count: Option<usize>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.node_count == Some(0) || self.document.trim().is_empty()
    }
}

/// A ranked hit from the full-text search service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub resource: Term,
    pub score: f64,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.score)
    }
}

/// Result of a SPARQL query: CONSTRUCT/DESCRIBE give a graph, SELECT/ASK give bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Graph(Graph),
    Bindings(ResultSet),
}

impl QueryResult {
    pub fn as_graph(&self) -> Option<&Graph> {
        match self {
            QueryResult::Graph(g) => Some(g),
            QueryResult::Bindings(_) => None,
        }
    }

    pub fn as_bindings(&self) -> Option<&ResultSet> {
        match self {
            QueryResult::Bindings(r) => Some(r),
            QueryResult::Graph(_) => None,
        }
    }
}
