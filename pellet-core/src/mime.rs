// Content types advertised by services and negotiated over HTTP

use crate::error::PelletError;
use std::fmt;
use std::str::FromStr;

/// A parsed media type such as `application/rdf+xml; charset=utf-8`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MimeType {
    primary: String,
    sub: String,
    params: Vec<(String, String)>,
}

impl MimeType {
    /// Build a media type from its two halves without parameters.
    pub fn new(primary: impl Into<String>, sub: impl Into<String>) -> Self {
        MimeType {
            primary: primary.into().to_ascii_lowercase(),
            sub: sub.into().to_ascii_lowercase(),
            params: Vec::new(),
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn sub(&self) -> &str {
        &self.sub
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// `type/subtype` without parameters.
    pub fn essence(&self) -> String {
        format!("{}/{}", self.primary, self.sub)
    }

    /// Parameter-insensitive match, with `*` as a wildcard on either side.
    ///
    /// `application/json` and `text/json` are treated as the same type since
    /// servers advertise either for their JSON documents.
    pub fn matches(&self, other: &MimeType) -> bool {
        if self.is_json() && other.is_json() {
            return true;
        }
        let primary = self.primary == "*" || other.primary == "*" || self.primary == other.primary;
        let sub = self.sub == "*" || other.sub == "*" || self.sub == other.sub;
        primary && sub
    }

    fn is_json(&self) -> bool {
        self.sub == "json" && (self.primary == "text" || self.primary == "application")
    }
}

impl FromStr for MimeType {
    type Err = PelletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(';');
        let essence = parts.next().unwrap_or_default().trim();
        let (primary, sub) = essence
            .split_once('/')
            .ok_or_else(|| PelletError::configuration(format!("Invalid media type: {:?}", s)))?;
        let (primary, sub) = (primary.trim(), sub.trim());
        if primary.is_empty() || sub.is_empty() || sub.contains('/') {
            return Err(PelletError::configuration(format!("Invalid media type: {:?}", s)));
        }

        let mut params = Vec::new();
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (key, value) = param.split_once('=').ok_or_else(|| {
                PelletError::configuration(format!("Invalid media type parameter in {:?}", s))
            })?;
            params.push((
                key.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ));
        }

        Ok(MimeType {
            primary: primary.to_ascii_lowercase(),
            sub: sub.to_ascii_lowercase(),
            params,
        })
    }
}

impl fmt::Display for MimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.primary, self.sub)?;
        for (k, v) in &self.params {
            write!(f, ";{}={}", k, v)?;
        }
        Ok(())
    }
}

pub fn json() -> MimeType {
    MimeType::new("text", "json")
}

pub fn rdf_xml() -> MimeType {
    MimeType::new("application", "rdf+xml")
}

pub fn turtle() -> MimeType {
    MimeType::new("text", "turtle")
}

pub fn html() -> MimeType {
    MimeType::new("text", "html")
}

pub fn sparql_xml() -> MimeType {
    MimeType::new("application", "sparql-results+xml")
}

pub fn sparql_json() -> MimeType {
    MimeType::new("application", "sparql-results+json")
}

/// Join media types into an `Accept` header value.
pub fn accept_header(types: &[MimeType]) -> String {
    types
        .iter()
        .map(|t| t.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// True when any of `offered` is compatible with `required`.
pub fn supports(offered: &[MimeType], required: &MimeType) -> bool {
    offered.iter().any(|t| t.matches(required))
}

/// Parse a list of media type strings, failing on the first malformed one.
pub fn parse_all<I, S>(raw: I) -> Result<Vec<MimeType>, PelletError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    raw.into_iter().map(|s| s.as_ref().parse()).collect()
}
