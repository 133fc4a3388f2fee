// HTTP endpoints advertised in discovery documents

use crate::error::PelletError;
use http::Method;
use std::fmt;
use url::Url;

/// Parse an advertised verb. Only the standard HTTP methods are accepted.
pub fn parse_method(raw: &str) -> Result<Method, PelletError> {
    let method = match raw.trim().to_ascii_uppercase().as_str() {
        "GET" => Method::GET,
        "POST" => Method::POST,
        "PUT" => Method::PUT,
        "DELETE" => Method::DELETE,
        "HEAD" => Method::HEAD,
        "OPTIONS" => Method::OPTIONS,
        "PATCH" => Method::PATCH,
        "TRACE" => Method::TRACE,
        "CONNECT" => Method::CONNECT,
        other => {
            return Err(PelletError::configuration(format!(
                "Unknown HTTP method: {:?}",
                other
            )))
        }
    };
    Ok(method)
}

/// A URL together with the HTTP methods usable against it.
///
/// Methods keep the order the server advertised them in; the first one is the
/// fallback when the connection's preferred method is not offered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: Url,
    methods: Vec<Method>,
}

impl Endpoint {
    pub fn new(url: Url, methods: impl IntoIterator<Item = Method>) -> Self {
        let mut deduped: Vec<Method> = Vec::new();
        for method in methods {
            if !deduped.contains(&method) {
                deduped.push(method);
            }
        }
        Endpoint {
            url,
            methods: deduped,
        }
    }

    /// Parse an endpoint from its URL string and advertised method names.
    pub fn parse<I, S>(url: &str, methods: I) -> Result<Self, PelletError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let url = Url::parse(url)?;
        let methods = methods
            .into_iter()
            .map(|m| parse_method(m.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Endpoint::new(url, methods))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn supports(&self, method: &Method) -> bool {
        self.methods.contains(method)
    }

    /// Pick `preferred` if this endpoint offers it, otherwise the first advertised method.
    pub fn select_method(&self, preferred: Option<&Method>) -> Result<&Method, PelletError> {
        if let Some(preferred) = preferred {
            if let Some(found) = self.methods.iter().find(|m| *m == preferred) {
                return Ok(found);
            }
        }
        self.methods
            .first()
            .ok_or_else(|| PelletError::transport(format!("No HTTP methods in {}", self.url)))
    }

    /// Same methods with `params` appended to the URL as form-encoded query pairs.
    ///
    /// Parameters with no value are omitted.
    pub fn with_query(&self, params: &[(&str, Option<&str>)]) -> Self {
        let mut url = self.url.clone();
        append_query(&mut url, params);
        self.with_url(url)
    }

    /// Same methods against a different URL, e.g. after template expansion.
    pub fn with_url(&self, url: Url) -> Self {
        Endpoint {
            url,
            methods: self.methods.clone(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let methods: Vec<&str> = self.methods.iter().map(|m| m.as_str()).collect();
        write!(f, "{} [{}]", self.url, methods.join(", "))
    }
}

/// Remove a trailing form-style template expression (`{?query}`) from a raw URL.
///
/// Discovery documents advertise templated URLs; the expression is dropped
/// before the URL is parsed since `{` and `?` would otherwise be read as path
/// and query characters.
pub fn strip_query_template(template: &str) -> Result<String, PelletError> {
    match template.find("{?") {
        Some(start) => {
            let end = template[start..]
                .find('}')
                .map(|offset| start + offset)
                .ok_or_else(|| {
                    PelletError::configuration(format!("Unterminated URI template: {}", template))
                })?;
            Ok(format!("{}{}", &template[..start], &template[end + 1..]))
        }
        None => Ok(template.to_string()),
    }
}

/// Expand a form-style query template (`{?query}`, `{?query,named-graph-uri}`).
///
/// The template expression is removed from the URL and each present parameter is
/// appended as a form-encoded query pair. Parameters with no value are omitted.
/// A URL without a template expression still receives the parameters.
pub fn expand_query_template(
    template: &str,
    params: &[(&str, Option<&str>)],
) -> Result<Url, PelletError> {
    let base = strip_query_template(template)?;

    let mut url = Url::parse(&base)?;
    append_query(&mut url, params);
    Ok(url)
}

fn append_query(url: &mut Url, params: &[(&str, Option<&str>)]) {
    {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in params {
            if let Some(value) = value {
                pairs.append_pair(name, value);
            }
        }
    }
    // An empty `?` is left behind when nothing was appended
    if url.query() == Some("") {
        url.set_query(None);
    }
}
