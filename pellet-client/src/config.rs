use pellet_core::{parse_method, Method, PelletError, Url};

pub const ENV_URL: &str = "PELLET_SERVER_URL";
pub const ENV_METHOD: &str = "PELLET_METHOD";
pub const ENV_TIMEOUT_MS: &str = "PELLET_TIMEOUT_MS";
pub const ENV_WORKERS: &str = "PELLET_WORKERS";
pub const ENV_MAX_IN_FLIGHT: &str = "PELLET_MAX_IN_FLIGHT";

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Root URL of the server; discovery is requested here
    pub url: String,
    /// Method used whenever an endpoint offers it
    pub preferred_method: Method,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
    /// Worker threads running asynchronous calls
    pub worker_threads: usize,
    /// Asynchronous calls allowed to run at once; the rest queue
    pub max_in_flight: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/".to_string(),
            preferred_method: Method::GET,
            timeout_ms: 30000,
            worker_threads: 4,
            max_in_flight: 256,
        }
    }
}

impl ClientConfig {
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.preferred_method = method;
        self
    }

    /// Defaults overlaid with the `PELLET_*` environment variables.
    pub fn from_env() -> Result<Self, PelletError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PelletError> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_URL) {
            config.url = url;
        }
        if let Some(method) = lookup(ENV_METHOD) {
            config.preferred_method = parse_method(&method)?;
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_MS) {
            config.timeout_ms = parse_number(ENV_TIMEOUT_MS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_WORKERS) {
            config.worker_threads = parse_number(ENV_WORKERS, &raw)?;
        }
        if let Some(raw) = lookup(ENV_MAX_IN_FLIGHT) {
            config.max_in_flight = parse_number(ENV_MAX_IN_FLIGHT, &raw)?;
        }
        Ok(config)
    }

    pub fn parsed_url(&self) -> Result<Url, PelletError> {
        Ok(Url::parse(&self.url)?)
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, raw: &str) -> Result<N, PelletError> {
    raw.trim()
        .parse()
        .map_err(|_| PelletError::configuration(format!("{} must be a number, got {:?}", key, raw)))
}
