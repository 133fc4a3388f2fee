use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`PelletError`], stable across variants' payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Discovery,
    UnresolvedCapability,
    Transport,
    Decode,
    Configuration,
    Executor,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Discovery => "discovery",
            ErrorKind::UnresolvedCapability => "unresolved_capability",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Executor => "executor",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PelletError {
    /// The discovery document is missing required structure.
    #[error("Discovery error: {message}")]
    Discovery {
        message: String,
        payload: Option<String>,
    },

    /// An advertised capability has no registered implementation.
    #[error("Unresolved capability: {name}")]
    UnresolvedCapability { name: String },

    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    #[error("Decode error: {message}")]
    Decode {
        message: String,
        payload: Option<String>,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Executor error: {message}")]
    Executor { message: String },
}

impl PelletError {
    pub fn discovery(message: impl Into<String>) -> Self {
        PelletError::Discovery {
            message: message.into(),
            payload: None,
        }
    }

    pub fn discovery_with_payload(message: impl Into<String>, payload: impl Into<String>) -> Self {
        PelletError::Discovery {
            message: message.into(),
            payload: Some(payload.into()),
        }
    }

    pub fn unresolved(name: impl Into<String>) -> Self {
        PelletError::UnresolvedCapability { name: name.into() }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        PelletError::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        PelletError::Transport {
            status: Some(status),
            message: format!("Wrong response code ({}): {}", status, body.into()),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        PelletError::Decode {
            message: message.into(),
            payload: None,
        }
    }

    pub fn decode_with_payload(message: impl Into<String>, payload: impl Into<String>) -> Self {
        PelletError::Decode {
            message: message.into(),
            payload: Some(payload.into()),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        PelletError::Configuration {
            message: message.into(),
        }
    }

    pub fn executor(message: impl Into<String>) -> Self {
        PelletError::Executor {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PelletError::Discovery { .. } => ErrorKind::Discovery,
            PelletError::UnresolvedCapability { .. } => ErrorKind::UnresolvedCapability,
            PelletError::Transport { .. } => ErrorKind::Transport,
            PelletError::Decode { .. } => ErrorKind::Decode,
            PelletError::Configuration { .. } => ErrorKind::Configuration,
            PelletError::Executor { .. } => ErrorKind::Executor,
        }
    }

    /// The raw document that failed to parse, when one was captured.
    pub fn payload(&self) -> Option<&str> {
        match self {
            PelletError::Discovery { payload, .. } | PelletError::Decode { payload, .. } => {
                payload.as_deref()
            }
            _ => None,
        }
    }

    /// Attach the offending payload to a discovery or decode error.
    pub fn with_payload(self, raw: impl Into<String>) -> Self {
        match self {
            PelletError::Discovery { message, .. } => PelletError::Discovery {
                message,
                payload: Some(raw.into()),
            },
            PelletError::Decode { message, .. } => PelletError::Decode {
                message,
                payload: Some(raw.into()),
            },
            other => other,
        }
    }
}

impl From<serde_json::Error> for PelletError {
    fn from(err: serde_json::Error) -> Self {
        PelletError::decode(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for PelletError {
    fn from(err: url::ParseError) -> Self {
        PelletError::configuration(format!("Invalid URL: {}", err))
    }
}

pub type Result<T, E = PelletError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convenience_constructors() {
        assert_eq!(PelletError::discovery("x").kind(), ErrorKind::Discovery);
        assert_eq!(PelletError::unresolved("classify").kind(), ErrorKind::UnresolvedCapability);
        assert_eq!(PelletError::transport("down").kind(), ErrorKind::Transport);
        assert_eq!(PelletError::decode("bad").kind(), ErrorKind::Decode);
        assert_eq!(PelletError::configuration("types").kind(), ErrorKind::Configuration);
        assert_eq!(PelletError::executor("full").kind(), ErrorKind::Executor);
    }

    #[test]
    fn test_status_error_keeps_code() {
        let err = PelletError::status(404, "no such kb");
        match &err {
            PelletError::Transport { status, message } => {
                assert_eq!(*status, Some(404));
                assert!(message.contains("404"));
                assert!(message.contains("no such kb"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_payload_attachment() {
        let err = PelletError::discovery("missing knowledge-bases").with_payload("{}");
        assert_eq!(err.payload(), Some("{}"));

        // Transport errors never carry a payload
        let err = PelletError::transport("refused").with_payload("{}");
        assert_eq!(err.payload(), None);
    }

    #[test]
    fn test_json_error_is_decode() {
        let err: PelletError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_error_display() {
        let err = PelletError::configuration("classify service must support application/rdf+xml");
        let display = format!("{}", err);
        assert!(display.contains("Configuration"));
        assert!(display.contains("application/rdf+xml"));
    }
}
