use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The external collaborator a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Service {
    Retrieval,
    Generation,
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Service::Retrieval => write!(f, "retrieval"),
            Service::Generation => write!(f, "generation"),
        }
    }
}

/// Category of an external failure. Only affects the surfaced message;
/// every kind is handled the same way by the breaker and fallback path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Unavailable,
    Auth,
    Quota,
    Malformed,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Timeout => "timed out",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Auth => "authentication failed",
            FailureKind::Quota => "quota exceeded",
            FailureKind::Malformed => "malformed response",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Retrieval {kind}: {message}")]
    Retrieval { kind: FailureKind, message: String },

    #[error("Generation {kind}: {message}")]
    Generation { kind: FailureKind, message: String },

    #[error("Rate limit exceeded for '{identity}' on tier '{tier}', retry after {retry_after:?}")]
    RateLimited {
        identity: String,
        tier: String,
        retry_after: Duration,
    },

    #[error("Circuit '{name}' is open")]
    CircuitOpen { name: String },

    #[error("Storage failed: {0}")]
    Storage(String),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    /// Build the error variant matching `service`.
    pub fn failure(service: Service, kind: FailureKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match service {
            Service::Retrieval => Error::Retrieval { kind, message },
            Service::Generation => Error::Generation { kind, message },
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Error::CircuitOpen { .. })
    }

    /// Failure category for retrieval/generation errors.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Error::Retrieval { kind, .. } | Error::Generation { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
