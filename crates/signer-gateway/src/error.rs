//! Error taxonomy for the signing gateway.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Crate-wide result alias.
pub type Result<T, E = SignerError> = std::result::Result<T, E>;

/// What went wrong on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// The request or connection exceeded its deadline.
    Timeout,
    /// The backend could not be reached.
    Connect,
    /// Any other failure while sending or receiving.
    Request,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Timeout => f.write_str("timed out"),
            TransportKind::Connect => f.write_str("connection failed"),
            TransportKind::Request => f.write_str("request failed"),
        }
    }
}

/// Errors surfaced by credential resolution, the backend client, the token
/// manager and the signing gateway.
///
/// The error is `Clone` so a single login outcome can be handed to every
/// caller waiting on it. No variant ever carries a token value.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignerError {
    /// Missing or contradictory configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A local file (credential, CA bundle, config) could not be read.
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<std::io::Error>,
    },

    /// Network failure talking to the backend.
    #[error("{kind} calling {endpoint}: {reason}")]
    Transport {
        endpoint: String,
        kind: TransportKind,
        reason: String,
    },

    /// The backend rejected the credentials or the token, or returned no
    /// token material.
    #[error("authorization failed at {endpoint}: {reason}")]
    Auth { endpoint: String, reason: String },

    /// The backend answered with a non-success status.
    #[error("backend returned {status} for {endpoint}: {message}")]
    Backend {
        endpoint: String,
        status: u16,
        message: String,
    },

    /// The signing request is malformed.
    #[error("invalid signing request: {0}")]
    Validation(String),

    /// The backend answered successfully but with an unexpected body.
    #[error("unexpected response from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },
}

impl SignerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SignerError::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub(crate) fn transport(endpoint: &str, err: &reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportKind::Timeout
        } else if err.is_connect() {
            TransportKind::Connect
        } else {
            TransportKind::Request
        };
        SignerError::Transport {
            endpoint: endpoint.to_string(),
            kind,
            reason: err.to_string(),
        }
    }

    pub(crate) fn protocol(endpoint: &str, reason: impl fmt::Display) -> Self {
        SignerError::Protocol {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that a fresh login may cure.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, SignerError::Auth { .. })
    }

    /// True when the failure was a deadline expiring.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SignerError::Transport {
                kind: TransportKind::Timeout,
                ..
            }
        )
    }
}
