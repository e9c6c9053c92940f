//! Error types for the snapd client.
//!
//! # Design
//! Failures fall into three groups that callers handle differently: the
//! socket could not be used (`Transport`), the daemon answered with something
//! that is not JSON (`Decode`), or the daemon answered with an error envelope
//! (`Daemon`). The daemon's message is kept verbatim so it can be shown to an
//! end user as-is.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by `SnapdClient`.
#[derive(Debug, Error)]
pub enum SnapdError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body is not valid JSON.
    #[error("failed to decode snapd response: {0}")]
    Decode(#[source] serde_json::Error),

    /// snapd answered with `"type": "error"`.
    #[error("{message}")]
    Daemon {
        message: String,
        /// Machine-readable error kind, e.g. `snap-not-found`.
        kind: Option<String>,
        status_code: Option<u16>,
    },

    /// The request payload could not be serialized to JSON.
    #[error("failed to serialize request body: {0}")]
    Serialize(#[source] serde_json::Error),
}

impl SnapdError {
    /// True when the daemon socket is missing or refuses connections, which
    /// usually means snapd is not running.
    pub fn is_daemon_unavailable(&self) -> bool {
        match self {
            SnapdError::Transport(TransportError::Connect { source, .. }) => matches!(
                source.kind(),
                io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound
            ),
            _ => false,
        }
    }

    /// The daemon's error kind, when this is a `Daemon` error that has one.
    pub fn daemon_kind(&self) -> Option<&str> {
        match self {
            SnapdError::Daemon { kind, .. } => kind.as_deref(),
            _ => None,
        }
    }
}

/// Socket-level failures.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to snapd at {}: {source}", socket.display())]
    Connect { socket: PathBuf, source: io::Error },

    #[error("HTTP handshake with snapd failed: {0}")]
    Handshake(#[source] hyper::Error),

    #[error("failed to send request to snapd: {0}")]
    Request(#[source] hyper::Error),

    #[error("failed to read response from snapd: {0}")]
    Body(#[source] hyper::Error),

    #[error("invalid HTTP request: {0}")]
    InvalidRequest(#[source] ::http::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daemon_error_displays_message_verbatim() {
        let err = SnapdError::Daemon {
            message: "snap \"foo\" is not installed".to_string(),
            kind: Some("snap-not-found".to_string()),
            status_code: Some(404),
        };

        assert_eq!(err.to_string(), "snap \"foo\" is not installed");
        assert_eq!(err.daemon_kind(), Some("snap-not-found"));
    }

    #[test]
    fn missing_socket_counts_as_unavailable() {
        let err = SnapdError::from(TransportError::Connect {
            socket: PathBuf::from("/run/snapd.socket"),
            source: io::Error::from(io::ErrorKind::NotFound),
        });

        assert!(err.is_daemon_unavailable());
        assert!(err.to_string().contains("/run/snapd.socket"));
    }

    #[test]
    fn permission_denied_is_not_unavailable() {
        let err = SnapdError::from(TransportError::Connect {
            socket: PathBuf::from("/run/snapd.socket"),
            source: io::Error::from(io::ErrorKind::PermissionDenied),
        });

        assert!(!err.is_daemon_unavailable());
    }
}
