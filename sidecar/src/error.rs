//! Sidecar error types
//!
//! Configuration problems (`EndpointError`, `ConnectError::UnsupportedPolicyTarget`)
//! are returned to the caller and never retried. Transport problems are
//! retried by the connection manager. Server setup problems (`ServeError`)
//! end the serving task.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tonic::Status;

/// Boxed error as produced by the tonic transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Invalid endpoint: {0:?}")]
    InvalidEndpoint(String),
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),

    #[error("OnConnectionLoss callback only supported for unix:// addresses, got {0}")]
    UnsupportedPolicyTarget(String),

    #[error("Failed to dial {endpoint}: {source}")]
    DialFailed {
        endpoint: String,
        #[source]
        source: BoxError,
    },

    /// The reconnect policy refused to reconnect after a connection loss.
    /// Deliberate, unlike `DialFailed`.
    #[error("Connection to {0} lost, reconnecting disabled")]
    ReconnectDisabled(String),
}

impl ConnectError {
    pub(crate) fn dial<E: Into<BoxError>>(endpoint: impl ToString, source: E) -> Self {
        Self::DialFailed {
            endpoint: endpoint.to_string(),
            source: source.into(),
        }
    }

    /// True when the failure is the reconnect policy's decision rather than
    /// an unreachable driver.
    pub fn is_reconnect_disabled(&self) -> bool {
        matches!(self, Self::ReconnectDisabled(_))
    }

    /// Find the connection error behind a failed call, if the channel
    /// produced one.
    pub fn from_status(status: &Status) -> Option<&ConnectError> {
        let mut source = StdError::source(status);
        while let Some(err) = source {
            if let Some(connect) = err.downcast_ref::<ConnectError>() {
                return Some(connect);
            }
            source = err.source();
        }
        None
    }

    /// True when `status` reports a call refused because the reconnect
    /// policy vetoed redialing.
    pub fn is_reconnect_disabled_status(status: &Status) -> bool {
        Self::from_status(status).is_some_and(Self::is_reconnect_disabled)
    }
}

#[derive(Debug, Error)]
pub enum ServeError {
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),

    #[error("Failed to remove {path}, error: {source}")]
    RemoveStaleSocket {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to create socket directory {path}: {source}")]
    CreateSocketDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to set permissions on {path}: {source}")]
    SocketPermissions {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to listen on {endpoint}: {source}")]
    Bind {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("gRPC server on {endpoint} failed: {source}")]
    Serve {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    #[error("Serving task for {endpoint} panicked")]
    Panicked { endpoint: String },

    #[error("Server not started or already waited on")]
    NotStarted,
}
