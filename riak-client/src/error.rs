//! Client error types.
//!
//! [`ClientError`] is what the socket layer produces. Connections translate
//! every one of them into a [`RiakError`], the only error type that reaches
//! managers, nodes and callers.

use riak_protocol::{ProtocolError, TermError};
use std::fmt;
use thiserror::Error;

/// Transport-level errors raised by the framed socket.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("request timeout")]
    Timeout,

    #[error("connection disposed")]
    Disposed,

    #[error("riak error {code}: {message}")]
    ServerError { code: u32, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ClientError {
    /// Returns whether the error means the node could not be reached or
    /// dropped the connection.
    pub fn is_node_offline(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::ConnectionClosed
                | ClientError::ConnectTimeout
                | ClientError::Timeout
                | ClientError::TlsHandshake(_)
        )
    }
}

impl From<TermError> for ClientError {
    fn from(err: TermError) -> Self {
        ClientError::Protocol(ProtocolError::Term(err))
    }
}

/// Outcome category carried by every [`RiakError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultCode {
    CommunicationError,
    InvalidRequest,
    ShuttingDown,
    NoConnections,
    ClusterOffline,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::CommunicationError => write!(f, "COMMUNICATION_ERROR"),
            ResultCode::InvalidRequest => write!(f, "INVALID_REQUEST"),
            ResultCode::ShuttingDown => write!(f, "SHUTTING_DOWN"),
            ResultCode::NoConnections => write!(f, "NO_CONNECTIONS"),
            ResultCode::ClusterOffline => write!(f, "CLUSTER_OFFLINE"),
        }
    }
}

/// A failed operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct RiakError {
    pub code: ResultCode,
    pub message: String,
    /// The node did not answer; it may be taken out of rotation.
    pub node_offline: bool,
    /// The operation may be re-attempted, possibly on another node.
    pub retryable: bool,
    /// Error code sent by the server, if the failure was a server error.
    pub server_code: Option<u32>,
}

impl RiakError {
    pub fn new(code: ResultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            node_offline: false,
            retryable: false,
            server_code: None,
        }
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn node_offline(mut self) -> Self {
        self.node_offline = true;
        self
    }

    pub fn shutting_down() -> Self {
        Self::new(ResultCode::ShuttingDown, "node is shutting down")
    }

    pub fn no_connections() -> Self {
        Self::new(ResultCode::NoConnections, "unable to acquire connection").retryable()
    }

    pub fn cluster_offline() -> Self {
        Self::new(ResultCode::ClusterOffline, "unable to access functioning Riak node")
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ResultCode::InvalidRequest, message)
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }
}

/// Result of an operation against Riak.
pub type RiakResult<T> = Result<T, RiakError>;
