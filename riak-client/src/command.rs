//! Request/response command abstraction.

use crate::error::ClientError;
use riak_protocol::RiakMessage;

/// An operation that sends one request and consumes its response.
///
/// For streaming commands `on_success` is called once per received frame,
/// in order, until a frame reports done.
pub trait Command: Send {
    type Request: RiakMessage + Send + Sync;
    type Response: RiakMessage + Send;

    /// Builds the request. Fails with [`ClientError::InvalidRequest`] when the
    /// command's arguments are unusable.
    fn construct_request(&self) -> Result<Self::Request, ClientError>;

    fn on_success(&mut self, response: Self::Response) -> Result<(), ClientError>;

    /// Discards anything collected by `on_success`. Called before every
    /// attempt, so a retried command starts from scratch.
    fn reset(&mut self) {}
}

/// Rejects blank names before anything reaches the wire.
pub(crate) fn require_non_blank(what: &str, value: &str) -> Result<(), ClientError> {
    if value.trim().is_empty() {
        return Err(ClientError::InvalidRequest(format!("{} must not be blank", what)));
    }
    Ok(())
}
