//! Transport-level dispatch failures.
//!
//! Everything here is answered with an HTTP error status. RPC-level failures
//! never show up here; they are encoded inside the reply envelope.

use thiserror::Error;

use crate::protocol::CodecError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[from] CodecError),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("no service bound at {0}")]
    UnknownPath(String),

    #[error("server is shutting down")]
    Unavailable,
}

impl BridgeError {
    /// Short label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::MalformedEnvelope(_) => "malformed_envelope",
            BridgeError::UnsupportedContentType(_) => "unsupported_content_type",
            BridgeError::UnknownPath(_) => "unknown_path",
            BridgeError::Unavailable => "unavailable",
        }
    }
}
