//! Codec failures. Every variant means the envelope is malformed.

use thiserror::Error;

use crate::protocol::types::MessageType;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("truncated input: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unversioned binary header (non-strict encoding is not accepted)")]
    Unversioned,

    #[error("bad protocol version: {0:#x}")]
    BadVersion(u32),

    #[error("bad compact protocol id: {0:#x}")]
    BadProtocolId(u8),

    #[error("invalid message type: {0}")]
    InvalidMessageType(u8),

    #[error("invalid field type: {0}")]
    InvalidType(u8),

    #[error("negative size: {0}")]
    NegativeSize(i64),

    #[error("declared size {size} exceeds remaining input {remaining}")]
    SizeExceedsInput { size: usize, remaining: usize },

    #[error("varint too long")]
    VarintOverflow,

    #[error("nesting deeper than {0}")]
    DepthLimit(usize),

    #[error("method name is not valid UTF-8")]
    InvalidMethodName,

    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    #[error("expected CALL or ONEWAY, got {0}")]
    NotACall(MessageType),

    #[error("expected REPLY or EXCEPTION, got {0}")]
    NotAReply(MessageType),
}
