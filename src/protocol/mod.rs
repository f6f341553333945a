//! Thrift message envelope codec.
//!
//! # Data Flow
//! ```text
//! HTTP request body (bytes)
//!     → ProtocolKind (negotiated from Content-Type)
//!     → binary.rs / compact.rs (header + struct payload)
//!     → Message { header, body: Struct }
//!     → Call (CALL / ONEWAY only)
//!
//! Reply (success | declared exception | application error)
//!     → Message (REPLY result struct or EXCEPTION struct)
//!     → binary.rs / compact.rs
//!     → HTTP response body (bytes)
//! ```
//!
//! # Design Decisions
//! - Payloads are decoded into a dynamic `Value` tree instead of generated types
//! - Collections keep their element types so canonical input re-encodes byte-for-byte
//! - Every length and size is checked against the remaining input before allocating
//! - Nesting depth is bounded to keep recursion on untrusted input finite

mod binary;
mod compact;
pub mod error;
pub mod message;
mod reader;
pub mod types;
pub mod value;

use bytes::Bytes;

pub use error::CodecError;
pub use message::{
    ApplicationError, ApplicationErrorKind, Call, Message, Reply, ReplyBody,
};
pub use types::{MessageHeader, MessageType, ProtocolKind, TType};
pub use value::{Field, ListValue, MapValue, Struct, Value};

/// Maximum struct/collection nesting accepted from the wire.
pub const MAX_DEPTH: usize = 64;

/// Decode any message envelope.
pub fn decode_message(protocol: ProtocolKind, input: &[u8]) -> Result<Message, CodecError> {
    match protocol {
        ProtocolKind::Binary => binary::decode(input),
        ProtocolKind::Compact => compact::decode(input),
    }
}

/// Encode any message envelope.
pub fn encode_message(protocol: ProtocolKind, message: &Message) -> Bytes {
    match protocol {
        ProtocolKind::Binary => binary::encode(message),
        ProtocolKind::Compact => compact::encode(message),
    }
}

/// Decode an inbound call. Only CALL and ONEWAY envelopes are accepted.
pub fn decode_call(protocol: ProtocolKind, input: &[u8]) -> Result<Call, CodecError> {
    Call::try_from(decode_message(protocol, input)?)
}

/// Encode an outbound call (client side).
pub fn encode_call(protocol: ProtocolKind, call: &Call) -> Bytes {
    encode_message(protocol, &call.to_message())
}

/// Encode a reply, choosing REPLY or EXCEPTION from the outcome kind.
pub fn encode_reply(protocol: ProtocolKind, reply: &Reply) -> Bytes {
    encode_message(protocol, &reply.to_message())
}

/// Decode a reply (client side).
pub fn decode_reply(protocol: ProtocolKind, input: &[u8]) -> Result<Reply, CodecError> {
    Reply::try_from(decode_message(protocol, input)?)
}

/// Encode a protocol-level failure that has no declared exception form.
pub fn encode_exception(
    protocol: ProtocolKind,
    call_header: &MessageHeader,
    kind: ApplicationErrorKind,
    message: impl Into<String>,
) -> Bytes {
    let reply = Reply::application_error(call_header, ApplicationError::new(kind, message));
    encode_reply(protocol, &reply)
}
