//! Envelope header and wire type identifiers.

use serde::{Deserialize, Serialize};

use crate::protocol::error::CodecError;

/// Thrift message type carried in the envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl MessageType {
    pub fn as_u8(self) -> u8 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::Oneway => 4,
        }
    }

    pub fn from_u8(raw: u8) -> Result<Self, CodecError> {
        match raw {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(CodecError::InvalidMessageType(other)),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MessageType::Call => "CALL",
            MessageType::Reply => "REPLY",
            MessageType::Exception => "EXCEPTION",
            MessageType::Oneway => "ONEWAY",
        };
        f.write_str(name)
    }
}

/// Envelope header: method name, message type and sequence id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub name: String,
    pub message_type: MessageType,
    /// Advisory over HTTP; replies copy the value from their call.
    pub sequence_id: i32,
}

impl MessageHeader {
    pub fn new(name: impl Into<String>, message_type: MessageType, sequence_id: i32) -> Self {
        Self {
            name: name.into(),
            message_type,
            sequence_id,
        }
    }

    /// Header for the reply to this call, keeping name and sequence id.
    pub fn reply_to(&self, message_type: MessageType) -> Self {
        Self {
            name: self.name.clone(),
            message_type,
            sequence_id: self.sequence_id,
        }
    }
}

/// Field and element type identifiers (binary protocol numbering).
///
/// `Stop` doubles as "unspecified" for the element types of empty compact maps,
/// which carry no type byte on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TType {
    Stop,
    Bool,
    Byte,
    Double,
    I16,
    I32,
    I64,
    String,
    Struct,
    Map,
    Set,
    List,
}

impl TType {
    pub fn binary_id(self) -> u8 {
        match self {
            TType::Stop => 0,
            TType::Bool => 2,
            TType::Byte => 3,
            TType::Double => 4,
            TType::I16 => 6,
            TType::I32 => 8,
            TType::I64 => 10,
            TType::String => 11,
            TType::Struct => 12,
            TType::Map => 13,
            TType::Set => 14,
            TType::List => 15,
        }
    }

    pub fn from_binary_id(raw: u8) -> Result<Self, CodecError> {
        match raw {
            0 => Ok(TType::Stop),
            2 => Ok(TType::Bool),
            3 => Ok(TType::Byte),
            4 => Ok(TType::Double),
            6 => Ok(TType::I16),
            8 => Ok(TType::I32),
            10 => Ok(TType::I64),
            11 => Ok(TType::String),
            12 => Ok(TType::Struct),
            13 => Ok(TType::Map),
            14 => Ok(TType::Set),
            15 => Ok(TType::List),
            other => Err(CodecError::InvalidType(other)),
        }
    }
}

/// Envelope encoding, pluggable per registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolKind {
    #[default]
    Binary,
    Compact,
}

/// Media type shared by every Thrift protocol variant.
pub const THRIFT_MEDIA_TYPE: &str = "application/x-thrift";

impl ProtocolKind {
    /// `Content-Type` value announcing this protocol.
    pub fn content_type(self) -> &'static str {
        match self {
            ProtocolKind::Binary => "application/x-thrift; protocol=TBINARY",
            ProtocolKind::Compact => "application/x-thrift; protocol=TCOMPACT",
        }
    }

    /// Parse a `Content-Type` header.
    ///
    /// Returns `Ok(None)` for a bare `application/x-thrift` (no protocol
    /// parameter) so the caller can fall back to the service default.
    pub fn from_content_type(value: &str) -> Result<Option<Self>, String> {
        let mut parts = value.split(';').map(str::trim);
        let media_type = parts.next().unwrap_or_default();
        if !media_type.eq_ignore_ascii_case(THRIFT_MEDIA_TYPE) {
            return Err(value.to_string());
        }

        for param in parts {
            let Some((key, val)) = param.split_once('=') else {
                continue;
            };
            if !key.trim().eq_ignore_ascii_case("protocol") {
                continue;
            }
            let val = val.trim().trim_matches('"');
            return if val.eq_ignore_ascii_case("TBINARY") {
                Ok(Some(ProtocolKind::Binary))
            } else if val.eq_ignore_ascii_case("TCOMPACT") {
                Ok(Some(ProtocolKind::Compact))
            } else {
                Err(value.to_string())
            };
        }
        Ok(None)
    }
}

impl std::fmt::Display for ProtocolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProtocolKind::Binary => f.write_str("binary"),
            ProtocolKind::Compact => f.write_str("compact"),
        }
    }
}
