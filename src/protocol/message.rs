//! Calls, replies and application errors on top of the raw envelope.

use thiserror::Error;

use crate::protocol::error::CodecError;
use crate::protocol::types::{MessageHeader, MessageType};
use crate::protocol::value::{Struct, Value};

/// A raw envelope: header plus struct payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: MessageHeader,
    pub body: Struct,
}

/// A decoded inbound call. Immutable once decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub header: MessageHeader,
    pub args: Struct,
}

impl Call {
    pub fn new(name: impl Into<String>, sequence_id: i32, args: Struct) -> Self {
        Self {
            header: MessageHeader::new(name, MessageType::Call, sequence_id),
            args,
        }
    }

    pub fn oneway(name: impl Into<String>, sequence_id: i32, args: Struct) -> Self {
        Self {
            header: MessageHeader::new(name, MessageType::Oneway, sequence_id),
            args,
        }
    }

    pub fn method(&self) -> &str {
        &self.header.name
    }

    pub fn is_oneway(&self) -> bool {
        self.header.message_type == MessageType::Oneway
    }

    pub fn to_message(&self) -> Message {
        Message {
            header: self.header.clone(),
            body: self.args.clone(),
        }
    }
}

impl TryFrom<Message> for Call {
    type Error = CodecError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        match message.header.message_type {
            MessageType::Call | MessageType::Oneway => Ok(Call {
                header: message.header,
                args: message.body,
            }),
            other => Err(CodecError::NotACall(other)),
        }
    }
}

/// Outcome carried by a reply. Exactly one kind per reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    /// `None` for void methods.
    Success(Option<Value>),
    /// Schema-declared exception stored at `field_id` of the result struct.
    Declared { field_id: i16, exception: Struct },
    ApplicationError(ApplicationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub header: MessageHeader,
    pub body: ReplyBody,
}

impl Reply {
    pub fn success(call: &MessageHeader, value: Option<Value>) -> Self {
        Self {
            header: call.reply_to(MessageType::Reply),
            body: ReplyBody::Success(value),
        }
    }

    pub fn declared(call: &MessageHeader, field_id: i16, exception: Struct) -> Self {
        Self {
            header: call.reply_to(MessageType::Reply),
            body: ReplyBody::Declared {
                field_id,
                exception,
            },
        }
    }

    pub fn application_error(call: &MessageHeader, error: ApplicationError) -> Self {
        Self {
            header: call.reply_to(MessageType::Exception),
            body: ReplyBody::ApplicationError(error),
        }
    }

    pub fn is_exception(&self) -> bool {
        self.header.message_type == MessageType::Exception
    }

    /// Result struct layout: field 0 holds the success value, fields 1.. the
    /// declared exceptions. Application errors become an EXCEPTION message.
    pub fn to_message(&self) -> Message {
        let body = match &self.body {
            ReplyBody::Success(Some(value)) => Struct::new().with(0, value.clone()),
            ReplyBody::Success(None) => Struct::new(),
            ReplyBody::Declared {
                field_id,
                exception,
            } => Struct::new().with(*field_id, exception.clone()),
            ReplyBody::ApplicationError(err) => err.to_struct(),
        };
        Message {
            header: self.header.clone(),
            body,
        }
    }
}

impl TryFrom<Message> for Reply {
    type Error = CodecError;

    fn try_from(message: Message) -> Result<Self, Self::Error> {
        let body = match message.header.message_type {
            MessageType::Reply => {
                let mut fields = message.body.into_fields().into_iter();
                match fields.next() {
                    None => ReplyBody::Success(None),
                    Some(field) if field.id == 0 => ReplyBody::Success(Some(field.value)),
                    Some(field) => match field.value {
                        Value::Struct(exception) => ReplyBody::Declared {
                            field_id: field.id,
                            exception,
                        },
                        other => ReplyBody::Declared {
                            field_id: field.id,
                            exception: Struct::new().with(1, other),
                        },
                    },
                }
            }
            MessageType::Exception => {
                ReplyBody::ApplicationError(ApplicationError::from_struct(&message.body))
            }
            other => return Err(CodecError::NotAReply(other)),
        };
        Ok(Reply {
            header: message.header,
            body,
        })
    }
}

/// Error kinds of the standard `TApplicationException`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationErrorKind {
    Unknown,
    UnknownMethod,
    InvalidMessageType,
    WrongMethodName,
    BadSequenceId,
    MissingResult,
    InternalError,
    ProtocolError,
    InvalidTransform,
    InvalidProtocol,
    UnsupportedClientType,
}

impl ApplicationErrorKind {
    pub fn code(self) -> i32 {
        match self {
            ApplicationErrorKind::Unknown => 0,
            ApplicationErrorKind::UnknownMethod => 1,
            ApplicationErrorKind::InvalidMessageType => 2,
            ApplicationErrorKind::WrongMethodName => 3,
            ApplicationErrorKind::BadSequenceId => 4,
            ApplicationErrorKind::MissingResult => 5,
            ApplicationErrorKind::InternalError => 6,
            ApplicationErrorKind::ProtocolError => 7,
            ApplicationErrorKind::InvalidTransform => 8,
            ApplicationErrorKind::InvalidProtocol => 9,
            ApplicationErrorKind::UnsupportedClientType => 10,
        }
    }

    /// Unrecognised codes collapse to `Unknown`.
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => ApplicationErrorKind::UnknownMethod,
            2 => ApplicationErrorKind::InvalidMessageType,
            3 => ApplicationErrorKind::WrongMethodName,
            4 => ApplicationErrorKind::BadSequenceId,
            5 => ApplicationErrorKind::MissingResult,
            6 => ApplicationErrorKind::InternalError,
            7 => ApplicationErrorKind::ProtocolError,
            8 => ApplicationErrorKind::InvalidTransform,
            9 => ApplicationErrorKind::InvalidProtocol,
            10 => ApplicationErrorKind::UnsupportedClientType,
            _ => ApplicationErrorKind::Unknown,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ApplicationErrorKind::Unknown => "UNKNOWN",
            ApplicationErrorKind::UnknownMethod => "UNKNOWN_METHOD",
            ApplicationErrorKind::InvalidMessageType => "INVALID_MESSAGE_TYPE",
            ApplicationErrorKind::WrongMethodName => "WRONG_METHOD_NAME",
            ApplicationErrorKind::BadSequenceId => "BAD_SEQUENCE_ID",
            ApplicationErrorKind::MissingResult => "MISSING_RESULT",
            ApplicationErrorKind::InternalError => "INTERNAL_ERROR",
            ApplicationErrorKind::ProtocolError => "PROTOCOL_ERROR",
            ApplicationErrorKind::InvalidTransform => "INVALID_TRANSFORM",
            ApplicationErrorKind::InvalidProtocol => "INVALID_PROTOCOL",
            ApplicationErrorKind::UnsupportedClientType => "UNSUPPORTED_CLIENT_TYPE",
        }
    }
}

impl std::fmt::Display for ApplicationErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Protocol-level failure with no schema-declared representation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ApplicationError {
    pub kind: ApplicationErrorKind,
    pub message: String,
}

impl ApplicationError {
    pub fn new(kind: ApplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Wire layout: field 1 message (string), field 2 type (i32).
    pub fn to_struct(&self) -> Struct {
        Struct::new()
            .with(1, Value::string(self.message.clone()))
            .with(2, Value::I32(self.kind.code()))
    }

    pub fn from_struct(s: &Struct) -> Self {
        let message = s
            .field(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let kind = s
            .field(2)
            .and_then(Value::as_i64)
            .map(|code| ApplicationErrorKind::from_code(code as i32))
            .unwrap_or(ApplicationErrorKind::Unknown);
        Self { kind, message }
    }
}
