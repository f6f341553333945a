//! Per-call request and response log records.
//!
//! A record maps a closed set of [`Attribute`] keys to typed
//! [`AttributeValue`]s. Records are built by the log-collecting decorator and
//! are immutable once handed to a consumer.

use std::collections::HashMap;
use std::fmt;

use axum::http::HeaderMap;
use thiserror::Error;
use uuid::Uuid;

use crate::protocol::{ApplicationError, Call, Reply, ReplyBody, Struct, Value};
use crate::service::{RpcRequest, RpcResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    HttpHeaders,
    RpcRequest,
    RawRpcRequest,
    RpcResponse,
    RawRpcResponse,
}

impl Attribute {
    pub fn name(self) -> &'static str {
        match self {
            Attribute::HttpHeaders => "HTTP_HEADERS",
            Attribute::RpcRequest => "RPC_REQUEST",
            Attribute::RawRpcRequest => "RAW_RPC_REQUEST",
            Attribute::RpcResponse => "RPC_RESPONSE",
            Attribute::RawRpcResponse => "RAW_RPC_RESPONSE",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Headers(HeaderMap),
    Invocation(RpcInvocation),
    Call(Call),
    Result(RpcResult),
    Reply(Reply),
}

impl AttributeValue {
    fn kind(&self) -> &'static str {
        match self {
            AttributeValue::Headers(_) => "headers",
            AttributeValue::Invocation(_) => "invocation",
            AttributeValue::Call(_) => "call",
            AttributeValue::Result(_) => "result",
            AttributeValue::Reply(_) => "reply",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LogError {
    #[error("attribute {0} is not present")]
    NotPresent(Attribute),

    #[error("attribute {attr} holds a {found} value")]
    WrongType { attr: Attribute, found: &'static str },
}

/// The decoded call as seen by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcInvocation {
    pub service: String,
    pub method: String,
    pub args: Struct,
}

/// The decoded outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcResult {
    Success(Option<Value>),
    Declared { field_id: i16, exception: Struct },
    /// Rejected by the service or the dispatcher (e.g. unknown method).
    ApplicationError(ApplicationError),
    /// The handler or a decorator failed. `detail` never reaches the wire.
    Failed { detail: String },
    /// Oneway call that completed normally.
    NoReply,
}

impl RpcResult {
    pub fn from_response(response: &RpcResponse) -> Self {
        if let Some(cause) = &response.cause {
            return RpcResult::Failed {
                detail: cause.to_string(),
            };
        }
        match response.reply.as_ref().map(|reply| &reply.body) {
            None => RpcResult::NoReply,
            Some(ReplyBody::Success(value)) => RpcResult::Success(value.clone()),
            Some(ReplyBody::Declared {
                field_id,
                exception,
            }) => RpcResult::Declared {
                field_id: *field_id,
                exception: exception.clone(),
            },
            Some(ReplyBody::ApplicationError(error)) => RpcResult::ApplicationError(error.clone()),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RpcResult::Success(_) | RpcResult::NoReply)
    }
}

macro_rules! typed_accessor {
    ($name:ident, $attr:expr, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Result<&$ty, LogError> {
            match self.attr($attr)? {
                AttributeValue::$variant(value) => Ok(value),
                other => Err(LogError::WrongType {
                    attr: $attr,
                    found: other.kind(),
                }),
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestLog {
    id: Uuid,
    attrs: HashMap<Attribute, AttributeValue>,
}

impl RequestLog {
    pub const HTTP_HEADERS: Attribute = Attribute::HttpHeaders;
    pub const RPC_REQUEST: Attribute = Attribute::RpcRequest;
    pub const RAW_RPC_REQUEST: Attribute = Attribute::RawRpcRequest;

    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            attrs: HashMap::new(),
        }
    }

    /// Everything the bridge knows about a call before it is dispatched.
    pub fn from_request(request: &RpcRequest) -> Self {
        let mut log = Self::new(request.ctx.id());
        log.set(Self::HTTP_HEADERS, AttributeValue::Headers(request.headers.clone()));
        log.set(
            Self::RPC_REQUEST,
            AttributeValue::Invocation(RpcInvocation {
                service: request.ctx.service().to_string(),
                method: request.call.method().to_string(),
                args: request.call.args.clone(),
            }),
        );
        log.set(Self::RAW_RPC_REQUEST, AttributeValue::Call(request.call.clone()));
        log
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set(&mut self, attr: Attribute, value: AttributeValue) {
        self.attrs.insert(attr, value);
    }

    pub fn has_attr(&self, attr: Attribute) -> bool {
        self.attrs.contains_key(&attr)
    }

    pub fn attr(&self, attr: Attribute) -> Result<&AttributeValue, LogError> {
        self.attrs.get(&attr).ok_or(LogError::NotPresent(attr))
    }

    typed_accessor!(headers, Self::HTTP_HEADERS, Headers, HeaderMap);
    typed_accessor!(invocation, Self::RPC_REQUEST, Invocation, RpcInvocation);
    typed_accessor!(raw_call, Self::RAW_RPC_REQUEST, Call, Call);
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseLog {
    id: Uuid,
    attrs: HashMap<Attribute, AttributeValue>,
}

impl ResponseLog {
    pub const HTTP_HEADERS: Attribute = Attribute::HttpHeaders;
    pub const RPC_RESPONSE: Attribute = Attribute::RpcResponse;
    pub const RAW_RPC_RESPONSE: Attribute = Attribute::RawRpcResponse;

    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            attrs: HashMap::new(),
        }
    }

    /// `RAW_RPC_RESPONSE` is only present when a reply is sent.
    pub fn from_response(id: Uuid, response: &RpcResponse) -> Self {
        let mut log = Self::new(id);
        log.set(Self::HTTP_HEADERS, AttributeValue::Headers(response.headers.clone()));
        log.set(
            Self::RPC_RESPONSE,
            AttributeValue::Result(RpcResult::from_response(response)),
        );
        if let Some(reply) = &response.reply {
            log.set(Self::RAW_RPC_RESPONSE, AttributeValue::Reply(reply.clone()));
        }
        log
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn set(&mut self, attr: Attribute, value: AttributeValue) {
        self.attrs.insert(attr, value);
    }

    pub fn has_attr(&self, attr: Attribute) -> bool {
        self.attrs.contains_key(&attr)
    }

    pub fn attr(&self, attr: Attribute) -> Result<&AttributeValue, LogError> {
        self.attrs.get(&attr).ok_or(LogError::NotPresent(attr))
    }

    typed_accessor!(headers, Self::HTTP_HEADERS, Headers, HeaderMap);
    typed_accessor!(result, Self::RPC_RESPONSE, Result, RpcResult);
    typed_accessor!(raw_reply, Self::RAW_RPC_RESPONSE, Reply, Reply);
}
