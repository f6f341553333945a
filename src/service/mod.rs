//! RPC service dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! ServiceBinding::dispatch(ctx, headers, raw bytes)
//!     → protocol::decode_call (MalformedEnvelope on failure)
//!     → decorated RpcHandler (decorator chain, outermost first)
//!     → dispatcher.rs (method lookup, handler invocation)
//!     → responder.rs (single terminal outcome)
//!     → RpcResponse { reply, cause }
//!     → protocol::encode_reply (skipped for oneway calls)
//! ```
//!
//! # Design Decisions
//! - Unknown methods become an `UNKNOWN_METHOD` reply, never a dropped call
//! - Handler failures become a generic `INTERNAL_ERROR`; the cause stays local
//! - Decorator errors and panics are converted the same way at the binding
//! - No cross-call mutable state: definitions are frozen behind `Arc`

pub mod binding;
pub mod context;
pub mod definition;
pub mod dispatcher;
pub mod error;
pub mod responder;

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderValue};
use tower::util::BoxCloneSyncService;
use tower::BoxError;

use crate::protocol::{
    ApplicationError, ApplicationErrorKind, Call, MessageHeader, ProtocolKind, Reply,
};

pub use binding::{EncodedReply, ServiceBinding};
pub use context::CallContext;
pub use definition::{MethodEntry, ServiceDefinition, ServiceDefinitionBuilder};
pub use dispatcher::Dispatcher;
pub use error::BridgeError;
pub use responder::{Outcome, Responder};

/// Message put on the wire for every failure that is not meant for clients.
pub const INTERNAL_ERROR_MESSAGE: &str = "internal server error";

/// Locally retained failure detail.
pub type FailureCause = Arc<dyn std::error::Error + Send + Sync>;

/// The handler type every decorator wraps and returns.
pub type RpcHandler = BoxCloneSyncService<RpcRequest, RpcResponse, BoxError>;

/// A decoded call travelling down the decorator chain.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    pub ctx: CallContext,
    /// Headers of the HTTP request that carried the call.
    pub headers: HeaderMap,
    pub call: Call,
    /// No reply will be sent: ONEWAY envelope or a method registered as oneway.
    pub oneway: bool,
}

impl RpcRequest {
    /// Oneway follows the envelope type; `ServiceBinding` also applies the
    /// method registration.
    pub fn new(ctx: CallContext, headers: HeaderMap, call: Call) -> Self {
        let oneway = call.is_oneway();
        Self {
            ctx,
            headers,
            call,
            oneway,
        }
    }
}

/// The dispatch outcome travelling back up the decorator chain.
#[derive(Debug, Clone)]
pub struct RpcResponse {
    /// Headers for the HTTP response.
    pub headers: HeaderMap,
    /// `None` when no reply is sent (oneway).
    pub reply: Option<Reply>,
    /// Failure detail for local observers. Never encoded.
    pub cause: Option<FailureCause>,
    /// False when the called method is not part of the service.
    pub method_resolved: bool,
}

impl RpcResponse {
    pub fn new(protocol: ProtocolKind, reply: Option<Reply>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(protocol.content_type()),
        );
        Self {
            headers,
            reply,
            cause: None,
            method_resolved: true,
        }
    }

    pub fn with_cause(mut self, cause: FailureCause) -> Self {
        self.cause = Some(cause);
        self
    }

    /// Generic `INTERNAL_ERROR` reply for `call`, keeping `cause` local.
    pub fn internal_error(
        protocol: ProtocolKind,
        call: &MessageHeader,
        oneway: bool,
        cause: FailureCause,
    ) -> Self {
        let reply = (!oneway).then(|| {
            Reply::application_error(
                call,
                ApplicationError::new(ApplicationErrorKind::InternalError, INTERNAL_ERROR_MESSAGE),
            )
        });
        Self::new(protocol, reply).with_cause(cause)
    }
}
