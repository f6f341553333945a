//! A service bound to a path: decode, run the decorated chain, encode.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::{HeaderMap, HeaderValue};
use bytes::Bytes;
use futures_util::FutureExt;
use thiserror::Error;
use tower::ServiceExt;
use uuid::Uuid;

use crate::decorator::Decorators;
use crate::net::SessionProtocol;
use crate::protocol::{self, ApplicationErrorKind, ProtocolKind};
use crate::service::definition::ServiceDefinition;
use crate::service::dispatcher::Dispatcher;
use crate::service::error::BridgeError;
use crate::service::{
    CallContext, FailureCause, RpcHandler, RpcRequest, RpcResponse, INTERNAL_ERROR_MESSAGE,
};

#[derive(Debug, Error)]
#[error("panic while handling call: {0}")]
pub(crate) struct Panicked(pub(crate) String);

/// Encoded outcome of one dispatch.
#[derive(Debug, Clone)]
pub struct EncodedReply {
    pub headers: HeaderMap,
    /// `None` for oneway calls.
    pub body: Option<Bytes>,
}

/// Routing-table entry. Built once at startup, read-only afterwards.
#[derive(Clone)]
pub struct ServiceBinding {
    path: Arc<str>,
    service_name: Arc<str>,
    default_protocol: ProtocolKind,
    oneway_methods: Arc<HashSet<String>>,
    handler: RpcHandler,
}

impl ServiceBinding {
    pub fn new(path: impl Into<String>, definition: ServiceDefinition, decorators: &Decorators) -> Self {
        let service_name: Arc<str> = Arc::from(definition.name());
        let default_protocol = definition.protocol();
        let oneway_methods: HashSet<String> = definition
            .method_names()
            .filter(|name| definition.method(name).is_some_and(|m| m.is_oneway()))
            .map(str::to_string)
            .collect();
        let handler = decorators.apply(RpcHandler::new(Dispatcher::new(definition)));
        Self {
            path: Arc::from(path.into()),
            service_name,
            default_protocol,
            oneway_methods: Arc::new(oneway_methods),
            handler,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Pick the envelope protocol from `Content-Type`, falling back to the
    /// service default when the header is absent or names no protocol.
    pub fn negotiate(&self, content_type: Option<&HeaderValue>) -> Result<ProtocolKind, BridgeError> {
        let Some(value) = content_type else {
            return Ok(self.default_protocol);
        };
        let value = value
            .to_str()
            .map_err(|_| BridgeError::UnsupportedContentType(format!("{value:?}")))?;
        match ProtocolKind::from_content_type(value) {
            Ok(Some(protocol)) => Ok(protocol),
            Ok(None) => Ok(self.default_protocol),
            Err(raw) => Err(BridgeError::UnsupportedContentType(raw)),
        }
    }

    pub fn context(
        &self,
        id: Uuid,
        session_protocol: SessionProtocol,
        protocol: ProtocolKind,
        remote_addr: Option<SocketAddr>,
    ) -> CallContext {
        CallContext::with_id(
            id,
            self.service_name.to_string(),
            self.path.to_string(),
            session_protocol,
            protocol,
            remote_addr,
        )
    }

    /// Decode `raw`, run it through the decorated chain and encode the reply.
    ///
    /// Only a malformed envelope is an error; every RPC-level failure,
    /// including decorator errors and panics, is encoded as a reply.
    pub async fn dispatch(
        &self,
        ctx: CallContext,
        headers: HeaderMap,
        raw: &[u8],
    ) -> Result<EncodedReply, BridgeError> {
        let protocol = ctx.protocol();
        let call = protocol::decode_call(protocol, raw)?;
        let header = call.header.clone();
        let oneway = call.is_oneway() || self.oneway_methods.contains(call.method());

        let mut request = RpcRequest::new(ctx.clone(), headers, call);
        request.oneway = oneway;
        let chain = self.handler.clone().oneshot(request);

        let response = match AssertUnwindSafe(chain).catch_unwind().await {
            Ok(Ok(response)) => response,
            Ok(Err(error)) => {
                tracing::error!(
                    request_id = %ctx.id(),
                    method = %header.name,
                    error = %error,
                    "Decorator chain failed"
                );
                RpcResponse::internal_error(protocol, &header, oneway, FailureCause::from(error))
            }
            Err(payload) => {
                let panic = Panicked(panic_message(payload.as_ref()));
                tracing::error!(
                    request_id = %ctx.id(),
                    method = %header.name,
                    error = %panic,
                    "Call panicked"
                );
                RpcResponse::internal_error(protocol, &header, oneway, Arc::new(panic))
            }
        };

        if oneway {
            return Ok(EncodedReply {
                headers: response.headers,
                body: None,
            });
        }

        let body = match &response.reply {
            Some(reply) => protocol::encode_reply(protocol, reply),
            None => {
                tracing::error!(
                    request_id = %ctx.id(),
                    method = %header.name,
                    "Chain produced no reply for a two-way call"
                );
                protocol::encode_exception(
                    protocol,
                    &header,
                    ApplicationErrorKind::InternalError,
                    INTERNAL_ERROR_MESSAGE,
                )
            }
        };

        Ok(EncodedReply {
            headers: response.headers,
            body: Some(body),
        })
    }
}

impl std::fmt::Debug for ServiceBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceBinding")
            .field("path", &self.path)
            .field("service", &self.service_name)
            .field("default_protocol", &self.default_protocol)
            .finish()
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
