//! Emits a tracing event when a call enters the chain and when it completes.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{BoxError, Layer, Service};

use crate::decorator::outcome_label;
use crate::service::{RpcRequest, RpcResponse};

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl LoggingLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = LoggingService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LoggingService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct LoggingService<S> {
    inner: S,
}

impl<S> Service<RpcRequest> for LoggingService<S>
where
    S: Service<RpcRequest, Response = RpcResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = RpcResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<RpcResponse, BoxError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let ctx = req.ctx.clone();
            let method = req.call.method().to_string();
            tracing::debug!(
                request_id = %ctx.id(),
                service = %ctx.service(),
                method = %method,
                seq = req.call.header.sequence_id,
                session = %ctx.session_protocol(),
                protocol = %ctx.protocol(),
                "RPC call received"
            );

            let result = inner.call(req).await;
            let elapsed_ms = ctx.elapsed().as_millis() as u64;

            match &result {
                Ok(response) => {
                    let outcome = outcome_label(response);
                    if let Some(cause) = &response.cause {
                        tracing::warn!(
                            request_id = %ctx.id(),
                            service = %ctx.service(),
                            method = %method,
                            outcome,
                            elapsed_ms,
                            cause = %cause,
                            "RPC call failed"
                        );
                    } else {
                        tracing::info!(
                            request_id = %ctx.id(),
                            service = %ctx.service(),
                            method = %method,
                            outcome,
                            elapsed_ms,
                            "RPC call completed"
                        );
                    }
                }
                Err(error) => {
                    tracing::error!(
                        request_id = %ctx.id(),
                        service = %ctx.service(),
                        method = %method,
                        elapsed_ms,
                        error = %error,
                        "RPC call errored inside the decorator chain"
                    );
                }
            }
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use tower::ServiceExt;

    use super::*;
    use crate::decorator::Decorators;
    use crate::net::SessionProtocol;
    use crate::protocol::{Call, ProtocolKind, ReplyBody, Struct, Value};
    use crate::service::{CallContext, Dispatcher, RpcHandler, ServiceDefinition};

    #[tokio::test]
    async fn passes_outcome_through_unchanged() {
        let definition = ServiceDefinition::builder("Svc")
            .method("answer", |_ctx, _args, responder| responder.success(42))
            .build();
        let mut decorators = Decorators::new();
        decorators.push(LoggingLayer::new());
        let handler = decorators.apply(RpcHandler::new(Dispatcher::new(definition)));

        let response = handler
            .oneshot(RpcRequest::new(
                CallContext::new("Svc", "/svc", SessionProtocol::Http, ProtocolKind::Binary),
                HeaderMap::new(),
                Call::new("answer", 9, Struct::new()),
            ))
            .await
            .unwrap();

        let reply = response.reply.unwrap();
        assert_eq!(reply.header.sequence_id, 9);
        assert_eq!(reply.body, ReplyBody::Success(Some(Value::I32(42))));
    }
}
