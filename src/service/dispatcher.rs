//! The innermost handler: resolves the method and turns the handler's single
//! outcome into a reply.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{BoxError, Service};

use crate::protocol::{ApplicationError, ApplicationErrorKind, Reply};
use crate::service::binding::{panic_message, Panicked};
use crate::service::definition::ServiceDefinition;
use crate::service::responder::{Outcome, Responder};
use crate::service::{FailureCause, RpcRequest, RpcResponse, INTERNAL_ERROR_MESSAGE};

#[derive(Debug, Clone)]
pub struct Dispatcher {
    service: Arc<ServiceDefinition>,
}

impl Dispatcher {
    pub fn new(service: ServiceDefinition) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> &ServiceDefinition {
        &self.service
    }

    /// Run one call to completion. Never fails: every outcome is a response.
    ///
    /// A reply is suppressed when the envelope is ONEWAY or the method was
    /// registered as oneway.
    pub async fn invoke(&self, request: RpcRequest) -> RpcResponse {
        let RpcRequest { ctx, call, .. } = request;
        let protocol = ctx.protocol();

        let Some(method) = self.service.method(call.method()) else {
            tracing::warn!(
                request_id = %ctx.id(),
                service = %self.service.name(),
                method = %call.method(),
                "Unknown method"
            );
            let reply = (!call.is_oneway()).then(|| {
                Reply::application_error(
                    &call.header,
                    ApplicationError::new(
                        ApplicationErrorKind::UnknownMethod,
                        format!("unknown method: {}", call.method()),
                    ),
                )
            });
            let mut response = RpcResponse::new(protocol, reply);
            response.method_resolved = false;
            return response;
        };

        let no_reply = call.is_oneway() || method.is_oneway();
        let header = call.header;

        let (responder, outcome) = Responder::channel();
        let invoked = panic::catch_unwind(AssertUnwindSafe(|| {
            method.invoke(ctx.clone(), call.args, responder)
        }));

        let outcome = match invoked {
            Ok(()) => outcome.await.unwrap_or_else(|_| {
                Outcome::Failed("handler dropped its responder without completing".into())
            }),
            Err(payload) => Outcome::Failed(Box::new(Panicked(panic_message(payload.as_ref())))),
        };

        let (reply, cause) = match outcome {
            Outcome::Success(value) => (Reply::success(&header, value), None),
            Outcome::Declared {
                field_id,
                exception,
            } => (Reply::declared(&header, field_id, exception), None),
            Outcome::Rejected(error) => (Reply::application_error(&header, error), None),
            Outcome::Failed(error) => {
                tracing::warn!(
                    request_id = %ctx.id(),
                    service = %self.service.name(),
                    method = %header.name,
                    error = %error,
                    "Handler failed"
                );
                let cause: FailureCause = Arc::from(error);
                let reply = Reply::application_error(
                    &header,
                    ApplicationError::new(
                        ApplicationErrorKind::InternalError,
                        INTERNAL_ERROR_MESSAGE,
                    ),
                );
                (reply, Some(cause))
            }
        };

        let mut response = RpcResponse::new(protocol, (!no_reply).then_some(reply));
        response.cause = cause;
        response
    }
}

impl Service<RpcRequest> for Dispatcher {
    type Response = RpcResponse;
    type Error = BoxError;
    type Future = BoxFuture<'static, Result<RpcResponse, BoxError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RpcRequest) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.invoke(request).await) })
    }
}
