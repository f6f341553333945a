//! Builds a [`RequestLog`] and [`ResponseLog`] for every call and hands them
//! to a [`MessageLogConsumer`].
//!
//! The request log is emitted before the inner handler runs and the response
//! log after it completes, so a consumer always sees a call's request first.
//! Consumer errors are logged and never affect the call.

use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{BoxError, Layer, Service};

use crate::observability::message_log::{RequestLog, ResponseLog};
use crate::service::{FailureCause, RpcRequest, RpcResponse};

/// Receives message logs. Implementations must not block.
pub trait MessageLogConsumer: Send + Sync + 'static {
    fn on_request(&self, log: RequestLog) -> Result<(), BoxError>;

    fn on_response(&self, log: ResponseLog) -> Result<(), BoxError>;
}

impl<C: MessageLogConsumer> MessageLogConsumer for Arc<C> {
    fn on_request(&self, log: RequestLog) -> Result<(), BoxError> {
        (**self).on_request(log)
    }

    fn on_response(&self, log: ResponseLog) -> Result<(), BoxError> {
        (**self).on_response(log)
    }
}

pub struct LogCollectingLayer<C> {
    consumer: Arc<C>,
}

impl<C> LogCollectingLayer<C> {
    pub fn new(consumer: C) -> Self {
        Self {
            consumer: Arc::new(consumer),
        }
    }
}

impl<C> Clone for LogCollectingLayer<C> {
    fn clone(&self) -> Self {
        Self {
            consumer: self.consumer.clone(),
        }
    }
}

impl<S, C> Layer<S> for LogCollectingLayer<C> {
    type Service = LogCollectingService<S, C>;

    fn layer(&self, inner: S) -> Self::Service {
        LogCollectingService {
            inner,
            consumer: self.consumer.clone(),
        }
    }
}

pub struct LogCollectingService<S, C> {
    inner: S,
    consumer: Arc<C>,
}

impl<S: Clone, C> Clone for LogCollectingService<S, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            consumer: self.consumer.clone(),
        }
    }
}

impl<S, C> Service<RpcRequest> for LogCollectingService<S, C>
where
    S: Service<RpcRequest, Response = RpcResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
    C: MessageLogConsumer,
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
        let consumer = self.consumer.clone();

        Box::pin(async move {
            let id = req.ctx.id();
            let protocol = req.ctx.protocol();
            let header = req.call.header.clone();
            let oneway = req.oneway;

            if let Err(error) = consumer.on_request(RequestLog::from_request(&req)) {
                tracing::warn!(request_id = %id, error = %error, "Request log consumer failed");
            }

            let result = inner.call(req).await;

            let log = match &result {
                Ok(response) => ResponseLog::from_response(id, response),
                Err(error) => {
                    let cause: FailureCause = Arc::new(ChainError(error.to_string()));
                    let response = RpcResponse::internal_error(protocol, &header, oneway, cause);
                    ResponseLog::from_response(id, &response)
                }
            };
            if let Err(error) = consumer.on_response(log) {
                tracing::warn!(request_id = %id, error = %error, "Response log consumer failed");
            }

            result
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ChainError(String);

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::http::{HeaderMap, HeaderValue};
    use tower::ServiceExt;

    use super::*;
    use crate::decorator::Decorators;
    use crate::net::SessionProtocol;
    use crate::observability::message_log::RpcResult;
    use crate::observability::LogSink;
    use crate::protocol::{Call, MessageType, ProtocolKind, Struct, Value};
    use crate::service::{CallContext, Dispatcher, RpcHandler, ServiceDefinition};

    fn handler(decorators: &Decorators) -> RpcHandler {
        let definition = ServiceDefinition::builder("HelloService")
            .method("hello", |_ctx, args, responder| {
                let name = args.field(1).and_then(Value::as_str).unwrap_or_default();
                responder.success(format!("Hello, {name}!"));
            })
            .method("fail", |_ctx, args, responder| {
                let name = args.field(1).and_then(Value::as_str).unwrap_or_default();
                responder.fail(std::io::Error::other(name.to_string()));
            })
            .build();
        decorators.apply(RpcHandler::new(Dispatcher::new(definition)))
    }

    fn request(method: &str) -> RpcRequest {
        let mut headers = HeaderMap::new();
        headers.insert("x-test", HeaderValue::from_static("yes"));
        RpcRequest::new(
            CallContext::new("HelloService", "/hello", SessionProtocol::Http, ProtocolKind::Binary),
            headers,
            Call::new(method, 1, Struct::new().with(1, "Trustin")),
        )
    }

    #[tokio::test]
    async fn records_request_then_response() {
        let sink = LogSink::default();
        let mut decorators = Decorators::new();
        decorators.push(LogCollectingLayer::new(sink.clone()));

        let req = request("hello");
        let id = req.ctx.id();
        handler(&decorators).oneshot(req).await.unwrap();

        let request_log = sink.try_take_request().unwrap();
        assert_eq!(request_log.id(), id);
        assert_eq!(request_log.headers().unwrap().get("x-test").unwrap(), "yes");

        let response_log = sink.try_take_response().unwrap();
        assert_eq!(response_log.id(), id);
        assert_eq!(
            response_log.result().unwrap(),
            &RpcResult::Success(Some(Value::string("Hello, Trustin!")))
        );
        assert_eq!(
            response_log.raw_reply().unwrap().header.message_type,
            MessageType::Reply
        );
    }

    #[tokio::test]
    async fn failure_is_logged_with_exception_reply() {
        let sink = LogSink::default();
        let mut decorators = Decorators::new();
        decorators.push(LogCollectingLayer::new(sink.clone()));

        handler(&decorators).oneshot(request("fail")).await.unwrap();

        let request_log = sink.try_take_request().unwrap();
        let args = &request_log.invocation().unwrap().args;
        assert_eq!(args.field(1).and_then(Value::as_str), Some("Trustin"));

        let response_log = sink.try_take_response().unwrap();
        assert_eq!(
            response_log.raw_reply().unwrap().header.message_type,
            MessageType::Exception
        );
        assert!(matches!(
            response_log.result().unwrap(),
            RpcResult::Failed { detail } if detail == "Trustin"
        ));
    }

    #[tokio::test]
    async fn chain_error_log_follows_the_oneway_rule() {
        let sink = LogSink::default();
        let layer = LogCollectingLayer::new(sink.clone());
        let failing = tower::service_fn(|_req: RpcRequest| async {
            Err::<RpcResponse, BoxError>("chain broke".into())
        });

        let two_way = request("hello");
        assert!(layer.layer(failing.clone()).oneshot(two_way).await.is_err());
        let log = sink.try_take_response().unwrap();
        assert_eq!(log.raw_reply().unwrap().header.message_type, MessageType::Exception);

        let mut registered_oneway = request("hello");
        registered_oneway.oneway = true;
        assert!(layer.layer(failing).oneshot(registered_oneway).await.is_err());
        let log = sink.try_take_response().unwrap();
        assert!(!log.has_attr(ResponseLog::RAW_RPC_RESPONSE));
        assert!(matches!(
            log.result().unwrap(),
            RpcResult::Failed { detail } if detail == "chain broke"
        ));
    }

    struct Order(Mutex<Vec<&'static str>>);

    impl MessageLogConsumer for Order {
        fn on_request(&self, _log: RequestLog) -> Result<(), BoxError> {
            self.0.lock().unwrap().push("request");
            Err("consumer is unhappy".into())
        }

        fn on_response(&self, _log: ResponseLog) -> Result<(), BoxError> {
            self.0.lock().unwrap().push("response");
            Ok(())
        }
    }

    #[tokio::test]
    async fn consumer_errors_do_not_affect_the_call() {
        let order = Arc::new(Order(Mutex::new(Vec::new())));
        let mut decorators = Decorators::new();
        decorators.push(LogCollectingLayer::new(order.clone()));

        let response = handler(&decorators).oneshot(request("hello")).await.unwrap();
        assert!(!response.reply.unwrap().is_exception());
        assert_eq!(*order.0.lock().unwrap(), vec!["request", "response"]);
    }
}
