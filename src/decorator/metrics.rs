//! Per-call counters and latency histograms.

use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tower::{BoxError, Layer, Service};

use crate::decorator::outcome_label;
use crate::observability::metrics::record_call;
use crate::service::{RpcRequest, RpcResponse};

/// Label recorded for calls to methods the service does not define.
pub const UNKNOWN_METHOD_LABEL: &str = "unknown";

/// Method names come from the client, so only resolved ones become labels.
fn method_label<'a>(method: &'a str, result: &Result<RpcResponse, BoxError>) -> &'a str {
    match result {
        Ok(response) if !response.method_resolved => UNKNOWN_METHOD_LABEL,
        _ => method,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl MetricsLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = MetricsService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        MetricsService { inner }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
    inner: S,
}

impl<S> Service<RpcRequest> for MetricsService<S>
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
            let result = inner.call(req).await;
            let outcome = match &result {
                Ok(response) => outcome_label(response),
                Err(_) => "failure",
            };
            record_call(ctx.service(), method_label(&method, &result), outcome, ctx.elapsed());
            result
        })
    }
}
