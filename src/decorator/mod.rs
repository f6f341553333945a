//! Decorator chain around the dispatcher.
//!
//! # Data Flow
//! ```text
//! push(layer 1), push(layer 2), ..., push(layer N)
//!
//! call:  N pre → ... → 1 pre → Dispatcher → 1 post → ... → N post
//! ```
//!
//! # Design Decisions
//! - Any `tower::Layer` over `RpcHandler` is a decorator
//! - The chain is composed once per service at build time, never per call
//! - First registered is innermost
//! - Decorator errors and panics are turned into `INTERNAL_ERROR` replies by
//!   `ServiceBinding`, so they never escape a call

pub mod collect;
pub mod logging;
pub mod metrics;

use std::sync::Arc;

use tower::util::BoxCloneSyncService;
use tower::{BoxError, Layer, Service};

use crate::protocol::ReplyBody;
use crate::service::{RpcHandler, RpcRequest, RpcResponse};

pub use collect::{LogCollectingLayer, MessageLogConsumer};
pub use logging::LoggingLayer;
pub use metrics::MetricsLayer;

type Wrap = Arc<dyn Fn(RpcHandler) -> RpcHandler + Send + Sync>;

/// Ordered list of decorators. Holds no per-call state.
#[derive(Clone, Default)]
pub struct Decorators {
    wraps: Vec<Wrap>,
}

impl Decorators {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<L>(&mut self, layer: L) -> &mut Self
    where
        L: Layer<RpcHandler> + Send + Sync + 'static,
        L::Service: Service<RpcRequest, Response = RpcResponse, Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<RpcRequest>>::Future: Send + 'static,
    {
        self.wraps
            .push(Arc::new(move |inner| BoxCloneSyncService::new(layer.layer(inner))));
        self
    }

    pub fn len(&self) -> usize {
        self.wraps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wraps.is_empty()
    }

    /// Wrap `handler` with every decorator, first registered innermost.
    pub fn apply(&self, handler: RpcHandler) -> RpcHandler {
        self.wraps.iter().fold(handler, |inner, wrap| wrap(inner))
    }
}

impl std::fmt::Debug for Decorators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decorators")
            .field("len", &self.wraps.len())
            .finish()
    }
}

/// Label for logs and metrics.
pub fn outcome_label(response: &RpcResponse) -> &'static str {
    if response.cause.is_some() {
        return "failure";
    }
    match response.reply.as_ref().map(|reply| &reply.body) {
        None => "oneway",
        Some(ReplyBody::Success(_)) => "success",
        Some(ReplyBody::Declared { .. }) => "declared_exception",
        Some(ReplyBody::ApplicationError(_)) => "application_error",
    }
}
