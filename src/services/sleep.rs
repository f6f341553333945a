//! `SleepService { i64 sleep(1: i64 milliseconds) }`.
//!
//! Completes from a timer task, exercising deferred completion.

use std::sync::Arc;
use std::time::Duration;

use crate::client::{unexpected, ClientError, RpcClient};
use crate::protocol::{ApplicationErrorKind, Struct, Value};
use crate::service::{Responder, ServiceDefinition};

pub const SERVICE_NAME: &str = "SleepService";

pub trait SleepService: Send + Sync + 'static {
    fn sleep(&self, milliseconds: i64, responder: Responder);
}

impl<F> SleepService for F
where
    F: Fn(i64, Responder) + Send + Sync + 'static,
{
    fn sleep(&self, milliseconds: i64, responder: Responder) {
        self(milliseconds, responder)
    }
}

/// Replies with the requested delay once it has elapsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerSleep;

impl SleepService for TimerSleep {
    fn sleep(&self, milliseconds: i64, responder: Responder) {
        let delay = Duration::from_millis(milliseconds.max(0) as u64);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            responder.success(milliseconds);
        });
    }
}

pub fn sleep_service<S: SleepService>(service: S) -> ServiceDefinition {
    let service = Arc::new(service);
    ServiceDefinition::builder(SERVICE_NAME)
        .method("sleep", move |_ctx, args, responder| {
            match args.field(1).and_then(Value::as_i64) {
                Some(ms) => service.sleep(ms, responder),
                None => responder.reject(
                    ApplicationErrorKind::ProtocolError,
                    "sleep: missing required argument 'milliseconds'",
                ),
            }
        })
        .build()
}

#[derive(Debug, Clone)]
pub struct SleepClient {
    rpc: RpcClient,
}

impl SleepClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn sleep(&self, milliseconds: i64) -> Result<i64, ClientError> {
        let result = self
            .rpc
            .call("sleep", Struct::new().with(1, milliseconds))
            .await?;
        match result.as_ref().and_then(Value::as_i64) {
            Some(ms) => Ok(ms),
            None => Err(unexpected("sleep", result.as_ref())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use axum::http::HeaderMap;

    use super::*;
    use crate::net::SessionProtocol;
    use crate::protocol::{Call, ProtocolKind, ReplyBody};
    use crate::service::{CallContext, Dispatcher, RpcRequest};

    #[tokio::test]
    async fn completes_after_the_delay() {
        let started = Instant::now();
        let response = Dispatcher::new(sleep_service(TimerSleep))
            .invoke(RpcRequest::new(
                CallContext::new(SERVICE_NAME, "/sleep", SessionProtocol::Http, ProtocolKind::Binary),
                HeaderMap::new(),
                Call::new("sleep", 1, Struct::new().with(1, 50i64)),
            ))
            .await;

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(
            response.reply.unwrap().body,
            ReplyBody::Success(Some(Value::I64(50)))
        );
    }
}
