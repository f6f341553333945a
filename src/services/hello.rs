//! `HelloService { string hello(1: string name) }`.

use std::sync::Arc;

use crate::client::{unexpected, ClientError, RpcClient};
use crate::protocol::{ApplicationErrorKind, Struct, Value};
use crate::service::{Responder, ServiceDefinition};

pub const SERVICE_NAME: &str = "HelloService";

/// The capability set. Closures taking `(name, responder)` implement it.
pub trait HelloService: Send + Sync + 'static {
    fn hello(&self, name: String, responder: Responder);
}

impl<F> HelloService for F
where
    F: Fn(String, Responder) + Send + Sync + 'static,
{
    fn hello(&self, name: String, responder: Responder) {
        self(name, responder)
    }
}

/// Expose `service` as a method table.
pub fn hello_service<S: HelloService>(service: S) -> ServiceDefinition {
    let service = Arc::new(service);
    ServiceDefinition::builder(SERVICE_NAME)
        .method("hello", move |_ctx, args, responder| {
            match args.field(1).and_then(Value::as_str) {
                Some(name) => service.hello(name.to_string(), responder),
                None => responder.reject(
                    ApplicationErrorKind::ProtocolError,
                    "hello: missing required argument 'name'",
                ),
            }
        })
        .build()
}

pub type Greeting = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Default implementation: completes immediately with a greeting.
///
/// The greeting step is a strategy; swapping it changes only the text.
#[derive(Clone)]
pub struct HelloHandler {
    greeting: Greeting,
}

impl HelloHandler {
    pub fn new() -> Self {
        Self::with_greeting(|name| format!("Hello, {name}!"))
    }

    pub fn with_greeting<G>(greeting: G) -> Self
    where
        G: Fn(&str) -> String + Send + Sync + 'static,
    {
        Self {
            greeting: Arc::new(greeting),
        }
    }

    pub fn greet(&self, name: &str) -> String {
        (self.greeting)(name)
    }
}

impl Default for HelloHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl HelloService for HelloHandler {
    fn hello(&self, name: String, responder: Responder) {
        responder.success(self.greet(&name));
    }
}

/// Typed client for `HelloService`.
#[derive(Debug, Clone)]
pub struct HelloClient {
    rpc: RpcClient,
}

impl HelloClient {
    pub fn new(rpc: RpcClient) -> Self {
        Self { rpc }
    }

    pub async fn hello(&self, name: &str) -> Result<String, ClientError> {
        let result = self.rpc.call("hello", Struct::new().with(1, name)).await?;
        match result.as_ref().and_then(Value::as_str) {
            Some(greeting) => Ok(greeting.to_string()),
            None => Err(unexpected("hello", result.as_ref())),
        }
    }
}
