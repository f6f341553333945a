//! Demo services served by the `thrift-http` binary and the integration tests.
//!
//! ```text
//! /hello       HelloHandler (default greeting)
//! /hellochild  HelloHandler with the greeting strategy replaced
//! /exception   fails every call with the caller's name as the cause
//! /sleep       TimerSleep, completes from a timer task
//! ```

pub mod hello;
pub mod sleep;

use crate::service::ServiceDefinition;

pub use hello::{hello_service, HelloClient, HelloHandler, HelloService};
pub use sleep::{sleep_service, SleepClient, SleepService, TimerSleep};

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct NamedFailure(pub String);

/// `(path, service)` pairs for every demo service.
pub fn demo_services() -> Vec<(&'static str, ServiceDefinition)> {
    vec![
        ("/hello", hello_service(HelloHandler::new())),
        (
            "/hellochild",
            hello_service(HelloHandler::with_greeting(|name| format!("Goodbye, {name}!"))),
        ),
        (
            "/exception",
            hello_service(|name: String, responder: crate::service::Responder| {
                responder.fail(NamedFailure(name))
            }),
        ),
        ("/sleep", sleep_service(TimerSleep)),
    ]
}
