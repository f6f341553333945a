//! Thrift-over-HTTP bridge library.

// Wire format
pub mod protocol;

// Dispatch core
pub mod decorator;
pub mod service;

// Transport
pub mod http;
pub mod net;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

// Clients and demo services
pub mod client;
pub mod services;

pub use config::GatewayConfig;
pub use http::{RunningServer, Server, ServerBuilder};
pub use lifecycle::Shutdown;
pub use service::{Responder, ServiceDefinition};
