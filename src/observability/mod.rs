//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every call produces:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters and histograms)
//!     → message_log.rs (RequestLog / ResponseLog, via LogCollectingLayer)
//!
//! Consumers:
//!     → stdout (fmt or JSON)
//!     → Prometheus scrape endpoint
//!     → sink.rs (LogSink queues drained by tests or monitors)
//! ```
//!
//! # Design Decisions
//! - Request ID (UUID v4) keys every log line and message log
//! - Message logs use a closed attribute set with typed values
//! - Failure detail is observable locally but never serialized

pub mod logging;
pub mod message_log;
pub mod metrics;
pub mod sink;

pub use message_log::{
    Attribute, AttributeValue, LogError, RequestLog, ResponseLog, RpcInvocation, RpcResult,
};
pub use sink::{LogSink, SinkConfig};
