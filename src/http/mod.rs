//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection (one listener per PortBinding)
//!     → server.rs (Axum router, tower-http middleware)
//!     → handler.rs (content-type negotiation, body read, permits)
//!     → service::ServiceBinding::dispatch
//!     → 200 with the encoded reply, or an error status for transport faults
//! ```
//!
//! # Design Decisions
//! - Exact path routes only; unknown paths hit the 404 fallback
//! - Non-POST methods get 405 from the method router
//! - RPC failures are always 200 with an EXCEPTION envelope

pub mod handler;
pub mod server;

pub use handler::X_REQUEST_ID;
pub use server::{BuildError, RunningServer, Server, ServerBuilder, ServerError};
