//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! PortBinding (address, HTTP or HTTPS, optional TLS context)
//!     → binding.rs (session protocol, bound/active port descriptors)
//!     → tls.rs (PEM loading, rustls crypto provider)
//!     → Hand off to the HTTP layer (one axum-server per port)
//! ```
//!
//! # Design Decisions
//! - Bindings are static configuration consumed at startup
//! - Every HTTPS port owns its TLS context; a server-wide default fills gaps
//! - Port 0 binds an ephemeral port, reported back through `ActivePort`

pub mod binding;
pub mod tls;

pub use binding::{ActivePort, PortBinding, SessionProtocol};
