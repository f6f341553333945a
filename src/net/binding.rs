//! Port bindings and session protocols.

use std::net::SocketAddr;

use axum_server::tls_rustls::RustlsConfig;
use serde::{Deserialize, Serialize};

/// Transport protocol spoken on a listening port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionProtocol {
    #[default]
    Http,
    Https,
}

impl SessionProtocol {
    pub fn scheme(self) -> &'static str {
        match self {
            SessionProtocol::Http => "http",
            SessionProtocol::Https => "https",
        }
    }

    pub fn is_tls(self) -> bool {
        self == SessionProtocol::Https
    }
}

impl std::fmt::Display for SessionProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.scheme())
    }
}

/// A port to listen on. Created at startup, lives until shutdown.
#[derive(Clone)]
pub struct PortBinding {
    pub addr: SocketAddr,
    pub protocol: SessionProtocol,
    /// Port-specific TLS context; HTTPS ports without one use the server default.
    pub tls: Option<RustlsConfig>,
}

impl PortBinding {
    pub fn http(addr: SocketAddr) -> Self {
        Self {
            addr,
            protocol: SessionProtocol::Http,
            tls: None,
        }
    }

    pub fn https(addr: SocketAddr, tls: Option<RustlsConfig>) -> Self {
        Self {
            addr,
            protocol: SessionProtocol::Https,
            tls,
        }
    }
}

impl std::fmt::Debug for PortBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortBinding")
            .field("addr", &self.addr)
            .field("protocol", &self.protocol)
            .field("tls", &self.tls.is_some())
            .finish()
    }
}

/// A port that is actually accepting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivePort {
    pub protocol: SessionProtocol,
    pub local_addr: SocketAddr,
}
