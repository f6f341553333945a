//! Per-call context.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::net::SessionProtocol;
use crate::protocol::ProtocolKind;

/// Identity and environment of a single call, shared by every decorator and
/// the handler. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CallContext {
    inner: Arc<ContextInner>,
}

#[derive(Debug)]
struct ContextInner {
    id: Uuid,
    service: String,
    path: String,
    session_protocol: SessionProtocol,
    protocol: ProtocolKind,
    remote_addr: Option<SocketAddr>,
    started: Instant,
}

impl CallContext {
    pub fn new(
        service: impl Into<String>,
        path: impl Into<String>,
        session_protocol: SessionProtocol,
        protocol: ProtocolKind,
    ) -> Self {
        Self::with_id(Uuid::new_v4(), service, path, session_protocol, protocol, None)
    }

    pub fn with_id(
        id: Uuid,
        service: impl Into<String>,
        path: impl Into<String>,
        session_protocol: SessionProtocol,
        protocol: ProtocolKind,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id,
                service: service.into(),
                path: path.into(),
                session_protocol,
                protocol,
                remote_addr,
                started: Instant::now(),
            }),
        }
    }

    /// Correlation id; taken from `x-request-id` when the client sent a UUID.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn session_protocol(&self) -> SessionProtocol {
        self.inner.session_protocol
    }

    /// Envelope encoding negotiated for this call.
    pub fn protocol(&self) -> ProtocolKind {
        self.inner.protocol
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.inner.remote_addr
    }

    pub fn started(&self) -> Instant {
        self.inner.started
    }

    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }
}
