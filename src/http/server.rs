//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Collect ports, TLS contexts, services and decorators (ServerBuilder)
//! - Create the Axum Router with one exact POST route per service
//! - Wire up middleware (tracing, request ID, timeout, body limit)
//! - Keep a client request id only when it is a UUID
//! - Bind every port and serve the same router on each (Server::start)
//! - Graceful shutdown of all ports together (RunningServer::stop)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::post;
use axum::{Extension, Router};
use axum_server::tls_rustls::RustlsConfig;
use axum_server::Handle;
use thiserror::Error;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinHandle;
use tower::{BoxError, Layer, Service};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::decorator::Decorators;
use crate::http::handler::{self, RpcState};
use crate::net::tls::install_crypto_provider;
use crate::net::{ActivePort, PortBinding, SessionProtocol};
use crate::service::{RpcHandler, RpcRequest, RpcResponse, ServiceBinding, ServiceDefinition};

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("no ports configured")]
    NoPorts,

    #[error("no services registered")]
    NoServices,

    #[error("https port {0} has no TLS context and no default was set")]
    MissingTls(SocketAddr),

    #[error("invalid service path {0:?}: must be an absolute path without wildcards")]
    InvalidPath(String),

    #[error("a service is already bound at {0}")]
    DuplicatePath(String),
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("listener on {addr} failed: {source}")]
    Serve {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("listener task on {addr} panicked")]
    Task { addr: SocketAddr },
}

/// Collects everything a server needs. Nothing is bound until `start`.
pub struct ServerBuilder {
    ports: Vec<PortBinding>,
    default_tls: Option<RustlsConfig>,
    services: Vec<(String, ServiceDefinition)>,
    decorators: Decorators,
    allow_path_override: bool,
    request_timeout: Duration,
    max_body_size: usize,
    max_concurrent_requests: usize,
    shutdown_grace: Duration,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self {
            ports: Vec::new(),
            default_tls: None,
            services: Vec::new(),
            decorators: Decorators::new(),
            allow_path_override: false,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
            max_concurrent_requests: 1024,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen on `addr`. HTTPS ports use the default TLS context.
    pub fn port(mut self, addr: SocketAddr, protocol: SessionProtocol) -> Self {
        self.ports.push(match protocol {
            SessionProtocol::Http => PortBinding::http(addr),
            SessionProtocol::Https => PortBinding::https(addr, None),
        });
        self
    }

    /// Listen for HTTPS on `addr` with its own TLS context.
    pub fn port_with_tls(mut self, addr: SocketAddr, tls: RustlsConfig) -> Self {
        self.ports.push(PortBinding::https(addr, Some(tls)));
        self
    }

    /// TLS context for HTTPS ports that were not given one.
    pub fn tls(mut self, tls: RustlsConfig) -> Self {
        self.default_tls = Some(tls);
        self
    }

    pub fn service_at(mut self, path: impl Into<String>, service: ServiceDefinition) -> Self {
        self.services.push((path.into(), service));
        self
    }

    /// Add a decorator around every service. The first one added is innermost.
    pub fn decorator<L>(mut self, layer: L) -> Self
    where
        L: Layer<RpcHandler> + Send + Sync + 'static,
        L::Service: Service<RpcRequest, Response = RpcResponse, Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        <L::Service as Service<RpcRequest>>::Future: Send + 'static,
    {
        self.decorators.push(layer);
        self
    }

    /// Let a later `service_at` replace an earlier one at the same path.
    pub fn allow_path_override(mut self, allow: bool) -> Self {
        self.allow_path_override = allow;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }

    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit;
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn build(self) -> Result<Server, BuildError> {
        if self.ports.is_empty() {
            return Err(BuildError::NoPorts);
        }
        if self.services.is_empty() {
            return Err(BuildError::NoServices);
        }
        if let Some(port) = self
            .ports
            .iter()
            .find(|p| p.protocol.is_tls() && p.tls.is_none() && self.default_tls.is_none())
        {
            return Err(BuildError::MissingTls(port.addr));
        }

        let mut bindings: Vec<ServiceBinding> = Vec::with_capacity(self.services.len());
        for (path, definition) in self.services {
            if !is_valid_path(&path) {
                return Err(BuildError::InvalidPath(path));
            }
            let binding = ServiceBinding::new(path, definition, &self.decorators);
            match bindings.iter().position(|b| b.path() == binding.path()) {
                Some(index) if self.allow_path_override => {
                    tracing::warn!(
                        path = %binding.path(),
                        replaced = %bindings[index].service_name(),
                        service = %binding.service_name(),
                        "Path registered twice; keeping the later service"
                    );
                    bindings[index] = binding;
                }
                Some(_) => return Err(BuildError::DuplicatePath(binding.path().to_string())),
                None => bindings.push(binding),
            }
        }

        let limiter = Arc::new(Semaphore::new(
            self.max_concurrent_requests.min(Semaphore::MAX_PERMITS),
        ));
        let router = build_router(
            &bindings,
            limiter.clone(),
            self.request_timeout,
            self.max_body_size,
        );

        Ok(Server {
            router,
            ports: self.ports,
            default_tls: self.default_tls,
            paths: bindings.iter().map(|b| b.path().to_string()).collect(),
            limiter,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// Exact paths only: axum treats `{..}`, `*` and legacy `:` segments as
/// captures and panics on the latter.
fn is_valid_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}', '*', '?', '#'])
        && !path.split('/').any(|segment| segment.starts_with(':'))
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
fn build_router(
    bindings: &[ServiceBinding],
    limiter: Arc<Semaphore>,
    request_timeout: Duration,
    max_body_size: usize,
) -> Router {
    let mut router = Router::new();
    for binding in bindings {
        let state = RpcState {
            binding: binding.clone(),
            limiter: limiter.clone(),
        };
        router = router.route(binding.path(), post(handler::rpc).with_state(state));
    }

    router
        .fallback(handler::unknown_path)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_body_size))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(middleware::map_request(handler::normalize_request_id))
        .layer(TraceLayer::new_for_http())
}

/// A fully built server. Immutable; `start` binds the ports.
pub struct Server {
    router: Router,
    ports: Vec<PortBinding>,
    default_tls: Option<RustlsConfig>,
    paths: Vec<String>,
    limiter: Arc<Semaphore>,
    shutdown_grace: Duration,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Paths with a bound service, in registration order.
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Bind every port and start serving.
    ///
    /// If any port fails to bind, the ports already started are shut down.
    pub async fn start(self) -> Result<RunningServer, ServerError> {
        install_crypto_provider();

        let mut running = RunningServer {
            ports: Vec::with_capacity(self.ports.len()),
            listeners: Vec::with_capacity(self.ports.len()),
            limiter: self.limiter.clone(),
            shutdown_grace: self.shutdown_grace,
        };

        for port in &self.ports {
            match self.serve_port(port) {
                Ok((active, listener)) => {
                    tracing::info!(
                        address = %active.local_addr,
                        protocol = %active.protocol,
                        services = self.paths.len(),
                        "Listening for connections"
                    );
                    running.ports.push(active);
                    running.listeners.push(listener);
                }
                Err(e) => {
                    let _ = running.stop().await;
                    return Err(e);
                }
            }
        }

        Ok(running)
    }

    fn serve_port(&self, port: &PortBinding) -> Result<(ActivePort, Listener), ServerError> {
        let bind_err = |source| ServerError::Bind {
            addr: port.addr,
            source,
        };
        let listener = std::net::TcpListener::bind(port.addr).map_err(bind_err)?;
        listener.set_nonblocking(true).map_err(bind_err)?;
        let local_addr = listener.local_addr().map_err(bind_err)?;

        let app = self
            .router
            .clone()
            .layer(Extension(port.protocol))
            .into_make_service_with_connect_info::<SocketAddr>();
        let handle = Handle::new();

        let task = match port.protocol {
            SessionProtocol::Http => {
                let server = axum_server::from_tcp(listener).handle(handle.clone());
                tokio::spawn(async move { server.serve(app).await })
            }
            SessionProtocol::Https => {
                // Checked in build.
                let Some(tls) = port.tls.clone().or_else(|| self.default_tls.clone()) else {
                    return Err(bind_err(std::io::Error::other("missing TLS context")));
                };
                let server =
                    axum_server::tls_rustls::from_tcp_rustls(listener, tls).handle(handle.clone());
                tokio::spawn(async move { server.serve(app).await })
            }
        };

        let active = ActivePort {
            protocol: port.protocol,
            local_addr,
        };
        Ok((
            active,
            Listener {
                addr: local_addr,
                handle,
                task,
            },
        ))
    }
}

struct Listener {
    addr: SocketAddr,
    handle: Handle,
    task: JoinHandle<std::io::Result<()>>,
}

/// A server that is accepting connections on every configured port.
pub struct RunningServer {
    ports: Vec<ActivePort>,
    listeners: Vec<Listener>,
    limiter: Arc<Semaphore>,
    shutdown_grace: Duration,
}

impl RunningServer {
    pub fn active_ports(&self) -> &[ActivePort] {
        &self.ports
    }

    /// Local address of the first port speaking `protocol`.
    pub fn port(&self, protocol: SessionProtocol) -> Option<SocketAddr> {
        self.ports
            .iter()
            .find(|p| p.protocol == protocol)
            .map(|p| p.local_addr)
    }

    /// Stop accepting, let in-flight requests drain, then close every port.
    pub async fn stop(self) -> Result<(), ServerError> {
        self.limiter.close();
        for listener in &self.listeners {
            listener.handle.graceful_shutdown(Some(self.shutdown_grace));
        }

        let mut first_error = None;
        for listener in self.listeners {
            let result = match listener.task.await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(source)) => Err(ServerError::Serve {
                    addr: listener.addr,
                    source,
                }),
                Err(_) => Err(ServerError::Task {
                    addr: listener.addr,
                }),
            };
            if let Err(e) = result {
                tracing::error!(address = %listener.addr, error = %e, "Listener stopped with error");
                first_error.get_or_insert(e);
            }
        }

        tracing::info!("HTTP server stopped");
        first_error.map_or(Ok(()), Err)
    }

    /// Serve until `shutdown` fires, then stop gracefully.
    pub async fn run_until(self, mut shutdown: broadcast::Receiver<()>) -> Result<(), ServerError> {
        let _ = shutdown.recv().await;
        tracing::info!("Shutdown signal received");
        self.stop().await
    }
}
