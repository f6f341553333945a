//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use thrift_http::client::RpcClient;
use thrift_http::decorator::{LogCollectingLayer, LoggingLayer};
use thrift_http::net::tls::tls_config_from_pem;
use thrift_http::net::SessionProtocol;
use thrift_http::observability::{LogSink, SinkConfig};
use thrift_http::protocol::ProtocolKind;
use thrift_http::service::ServiceDefinition;
use thrift_http::services::{demo_services, hello_service, HelloHandler};
use thrift_http::{RunningServer, Server, ServerBuilder};
use tokio::sync::mpsc;

/// A server on ephemeral HTTP and HTTPS ports with the demo services,
/// a oneway `/notify` service and a log sink that starts disabled.
pub struct TestServer {
    running: RunningServer,
    pub sink: LogSink,
    pub notifications: mpsc::UnboundedReceiver<String>,
    pub client: reqwest::Client,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(|builder| builder).await
    }

    pub async fn start_with(configure: impl FnOnce(ServerBuilder) -> ServerBuilder) -> Self {
        let certified =
            rcgen::generate_simple_self_signed(vec!["127.0.0.1".to_string()]).unwrap();
        let tls = tls_config_from_pem(
            certified.cert.pem().into_bytes(),
            certified.key_pair.serialize_pem().into_bytes(),
        )
        .await
        .unwrap();

        let sink = LogSink::new(SinkConfig { enabled: false });
        let (tx, notifications) = mpsc::unbounded_channel();
        let local = SocketAddr::from(([127, 0, 0, 1], 0));

        let mut builder = Server::builder()
            .port(local, SessionProtocol::Http)
            .port(local, SessionProtocol::Https)
            .tls(tls)
            .decorator(LoggingLayer::new())
            .decorator(LogCollectingLayer::new(sink.clone()))
            .allow_path_override(true);
        for (path, service) in demo_services() {
            builder = builder.service_at(path, service);
        }
        builder = builder
            // Registered twice on purpose; the later one wins.
            .service_at(
                "/hellochild",
                hello_service(HelloHandler::with_greeting(|name| format!("Goodbye, {name}!"))),
            )
            .service_at("/notify", notify_service(tx));

        let running = configure(builder).build().unwrap().start().await.unwrap();

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .no_proxy()
            .build()
            .unwrap();

        Self {
            running,
            sink,
            notifications,
            client,
        }
    }

    pub fn addr(&self, protocol: SessionProtocol) -> SocketAddr {
        self.running.port(protocol).unwrap()
    }

    pub fn url(&self, protocol: SessionProtocol, path: &str) -> String {
        format!("{}://{}{}", protocol.scheme(), self.addr(protocol), path)
    }

    pub fn rpc(&self, protocol: SessionProtocol, path: &str) -> RpcClient {
        RpcClient::with_client(self.client.clone(), self.url(protocol, path))
    }

    pub fn rpc_with(&self, protocol: SessionProtocol, path: &str, kind: ProtocolKind) -> RpcClient {
        self.rpc(protocol, path).protocol(kind)
    }

    pub fn running(&self) -> &RunningServer {
        &self.running
    }

    pub async fn stop(self) {
        self.running.stop().await.unwrap();
    }
}

fn notify_service(tx: mpsc::UnboundedSender<String>) -> ServiceDefinition {
    ServiceDefinition::builder("NotifyService")
        .oneway_method("notify", move |_ctx, args, responder| {
            let message = args
                .field(1)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let _ = tx.send(message);
            responder.success_void();
        })
        .build()
}
