//! End-to-end tests: real sockets, real TLS, reqwest on the client side.

use std::time::{Duration, Instant};

use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use thrift_http::client::ClientError;
use thrift_http::net::SessionProtocol;
use thrift_http::observability::{RequestLog, ResponseLog, RpcResult};
use thrift_http::protocol::{
    self, ApplicationErrorKind, Call, MessageType, ProtocolKind, ReplyBody, Struct, Value,
};
use thrift_http::services::{HelloClient, SleepClient};

mod common;

use common::TestServer;

const LOG_WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_hello_over_http() {
    let server = TestServer::start().await;
    let client = HelloClient::new(server.rpc(SessionProtocol::Http, "/hello"));
    assert_eq!(client.hello("Trustin").await.unwrap(), "Hello, Trustin!");
    server.stop().await;
}

#[tokio::test]
async fn test_hello_over_https() {
    let server = TestServer::start().await;
    let client = HelloClient::new(server.rpc(SessionProtocol::Https, "/hello"));
    assert_eq!(client.hello("Trustin").await.unwrap(), "Hello, Trustin!");
    server.stop().await;
}

#[tokio::test]
async fn test_overridden_greeting() {
    let server = TestServer::start().await;
    for session in [SessionProtocol::Http, SessionProtocol::Https] {
        let client = HelloClient::new(server.rpc(session, "/hellochild"));
        assert_eq!(client.hello("Trustin").await.unwrap(), "Goodbye, Trustin!");
    }
    server.stop().await;
}

#[tokio::test]
async fn test_compact_protocol_matches_binary() {
    let server = TestServer::start().await;
    for session in [SessionProtocol::Http, SessionProtocol::Https] {
        for kind in [ProtocolKind::Binary, ProtocolKind::Compact] {
            let client = HelloClient::new(server.rpc_with(session, "/hello", kind));
            assert_eq!(client.hello("Trustin").await.unwrap(), "Hello, Trustin!");
        }
    }
    server.stop().await;
}

#[tokio::test]
async fn test_exception_is_a_typed_application_error() {
    let server = TestServer::start().await;
    let client = HelloClient::new(server.rpc(SessionProtocol::Http, "/exception"));

    match client.hello("Trustin").await {
        Err(ClientError::Application(e)) => {
            assert_eq!(e.kind, ApplicationErrorKind::InternalError);
            assert!(!e.message.contains("Trustin"));
        }
        other => panic!("expected an application error, got {other:?}"),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_message_logs_for_call() {
    let server = TestServer::start().await;
    let client = HelloClient::new(server.rpc(SessionProtocol::Http, "/hello"));
    server.sink.set_enabled(true);
    client.hello("Trustin").await.unwrap();

    let req = server.sink.take_request_timeout(LOG_WAIT).await.unwrap();
    let res = server.sink.take_response_timeout(LOG_WAIT).await.unwrap();
    assert_eq!(req.id(), res.id());

    assert!(req.has_attr(RequestLog::HTTP_HEADERS));
    assert!(req.has_attr(RequestLog::RPC_REQUEST));
    assert!(req.has_attr(RequestLog::RAW_RPC_REQUEST));

    let raw_request = req.raw_call().unwrap();
    assert_eq!(raw_request.header.message_type, MessageType::Call);
    assert_eq!(raw_request.header.name, "hello");
    assert_eq!(
        raw_request.args.field(1).and_then(Value::as_str),
        Some("Trustin")
    );

    assert!(res.has_attr(ResponseLog::HTTP_HEADERS));
    assert!(res.has_attr(ResponseLog::RPC_RESPONSE));
    assert!(res.has_attr(ResponseLog::RAW_RPC_RESPONSE));

    let raw_response = res.raw_reply().unwrap();
    assert_eq!(raw_response.header.message_type, MessageType::Reply);
    assert_eq!(raw_response.header.name, "hello");
    assert_eq!(
        raw_response.body,
        ReplyBody::Success(Some(Value::string("Hello, Trustin!")))
    );
    server.stop().await;
}

#[tokio::test]
async fn test_message_logs_for_exception() {
    let server = TestServer::start().await;
    let client = HelloClient::new(server.rpc(SessionProtocol::Http, "/exception"));
    server.sink.set_enabled(true);
    assert!(matches!(
        client.hello("Trustin").await,
        Err(ClientError::Application(_))
    ));

    let req = server.sink.take_request_timeout(LOG_WAIT).await.unwrap();
    let res = server.sink.take_response_timeout(LOG_WAIT).await.unwrap();

    let invocation = req.invocation().unwrap();
    assert_eq!(invocation.method, "hello");
    assert_eq!(invocation.args.field(1).and_then(Value::as_str), Some("Trustin"));
    assert_eq!(req.raw_call().unwrap().header.message_type, MessageType::Call);

    let raw_response = res.raw_reply().unwrap();
    assert_eq!(raw_response.header.message_type, MessageType::Exception);
    assert_eq!(raw_response.header.name, "hello");
    assert!(matches!(raw_response.body, ReplyBody::ApplicationError(_)));

    // The cause is visible locally even though the wire only says "internal".
    assert_eq!(
        res.result().unwrap(),
        &RpcResult::Failed {
            detail: "Trustin".to_string()
        }
    );
    server.stop().await;
}

#[tokio::test]
async fn test_one_record_pair_per_call() {
    let server = TestServer::start().await;
    let client = HelloClient::new(server.rpc(SessionProtocol::Http, "/hello"));

    client.hello("off").await.unwrap();
    assert!(server.sink.try_take_request().is_none());
    assert!(server.sink.try_take_response().is_none());

    server.sink.set_enabled(true);
    client.hello("a").await.unwrap();
    client.hello("b").await.unwrap();
    assert_eq!(server.sink.pending_requests(), 2);
    assert_eq!(server.sink.pending_responses(), 2);

    server.sink.reset();
    client.hello("c").await.unwrap();
    assert_eq!(server.sink.pending_requests(), 0);
    server.stop().await;
}

#[tokio::test]
async fn test_sleep_completes_from_timer() {
    let server = TestServer::start().await;
    let client = SleepClient::new(server.rpc(SessionProtocol::Https, "/sleep"));
    let started = Instant::now();
    assert_eq!(client.sleep(100).await.unwrap(), 100);
    assert!(started.elapsed() >= Duration::from_millis(100));
    server.stop().await;
}

#[tokio::test]
async fn test_unknown_method() {
    let server = TestServer::start().await;
    let rpc = server.rpc(SessionProtocol::Http, "/hello");
    match rpc.call("goodbye", Struct::new()).await {
        Err(ClientError::Application(e)) => {
            assert_eq!(e.kind, ApplicationErrorKind::UnknownMethod)
        }
        other => panic!("expected UNKNOWN_METHOD, got {other:?}"),
    }
    server.stop().await;
}

#[tokio::test]
async fn test_oneway_call_gets_empty_reply() {
    let mut server = TestServer::start().await;
    let body = protocol::encode_call(
        ProtocolKind::Binary,
        &Call::oneway("notify", 1, Struct::new().with(1, "ping")),
    );
    let response = server
        .client
        .post(server.url(SessionProtocol::Http, "/notify"))
        .header(CONTENT_TYPE, ProtocolKind::Binary.content_type())
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());

    let received = tokio::time::timeout(LOG_WAIT, server.notifications.recv())
        .await
        .unwrap();
    assert_eq!(received.as_deref(), Some("ping"));

    // A CALL envelope to a method registered as oneway gets no reply either.
    server
        .rpc(SessionProtocol::Https, "/notify")
        .oneway("notify", Struct::new().with(1, "pong"))
        .await
        .unwrap();
    let body = protocol::encode_call(
        ProtocolKind::Binary,
        &Call::new("notify", 2, Struct::new().with(1, "again")),
    );
    let response = server
        .client
        .post(server.url(SessionProtocol::Http, "/notify"))
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.bytes().await.unwrap().is_empty());
    for expected in ["pong", "again"] {
        let received = tokio::time::timeout(LOG_WAIT, server.notifications.recv())
            .await
            .unwrap();
        assert_eq!(received.as_deref(), Some(expected));
    }
    server.stop().await;
}

#[tokio::test]
async fn test_transport_faults() {
    let server = TestServer::start().await;
    let hello = server.url(SessionProtocol::Http, "/hello");
    let call = protocol::encode_call(
        ProtocolKind::Binary,
        &Call::new("hello", 1, Struct::new().with(1, "x")),
    );

    let unknown_path = server
        .client
        .post(server.url(SessionProtocol::Http, "/missing"))
        .body(call.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(unknown_path.status(), StatusCode::NOT_FOUND);

    let malformed = server
        .client
        .post(&hello)
        .header(CONTENT_TYPE, "application/x-thrift")
        .body("garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), StatusCode::BAD_REQUEST);

    let wrong_method = server.client.get(&hello).send().await.unwrap();
    assert_eq!(wrong_method.status(), StatusCode::METHOD_NOT_ALLOWED);

    let wrong_type = server
        .client
        .post(&hello)
        .header(CONTENT_TYPE, "application/json")
        .body(call)
        .send()
        .await
        .unwrap();
    assert_eq!(wrong_type.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    server.stop().await;
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = TestServer::start_with(|builder| builder.max_body_size(64)).await;
    let response = server
        .client
        .post(server.url(SessionProtocol::Http, "/hello"))
        .header(CONTENT_TYPE, "application/x-thrift")
        .body(vec![0u8; 1024])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    server.stop().await;
}

#[tokio::test]
async fn test_request_id_is_returned_and_shared_with_logs() {
    let server = TestServer::start().await;
    server.sink.set_enabled(true);
    let body = protocol::encode_call(
        ProtocolKind::Binary,
        &Call::new("hello", 7, Struct::new().with(1, "Trustin")),
    );
    let response = server
        .client
        .post(server.url(SessionProtocol::Http, "/hello"))
        .header(CONTENT_TYPE, ProtocolKind::Binary.content_type())
        .body(body)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(CONTENT_TYPE).unwrap(),
        ProtocolKind::Binary.content_type()
    );
    let request_id = response
        .headers()
        .get("x-request-id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let reply = protocol::decode_reply(ProtocolKind::Binary, &response.bytes().await.unwrap()).unwrap();
    assert_eq!(reply.header.sequence_id, 7);

    let log = server.sink.take_request_timeout(LOG_WAIT).await.unwrap();
    assert_eq!(log.id().to_string(), request_id);
    server.stop().await;
}

#[tokio::test]
async fn test_client_request_ids_match_logs() {
    let server = TestServer::start().await;
    server.sink.set_enabled(true);
    let client_uuid = "6f1b0c3e-8f57-4a43-9d55-2c1a8e2b7d10";

    for sent in ["not-a-uuid", client_uuid] {
        let body = protocol::encode_call(
            ProtocolKind::Binary,
            &Call::new("hello", 1, Struct::new().with(1, "Trustin")),
        );
        let response = server
            .client
            .post(server.url(SessionProtocol::Http, "/hello"))
            .header("x-request-id", sent)
            .body(body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let echoed = response
            .headers()
            .get("x-request-id")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        if sent == client_uuid {
            assert_eq!(echoed, client_uuid);
        }

        let log = server.sink.take_request_timeout(LOG_WAIT).await.unwrap();
        assert_eq!(log.id().to_string(), echoed);
        server.sink.take_response_timeout(LOG_WAIT).await.unwrap();
    }

    server.stop().await;
}

#[tokio::test]
async fn test_active_ports() {
    let server = TestServer::start().await;
    let ports = server.running().active_ports();
    assert_eq!(ports.len(), 2);
    assert!(ports.iter().any(|p| p.protocol == SessionProtocol::Http));
    assert!(ports.iter().any(|p| p.protocol == SessionProtocol::Https));
    assert!(ports.iter().all(|p| p.local_addr.port() != 0));
    server.stop().await;
}
