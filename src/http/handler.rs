//! Axum handlers: one POST route per bound service plus the 404 fallback.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, FromRequest, Request, State};
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::net::SessionProtocol;
use crate::observability::metrics::record_transport_error;
use crate::service::{BridgeError, ServiceBinding};

pub const X_REQUEST_ID: &str = "x-request-id";

/// State for a single route.
#[derive(Clone)]
pub(crate) struct RpcState {
    pub binding: ServiceBinding,
    pub limiter: Arc<Semaphore>,
}

pub(crate) async fn rpc(
    State(state): State<RpcState>,
    Extension(session): Extension<SessionProtocol>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let Ok(_permit) = state.limiter.clone().acquire_owned().await else {
        return BridgeError::Unavailable.into_response();
    };

    let request_id = request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
        .unwrap_or_else(Uuid::new_v4);

    let protocol = match state
        .binding
        .negotiate(request.headers().get(header::CONTENT_TYPE))
    {
        Ok(protocol) => protocol,
        Err(e) => return e.into_response(),
    };

    let headers = request.headers().clone();
    let body = match Bytes::from_request(request, &()).await {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(
                request_id = %request_id,
                path = %state.binding.path(),
                error = %rejection,
                "Failed to read request body"
            );
            record_transport_error("body");
            return rejection.into_response();
        }
    };

    let ctx = state
        .binding
        .context(request_id, session, protocol, Some(remote));

    match state.binding.dispatch(ctx, headers, &body).await {
        Ok(reply) => {
            let mut response = match reply.body {
                Some(bytes) => Response::new(Body::from(bytes)),
                None => Response::new(Body::empty()),
            };
            *response.status_mut() = StatusCode::OK;
            response.headers_mut().extend(reply.headers);
            response
        }
        Err(e) => {
            tracing::warn!(
                request_id = %request_id,
                path = %state.binding.path(),
                error = %e,
                "Rejected request"
            );
            e.into_response()
        }
    }
}

/// Drop a client `x-request-id` that is not a UUID so a fresh one is
/// generated; the response header then matches the call's log id.
pub(crate) async fn normalize_request_id(mut request: Request) -> Request {
    let foreign = request
        .headers()
        .get(X_REQUEST_ID)
        .is_some_and(|v| v.to_str().ok().and_then(|v| Uuid::parse_str(v).ok()).is_none());
    if foreign {
        tracing::debug!("Replacing non-UUID x-request-id");
        request.headers_mut().remove(X_REQUEST_ID);
    }
    request
}

pub(crate) async fn unknown_path(uri: Uri) -> Response {
    tracing::debug!(path = %uri.path(), "No service bound at path");
    BridgeError::UnknownPath(uri.path().to_string()).into_response()
}

impl IntoResponse for BridgeError {
    fn into_response(self) -> Response {
        let status = match &self {
            BridgeError::MalformedEnvelope(_) => StatusCode::BAD_REQUEST,
            BridgeError::UnsupportedContentType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            BridgeError::UnknownPath(_) => StatusCode::NOT_FOUND,
            BridgeError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };
        record_transport_error(self.kind());
        (status, self.to_string()).into_response()
    }
}
