//! Thrift-over-HTTP client.
//!
//! Encodes a call, POSTs it, and decodes the reply. Application errors come
//! back as [`ClientError::Application`], never as transport errors.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::protocol::{
    self, ApplicationError, Call, CodecError, ProtocolKind, ReplyBody, Struct, Value,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server answered {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed reply: {0}")]
    Codec(#[from] CodecError),

    #[error("application error: {0}")]
    Application(#[from] ApplicationError),

    #[error("declared exception in result field {field_id}")]
    Declared { field_id: i16, exception: Struct },

    #[error("reply is for method {actual:?}, expected {expected:?}")]
    WrongMethod { expected: String, actual: String },

    #[error("unexpected result for {method}: {detail}")]
    UnexpectedResult { method: String, detail: String },
}

/// Client for one service path.
#[derive(Debug, Clone)]
pub struct RpcClient {
    http: reqwest::Client,
    url: String,
    protocol: ProtocolKind,
    next_seq: Arc<AtomicI32>,
}

impl RpcClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), url)
    }

    pub fn with_client(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
            protocol: ProtocolKind::default(),
            next_seq: Arc::new(AtomicI32::new(1)),
        }
    }

    pub fn protocol(mut self, protocol: ProtocolKind) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, call: &Call) -> Result<bytes::Bytes, ClientError> {
        let body = protocol::encode_call(self.protocol, call);
        let response = self
            .http
            .post(&self.url)
            .header(CONTENT_TYPE, self.protocol.content_type())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Status { status, body });
        }
        Ok(response.bytes().await?)
    }

    /// Invoke `method` and wait for its result. `Ok(None)` is a void success.
    pub async fn call(&self, method: &str, args: Struct) -> Result<Option<Value>, ClientError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let call = Call::new(method, seq, args);
        let raw = self.post(&call).await?;
        let reply = protocol::decode_reply(self.protocol, &raw)?;

        if reply.header.name != method {
            return Err(ClientError::WrongMethod {
                expected: method.to_string(),
                actual: reply.header.name,
            });
        }
        if reply.header.sequence_id != seq {
            tracing::debug!(
                expected = seq,
                actual = reply.header.sequence_id,
                "Reply sequence id differs from call"
            );
        }

        match reply.body {
            ReplyBody::Success(value) => Ok(value),
            ReplyBody::Declared {
                field_id,
                exception,
            } => Err(ClientError::Declared {
                field_id,
                exception,
            }),
            ReplyBody::ApplicationError(error) => Err(ClientError::Application(error)),
        }
    }

    /// Fire a oneway call. Resolves once the server has accepted it.
    pub async fn oneway(&self, method: &str, args: Struct) -> Result<(), ClientError> {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.post(&Call::oneway(method, seq, args)).await?;
        Ok(())
    }
}

pub(crate) fn unexpected(method: &str, value: Option<&Value>) -> ClientError {
    ClientError::UnexpectedResult {
        method: method.to_string(),
        detail: match value {
            Some(v) => format!("got {:?}", v.ttype()),
            None => "no value".to_string(),
        },
    }
}
