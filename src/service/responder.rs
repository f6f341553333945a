//! Single-shot completion sink handed to method handlers.

use tokio::sync::oneshot;
use tower::BoxError;

use crate::protocol::{ApplicationError, ApplicationErrorKind, Struct, Value};

/// Terminal signal of a handler.
#[derive(Debug)]
pub enum Outcome {
    Success(Option<Value>),
    Declared { field_id: i16, exception: Struct },
    /// An application error the handler chose to put on the wire as-is.
    Rejected(ApplicationError),
    /// Any other failure; the detail stays local.
    Failed(BoxError),
}

/// Completion sink for one call.
///
/// Every completing method takes `self`, so a handler can signal at most once.
/// Dropping the responder without signalling fails the call with
/// `INTERNAL_ERROR`. If the client went away first, the signal is discarded.
#[derive(Debug)]
pub struct Responder {
    tx: oneshot::Sender<Outcome>,
}

impl Responder {
    pub(crate) fn channel() -> (Responder, oneshot::Receiver<Outcome>) {
        let (tx, rx) = oneshot::channel();
        (Responder { tx }, rx)
    }

    pub fn success(self, value: impl Into<Value>) {
        self.complete(Outcome::Success(Some(value.into())));
    }

    /// Complete a void method.
    pub fn success_void(self) {
        self.complete(Outcome::Success(None));
    }

    /// Complete with a schema-declared exception.
    pub fn declared(self, field_id: i16, exception: Struct) {
        self.complete(Outcome::Declared {
            field_id,
            exception,
        });
    }

    /// Complete with an application error whose message is meant for the client.
    pub fn reject(self, kind: ApplicationErrorKind, message: impl Into<String>) {
        self.complete(Outcome::Rejected(ApplicationError::new(kind, message)));
    }

    /// Fail the call. The client sees a generic `INTERNAL_ERROR`.
    pub fn fail(self, error: impl Into<BoxError>) {
        self.complete(Outcome::Failed(error.into()));
    }

    /// True once nobody waits for this call any more (client disconnected).
    pub fn is_abandoned(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn complete(self, outcome: Outcome) {
        if self.tx.send(outcome).is_err() {
            tracing::debug!("Call abandoned before completion; outcome discarded");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_exactly_one_outcome() {
        let (responder, rx) = Responder::channel();
        responder.success("done");
        match rx.await.unwrap() {
            Outcome::Success(Some(v)) => assert_eq!(v.as_str(), Some("done")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn dropped_responder_closes_channel() {
        let (responder, rx) = Responder::channel();
        drop(responder);
        assert!(rx.await.is_err());
    }

    #[test]
    fn abandoned_when_receiver_dropped() {
        let (responder, rx) = Responder::channel();
        assert!(!responder.is_abandoned());
        drop(rx);
        assert!(responder.is_abandoned());
        responder.fail("ignored");
    }
}
