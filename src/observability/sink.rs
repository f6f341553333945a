//! In-memory queue of message logs for tests and local monitors.
//!
//! # Design Decisions
//! - Recording never waits: unbounded queues behind a short `Mutex`
//! - Takers park on a `Notify`, optionally bounded by a timeout
//! - The enable flag lives on the sink instance, so independent sinks never
//!   interfere with each other

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tower::BoxError;

use crate::decorator::collect::MessageLogConsumer;
use crate::observability::message_log::{RequestLog, ResponseLog};

#[derive(Debug, Clone, Copy)]
pub struct SinkConfig {
    pub enabled: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug)]
struct Queue<T> {
    items: Mutex<VecDeque<T>>,
    ready: Notify,
}

impl<T> Queue<T> {
    fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
            ready: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, item: T) {
        self.lock().push_back(item);
        self.ready.notify_one();
    }

    fn try_pop(&self) -> Option<T> {
        self.lock().pop_front()
    }

    async fn pop(&self) -> T {
        loop {
            if let Some(item) = self.try_pop() {
                return item;
            }
            self.ready.notified().await;
        }
    }

    fn len(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) {
        self.lock().clear();
    }
}

#[derive(Debug)]
struct Inner {
    enabled: AtomicBool,
    requests: Queue<RequestLog>,
    responses: Queue<ResponseLog>,
}

/// Cheap to clone; clones share the same queues and flag.
#[derive(Debug, Clone)]
pub struct LogSink {
    inner: Arc<Inner>,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(SinkConfig::default())
    }
}

impl LogSink {
    pub fn new(config: SinkConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                enabled: AtomicBool::new(config.enabled),
                requests: Queue::new(),
                responses: Queue::new(),
            }),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    pub fn record_request(&self, log: RequestLog) {
        if self.is_enabled() {
            self.inner.requests.push(log);
        }
    }

    pub fn record_response(&self, log: ResponseLog) {
        if self.is_enabled() {
            self.inner.responses.push(log);
        }
    }

    /// Wait until a request log is available.
    pub async fn take_request(&self) -> RequestLog {
        self.inner.requests.pop().await
    }

    /// Wait until a response log is available.
    pub async fn take_response(&self) -> ResponseLog {
        self.inner.responses.pop().await
    }

    pub async fn take_request_timeout(&self, timeout: Duration) -> Option<RequestLog> {
        tokio::time::timeout(timeout, self.take_request()).await.ok()
    }

    pub async fn take_response_timeout(&self, timeout: Duration) -> Option<ResponseLog> {
        tokio::time::timeout(timeout, self.take_response()).await.ok()
    }

    pub fn try_take_request(&self) -> Option<RequestLog> {
        self.inner.requests.try_pop()
    }

    pub fn try_take_response(&self) -> Option<ResponseLog> {
        self.inner.responses.try_pop()
    }

    pub fn pending_requests(&self) -> usize {
        self.inner.requests.len()
    }

    pub fn pending_responses(&self) -> usize {
        self.inner.responses.len()
    }

    pub fn clear(&self) {
        self.inner.requests.clear();
        self.inner.responses.clear();
    }

    /// Disable recording and drop everything queued.
    pub fn reset(&self) {
        self.set_enabled(false);
        self.clear();
    }
}

impl MessageLogConsumer for LogSink {
    fn on_request(&self, log: RequestLog) -> Result<(), BoxError> {
        self.record_request(log);
        Ok(())
    }

    fn on_response(&self, log: ResponseLog) -> Result<(), BoxError> {
        self.record_response(log);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn records_in_order() {
        let sink = LogSink::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        sink.record_request(RequestLog::new(first));
        sink.record_request(RequestLog::new(second));

        assert_eq!(sink.take_request().await.id(), first);
        assert_eq!(sink.take_request().await.id(), second);
        assert!(sink.try_take_request().is_none());
    }

    #[tokio::test]
    async fn take_waits_for_a_record() {
        let sink = LogSink::default();
        let producer = sink.clone();
        let id = Uuid::new_v4();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.record_response(ResponseLog::new(id));
        });

        let log = sink
            .take_response_timeout(Duration::from_secs(5))
            .await
            .expect("response log");
        assert_eq!(log.id(), id);
    }

    #[tokio::test]
    async fn disabled_sink_records_nothing() {
        let sink = LogSink::new(SinkConfig { enabled: false });
        sink.record_request(RequestLog::new(Uuid::new_v4()));
        sink.record_response(ResponseLog::new(Uuid::new_v4()));

        assert_eq!(sink.pending_requests(), 0);
        assert!(sink
            .take_request_timeout(Duration::from_millis(20))
            .await
            .is_none());
    }

    #[test]
    fn reset_disables_and_clears() {
        let sink = LogSink::default();
        sink.record_request(RequestLog::new(Uuid::new_v4()));
        sink.record_response(ResponseLog::new(Uuid::new_v4()));

        sink.reset();
        assert!(!sink.is_enabled());
        assert_eq!(sink.pending_requests(), 0);
        assert_eq!(sink.pending_responses(), 0);
    }

    #[test]
    fn sinks_do_not_share_their_flag() {
        let a = LogSink::default();
        let b = LogSink::default();
        a.set_enabled(false);
        assert!(b.is_enabled());
    }
}
