//! Outstanding-call bookkeeping.
//!
//! The table is the single authority on whether a call is still live. Every
//! transition out of `Sent` (completion, expiry, cancellation) removes the
//! entry under one lock, so a call reaches exactly one terminal outcome.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Duration;

use ivcrpc_frame::{ids, Response, RSP_RET_CODE};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{Result, RpcError};

/// Terminal outcome of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The responder answered. The return code may still signal an error.
    Completed(Response),
    /// No response arrived before the deadline.
    TimedOut { elapsed: Duration },
    /// The call was withdrawn locally.
    Cancelled(CancelReason),
}

impl Outcome {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Completed(response) => Some(response),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::TimedOut { .. } => "timed_out",
            Self::Cancelled(_) => "cancelled",
        }
    }
}

/// Why a call was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CancelReason {
    /// The engine was shut down.
    Shutdown,
    /// The channel closed underneath the call.
    ChannelClosed,
    /// The caller withdrew the call.
    Requested,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Shutdown => "shutdown",
            Self::ChannelClosed => "channel_closed",
            Self::Requested => "requested",
        }
    }
}

/// Response shape a caller anticipates.
///
/// A response that contradicts the expectation is still delivered; the
/// mismatch is only logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expect {
    #[default]
    Any,
    /// A bare return code (`RSP_RET_CODE`).
    RetCodeOnly,
    /// A response carrying this identifier.
    Response(u32),
    /// The responder is not supposed to answer.
    NoReply,
}

impl Expect {
    pub fn matches(self, response: &Response) -> bool {
        match self {
            Self::Any => true,
            Self::RetCodeOnly => response.response_id == RSP_RET_CODE,
            Self::Response(id) => response.response_id == id,
            Self::NoReply => false,
        }
    }
}

/// Caller-side handle to an outstanding call.
///
/// Await it from async code, or [`wait`](Self::wait) from a plain thread.
#[derive(Debug)]
pub struct PendingCall {
    seq: u32,
    rx: oneshot::Receiver<Outcome>,
}

impl PendingCall {
    pub fn seq(&self) -> u32 {
        self.seq
    }

    /// Block the current thread until the outcome arrives.
    ///
    /// Panics if called from within an async runtime.
    pub fn wait(self) -> Outcome {
        self.rx.blocking_recv().unwrap_or(ORPHANED)
    }

    /// Take the outcome if it has already been delivered.
    pub fn try_outcome(&mut self) -> Option<Outcome> {
        match self.rx.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(ORPHANED),
        }
    }
}

/// Deadline used when `now + timeout` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

// Delivered if the table drops an entry without resolving it.
const ORPHANED: Outcome = Outcome::Cancelled(CancelReason::ChannelClosed);

impl Future for PendingCall {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(ORPHANED))
    }
}

struct Entry {
    submitted: Instant,
    deadline: Instant,
    expect: Expect,
    sink: oneshot::Sender<Outcome>,
}

impl Entry {
    fn deliver(self, seq: u32, outcome: Outcome) {
        if self.sink.send(outcome).is_err() {
            debug!(seq, "caller dropped pending call before its outcome");
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<u32, Entry>,
    closed: bool,
}

/// Outstanding calls keyed by sequence number.
pub struct PendingTable {
    inner: Mutex<Inner>,
    capacity: usize,
}

impl PendingTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record a call as outstanding and hand back its completion handle.
    pub fn register(
        &self,
        seq: u32,
        now: Instant,
        timeout: Duration,
        expect: Expect,
    ) -> Result<PendingCall> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(RpcError::Shutdown);
        }
        if inner.entries.contains_key(&seq) {
            return Err(RpcError::DuplicateSequence(seq));
        }
        if inner.entries.len() >= self.capacity {
            return Err(RpcError::TooManyOutstanding {
                limit: self.capacity,
            });
        }

        let deadline = now
            .checked_add(timeout)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let (sink, rx) = oneshot::channel();
        inner.entries.insert(
            seq,
            Entry {
                submitted: now,
                deadline,
                expect,
                sink,
            },
        );
        Ok(PendingCall { seq, rx })
    }

    /// Resolve the call `response` answers.
    ///
    /// Returns false for a stale or spurious response; those are absorbed.
    pub fn complete(&self, response: Response) -> bool {
        let seq = response.seq;
        let Some(entry) = self.lock().entries.remove(&seq) else {
            debug!(
                seq,
                response_id = response.response_id,
                "discarding stale response"
            );
            return false;
        };

        if !entry.expect.matches(&response) {
            warn!(
                seq,
                expected = ?entry.expect,
                response_id = response.response_id,
                response = ids::response_name(response.response_id),
                "response shape differs from expectation"
            );
        }
        entry.deliver(seq, Outcome::Completed(response));
        true
    }

    /// Time out every call whose deadline is at or before `now`.
    ///
    /// Returns the expired sequence numbers.
    pub fn expire(&self, now: Instant) -> Vec<u32> {
        let expired: Vec<(u32, Entry)> = {
            let mut inner = self.lock();
            let due: Vec<u32> = inner
                .entries
                .iter()
                .filter(|(_, entry)| entry.deadline <= now)
                .map(|(seq, _)| *seq)
                .collect();
            due.into_iter()
                .filter_map(|seq| inner.entries.remove(&seq).map(|entry| (seq, entry)))
                .collect()
        };

        expired
            .into_iter()
            .map(|(seq, entry)| {
                let elapsed = now.saturating_duration_since(entry.submitted);
                debug!(seq, elapsed_ms = elapsed.as_millis() as u64, "call timed out");
                entry.deliver(seq, Outcome::TimedOut { elapsed });
                seq
            })
            .collect()
    }

    /// Cancel one call. Returns false if it was no longer outstanding.
    pub fn cancel(&self, seq: u32, reason: CancelReason) -> bool {
        let Some(entry) = self.lock().entries.remove(&seq) else {
            return false;
        };
        entry.deliver(seq, Outcome::Cancelled(reason));
        true
    }

    /// Cancel every outstanding call. Returns how many were cancelled.
    pub fn cancel_all(&self, reason: CancelReason) -> usize {
        let drained: Vec<(u32, Entry)> = self.lock().entries.drain().collect();
        let count = drained.len();
        for (seq, entry) in drained {
            entry.deliver(seq, Outcome::Cancelled(reason));
        }
        count
    }

    /// Cancel everything and refuse further registrations.
    pub fn close(&self, reason: CancelReason) -> usize {
        let drained: Vec<(u32, Entry)> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.entries.drain().collect()
        };
        let count = drained.len();
        for (seq, entry) in drained {
            entry.deliver(seq, Outcome::Cancelled(reason));
        }
        count
    }

    /// Drop an entry without delivering an outcome.
    ///
    /// Used when the request never reached the channel; the caller learns
    /// about that from the send error instead.
    pub fn discard(&self, seq: u32) -> bool {
        self.lock().entries.remove(&seq).is_some()
    }

    pub fn contains(&self, seq: u32) -> bool {
        self.lock().entries.contains_key(&seq)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Earliest deadline among outstanding calls.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.lock()
            .entries
            .values()
            .map(|entry| entry.deadline)
            .min()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use ivcrpc_frame::ReturnCode;

    use super::*;
    use crate::error::ErrorKind;

    fn ack(seq: u32) -> Response {
        Response::ret_code(seq, ReturnCode::OK)
    }

    #[test]
    fn complete_delivers_exactly_once() {
        let table = PendingTable::new(8);
        let now = Instant::now();
        let mut call = table
            .register(7, now, Duration::from_millis(500), Expect::Any)
            .unwrap();

        assert!(table.complete(ack(7)));
        assert!(!table.complete(ack(7)));
        assert!(table.is_empty());

        match call.try_outcome() {
            Some(Outcome::Completed(response)) => assert_eq!(response.seq, 7),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn stale_response_is_absorbed() {
        let table = PendingTable::new(8);
        assert!(!table.complete(ack(99)));
    }

    #[test]
    fn duplicate_sequence_rejected() {
        let table = PendingTable::new(8);
        let now = Instant::now();
        let _first = table
            .register(3, now, Duration::from_secs(1), Expect::Any)
            .unwrap();
        let err = table
            .register(3, now, Duration::from_secs(1), Expect::Any)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateSequence);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn capacity_is_enforced() {
        let table = PendingTable::new(2);
        let now = Instant::now();
        let _a = table.register(1, now, Duration::from_secs(1), Expect::Any);
        let _b = table.register(2, now, Duration::from_secs(1), Expect::Any);
        let err = table
            .register(3, now, Duration::from_secs(1), Expect::Any)
            .unwrap_err();
        assert!(matches!(err, RpcError::TooManyOutstanding { limit: 2 }));
    }

    #[test]
    fn expire_times_out_only_overdue_calls() {
        let table = PendingTable::new(8);
        let start = Instant::now();
        let mut short = table
            .register(1, start, Duration::from_millis(100), Expect::Any)
            .unwrap();
        let mut long = table
            .register(2, start, Duration::from_millis(900), Expect::Any)
            .unwrap();

        assert!(table.expire(start + Duration::from_millis(99)).is_empty());
        assert_eq!(table.expire(start + Duration::from_millis(100)), vec![1]);

        assert_eq!(
            short.try_outcome(),
            Some(Outcome::TimedOut {
                elapsed: Duration::from_millis(100)
            })
        );
        assert_eq!(long.try_outcome(), None);

        // A late response for the expired call is stale.
        assert!(!table.complete(ack(1)));
        assert!(table.contains(2));
    }

    #[test]
    fn unbounded_timeout_is_clamped() {
        let table = PendingTable::new(8);
        let start = Instant::now();
        let mut call = table
            .register(1, start, Duration::MAX, Expect::Any)
            .unwrap();

        let deadline = table.next_deadline().unwrap();
        assert!(deadline > start + Duration::from_secs(86_400 * 365));
        assert!(table.expire(start + Duration::from_secs(86_400)).is_empty());
        assert_eq!(call.try_outcome(), None);
        assert!(table.complete(ack(1)));
    }

    #[test]
    fn cancel_all_reaches_every_call() {
        let table = PendingTable::new(8);
        let now = Instant::now();
        let mut calls: Vec<_> = (0..3)
            .map(|seq| {
                table
                    .register(seq, now, Duration::from_secs(1), Expect::Any)
                    .unwrap()
            })
            .collect();

        assert_eq!(table.cancel_all(CancelReason::ChannelClosed), 3);
        for call in &mut calls {
            assert_eq!(
                call.try_outcome(),
                Some(Outcome::Cancelled(CancelReason::ChannelClosed))
            );
        }

        // Still open after cancel_all.
        assert!(table
            .register(9, now, Duration::from_secs(1), Expect::Any)
            .is_ok());
    }

    #[test]
    fn close_refuses_new_calls() {
        let table = PendingTable::new(8);
        let now = Instant::now();
        let mut call = table
            .register(1, now, Duration::from_secs(1), Expect::Any)
            .unwrap();

        assert_eq!(table.close(CancelReason::Shutdown), 1);
        assert_eq!(
            call.try_outcome(),
            Some(Outcome::Cancelled(CancelReason::Shutdown))
        );
        let err = table
            .register(2, now, Duration::from_secs(1), Expect::Any)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Shutdown);
    }

    #[test]
    fn discard_leaves_caller_orphaned() {
        let table = PendingTable::new(8);
        let mut call = table
            .register(5, Instant::now(), Duration::from_secs(1), Expect::Any)
            .unwrap();
        assert!(table.discard(5));
        assert_eq!(
            call.try_outcome(),
            Some(Outcome::Cancelled(CancelReason::ChannelClosed))
        );
    }

    #[test]
    fn next_deadline_is_earliest() {
        let table = PendingTable::new(8);
        let now = Instant::now();
        let _a = table.register(1, now, Duration::from_millis(300), Expect::Any);
        let _b = table.register(2, now, Duration::from_millis(100), Expect::Any);
        assert_eq!(table.next_deadline(), Some(now + Duration::from_millis(100)));
    }

    #[test]
    fn expectation_mismatch_still_delivers() {
        let table = PendingTable::new(8);
        let mut call = table
            .register(4, Instant::now(), Duration::from_secs(1), Expect::RetCodeOnly)
            .unwrap();
        let mut response = ack(4);
        response.response_id = 0x10;
        response.payload = Bytes::from_static(b"unexpected");

        assert!(table.complete(response.clone()));
        assert_eq!(call.try_outcome(), Some(Outcome::Completed(response)));
    }

    #[test]
    fn expect_matches_shapes() {
        let bare = ack(0);
        assert!(Expect::Any.matches(&bare));
        assert!(Expect::RetCodeOnly.matches(&bare));
        assert!(!Expect::Response(0x7fff_fe02).matches(&bare));
        assert!(!Expect::NoReply.matches(&bare));
    }

    #[tokio::test]
    async fn pending_call_is_a_future() {
        let table = PendingTable::new(8);
        let call = table
            .register(11, Instant::now(), Duration::from_secs(1), Expect::Any)
            .unwrap();
        assert!(table.complete(ack(11)));
        let outcome = call.await;
        assert!(outcome.is_completed());
        assert_eq!(outcome.response().map(|r| r.seq), Some(11));
    }
}
