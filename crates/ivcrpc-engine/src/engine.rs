use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use ivcrpc_frame::{
    decode_frame, encode_request, encode_response, ids, peek_request_header, Frame, Request,
    Response, ReturnCode,
};
use ivcrpc_transport::{FrameSink, TransportError};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::dispatch::{DispatchTable, Handler, HandlerResponse, Reply};
use crate::error::{Result, RpcError};
use crate::pending::{CancelReason, Expect, Outcome, PendingCall, PendingTable};
use crate::sequence::SequenceTracker;

/// Parameters of one outbound call.
#[derive(Debug, Clone)]
pub struct Call {
    pub request_id: u32,
    pub flags: u32,
    pub payload: Bytes,
    /// Falls back to [`EngineConfig::default_timeout`].
    pub timeout: Option<Duration>,
    pub expect: Expect,
}

impl Call {
    pub fn new(request_id: u32) -> Self {
        Self {
            request_id,
            flags: 0,
            payload: Bytes::new(),
            timeout: None,
            expect: Expect::Any,
        }
    }

    pub fn with_flags(mut self, flags: u32) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_payload(mut self, payload: impl Into<Bytes>) -> Self {
        self.payload = payload.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_expect(mut self, expect: Expect) -> Self {
        self.expect = expect;
        self
    }
}

/// What [`RpcEngine::on_frame`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// A response resolved an outstanding call.
    Completed { seq: u32 },
    /// A response matched no outstanding call.
    Stale { seq: u32 },
    /// A request was answered.
    Answered {
        seq: u32,
        request_id: u32,
        return_code: ReturnCode,
    },
    /// A handler chose not to answer.
    Suppressed { seq: u32, request_id: u32 },
    /// Unknown signature.
    Malformed,
    /// Recognized signature but too short to carry a header.
    Invalid,
    /// The engine is shut down.
    Ignored,
}

/// Request/response engine bound to one frame channel.
///
/// The engine writes through `sink` and is fed inbound frames through
/// [`on_frame`](Self::on_frame). Share it behind an `Arc` between the
/// receive loop, the ticker, and callers.
pub struct RpcEngine<S> {
    sink: S,
    config: EngineConfig,
    sequence: SequenceTracker,
    pending: PendingTable,
    dispatch: DispatchTable,
    epoch: Instant,
    shut_down: AtomicBool,
}

impl<S: FrameSink> RpcEngine<S> {
    pub fn new(sink: S, config: EngineConfig) -> Self {
        Self::with_sequence(sink, config, SequenceTracker::new())
    }

    /// Build an engine with a caller-supplied sequence tracker.
    pub fn with_sequence(sink: S, config: EngineConfig, sequence: SequenceTracker) -> Self {
        Self {
            pending: PendingTable::new(config.max_outstanding),
            sink,
            config,
            sequence,
            dispatch: DispatchTable::new(),
            epoch: Instant::now(),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn register_handler(&self, request_id: u32, handler: impl Handler) -> Result<()> {
        self.dispatch.register(request_id, handler)
    }

    pub fn unregister_handler(&self, request_id: u32) -> bool {
        self.dispatch.unregister(request_id)
    }

    pub fn handlers(&self) -> Vec<u32> {
        self.dispatch.registered()
    }

    /// Send `payload` as request `request_id`.
    ///
    /// Returns once the frame is on the channel; the outcome arrives through
    /// the returned handle.
    pub fn send(
        &self,
        request_id: u32,
        payload: impl Into<Bytes>,
        timeout: Duration,
    ) -> Result<PendingCall> {
        self.start(
            Call::new(request_id)
                .with_payload(payload)
                .with_timeout(timeout),
        )
    }

    /// Put `call` on the channel.
    ///
    /// Encoding problems and channel refusals are returned here and leave no
    /// pending entry behind.
    pub fn start(&self, call: Call) -> Result<PendingCall> {
        if self.is_shut_down() {
            return Err(RpcError::Shutdown);
        }

        let seq = self.sequence.next();
        let mut frame = BytesMut::new();
        encode_request(seq, call.flags, call.request_id, &call.payload, &mut frame)?;
        let max = self.sink.frame_size();
        if frame.len() > max {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max,
            }
            .into());
        }

        // Register before writing; the response may race the write's return.
        let timeout = call.timeout.unwrap_or(self.config.default_timeout);
        let pending = self
            .pending
            .register(seq, Instant::now(), timeout, call.expect)?;

        if let Err(err) = self.sink.write_frame(&frame) {
            self.pending.discard(seq);
            warn!(seq, request_id = call.request_id, error = %err, "request not sent");
            return Err(err.into());
        }

        debug!(
            seq,
            request_id = call.request_id,
            request = ids::request_name(call.request_id),
            len = call.payload.len(),
            timeout_ms = timeout.as_millis() as u64,
            "request sent"
        );
        Ok(pending)
    }

    /// Send `call` and wait for its outcome.
    pub async fn call(&self, call: Call) -> Result<Outcome> {
        Ok(self.start(call)?.await)
    }

    /// Handle one frame from the channel.
    ///
    /// Malformed frames and stale responses are absorbed. An error is only
    /// returned when the answer to a request could not be written.
    pub fn on_frame(&self, frame: &[u8]) -> Result<Disposition> {
        let received = self.timestamp();
        if self.is_shut_down() {
            debug!(len = frame.len(), "engine shut down; frame ignored");
            return Ok(Disposition::Ignored);
        }

        match decode_frame(frame) {
            Ok(Frame::Response(response)) => {
                let seq = response.seq;
                debug!(
                    seq,
                    return_code = response.return_code.value(),
                    response_id = response.response_id,
                    len = response.payload.len(),
                    "response received"
                );
                if self.pending.complete(response) {
                    Ok(Disposition::Completed { seq })
                } else {
                    Ok(Disposition::Stale { seq })
                }
            }
            Ok(Frame::Request(request)) => self.answer(request, received),
            Ok(Frame::Malformed { signature }) => {
                warn!(?signature, len = frame.len(), "dropping malformed frame");
                Ok(Disposition::Malformed)
            }
            Err(err) => match peek_request_header(frame) {
                Some((seq, request_id)) => {
                    warn!(seq, request_id, error = %err, "rejecting request with bad length");
                    let mut response = Response::ret_code(seq, ReturnCode::BAD_PARAMETER);
                    response.ts_received = received;
                    response.ts_sent = self.timestamp();
                    self.respond(request_id, response)
                }
                None => {
                    warn!(error = %err, len = frame.len(), "dropping undecodable frame");
                    Ok(Disposition::Invalid)
                }
            },
        }
    }

    fn answer(&self, request: Request, received: u32) -> Result<Disposition> {
        let seq = request.seq;
        let request_id = request.request_id;
        debug!(
            seq,
            request_id,
            request = ids::request_name(request_id),
            len = request.payload.len(),
            "request received"
        );

        let reply = match self.dispatch.dispatch(&request) {
            Ok(reply) => reply,
            Err(err) => {
                warn!(seq, request_id, error = %err, "answering unhandled request");
                Reply::Respond(HandlerResponse::ret_code(err.return_code()))
            }
        };
        let answer = match reply {
            Reply::Respond(answer) => answer,
            Reply::Suppress => {
                debug!(seq, request_id, "handler suppressed response");
                return Ok(Disposition::Suppressed { seq, request_id });
            }
        };

        let response = Response {
            seq,
            return_code: answer.return_code,
            return_data: answer.return_data,
            ts_received: received,
            ts_sent: self.timestamp(),
            response_id: answer.response_id,
            payload: answer.payload,
        };
        self.respond(request_id, response)
    }

    /// Write exactly one response for a recognized request.
    fn respond(&self, request_id: u32, mut response: Response) -> Result<Disposition> {
        let seq = response.seq;
        let received = response.ts_received;
        let mut buf = BytesMut::with_capacity(response.wire_size());
        if let Err(err) = encode_response(&response, &mut buf) {
            warn!(seq, request_id, error = %err, "handler response not encodable");
            let ts_sent = response.ts_sent;
            response = Response::ret_code(seq, ReturnCode::IO_ERROR);
            response.ts_received = received;
            response.ts_sent = ts_sent;
            buf.clear();
            encode_response(&response, &mut buf)?;
        }

        if let Err(err) = self.sink.write_frame(&buf) {
            warn!(seq, request_id, error = %err, "response not sent");
            return Err(err.into());
        }
        debug!(
            seq,
            request_id,
            return_code = response.return_code.value(),
            response_id = response.response_id,
            "response sent"
        );
        Ok(Disposition::Answered {
            seq,
            request_id,
            return_code: response.return_code,
        })
    }

    /// Time out calls whose deadline is at or before `now`.
    ///
    /// Returns how many calls expired.
    pub fn tick(&self, now: Instant) -> usize {
        let expired = self.pending.expire(now);
        if !expired.is_empty() {
            debug!(count = expired.len(), "expired pending calls");
        }
        expired.len()
    }

    /// Withdraw one outstanding call.
    ///
    /// The request may already be on the channel; a late response is then
    /// absorbed as stale.
    pub fn cancel(&self, seq: u32) -> bool {
        self.pending.cancel(seq, CancelReason::Requested)
    }

    /// Cancel everything because the channel went away.
    pub fn channel_closed(&self) -> usize {
        let count = self.pending.cancel_all(CancelReason::ChannelClosed);
        if count > 0 {
            info!(cancelled = count, "channel closed with calls outstanding");
        }
        count
    }

    /// Stop the engine and cancel every outstanding call.
    ///
    /// Later sends fail with [`RpcError::Shutdown`] and inbound frames are
    /// ignored. Returns the number of cancelled calls; a repeated shutdown
    /// returns 0.
    pub fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let count = self.pending.close(CancelReason::Shutdown);
        info!(cancelled = count, "rpc engine shut down");
        count
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    /// Number of outstanding calls.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.next_deadline()
    }

    /// Microseconds since the engine was created, truncated to 32 bits.
    pub fn timestamp(&self) -> u32 {
        self.epoch.elapsed().as_micros() as u32
    }
}
