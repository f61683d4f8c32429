//! The four reserved debug-test call shapes.
//!
//! A responder with [`register_test_handlers`] installed acknowledges the
//! ACK shapes and deliberately ignores the NACK shapes, so a caller running
//! all four exercises completion and timeout on a live channel.

use std::fmt;

use ivcrpc_frame::ids::{
    self, REQ_TEST_DATA_ACK, REQ_TEST_DATA_NACK, REQ_TEST_NODATA_ACK, REQ_TEST_NODATA_NACK,
    RSP_TEST_DATA_ACK,
};
use ivcrpc_frame::{Request, ReturnCode};
use ivcrpc_transport::FrameSink;

use crate::dispatch::Reply;
use crate::engine::{Call, RpcEngine};
use crate::error::Result;
use crate::pending::{Expect, Outcome};

/// Payload sent by the data-bearing test shapes when none is given.
pub const TEST_PATTERN: &[u8] = b"ivcrpc-selftest";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestCall {
    /// Empty request, bare return-code acknowledgement.
    NoDataAck,
    /// Empty request, no reply.
    NoDataNack,
    /// Payload request, payload echoed back under `RSP_TEST_DATA_ACK`.
    DataAck,
    /// Payload request, no reply.
    DataNack,
}

impl TestCall {
    pub const ALL: [TestCall; 4] = [
        TestCall::NoDataAck,
        TestCall::NoDataNack,
        TestCall::DataAck,
        TestCall::DataNack,
    ];

    pub fn request_id(self) -> u32 {
        match self {
            Self::NoDataAck => REQ_TEST_NODATA_ACK,
            Self::NoDataNack => REQ_TEST_NODATA_NACK,
            Self::DataAck => REQ_TEST_DATA_ACK,
            Self::DataNack => REQ_TEST_DATA_NACK,
        }
    }

    pub fn from_request_id(request_id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.request_id() == request_id)
    }

    pub fn carries_payload(self) -> bool {
        matches!(self, Self::DataAck | Self::DataNack)
    }

    pub fn expect(self) -> Expect {
        match self {
            Self::NoDataAck => Expect::RetCodeOnly,
            Self::DataAck => Expect::Response(RSP_TEST_DATA_ACK),
            Self::NoDataNack | Self::DataNack => Expect::NoReply,
        }
    }

    /// Build the call. `payload` is dropped for the empty shapes.
    pub fn call(self, payload: &[u8]) -> Call {
        let call = Call::new(self.request_id()).with_expect(self.expect());
        if self.carries_payload() {
            call.with_payload(payload.to_vec())
        } else {
            call
        }
    }

    /// Whether `outcome` is what a conforming responder produces.
    pub fn passed(self, outcome: &Outcome, sent: &[u8]) -> bool {
        match (self, outcome) {
            (Self::NoDataAck, Outcome::Completed(rsp)) => {
                rsp.return_code.is_ok() && rsp.is_ret_code_only()
            }
            (Self::DataAck, Outcome::Completed(rsp)) => {
                rsp.return_code.is_ok()
                    && rsp.response_id == RSP_TEST_DATA_ACK
                    && rsp.payload.as_ref() == sent
            }
            (Self::NoDataNack | Self::DataNack, Outcome::TimedOut { .. }) => true,
            _ => false,
        }
    }

    pub fn name(self) -> &'static str {
        ids::request_name(self.request_id())
    }
}

impl fmt::Display for TestCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Install responder-side handlers for the four test shapes.
pub fn register_test_handlers<S: FrameSink>(engine: &RpcEngine<S>) -> Result<()> {
    engine.register_handler(REQ_TEST_NODATA_ACK, |_: &Request| {
        Reply::ret_code(ReturnCode::OK)
    })?;
    engine.register_handler(REQ_TEST_NODATA_NACK, |_: &Request| Reply::Suppress)?;
    engine.register_handler(REQ_TEST_DATA_ACK, |req: &Request| {
        Reply::payload(RSP_TEST_DATA_ACK, req.payload.clone())
    })?;
    engine.register_handler(REQ_TEST_DATA_NACK, |_: &Request| Reply::Suppress)?;
    Ok(())
}
