//! Bit-exact frame codec for the IVC RPC protocol.
//!
//! Every frame starts with a 4-byte signature that tells requests from
//! responses, followed by a fixed header and an opaque payload of at most
//! [`MAX_PAYLOAD`] bytes. All header fields are little-endian `u32`/`i32`
//! with no padding.
//!
//! Payload interpretation stays outside the codec; see [`payload`] for
//! explicit typed encoders.

pub mod codec;
pub mod error;
pub mod ids;
pub mod payload;
pub mod retcode;

pub use codec::{
    decode_frame, encode_request, encode_response, peek_request_header, Frame, Request, Response,
    MAX_FRAME_SIZE, MAX_HEADER_SIZE, MAX_PAYLOAD, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use ids::{REQUEST_SIGNATURE, RESPONSE_SIGNATURE, RSP_RET_CODE};
pub use payload::{PayloadReader, PayloadWriter, WireMessage};
pub use retcode::{ReturnCode, ReturnCodeBand};
