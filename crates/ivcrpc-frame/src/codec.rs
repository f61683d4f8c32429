use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::ids::{REQUEST_SIGNATURE, RESPONSE_SIGNATURE, RSP_RET_CODE};
use crate::retcode::ReturnCode;

/// Request header: signature, seq, flags, reserved, request id, length.
pub const REQUEST_HEADER_SIZE: usize = 24;

/// Response header: signature, seq, return code, return data, two
/// timestamps, response id, length.
pub const RESPONSE_HEADER_SIZE: usize = 32;

/// Upper bound on either header.
pub const MAX_HEADER_SIZE: usize = 32;

/// Maximum payload carried by one frame.
pub const MAX_PAYLOAD: usize = 0x400;

/// Largest frame the protocol can produce.
pub const MAX_FRAME_SIZE: usize = MAX_HEADER_SIZE + MAX_PAYLOAD;

/// A decoded RPC request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub seq: u32,
    pub flags: u32,
    pub request_id: u32,
    pub payload: Bytes,
}

impl Request {
    /// The total wire size of this request (header + payload).
    pub fn wire_size(&self) -> usize {
        REQUEST_HEADER_SIZE + self.payload.len()
    }
}

/// A decoded RPC response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Sequence number of the request this answers.
    pub seq: u32,
    pub return_code: ReturnCode,
    /// Auxiliary value chosen by the responder.
    pub return_data: u32,
    /// Responder clock when the request arrived. Diagnostic only.
    pub ts_received: u32,
    /// Responder clock when the response was written. Diagnostic only.
    pub ts_sent: u32,
    pub response_id: u32,
    pub payload: Bytes,
}

impl Response {
    /// A payload-less response carrying only a return code.
    pub fn ret_code(seq: u32, return_code: ReturnCode) -> Self {
        Self {
            seq,
            return_code,
            return_data: 0,
            ts_received: 0,
            ts_sent: 0,
            response_id: RSP_RET_CODE,
            payload: Bytes::new(),
        }
    }

    /// Returns true if this is a bare return-code response.
    pub fn is_ret_code_only(&self) -> bool {
        self.response_id == RSP_RET_CODE
    }

    /// The total wire size of this response (header + payload).
    pub fn wire_size(&self) -> usize {
        RESPONSE_HEADER_SIZE + self.payload.len()
    }
}

/// Result of decoding one channel frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Request(Request),
    Response(Response),
    /// Unrecognized signature. `signature` is `None` when the buffer was
    /// shorter than four bytes.
    Malformed { signature: Option<u32> },
}

/// Encode a request into the wire format.
///
/// ```text
/// offset  0        4     8       12         16           20            24
///         ┌────────┬─────┬───────┬──────────┬────────────┬─────────────┬─────────┐
///         │ 0x5152 │ seq │ flags │ reserved │ request_id │ payload_len │ payload │
///         │  564E  │     │       │   (0)    │            │             │         │
///         └────────┴─────┴───────┴──────────┴────────────┴─────────────┴─────────┘
/// ```
/// All fields are little-endian `u32`.
pub fn encode_request(
    seq: u32,
    flags: u32,
    request_id: u32,
    payload: &[u8],
    dst: &mut BytesMut,
) -> Result<()> {
    check_payload_len(payload.len())?;

    dst.reserve(REQUEST_HEADER_SIZE + payload.len());
    dst.put_u32_le(REQUEST_SIGNATURE);
    dst.put_u32_le(seq);
    dst.put_u32_le(flags);
    dst.put_u32_le(0);
    dst.put_u32_le(request_id);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
    Ok(())
}

/// Encode a response into the wire format.
///
/// ```text
/// offset  0        4     8         12          16      20      24            28            32
///         ┌────────┬─────┬─────────┬───────────┬───────┬───────┬─────────────┬─────────────┬─────────┐
///         │ 0x5252 │ seq │ ret     │ ret_data  │ ts    │ ts    │ response_id │ payload_len │ payload │
///         │  564E  │     │ (i32)   │           │ recv  │ sent  │             │             │         │
///         └────────┴─────┴─────────┴───────────┴───────┴───────┴─────────────┴─────────────┴─────────┘
/// ```
pub fn encode_response(response: &Response, dst: &mut BytesMut) -> Result<()> {
    check_payload_len(response.payload.len())?;

    dst.reserve(response.wire_size());
    dst.put_u32_le(RESPONSE_SIGNATURE);
    dst.put_u32_le(response.seq);
    dst.put_i32_le(response.return_code.value());
    dst.put_u32_le(response.return_data);
    dst.put_u32_le(response.ts_received);
    dst.put_u32_le(response.ts_sent);
    dst.put_u32_le(response.response_id);
    dst.put_u32_le(response.payload.len() as u32);
    dst.put_slice(&response.payload);
    Ok(())
}

/// Decode one channel frame.
///
/// Bytes after the declared payload (slot padding) are ignored. A buffer
/// whose signature is unknown decodes to [`Frame::Malformed`] rather than an
/// error; errors are reserved for frames that claim to be RPC frames but
/// cannot be.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    if src.len() < 4 {
        return Ok(Frame::Malformed { signature: None });
    }

    let mut buf = src;
    let signature = buf.get_u32_le();
    match signature {
        REQUEST_SIGNATURE => decode_request(src).map(Frame::Request),
        RESPONSE_SIGNATURE => decode_response(src).map(Frame::Response),
        other => Ok(Frame::Malformed {
            signature: Some(other),
        }),
    }
}

/// Read the sequence number and request id from a request header without
/// validating its payload length.
///
/// Returns `None` unless `src` starts with the request signature and holds a
/// complete 24-byte header.
pub fn peek_request_header(src: &[u8]) -> Option<(u32, u32)> {
    if src.len() < REQUEST_HEADER_SIZE {
        return None;
    }
    let mut buf = &src[..REQUEST_HEADER_SIZE];
    if buf.get_u32_le() != REQUEST_SIGNATURE {
        return None;
    }
    let seq = buf.get_u32_le();
    buf.advance(8);
    Some((seq, buf.get_u32_le()))
}

fn decode_request(src: &[u8]) -> Result<Request> {
    check_available(REQUEST_HEADER_SIZE, src.len())?;

    let mut buf = &src[4..REQUEST_HEADER_SIZE];
    let seq = buf.get_u32_le();
    let flags = buf.get_u32_le();
    let _reserved = buf.get_u32_le();
    let request_id = buf.get_u32_le();
    let payload_len = buf.get_u32_le() as usize;

    let payload = take_payload(src, REQUEST_HEADER_SIZE, payload_len)?;
    Ok(Request {
        seq,
        flags,
        request_id,
        payload,
    })
}

fn decode_response(src: &[u8]) -> Result<Response> {
    check_available(RESPONSE_HEADER_SIZE, src.len())?;

    let mut buf = &src[4..RESPONSE_HEADER_SIZE];
    let seq = buf.get_u32_le();
    let return_code = ReturnCode(buf.get_i32_le());
    let return_data = buf.get_u32_le();
    let ts_received = buf.get_u32_le();
    let ts_sent = buf.get_u32_le();
    let response_id = buf.get_u32_le();
    let payload_len = buf.get_u32_le() as usize;

    let payload = take_payload(src, RESPONSE_HEADER_SIZE, payload_len)?;
    Ok(Response {
        seq,
        return_code,
        return_data,
        ts_received,
        ts_sent,
        response_id,
        payload,
    })
}

fn take_payload(src: &[u8], header: usize, payload_len: usize) -> Result<Bytes> {
    check_payload_len(payload_len)?;
    let end = header + payload_len;
    check_available(end, src.len())?;
    Ok(Bytes::copy_from_slice(&src[header..end]))
}

fn check_payload_len(len: usize) -> Result<()> {
    if len > MAX_PAYLOAD {
        return Err(FrameError::PayloadTooLarge {
            size: len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

fn check_available(needed: usize, available: usize) -> Result<()> {
    if available < needed {
        return Err(FrameError::TruncatedFrame { needed, available });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{REQ_TEST_DATA_ACK, RSP_TEST_DATA_ACK};

    fn encoded_request(seq: u32, flags: u32, id: u32, payload: &[u8]) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_request(seq, flags, id, payload, &mut buf).unwrap();
        buf
    }

    #[test]
    fn peek_reads_header_with_bad_length() {
        let mut buf = encoded_request(77, 0, 0x99, b"");
        buf[20..24].copy_from_slice(&2000u32.to_le_bytes());
        assert!(matches!(
            decode_frame(&buf),
            Err(FrameError::PayloadTooLarge { size: 2000, .. })
        ));
        assert_eq!(peek_request_header(&buf), Some((77, 0x99)));

        assert_eq!(peek_request_header(&buf[..23]), None);
        let response = {
            let mut out = BytesMut::new();
            encode_response(&Response::ret_code(77, ReturnCode::OK), &mut out).unwrap();
            out
        };
        assert_eq!(peek_request_header(&response), None);
    }

    #[test]
    fn request_roundtrip() {
        let buf = encoded_request(7, 0x10, REQ_TEST_DATA_ACK, b"hello, ivc");
        assert_eq!(buf.len(), REQUEST_HEADER_SIZE + 10);

        let frame = decode_frame(&buf).unwrap();
        assert_eq!(
            frame,
            Frame::Request(Request {
                seq: 7,
                flags: 0x10,
                request_id: REQ_TEST_DATA_ACK,
                payload: Bytes::from_static(b"hello, ivc"),
            })
        );
    }

    #[test]
    fn request_header_layout_is_bit_exact() {
        let buf = encoded_request(0x0102_0304, 0xAABB_CCDD, 0x7fff_fe00, &[0xEE]);
        let expected: [u8; 25] = [
            0x4E, 0x56, 0x52, 0x51, // signature
            0x04, 0x03, 0x02, 0x01, // seq
            0xDD, 0xCC, 0xBB, 0xAA, // flags
            0x00, 0x00, 0x00, 0x00, // reserved
            0x00, 0xFE, 0xFF, 0x7F, // request id
            0x01, 0x00, 0x00, 0x00, // payload length
            0xEE,
        ];
        assert_eq!(buf.as_ref(), &expected);
    }

    #[test]
    fn response_header_layout_is_bit_exact() {
        let response = Response {
            seq: 1,
            return_code: ReturnCode::UNKNOWN_REQUEST,
            return_data: 2,
            ts_received: 3,
            ts_sent: 4,
            response_id: RSP_RET_CODE,
            payload: Bytes::new(),
        };
        let mut buf = BytesMut::new();
        encode_response(&response, &mut buf).unwrap();

        assert_eq!(buf.len(), RESPONSE_HEADER_SIZE);
        assert_eq!(&buf[0..4], b"NVRR");
        assert_eq!(&buf[8..12], &(-2048i32).to_le_bytes());
        assert_eq!(&buf[24..28], &[0xFF, 0xFF, 0xFF, 0x7F]);
        assert_eq!(&buf[28..32], &[0, 0, 0, 0]);
    }

    #[test]
    fn response_roundtrip_with_payload() {
        let response = Response {
            seq: 99,
            return_code: ReturnCode(5),
            return_data: 0xdead_beef,
            ts_received: 100,
            ts_sent: 150,
            response_id: RSP_TEST_DATA_ACK,
            payload: Bytes::from_static(b"ack"),
        };
        let mut buf = BytesMut::new();
        encode_response(&response, &mut buf).unwrap();
        assert_eq!(decode_frame(&buf).unwrap(), Frame::Response(response));
    }

    #[test]
    fn max_payload_accepted_and_one_more_rejected() {
        let payload = vec![0x5A; MAX_PAYLOAD];
        let buf = encoded_request(1, 0, 1, &payload);
        assert_eq!(buf.len(), REQUEST_HEADER_SIZE + MAX_PAYLOAD);

        let mut buf = BytesMut::new();
        let err = encode_request(1, 0, 1, &vec![0; MAX_PAYLOAD + 1], &mut buf).unwrap_err();
        assert_eq!(
            err,
            FrameError::PayloadTooLarge {
                size: MAX_PAYLOAD + 1,
                max: MAX_PAYLOAD
            }
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn slot_padding_is_ignored() {
        let mut buf = encoded_request(3, 0, 9, b"abc");
        buf.resize(MAX_FRAME_SIZE, 0);

        match decode_frame(&buf).unwrap() {
            Frame::Request(req) => assert_eq!(req.payload.as_ref(), b"abc"),
            other => panic!("expected request, got {other:?}"),
        }
    }

    #[test]
    fn unknown_signature_is_malformed() {
        let frame = decode_frame(&[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]).unwrap();
        assert_eq!(
            frame,
            Frame::Malformed {
                signature: Some(u32::MAX)
            }
        );
        assert_eq!(
            decode_frame(&[0x4E, 0x56]).unwrap(),
            Frame::Malformed { signature: None }
        );
        assert_eq!(
            decode_frame(&[0u8; 64]).unwrap(),
            Frame::Malformed { signature: Some(0) }
        );
    }

    #[test]
    fn short_header_is_truncated() {
        let buf = encoded_request(1, 0, 1, b"");
        let err = decode_frame(&buf[..REQUEST_HEADER_SIZE - 1]).unwrap_err();
        assert!(matches!(err, FrameError::TruncatedFrame { needed: 24, .. }));
    }

    #[test]
    fn payload_past_buffer_end_is_truncated() {
        let buf = encoded_request(1, 0, 1, b"0123456789");
        let err = decode_frame(&buf[..REQUEST_HEADER_SIZE + 4]).unwrap_err();
        assert_eq!(
            err,
            FrameError::TruncatedFrame {
                needed: REQUEST_HEADER_SIZE + 10,
                available: REQUEST_HEADER_SIZE + 4
            }
        );
    }

    #[test]
    fn oversized_length_field_rejected_on_decode() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(RESPONSE_SIGNATURE);
        buf.put_bytes(0, 24);
        buf.put_u32_le(4096);
        buf.put_bytes(0, 4096);

        let err = decode_frame(&buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 4096, .. }));
    }

    #[test]
    fn reserved_field_ignored_on_decode() {
        let mut buf = encoded_request(4, 0, 2, b"");
        buf[12..16].copy_from_slice(&[1, 2, 3, 4]);
        assert!(matches!(decode_frame(&buf).unwrap(), Frame::Request(r) if r.seq == 4));
    }

    #[test]
    fn ret_code_response_helper() {
        let rsp = Response::ret_code(12, ReturnCode::OK);
        assert!(rsp.is_ret_code_only());
        assert!(rsp.payload.is_empty());
        assert_eq!(rsp.wire_size(), RESPONSE_HEADER_SIZE);
    }
}
