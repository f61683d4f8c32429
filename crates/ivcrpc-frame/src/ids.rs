//! Protocol signatures and reserved request/response identifiers.
//!
//! Identifiers `0x7ffffe00..=0x7fffffff` are reserved by the protocol.
//! Everything below is available to applications.

/// Signature of a request frame ("NVRQ" read little-endian).
pub const REQUEST_SIGNATURE: u32 = 0x5152_564E;

/// Signature of a response frame ("NVRR" read little-endian).
pub const RESPONSE_SIGNATURE: u32 = 0x5252_564E;

/// Response identifier for a bare return code with no structured payload.
pub const RSP_RET_CODE: u32 = 0x7fff_ffff;

/// Debug test: no payload, expect an [`RSP_RET_CODE`] response.
pub const REQ_TEST_NODATA_ACK: u32 = 0x7fff_fe00;

/// Debug test: no payload, expect no response (the call times out).
pub const REQ_TEST_NODATA_NACK: u32 = 0x7fff_fe01;

/// Debug test: payload, expect a [`RSP_TEST_DATA_ACK`] response.
pub const REQ_TEST_DATA_ACK: u32 = 0x7fff_fe02;

/// Debug test: payload, expect no response (the call times out).
pub const REQ_TEST_DATA_NACK: u32 = 0x7fff_fe03;

/// Response identifier answering [`REQ_TEST_DATA_ACK`].
pub const RSP_TEST_DATA_ACK: u32 = 0x7fff_fe02;

/// First identifier of the reserved range.
pub const RESERVED_ID_START: u32 = 0x7fff_fe00;

/// Human-readable name for a request identifier.
pub fn request_name(id: u32) -> &'static str {
    match id {
        REQ_TEST_NODATA_ACK => "TEST_NODATA_ACK",
        REQ_TEST_NODATA_NACK => "TEST_NODATA_NACK",
        REQ_TEST_DATA_ACK => "TEST_DATA_ACK",
        REQ_TEST_DATA_NACK => "TEST_DATA_NACK",
        RESERVED_ID_START..=u32::MAX => "RESERVED",
        _ => "USER",
    }
}

/// Human-readable name for a response identifier.
pub fn response_name(id: u32) -> &'static str {
    match id {
        RSP_RET_CODE => "RET_CODE",
        RSP_TEST_DATA_ACK => "TEST_DATA_ACK",
        RESERVED_ID_START..=u32::MAX => "RESERVED",
        _ => "USER",
    }
}

/// Returns true if the identifier is one of the four debug test requests.
pub fn is_test_request(id: u32) -> bool {
    (REQ_TEST_NODATA_ACK..=REQ_TEST_DATA_NACK).contains(&id)
}

/// Returns true if the identifier lies in the protocol-reserved range.
pub fn is_reserved(id: u32) -> bool {
    id >= RESERVED_ID_START
}
