//! Response return codes and their phase bands.
//!
//! Negative codes are partitioned so a caller can tell where an error came
//! from by value alone:
//!
//! ```text
//!  0 ..                  success (positive values are handler-defined)
//! -1024 ..= -2047        initialization phase
//! -2048 ..= -3071        generated by the responder's RPC layer
//!  ..= -4096             application defined
//! ```
//!
//! The gaps (`-1..=-1023`, `-3072..=-4095`) belong to no band.

use std::fmt;

/// First (least negative) code of the initialization band.
pub const ERR_RANGE_INIT_BEGIN: i32 = -1024;
/// Last code of the initialization band.
pub const ERR_RANGE_INIT_END: i32 = -2047;
/// First code of the responder band.
pub const ERR_RANGE_RSP_BEGIN: i32 = -2048;
/// Last code of the responder band.
pub const ERR_RANGE_RSP_END: i32 = -3071;
/// First code of the application band; it extends down to `i32::MIN`.
pub const ERR_RANGE_USER_BEGIN: i32 = -4096;

/// Which phase a return code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturnCodeBand {
    Success,
    Init,
    Responder,
    Application,
    Unclassified,
}

impl ReturnCodeBand {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Init => "init",
            Self::Responder => "responder",
            Self::Application => "application",
            Self::Unclassified => "unclassified",
        }
    }
}

/// Signed 32-bit return code carried in every response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ReturnCode(pub i32);

impl ReturnCode {
    pub const OK: Self = Self(0);
    /// The responder has no handler for the request identifier.
    pub const UNKNOWN_REQUEST: Self = Self(ERR_RANGE_RSP_BEGIN);
    /// The request did not carry an RPC signature.
    pub const UNKNOWN_REQUEST_NON_RPC: Self = Self(ERR_RANGE_RSP_BEGIN - 1);
    pub const BAD_PARAMETER: Self = Self(ERR_RANGE_RSP_BEGIN - 2);
    pub const OUT_OF_MEMORY: Self = Self(ERR_RANGE_RSP_BEGIN - 3);
    pub const NO_DEVICE: Self = Self(ERR_RANGE_RSP_BEGIN - 4);
    pub const IO_ERROR: Self = Self(ERR_RANGE_RSP_BEGIN - 5);

    /// Build an application-band code; `offset` counts down from -4096.
    ///
    /// Returns `None` if the result would overflow `i32`.
    pub fn application(offset: u32) -> Option<Self> {
        let offset = i32::try_from(offset).ok()?;
        ERR_RANGE_USER_BEGIN.checked_sub(offset).map(Self)
    }

    pub fn value(self) -> i32 {
        self.0
    }

    pub fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub fn is_error(self) -> bool {
        self.0 < 0
    }

    pub fn band(self) -> ReturnCodeBand {
        match self.0 {
            0.. => ReturnCodeBand::Success,
            ERR_RANGE_INIT_END..=ERR_RANGE_INIT_BEGIN => ReturnCodeBand::Init,
            ERR_RANGE_RSP_END..=ERR_RANGE_RSP_BEGIN => ReturnCodeBand::Responder,
            i32::MIN..=ERR_RANGE_USER_BEGIN => ReturnCodeBand::Application,
            _ => ReturnCodeBand::Unclassified,
        }
    }

    /// Short description for the named responder codes.
    pub fn describe(self) -> Option<&'static str> {
        match self {
            Self::OK => Some("ok"),
            Self::UNKNOWN_REQUEST => Some("unknown request"),
            Self::UNKNOWN_REQUEST_NON_RPC => Some("unknown request (non-rpc)"),
            Self::BAD_PARAMETER => Some("invalid parameter"),
            Self::OUT_OF_MEMORY => Some("out of memory"),
            Self::NO_DEVICE => Some("no device"),
            Self::IO_ERROR => Some("i/o error"),
            _ => None,
        }
    }
}

impl From<i32> for ReturnCode {
    fn from(value: i32) -> Self {
        Self(value)
    }
}

impl From<ReturnCode> for i32 {
    fn from(code: ReturnCode) -> Self {
        code.0
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.describe() {
            Some(text) => write!(f, "{} ({text})", self.0),
            None => write!(f, "{} ({})", self.0, self.band().as_str()),
        }
    }
}
