use ivcrpc_frame::{FrameError, ReturnCode};
use ivcrpc_transport::TransportError;

/// Errors that can occur in engine operations.
///
/// These are reported synchronously to the sending or registering code.
/// Call outcomes (timeouts, cancellation, remote return codes) travel
/// through [`crate::Outcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Frame-level error (payload too large, truncated frame).
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The channel refused the frame.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A sequence number was registered twice while still outstanding.
    #[error("sequence number {0} is already outstanding")]
    DuplicateSequence(u32),

    /// A handler is already registered for this request identifier.
    #[error("handler already registered for request id {0:#010x}")]
    DuplicateHandler(u32),

    /// No handler is registered for this request identifier.
    #[error("no handler for request id {0:#010x}")]
    UnknownRequest(u32),

    /// The outstanding-call ceiling has been reached.
    #[error("too many outstanding calls (limit {limit})")]
    TooManyOutstanding { limit: usize },

    /// The engine has been shut down.
    #[error("engine shut down")]
    Shutdown,
}

/// Flat classification of [`RpcError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PayloadTooLarge,
    TruncatedFrame,
    BadPayload,
    Transport,
    DuplicateSequence,
    DuplicateHandler,
    UnknownRequest,
    TooManyOutstanding,
    Shutdown,
}

impl RpcError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Frame(FrameError::PayloadTooLarge { .. }) => ErrorKind::PayloadTooLarge,
            Self::Frame(FrameError::TruncatedFrame { .. }) => ErrorKind::TruncatedFrame,
            Self::Frame(FrameError::PayloadUnderrun { .. }) => ErrorKind::BadPayload,
            Self::Transport(_) => ErrorKind::Transport,
            Self::DuplicateSequence(_) => ErrorKind::DuplicateSequence,
            Self::DuplicateHandler(_) => ErrorKind::DuplicateHandler,
            Self::UnknownRequest(_) => ErrorKind::UnknownRequest,
            Self::TooManyOutstanding { .. } => ErrorKind::TooManyOutstanding,
            Self::Shutdown => ErrorKind::Shutdown,
        }
    }

    /// Return code a responder puts on the wire for this error.
    pub fn return_code(&self) -> ReturnCode {
        match self {
            Self::UnknownRequest(_) => ReturnCode::UNKNOWN_REQUEST,
            Self::Frame(FrameError::PayloadUnderrun { .. }) => ReturnCode::BAD_PARAMETER,
            Self::TooManyOutstanding { .. } => ReturnCode::OUT_OF_MEMORY,
            _ => ReturnCode::IO_ERROR,
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
