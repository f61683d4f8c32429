use std::path::PathBuf;

/// Errors raised by a frame channel.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the underlying stream.
    #[error("channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The frame does not fit in one channel slot.
    #[error("frame too large for channel ({size} bytes, slot {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The slot size cannot hold an RPC header.
    #[error("frame size {size} below minimum {min}")]
    InvalidFrameSize { size: usize, min: usize },

    /// The peer stopped draining the stream within the write timeout.
    ///
    /// When `written` is non-zero the slot boundary is lost and the channel
    /// must not be reused.
    #[error("write timed out after {written} of {slot} slot bytes")]
    WriteTimeout { written: usize, slot: usize },

    /// Every slot of a bounded channel is occupied.
    #[error("channel full ({capacity} frames queued)")]
    Full { capacity: usize },

    /// The remote end is gone; no further frames will move.
    #[error("channel closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;
