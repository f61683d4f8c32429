/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the protocol maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// A recognized frame claims more bytes than the buffer holds.
    #[error("truncated frame (need {needed} bytes, have {available})")]
    TruncatedFrame { needed: usize, available: usize },

    /// A typed payload decoder ran past the end of the payload.
    #[error("payload underrun (need {needed} bytes, {remaining} remaining)")]
    PayloadUnderrun { needed: usize, remaining: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
