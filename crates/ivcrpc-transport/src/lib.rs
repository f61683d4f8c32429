//! Fixed-size frame channels for the IVC RPC engine.
//!
//! An IVC channel moves frames of one fixed size between two execution
//! domains. This crate models that collaborator:
//! - [`FrameSink`] / [`FrameSource`]: the write side and the arrival side
//! - [`SlotWriter`] / [`SlotReader`]: fixed-size slots over any byte stream
//! - [`MemoryChannel`]: an in-process, fixed-capacity channel pair
//! - [`UnixDomainSocket`]: a local socket carrying slot-framed traffic
//!
//! Nothing here understands RPC headers; a frame is just bytes that must fit
//! in one slot.

pub mod error;
pub mod memory;
pub mod slot;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::{MemoryChannel, MemorySink, MemorySource};
pub use slot::{ChannelConfig, SlotReader, SlotWriter, DEFAULT_FRAME_SIZE, MIN_FRAME_SIZE};
pub use traits::{FrameSink, FrameSource, IpcStream};

#[cfg(unix)]
pub use uds::UnixDomainSocket;
