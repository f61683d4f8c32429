use std::io::{ErrorKind, Read, Write};
use std::sync::Mutex;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{FrameSink, FrameSource, IpcStream};

/// Default slot size: a 32-byte RPC header plus a 1 KiB payload.
pub const DEFAULT_FRAME_SIZE: usize = 32 + 1024;

/// Smallest usable slot: one response header with no payload.
pub const MIN_FRAME_SIZE: usize = 32;

/// Configuration for a stream-backed frame channel.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Bytes per slot. Both ends must agree on this out of band.
    pub frame_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<Duration>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            frame_size: DEFAULT_FRAME_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl ChannelConfig {
    /// Override the slot size.
    pub fn with_frame_size(mut self, frame_size: usize) -> Self {
        self.frame_size = frame_size;
        self
    }

    /// Reject slot sizes that cannot carry a header.
    pub fn validate(&self) -> Result<()> {
        if self.frame_size < MIN_FRAME_SIZE {
            return Err(TransportError::InvalidFrameSize {
                size: self.frame_size,
                min: MIN_FRAME_SIZE,
            });
        }
        Ok(())
    }
}

/// Writes fixed-size slots to any `Write` stream.
///
/// Every frame is zero-padded to `frame_size`, so the reader never needs a
/// length prefix to find the next slot.
pub struct SlotWriter<T> {
    inner: Mutex<WriterState<T>>,
    frame_size: usize,
    // Set when the stream carries a write timeout; a stall is then an error.
    write_timeout: Option<Duration>,
}

struct WriterState<T> {
    stream: T,
    buf: BytesMut,
}

impl<T: Write> SlotWriter<T> {
    /// Create a slot writer with the default slot size.
    pub fn new(inner: T) -> Self {
        Self::with_frame_size(inner, DEFAULT_FRAME_SIZE)
    }

    /// Create a slot writer with an explicit slot size.
    pub fn with_frame_size(inner: T, frame_size: usize) -> Self {
        Self {
            inner: Mutex::new(WriterState {
                stream: inner,
                buf: BytesMut::with_capacity(frame_size),
            }),
            frame_size,
            write_timeout: None,
        }
    }

    /// Report a stream stall as [`TransportError::WriteTimeout`] instead of
    /// retrying. Use when the stream itself has a write timeout set.
    pub fn with_write_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        let state = self
            .inner
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        state.stream
    }

    fn write_slot(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > self.frame_size {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max: self.frame_size,
            });
        }

        let mut state = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let WriterState { stream, buf } = &mut *state;

        buf.clear();
        buf.extend_from_slice(frame);
        buf.resize(self.frame_size, 0);

        let mut offset = 0usize;
        while offset < buf.len() {
            match stream.write(&buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stall(&err) => {
                    if self.write_timeout.is_some() {
                        return Err(TransportError::WriteTimeout {
                            written: offset,
                            slot: self.frame_size,
                        });
                    }
                    continue;
                }
                Err(err) if is_disconnect(&err) => return Err(TransportError::Closed),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        loop {
            match stream.flush() {
                Ok(()) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_stall(&err) && self.write_timeout.is_none() => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        trace!(len = frame.len(), slot = self.frame_size, "slot written");
        Ok(())
    }
}

impl<T: Write + Send> FrameSink for SlotWriter<T> {
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        self.write_slot(frame)
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }
}

/// Reads fixed-size slots from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole slots.
pub struct SlotReader<T> {
    inner: T,
    frame_size: usize,
    // Partially filled slot; survives a read timeout.
    slot: Vec<u8>,
    filled: usize,
}

impl<T: Read> SlotReader<T> {
    /// Create a slot reader with the default slot size.
    pub fn new(inner: T) -> Self {
        Self::with_frame_size(inner, DEFAULT_FRAME_SIZE)
    }

    /// Create a slot reader with an explicit slot size.
    pub fn with_frame_size(inner: T, frame_size: usize) -> Self {
        Self {
            inner,
            frame_size,
            slot: vec![0u8; frame_size],
            filled: 0,
        }
    }

    /// Slot size this reader expects.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn read_slot(&mut self) -> Result<Bytes> {
        while self.filled < self.frame_size {
            match self.inner.read(&mut self.slot[self.filled..]) {
                // EOF between slots and EOF mid-slot both end the channel.
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if is_disconnect(&err) => return Err(TransportError::Closed),
                Err(err) => return Err(TransportError::Io(err)),
            }
        }

        self.filled = 0;
        let slot = std::mem::replace(&mut self.slot, vec![0u8; self.frame_size]);
        Ok(Bytes::from(slot))
    }
}

impl<T: Read + Send> FrameSource for SlotReader<T> {
    fn read_frame(&mut self) -> Result<Bytes> {
        self.read_slot()
    }
}

/// Split a connected stream into a slot reader and a slot writer.
pub fn split_ipc(
    stream: IpcStream,
    config: &ChannelConfig,
) -> Result<(SlotReader<IpcStream>, SlotWriter<IpcStream>)> {
    config.validate()?;
    let reader_stream = stream.try_clone()?;
    reader_stream.set_read_timeout(config.read_timeout)?;
    stream.set_write_timeout(config.write_timeout)?;
    Ok((
        SlotReader::with_frame_size(reader_stream, config.frame_size),
        SlotWriter::with_frame_size(stream, config.frame_size)
            .with_write_timeout(config.write_timeout),
    ))
}

// Unix reports SO_SNDTIMEO expiry as WouldBlock.
fn is_stall(err: &std::io::Error) -> bool {
    matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
}

fn is_disconnect(err: &std::io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::BrokenPipe
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::UnexpectedEof
    )
}
