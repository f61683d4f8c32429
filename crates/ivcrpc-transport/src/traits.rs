use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;

use crate::error::Result;

/// Write side of a frame channel.
///
/// One call moves exactly one frame. A frame written successfully cannot be
/// recalled; the channel gives no delivery receipt.
pub trait FrameSink: Send + Sync {
    /// Hand one frame to the channel.
    ///
    /// Fails with `FrameTooLarge` if `frame` exceeds [`FrameSink::frame_size`],
    /// `Full` if the channel has no free slot, `Closed` if the peer is gone.
    fn write_frame(&self, frame: &[u8]) -> Result<()>;

    /// Size of one channel slot in bytes.
    fn frame_size(&self) -> usize;
}

/// Arrival side of a frame channel.
pub trait FrameSource: Send {
    /// Block until the next frame arrives.
    ///
    /// Returns `Err(TransportError::Closed)` once the channel is torn down.
    /// The returned buffer may carry trailing slot padding.
    fn read_frame(&mut self) -> Result<Bytes>;
}

impl<T: FrameSink + ?Sized> FrameSink for Arc<T> {
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn frame_size(&self) -> usize {
        (**self).frame_size()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        (**self).write_frame(frame)
    }

    fn frame_size(&self) -> usize {
        (**self).frame_size()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_frame(&mut self) -> Result<Bytes> {
        (**self).read_frame()
    }
}

/// A connected local byte stream implementing `Read` and `Write`.
///
/// Carries slot-framed channel traffic between two processes that stand in
/// for the two execution domains.
pub struct IpcStream {
    inner: IpcStreamInner,
}

enum IpcStreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for IpcStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for IpcStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl IpcStream {
    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: IpcStreamInner::Unix(stream),
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<std::time::Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => {
                let cloned = stream.try_clone()?;
                Ok(Self::from_unix(cloned))
            }
        }
    }

    /// Shut down both directions; a blocked reader on a clone sees EOF.
    pub fn shutdown(&self) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(stream) => stream
                .shutdown(std::net::Shutdown::Both)
                .map_err(Into::into),
        }
    }
}

impl std::fmt::Debug for IpcStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            #[cfg(unix)]
            IpcStreamInner::Unix(_) => f.debug_struct("IpcStream").field("type", &"unix").finish(),
        }
    }
}
