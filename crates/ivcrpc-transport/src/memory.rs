//! In-process channel pair with a fixed number of fixed-size slots.
//!
//! Behaves like a shared-memory ring: a write into a full ring fails with
//! `Full` instead of blocking, and dropping one end closes the other.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::time::Duration;

use bytes::Bytes;
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::traits::{FrameSink, FrameSource};

/// Write half of a memory channel. Cheap to clone.
#[derive(Clone)]
pub struct MemorySink {
    tx: SyncSender<Bytes>,
    frame_size: usize,
    capacity: usize,
}

/// Arrival half of a memory channel.
pub struct MemorySource {
    rx: Receiver<Bytes>,
}

/// One end of a bidirectional in-memory channel.
pub struct MemoryChannel {
    pub sink: MemorySink,
    pub source: MemorySource,
}

impl MemoryChannel {
    /// Create two connected ends. Each direction holds up to `capacity`
    /// frames of `frame_size` bytes.
    pub fn pair(frame_size: usize, capacity: usize) -> (MemoryChannel, MemoryChannel) {
        let (a_tx, a_rx) = mpsc::sync_channel(capacity);
        let (b_tx, b_rx) = mpsc::sync_channel(capacity);

        let a = MemoryChannel {
            sink: MemorySink {
                tx: a_tx,
                frame_size,
                capacity,
            },
            source: MemorySource { rx: b_rx },
        };
        let b = MemoryChannel {
            sink: MemorySink {
                tx: b_tx,
                frame_size,
                capacity,
            },
            source: MemorySource { rx: a_rx },
        };
        (a, b)
    }

    /// Split into the write and arrival halves.
    pub fn split(self) -> (MemorySink, MemorySource) {
        (self.sink, self.source)
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&self, frame: &[u8]) -> Result<()> {
        if frame.len() > self.frame_size {
            return Err(TransportError::FrameTooLarge {
                size: frame.len(),
                max: self.frame_size,
            });
        }

        let mut slot = vec![0u8; self.frame_size];
        slot[..frame.len()].copy_from_slice(frame);

        match self.tx.try_send(Bytes::from(slot)) {
            Ok(()) => {
                trace!(len = frame.len(), "memory slot queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(TransportError::Full {
                capacity: self.capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(TransportError::Closed),
        }
    }

    fn frame_size(&self) -> usize {
        self.frame_size
    }
}

impl MemorySource {
    /// Take the next frame if one is queued.
    pub fn try_read_frame(&mut self) -> Result<Option<Bytes>> {
        match self.rx.try_recv() {
            Ok(frame) => Ok(Some(frame)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Closed),
        }
    }

    /// Wait up to `timeout` for the next frame.
    pub fn read_frame_timeout(&mut self, timeout: Duration) -> Result<Option<Bytes>> {
        match self.rx.recv_timeout(timeout) {
            Ok(frame) => Ok(Some(frame)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Closed),
        }
    }
}

impl FrameSource for MemorySource {
    fn read_frame(&mut self) -> Result<Bytes> {
        self.rx.recv().map_err(|_| TransportError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_cross_in_both_directions() {
        let (a, b) = MemoryChannel::pair(16, 4);
        let (a_sink, mut a_source) = a.split();
        let (b_sink, mut b_source) = b.split();

        a_sink.write_frame(b"to-b").unwrap();
        b_sink.write_frame(b"to-a").unwrap();

        let at_b = b_source.read_frame().unwrap();
        let at_a = a_source.read_frame().unwrap();
        assert_eq!(&at_b[..4], b"to-b");
        assert_eq!(&at_a[..4], b"to-a");
        assert_eq!(at_b.len(), 16);
    }

    #[test]
    fn full_ring_rejects_write() {
        let (a, _b) = MemoryChannel::pair(8, 2);
        a.sink.write_frame(b"1").unwrap();
        a.sink.write_frame(b"2").unwrap();
        let err = a.sink.write_frame(b"3").unwrap_err();
        assert!(matches!(err, TransportError::Full { capacity: 2 }));
    }

    #[test]
    fn oversized_frame_rejected() {
        let (a, _b) = MemoryChannel::pair(4, 2);
        let err = a.sink.write_frame(b"12345").unwrap_err();
        assert!(matches!(err, TransportError::FrameTooLarge { .. }));
    }

    #[test]
    fn dropping_peer_closes_channel() {
        let (a, b) = MemoryChannel::pair(8, 2);
        drop(b);
        let (sink, mut source) = a.split();
        assert!(matches!(sink.write_frame(b"x"), Err(TransportError::Closed)));
        assert!(matches!(source.read_frame(), Err(TransportError::Closed)));
    }

    #[test]
    fn try_read_on_empty_ring_is_none() {
        let (mut a, _b) = MemoryChannel::pair(8, 2);
        assert!(a.source.try_read_frame().unwrap().is_none());
        assert!(a
            .source
            .read_frame_timeout(Duration::from_millis(5))
            .unwrap()
            .is_none());
    }
}
