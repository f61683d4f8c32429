//! Explicit typed payload encoding.
//!
//! Both domains read payloads field by field in little-endian order. Nothing
//! is reinterpreted in place, so alignment and padding on either side never
//! leak into the wire format.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::MAX_PAYLOAD;
use crate::error::{FrameError, Result};

/// A message type with an explicit payload layout.
pub trait WireMessage: Sized {
    fn encode(&self, w: &mut PayloadWriter) -> Result<()>;
    fn decode(r: &mut PayloadReader<'_>) -> Result<Self>;

    /// Encode into a standalone payload buffer.
    fn to_payload(&self) -> Result<Bytes> {
        let mut w = PayloadWriter::new();
        self.encode(&mut w)?;
        Ok(w.finish())
    }

    /// Decode from a payload buffer. Trailing bytes are ignored.
    fn from_payload(payload: &[u8]) -> Result<Self> {
        Self::decode(&mut PayloadReader::new(payload))
    }
}

/// Appends little-endian fields to a payload, never exceeding
/// [`MAX_PAYLOAD`] bytes.
#[derive(Debug, Default)]
pub struct PayloadWriter {
    buf: BytesMut,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_u8(&mut self, v: u8) -> Result<()> {
        self.ensure(1)?;
        self.buf.put_u8(v);
        Ok(())
    }

    pub fn put_u16(&mut self, v: u16) -> Result<()> {
        self.ensure(2)?;
        self.buf.put_u16_le(v);
        Ok(())
    }

    pub fn put_u32(&mut self, v: u32) -> Result<()> {
        self.ensure(4)?;
        self.buf.put_u32_le(v);
        Ok(())
    }

    pub fn put_i32(&mut self, v: i32) -> Result<()> {
        self.ensure(4)?;
        self.buf.put_i32_le(v);
        Ok(())
    }

    pub fn put_u64(&mut self, v: u64) -> Result<()> {
        self.ensure(8)?;
        self.buf.put_u64_le(v);
        Ok(())
    }

    pub fn put_bytes(&mut self, v: &[u8]) -> Result<()> {
        self.ensure(v.len())?;
        self.buf.put_slice(v);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }

    fn ensure(&self, extra: usize) -> Result<()> {
        let size = self.buf.len() + extra;
        if size > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size,
                max: MAX_PAYLOAD,
            });
        }
        Ok(())
    }
}

/// Reads little-endian fields from a payload.
#[derive(Debug)]
pub struct PayloadReader<'a> {
    buf: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn get_u16(&mut self) -> Result<u16> {
        self.need(2)?;
        Ok(self.buf.get_u16_le())
    }

    pub fn get_u32(&mut self) -> Result<u32> {
        self.need(4)?;
        Ok(self.buf.get_u32_le())
    }

    pub fn get_i32(&mut self) -> Result<i32> {
        self.need(4)?;
        Ok(self.buf.get_i32_le())
    }

    pub fn get_u64(&mut self) -> Result<u64> {
        self.need(8)?;
        Ok(self.buf.get_u64_le())
    }

    pub fn get_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.need(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn need(&self, needed: usize) -> Result<()> {
        if self.buf.len() < needed {
            return Err(FrameError::PayloadUnderrun {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }
}
