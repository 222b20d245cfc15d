//! Seekable big-endian stream abstraction.
//!
//! Section walkers read through [`ReadStream`] so the same code can run over
//! a plain decoded buffer ([`EntryReadStream`]) or over a block-compressed
//! area payload.

use byteorder::{BigEndian, ByteOrder};

use crate::{Error, FourCC, IdWidth, ResourceId, Result};

/// Origin of a relative seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    /// From the start of the stream.
    Begin,
    /// From the current position.
    Current,
    /// From the end of the stream.
    End,
}

/// Resolve a seek request to an absolute position.
///
/// Fails when the result is negative or beyond `length`.
pub fn resolve_seek(offset: i64, origin: SeekOrigin, position: u64, length: u64) -> Result<u64> {
    let base = match origin {
        SeekOrigin::Begin => 0i128,
        SeekOrigin::Current => position as i128,
        SeekOrigin::End => length as i128,
    };
    let target = base + offset as i128;
    if target < 0 || target > length as i128 {
        return Err(Error::CursorOverrun {
            position: target.max(0) as u64,
            length,
        });
    }
    Ok(target as u64)
}

/// A bounded, seekable, big-endian byte stream.
pub trait ReadStream {
    /// Current absolute position.
    fn position(&self) -> u64;

    /// Total logical length.
    fn length(&self) -> u64;

    /// Move the cursor. Landing beyond [`length`](Self::length) is an error.
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<()>;

    /// Read up to `buf.len()` bytes, clamping at the end of the stream.
    /// Returns the number of bytes copied.
    fn read_to_buf(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Bytes left before the end.
    fn remaining(&self) -> u64 {
        self.length().saturating_sub(self.position())
    }

    /// Read exactly `buf.len()` bytes.
    fn read_exact_bytes(&mut self, buf: &mut [u8]) -> Result<()> {
        let available = self.remaining() as usize;
        if available < buf.len() {
            return Err(Error::UnexpectedEof {
                needed: buf.len(),
                available,
            });
        }
        let read = self.read_to_buf(buf)?;
        if read != buf.len() {
            return Err(Error::UnexpectedEof {
                needed: buf.len(),
                available: read,
            });
        }
        Ok(())
    }

    /// Read exactly `count` bytes into a new vector.
    fn read_vec(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact_bytes(&mut buf)?;
        Ok(buf)
    }

    fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact_bytes(&mut b)?;
        Ok(b[0])
    }

    fn read_i8(&mut self) -> Result<i8> {
        self.read_u8().map(|b| b as i8)
    }

    fn read_bool(&mut self) -> Result<bool> {
        self.read_u8().map(|b| b != 0)
    }

    fn read_u16(&mut self) -> Result<u16> {
        let mut b = [0u8; 2];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_u16(&b))
    }

    fn read_i16(&mut self) -> Result<i16> {
        let mut b = [0u8; 2];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_i16(&b))
    }

    fn read_u32(&mut self) -> Result<u32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_u32(&b))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_i32(&b))
    }

    fn read_u64(&mut self) -> Result<u64> {
        let mut b = [0u8; 8];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_u64(&b))
    }

    fn read_f32(&mut self) -> Result<f32> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(BigEndian::read_f32(&b))
    }

    fn read_vec3(&mut self) -> Result<[f32; 3]> {
        Ok([self.read_f32()?, self.read_f32()?, self.read_f32()?])
    }

    fn read_fourcc(&mut self) -> Result<FourCC> {
        let mut b = [0u8; 4];
        self.read_exact_bytes(&mut b)?;
        Ok(FourCC(b))
    }

    /// Read a resource id of the given width.
    fn read_id(&mut self, width: IdWidth) -> Result<ResourceId> {
        let raw = match width {
            IdWidth::Bits32 => self.read_u32()? as u64,
            IdWidth::Bits64 => self.read_u64()?,
        };
        Ok(ResourceId::new(raw, width))
    }

    /// Read a NUL-terminated string.
    fn read_cstring(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            if self.remaining() == 0 {
                return Err(Error::MissingNullTerminator);
            }
            match self.read_u8()? {
                0 => break,
                b => bytes.push(b),
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Read a big-endian u32 and fail unless it equals `expected`.
    fn expect_magic(&mut self, expected: u32) -> Result<()> {
        let actual = self.read_u32()?;
        if actual != expected {
            return Err(Error::InvalidMagic { expected, actual });
        }
        Ok(())
    }

    /// Advance to the next multiple of 32.
    fn seek_align32(&mut self) -> Result<()> {
        let target = crate::round_up_32(self.position());
        self.seek(target as i64, SeekOrigin::Begin)
    }

    /// Skip `count` bytes forward.
    fn skip(&mut self, count: u64) -> Result<()> {
        self.seek(count as i64, SeekOrigin::Current)
    }
}

/// Bounded stream over an owned, fully decoded resource buffer.
///
/// Construction with a cursor at or beyond the end and seeks beyond the end
/// both fail with [`Error::CursorOverrun`].
#[derive(Debug, Clone)]
pub struct EntryReadStream {
    data: Vec<u8>,
    position: u64,
}

impl EntryReadStream {
    /// Wrap `data`, placing the cursor at `position`.
    pub fn new(data: Vec<u8>, position: u64) -> Result<Self> {
        let length = data.len() as u64;
        if position >= length {
            return Err(Error::CursorOverrun { position, length });
        }
        Ok(Self { data, position })
    }

    /// Wrap `data` with the cursor at 0. An empty buffer is an error, as
    /// with [`new`](Self::new).
    pub fn from_vec(data: Vec<u8>) -> Result<Self> {
        Self::new(data, 0)
    }

    /// The whole underlying buffer.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Take the underlying buffer back.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl ReadStream for EntryReadStream {
    #[inline]
    fn position(&self) -> u64 {
        self.position
    }

    #[inline]
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<()> {
        self.position = resolve_seek(offset, origin, self.position, self.length())?;
        Ok(())
    }

    fn read_to_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let start = self.position as usize;
        let count = buf.len().min(self.data.len().saturating_sub(start));
        buf[..count].copy_from_slice(&self.data[start..start + count]);
        self.position += count as u64;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construct_past_end_fails() {
        assert!(EntryReadStream::new(vec![1, 2, 3], 3).is_err());
        assert!(EntryReadStream::new(Vec::new(), 0).is_err());
        assert!(EntryReadStream::new(vec![1, 2, 3], 2).is_ok());
    }

    #[test]
    fn test_seek_bounds() {
        let mut s = EntryReadStream::from_vec(vec![0u8; 16]).unwrap();
        s.seek(16, SeekOrigin::Begin).unwrap();
        assert_eq!(s.remaining(), 0);
        let err = s.seek(1, SeekOrigin::Current).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Corrupt);
        assert!(s.seek(-17, SeekOrigin::End).is_err());
        s.seek(-4, SeekOrigin::End).unwrap();
        assert_eq!(s.position(), 12);
    }

    #[test]
    fn test_bulk_read_clamps() {
        let mut s = EntryReadStream::new(vec![1, 2, 3, 4], 2).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(s.read_to_buf(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], &[3, 4]);
        assert!(s.read_u8().is_err());
    }

    #[test]
    fn test_typed_reads_big_endian() {
        let mut data = vec![0x12, 0x34, 0x56, 0x78, 0x3F, 0x80, 0x00, 0x00];
        data.extend_from_slice(b"AB\0");
        let mut s = EntryReadStream::from_vec(data).unwrap();
        assert_eq!(s.read_u32().unwrap(), 0x1234_5678);
        assert_eq!(s.read_f32().unwrap(), 1.0);
        assert_eq!(s.read_cstring().unwrap(), "AB");
    }

    #[test]
    fn test_align32() {
        let mut s = EntryReadStream::from_vec(vec![0u8; 64]).unwrap();
        s.seek(5, SeekOrigin::Begin).unwrap();
        s.seek_align32().unwrap();
        assert_eq!(s.position(), 32);
        s.seek_align32().unwrap();
        assert_eq!(s.position(), 32);
    }
}
