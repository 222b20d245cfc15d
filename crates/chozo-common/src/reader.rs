//! Binary reader for zero-copy parsing of byte slices.
//!
//! [`BinaryReader`] is the borrowed counterpart of
//! [`EntryReadStream`](crate::EntryReadStream): it walks a slice (usually a
//! memory-mapped archive) without copying and implements
//! [`ReadStream`] so the big-endian typed reads are shared.

use zerocopy::FromBytes;

use crate::stream::resolve_seek;
use crate::{Error, ReadStream, Result, SeekOrigin};

/// A binary reader that provides zero-copy reading from a byte slice.
///
/// # Example
///
/// ```
/// use chozo_common::{BinaryReader, ReadStream};
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut reader = BinaryReader::new(&data);
///
/// assert_eq!(reader.read_u32().unwrap(), 0x01020304);
/// assert_eq!(reader.read_u32().unwrap(), 0x05060708);
/// assert!(reader.is_empty());
/// ```
#[derive(Debug, Clone)]
pub struct BinaryReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BinaryReader<'a> {
    /// Create a new reader from a byte slice.
    #[inline]
    pub const fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a new reader starting at a specific position.
    #[inline]
    pub const fn new_at(data: &'a [u8], position: usize) -> Self {
        Self { data, position }
    }

    /// Current position as a slice index.
    #[inline]
    pub const fn offset(&self) -> usize {
        self.position
    }

    /// Check if there are no more bytes to read.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.position >= self.data.len()
    }

    /// Jump to an absolute slice index.
    #[inline]
    pub fn set_offset(&mut self, position: usize) -> Result<()> {
        if position > self.data.len() {
            return Err(Error::CursorOverrun {
                position: position as u64,
                length: self.data.len() as u64,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Get the remaining bytes as a slice.
    #[inline]
    pub fn remaining_bytes(&self) -> &'a [u8] {
        &self.data[self.position.min(self.data.len())..]
    }

    /// Peek at bytes without advancing the position.
    #[inline]
    pub fn peek_bytes(&self, count: usize) -> Result<&'a [u8]> {
        let available = self.data.len().saturating_sub(self.position);
        if available < count {
            return Err(Error::UnexpectedEof {
                needed: count,
                available,
            });
        }
        Ok(&self.data[self.position..self.position + count])
    }

    /// Read bytes and advance the position.
    #[inline]
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8]> {
        let bytes = self.peek_bytes(count)?;
        self.position += count;
        Ok(bytes)
    }

    /// Read a null-terminated string borrowed from the buffer.
    pub fn read_cstr(&mut self) -> Result<&'a str> {
        let start = self.position;
        let remaining = self.remaining_bytes();

        let null_pos = memchr::memchr(0, remaining).ok_or(Error::MissingNullTerminator)?;

        let string_bytes = &remaining[..null_pos];
        self.position = start + null_pos + 1;

        std::str::from_utf8(string_bytes).map_err(Error::Utf8)
    }

    /// Read a struct using zerocopy.
    ///
    /// The struct must implement `FromBytes` from the zerocopy crate.
    #[inline]
    pub fn read_struct<T: FromBytes>(&mut self) -> Result<T> {
        let size = std::mem::size_of::<T>();
        let bytes = self.read_bytes(size)?;
        T::read_from_bytes(bytes).map_err(|_| Error::UnexpectedEof {
            needed: size,
            available: bytes.len(),
        })
    }

    /// Peek at a big-endian u32 without advancing.
    #[inline]
    pub fn peek_u32(&self) -> Result<u32> {
        let bytes = self.peek_bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Expect a specific value or return an error.
    pub fn expect<T: PartialEq + std::fmt::Debug + FromBytes>(&mut self, expected: T) -> Result<()> {
        let actual = self.read_struct::<T>()?;
        if actual != expected {
            return Err(Error::ExpectedValue {
                expected: format!("{:?}", expected),
                actual: format!("{:?}", actual),
            });
        }
        Ok(())
    }
}

impl ReadStream for BinaryReader<'_> {
    #[inline]
    fn position(&self) -> u64 {
        self.position as u64
    }

    #[inline]
    fn length(&self) -> u64 {
        self.data.len() as u64
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> Result<()> {
        self.position = resolve_seek(offset, origin, self.position as u64, self.length())? as usize;
        Ok(())
    }

    fn read_to_buf(&mut self, buf: &mut [u8]) -> Result<usize> {
        let src = self.remaining_bytes();
        let count = buf.len().min(src.len());
        buf[..count].copy_from_slice(&src[..count]);
        self.position += count;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::byteorder::big_endian::U32;
    use zerocopy::{Immutable, KnownLayout};

    #[derive(Debug, FromBytes, KnownLayout, Immutable)]
    #[repr(C, packed)]
    struct Pair {
        a: U32,
        b: U32,
    }

    #[test]
    fn test_read_primitives() {
        let data = [
            0x01u8, 0x02, 0x03, 0x04, // u32: 0x01020304
            0xFF, 0xFF, 0xFF, 0xFF, // u32: 0xFFFFFFFF
        ];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
        assert_eq!(reader.read_u32().unwrap(), 0xFFFFFFFF);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_read_cstr() {
        let data = b"hello\0world\0";
        let mut reader = BinaryReader::new(data);

        assert_eq!(reader.read_cstr().unwrap(), "hello");
        assert_eq!(reader.read_cstr().unwrap(), "world");
        assert!(reader.read_cstr().is_err());
    }

    #[test]
    fn test_peek_does_not_advance() {
        let data = [0x01, 0x02, 0x03, 0x04];
        let mut reader = BinaryReader::new(&data);

        assert_eq!(reader.peek_u32().unwrap(), 0x01020304);
        assert_eq!(reader.offset(), 0);
        assert_eq!(reader.read_u32().unwrap(), 0x01020304);
        assert_eq!(reader.offset(), 4);
    }

    #[test]
    fn test_read_struct() {
        let data = [0, 0, 0, 1, 0, 0, 0, 2];
        let mut reader = BinaryReader::new(&data);
        let pair: Pair = reader.read_struct().unwrap();
        assert_eq!(pair.a.get(), 1);
        assert_eq!(pair.b.get(), 2);
    }

    #[test]
    fn test_eof_error() {
        let data = [0x01, 0x02];
        let mut reader = BinaryReader::new(&data);

        assert!(reader.read_u32().is_err());
        assert!(reader.set_offset(3).is_err());
    }
}
