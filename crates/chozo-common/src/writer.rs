//! Big-endian binary writer.

use byteorder::{BigEndian, ByteOrder};
use zerocopy::{Immutable, IntoBytes};

use crate::{round_up_32_usize, FourCC, ResourceId};

/// Growable big-endian writer over a `Vec<u8>`.
///
/// # Example
///
/// ```
/// use chozo_common::BinaryWriter;
///
/// let mut w = BinaryWriter::new();
/// w.write_u32(0xDEADBEEF);
/// w.align32();
/// assert_eq!(w.len(), 32);
/// assert_eq!(&w.as_slice()[..4], &[0xDE, 0xAD, 0xBE, 0xEF]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct BinaryWriter {
    buf: Vec<u8>,
}

impl BinaryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.push(value as u8);
    }

    pub fn write_u16(&mut self, value: u16) {
        let mut b = [0u8; 2];
        BigEndian::write_u16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_i16(&mut self, value: i16) {
        let mut b = [0u8; 2];
        BigEndian::write_i16(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u32(&mut self, value: u32) {
        let mut b = [0u8; 4];
        BigEndian::write_u32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_u64(&mut self, value: u64) {
        let mut b = [0u8; 8];
        BigEndian::write_u64(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_f32(&mut self, value: f32) {
        let mut b = [0u8; 4];
        BigEndian::write_f32(&mut b, value);
        self.buf.extend_from_slice(&b);
    }

    pub fn write_vec3(&mut self, value: [f32; 3]) {
        for v in value {
            self.write_f32(v);
        }
    }

    pub fn write_fourcc(&mut self, value: FourCC) {
        self.buf.extend_from_slice(&value.0);
    }

    /// Write an id at its own width.
    pub fn write_id(&mut self, id: ResourceId) {
        self.buf.extend_from_slice(&id.to_be_bytes());
    }

    /// Write a string followed by a NUL byte.
    pub fn write_cstring(&mut self, value: &str) {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
    }

    /// Write a zerocopy struct verbatim.
    pub fn write_struct<T: IntoBytes + Immutable>(&mut self, value: &T) {
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Overwrite a u32 at an earlier offset.
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        BigEndian::write_u32(&mut self.buf[offset..offset + 4], value);
    }

    /// Append `count` zero bytes.
    pub fn pad(&mut self, count: usize) {
        self.buf.resize(self.buf.len() + count, 0);
    }

    /// Zero-pad to a multiple of `alignment`.
    pub fn align(&mut self, alignment: usize) {
        let rem = self.buf.len() % alignment;
        if rem != 0 {
            self.pad(alignment - rem);
        }
    }

    /// Zero-pad to a multiple of 32.
    pub fn align32(&mut self) {
        self.buf.resize(round_up_32_usize(self.buf.len()), 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_patch() {
        let mut w = BinaryWriter::new();
        w.write_u32(0);
        w.write_u16(0x0102);
        w.write_id(ResourceId::new64(0x1122_3344_5566_7788));
        w.patch_u32(0, 0xCAFEBABE);
        assert_eq!(
            w.as_slice(),
            &[0xCA, 0xFE, 0xBA, 0xBE, 0x01, 0x02, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88]
        );
    }

    #[test]
    fn test_align() {
        let mut w = BinaryWriter::new();
        w.align32();
        assert!(w.is_empty());
        w.write_u8(1);
        w.align(64);
        assert_eq!(w.len(), 64);
    }
}
