//! Version 3.5 archive table records (Mp1, Mp2).

use zerocopy::byteorder::big_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Archive header.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ClassicHeader {
    /// Major version (3)
    pub major: U16,
    /// Minor version (5)
    pub minor: U16,
    /// Always zero
    pub unused: U32,
}

impl ClassicHeader {
    pub const MAJOR: u16 = 3;
    pub const MINOR: u16 = 5;

    /// Header with the expected version.
    pub fn new() -> Self {
        Self {
            major: U16::new(Self::MAJOR),
            minor: U16::new(Self::MINOR),
            unused: U32::new(0),
        }
    }

    /// Combined version word, `0x00030005` for a valid archive.
    #[inline]
    pub fn version(&self) -> u32 {
        ((self.major.get() as u32) << 16) | self.minor.get() as u32
    }
}

impl Default for ClassicHeader {
    fn default() -> Self {
        Self::new()
    }
}

/// Entry table record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct ClassicEntry {
    /// Non-zero when the payload is compressed
    pub compressed: U32,
    /// Four-character type code
    pub kind: [u8; 4],
    /// 32-bit resource id
    pub id: U32,
    /// Stored payload size
    pub size: U32,
    /// Absolute payload offset
    pub offset: U32,
}
