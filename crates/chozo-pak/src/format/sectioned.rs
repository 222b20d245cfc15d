//! Version 2 sectioned archive records (Mp3).

use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

/// Archive header, padded to [`SectionedHeader::SIZE`] on disk.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SectionedHeader {
    /// Archive version (2)
    pub version: U32,
    /// Header size (0x40)
    pub header_size: U32,
    /// Payload digest; written as zero
    pub md5: [u8; 16],
}

impl SectionedHeader {
    pub const VERSION: u32 = 2;
    pub const SIZE: usize = 0x40;
    /// End of the section directory.
    pub const DIRECTORY_END: usize = 0x80;

    pub const STRN: [u8; 4] = *b"STRN";
    pub const RSHD: [u8; 4] = *b"RSHD";
    pub const DATA: [u8; 4] = *b"DATA";
}

/// Section directory record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SectionRecord {
    /// Section tag (`STRN`, `RSHD` or `DATA`)
    pub id: [u8; 4],
    /// Section size including trailing padding
    pub size: U32,
}

/// `RSHD` entry record.
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct SectionedEntry {
    /// Non-zero when the payload is `CMPD` compressed
    pub compressed: U32,
    /// Four-character type code
    pub kind: [u8; 4],
    /// 64-bit resource id
    pub id: U64,
    /// Stored payload size
    pub size: U32,
    /// Payload offset relative to the `DATA` section
    pub offset: U32,
}
