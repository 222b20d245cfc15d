//! PAK archive writer.
//!
//! Payloads are laid out in insertion order, each aligned to 32 bytes.

use std::fs;
use std::path::Path;

use zerocopy::byteorder::big_endian::{U32, U64};
use zerocopy::IntoBytes;

use chozo_common::{BinaryWriter, FourCC, Generation, PakFormat, ResourceId};

use crate::decompress;
use crate::format::{ClassicEntry, ClassicHeader, SectionRecord, SectionedEntry, SectionedHeader};
use crate::Result;

struct PendingEntry {
    id: ResourceId,
    kind: FourCC,
    name: Option<String>,
    data: Vec<u8>,
    compress: bool,
}

/// Builds a PAK archive for one generation.
pub struct PakBuilder {
    generation: Generation,
    entries: Vec<PendingEntry>,
}

impl PakBuilder {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            entries: Vec::new(),
        }
    }

    /// Number of entries added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a stored entry.
    pub fn add(&mut self, id: ResourceId, kind: FourCC, data: Vec<u8>) -> &mut Self {
        self.push(id, kind, None, data, false)
    }

    /// Add an entry that is compressed with the generation's scheme.
    pub fn add_compressed(&mut self, id: ResourceId, kind: FourCC, data: Vec<u8>) -> &mut Self {
        self.push(id, kind, None, data, true)
    }

    /// Add a stored entry that is also listed in the name table.
    pub fn add_named(
        &mut self,
        id: ResourceId,
        kind: FourCC,
        name: impl Into<String>,
        data: Vec<u8>,
    ) -> &mut Self {
        self.push(id, kind, Some(name.into()), data, false)
    }

    fn push(
        &mut self,
        id: ResourceId,
        kind: FourCC,
        name: Option<String>,
        data: Vec<u8>,
        compress: bool,
    ) -> &mut Self {
        self.entries.push(PendingEntry {
            id,
            kind,
            name,
            data,
            compress,
        });
        self
    }

    /// Encode every payload once.
    fn encode_payloads(&self) -> Result<Vec<(bool, Vec<u8>)>> {
        let scheme = self.generation.entry_compression();
        self.entries
            .iter()
            .map(|e| {
                if e.compress {
                    Ok((true, decompress::compress_entry(scheme, &e.data)?))
                } else {
                    Ok((false, e.data.clone()))
                }
            })
            .collect()
    }

    /// Serialize the archive.
    pub fn build(&self) -> Result<Vec<u8>> {
        let payloads = self.encode_payloads()?;
        match self.generation.pak_format() {
            PakFormat::Classic => Ok(self.build_classic(&payloads)),
            PakFormat::Sectioned => Ok(self.build_sectioned(&payloads)),
        }
    }

    /// Serialize the archive to a file.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.build()?)?;
        Ok(())
    }

    fn build_classic(&self, payloads: &[(bool, Vec<u8>)]) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_struct(&ClassicHeader::new());

        let named: Vec<_> = self.entries.iter().filter(|e| e.name.is_some()).collect();
        w.write_u32(named.len() as u32);
        for e in named {
            let name = e.name.as_deref().unwrap_or_default();
            w.write_fourcc(e.kind);
            w.write_id(e.id);
            w.write_u32(name.len() as u32);
            w.write_bytes(name.as_bytes());
        }

        w.write_u32(self.entries.len() as u32);
        let table_size = self.entries.len() * std::mem::size_of::<ClassicEntry>();
        let mut offset = chozo_common::round_up_32_usize(w.len() + table_size);
        for (e, (compressed, body)) in self.entries.iter().zip(payloads) {
            w.write_struct(&ClassicEntry {
                compressed: U32::new(*compressed as u32),
                kind: e.kind.0,
                id: U32::new(e.id.to_u64() as u32),
                size: U32::new(body.len() as u32),
                offset: U32::new(offset as u32),
            });
            offset = chozo_common::round_up_32_usize(offset + body.len());
        }

        w.align32();
        for (_, body) in payloads {
            w.write_bytes(body);
            w.align32();
        }
        w.into_inner()
    }

    fn build_sectioned(&self, payloads: &[(bool, Vec<u8>)]) -> Vec<u8> {
        let mut strn = BinaryWriter::new();
        let named: Vec<_> = self.entries.iter().filter(|e| e.name.is_some()).collect();
        strn.write_u32(named.len() as u32);
        for e in named {
            strn.write_cstring(e.name.as_deref().unwrap_or_default());
            strn.write_fourcc(e.kind);
            strn.write_u64(e.id.to_u64());
        }
        strn.align(0x40);

        let mut rshd = BinaryWriter::new();
        let mut data = BinaryWriter::new();
        rshd.write_u32(self.entries.len() as u32);
        for (e, (compressed, body)) in self.entries.iter().zip(payloads) {
            rshd.write_struct(&SectionedEntry {
                compressed: U32::new(*compressed as u32),
                kind: e.kind.0,
                id: U64::new(e.id.to_u64()),
                size: U32::new(body.len() as u32),
                offset: U32::new(data.len() as u32),
            });
            data.write_bytes(body);
            data.align32();
        }
        rshd.align(0x40);
        data.align(0x40);

        let mut w = BinaryWriter::new();
        w.write_struct(&SectionedHeader {
            version: U32::new(SectionedHeader::VERSION),
            header_size: U32::new(SectionedHeader::SIZE as u32),
            md5: [0; 16],
        });
        w.align(SectionedHeader::SIZE);
        w.write_u32(3);
        for (id, body) in [
            (SectionedHeader::STRN, &strn),
            (SectionedHeader::RSHD, &rshd),
            (SectionedHeader::DATA, &data),
        ] {
            w.write_bytes(
                SectionRecord {
                    id,
                    size: U32::new(body.len() as u32),
                }
                .as_bytes(),
            );
        }
        w.align(SectionedHeader::DIRECTORY_END);
        w.write_bytes(strn.as_slice());
        w.write_bytes(rshd.as_slice());
        w.write_bytes(data.as_slice());
        w.into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_layout() {
        let mut builder = PakBuilder::new(Generation::Mp1);
        builder.add(ResourceId::new32(1), FourCC::new(b"TXTR"), vec![1; 5]);
        builder.add(ResourceId::new32(2), FourCC::new(b"TXTR"), vec![2; 40]);
        let bytes = builder.build().unwrap();

        assert_eq!(&bytes[..4], &[0, 3, 0, 5]);
        // header 8 + names 4 + count 4 + 2 * 20 = 56 -> first payload at 64
        assert_eq!(&bytes[64..69], &[1; 5]);
        assert_eq!(&bytes[96..136], &[2; 40]);
        assert_eq!(bytes.len() % 32, 0);
    }

    #[test]
    fn test_sectioned_directory() {
        let mut builder = PakBuilder::new(Generation::Mp3);
        builder.add(ResourceId::new64(1), FourCC::new(b"TXTR"), vec![1; 5]);
        let bytes = builder.build().unwrap();
        assert_eq!(&bytes[..4], &[0, 0, 0, 2]);
        assert_eq!(&bytes[0x44..0x48], b"STRN");
        assert_eq!(bytes.len() % 0x40, 0);
    }
}
