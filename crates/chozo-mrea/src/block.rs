//! Block-compressed area payloads (Mp2, Mp3).
//!
//! After the section-size table, compressed areas carry an array of
//! [`BlockInfo`] records (32-byte aligned) followed by the block payloads.
//! A block with `comp_size == 0` is stored verbatim. Otherwise its payload is
//! front-padded to a multiple of 32 bytes and holds signed 16-bit length
//! prefixed segments: negative lengths are raw runs, positive lengths are
//! LZO segments. Each block covers a whole number of sections.
//!
//! [`BlockDecompressionStream`] presents the concatenated logical bytes as a
//! single [`ReadStream`], materializing one block at a time.

use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use chozo_common::{
    round_up_32, resolve_seek, BinaryWriter, Error as CommonError, ReadStream, Result as CommonResult,
    SeekOrigin,
};
use chozo_pak::{lzo_compress, lzo_decompress_into};

use crate::{Error, Result};

/// Largest logical size of a cooked block.
pub const BLOCK_SIZE: usize = 0x20000;

/// Largest logical run of one segment inside a block.
pub const SEGMENT_SIZE: usize = 0x4000;

/// Descriptor of one compressed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct BlockInfo {
    /// Scratch buffer size the game allocates for the block
    pub buf_size: U32,
    /// Logical bytes produced by the block
    pub decomp_size: U32,
    /// Payload bytes after the front padding, 0 when stored
    pub comp_size: U32,
    /// Sections covered by the block
    pub sec_count: U32,
}

impl BlockInfo {
    pub const SIZE: usize = 16;

    pub fn new(buf_size: u32, decomp_size: u32, comp_size: u32, sec_count: u32) -> Self {
        Self {
            buf_size: U32::new(buf_size),
            decomp_size: U32::new(decomp_size),
            comp_size: U32::new(comp_size),
            sec_count: U32::new(sec_count),
        }
    }

    fn read<R: ReadStream + ?Sized>(r: &mut R) -> CommonResult<Self> {
        Ok(Self::new(r.read_u32()?, r.read_u32()?, r.read_u32()?, r.read_u32()?))
    }

    #[inline]
    pub fn decompressed(&self) -> u64 {
        self.decomp_size.get() as u64
    }

    #[inline]
    pub fn is_stored(&self) -> bool {
        self.comp_size.get() == 0
    }

    /// Bytes the block occupies in the archive.
    #[inline]
    pub fn physical_size(&self) -> u64 {
        if self.is_stored() {
            self.decompressed()
        } else {
            round_up_32(self.comp_size.get() as u64)
        }
    }
}

/// A seekable logical stream over block-compressed area data.
pub struct BlockDecompressionStream<'a, R: ReadStream + ?Sized> {
    source: &'a mut R,
    infos: Vec<BlockInfo>,
    block_base: u64,
    total: u64,
    /// Materialized block: index, logical start, physical offset.
    current: Option<(usize, u64, u64)>,
    buffer: Vec<u8>,
    position: u64,
}

impl<'a, R: ReadStream + ?Sized> BlockDecompressionStream<'a, R> {
    /// Read `block_count` block infos at the source's position, align to 32
    /// and materialize the first block.
    pub fn new(source: &'a mut R, block_count: u32) -> Result<Self> {
        let mut infos = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            infos.push(BlockInfo::read(source)?);
        }
        source.seek_align32()?;
        let block_base = source.position();
        let total = infos.iter().map(BlockInfo::decompressed).sum();

        let mut stream = Self {
            source,
            infos,
            block_base,
            total,
            current: None,
            buffer: Vec::new(),
            position: 0,
        };
        if !stream.infos.is_empty() {
            stream.load_block(0, 0, 0)?;
        }
        Ok(stream)
    }

    pub fn block_infos(&self) -> &[BlockInfo] {
        &self.infos
    }

    /// Index of the materialized block.
    pub fn current_block(&self) -> Option<usize> {
        self.current.map(|(idx, _, _)| idx)
    }

    /// Position the stream at the start of section `section`.
    ///
    /// The owning block is found by accumulating each block's section count;
    /// the remaining distance inside the block comes from `sizes`.
    pub fn seek_to_section(&mut self, section: usize, sizes: &[u32]) -> Result<()> {
        let mut sec_accum = 0usize;
        let mut logical = 0u64;
        let mut physical = 0u64;
        for (idx, info) in self.infos.iter().enumerate() {
            let covered = info.sec_count.get() as usize;
            if section < sec_accum + covered {
                let in_block: u64 = sizes
                    .get(sec_accum..section)
                    .ok_or(Error::SectionIndex {
                        slot: "size table",
                        index: section as u32,
                        count: sizes.len() as u32,
                    })?
                    .iter()
                    .map(|&s| s as u64)
                    .sum();
                if self.current_block() != Some(idx) {
                    self.load_block(idx, logical, physical)?;
                }
                let target = logical + in_block;
                if target == self.total && sizes.get(section) == Some(&0) {
                    // Empty trailing section: nothing to read, nowhere to seek.
                    self.position = target;
                    return Ok(());
                }
                if target >= self.total {
                    return Err(Error::StreamOverrun {
                        target,
                        total: self.total,
                    });
                }
                self.seek(target as i64, SeekOrigin::Begin)?;
                return Ok(());
            }
            sec_accum += covered;
            logical += info.decompressed();
            physical += info.physical_size();
        }
        Err(Error::SectionIndex {
            slot: "block table",
            index: section as u32,
            count: sec_accum as u32,
        })
    }

    /// Write the block infos as stored blocks (`comp_size = 0`), for a
    /// decompressed copy of the area.
    pub fn write_decomp_infos(&self, w: &mut BinaryWriter) {
        for info in &self.infos {
            w.write_struct(&BlockInfo::new(
                info.buf_size.get(),
                info.decomp_size.get(),
                0,
                info.sec_count.get(),
            ));
        }
    }

    /// Accumulate logical and physical offsets up to the block owning
    /// `target`.
    fn locate(&self, target: u64) -> Option<(usize, u64, u64)> {
        let mut logical = 0u64;
        let mut physical = 0u64;
        for (idx, info) in self.infos.iter().enumerate() {
            if target < logical + info.decompressed() {
                return Some((idx, logical, physical));
            }
            logical += info.decompressed();
            physical += info.physical_size();
        }
        None
    }

    fn load_block(&mut self, idx: usize, logical: u64, physical: u64) -> CommonResult<()> {
        let info = self.infos[idx];
        self.source
            .seek((self.block_base + physical) as i64, SeekOrigin::Begin)?;
        let decomp = info.decompressed() as usize;
        self.buffer.clear();
        self.buffer.resize(decomp, 0);

        if info.is_stored() {
            self.source.read_exact_bytes(&mut self.buffer)?;
        } else {
            let comp = info.comp_size.get() as u64;
            self.source.skip(round_up_32(comp) - comp)?;
            let mut consumed = 0u64;
            let mut produced = 0usize;
            while produced < decomp {
                if consumed >= comp {
                    return Err(CommonError::Decompression(format!(
                        "block {} ran out of segments at {:#x} of {:#x} bytes",
                        idx, produced, decomp
                    )));
                }
                let len = self.source.read_i16()?;
                consumed += 2;
                if len < 0 {
                    let n = (-(len as i32)) as usize;
                    let dst = self.buffer.get_mut(produced..produced + n).ok_or_else(|| {
                        CommonError::Decompression(format!("block {} raw segment overflows", idx))
                    })?;
                    self.source.read_exact_bytes(dst)?;
                    produced += n;
                    consumed += n as u64;
                } else {
                    let segment = self.source.read_vec(len as usize)?;
                    let written = lzo_decompress_into(&segment, &mut self.buffer[produced..])
                        .map_err(|e| CommonError::Decompression(format!("block {}: {}", idx, e)))?;
                    produced += written;
                    consumed += len as u64;
                }
            }
        }

        self.current = Some((idx, logical, physical));
        Ok(())
    }

    fn current_range(&self) -> Option<(u64, u64)> {
        self.current
            .map(|(_, start, _)| (start, start + self.buffer.len() as u64))
    }
}

impl<R: ReadStream + ?Sized> ReadStream for BlockDecompressionStream<'_, R> {
    fn position(&self) -> u64 {
        self.position
    }

    fn length(&self) -> u64 {
        self.total
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> CommonResult<()> {
        let target = resolve_seek(offset, origin, self.position, self.total)?;
        if target >= self.total {
            return Err(CommonError::CursorOverrun {
                position: target,
                length: self.total,
            });
        }
        if let Some((start, end)) = self.current_range() {
            if (start..end).contains(&target) {
                self.position = target;
                return Ok(());
            }
        }
        let (idx, logical, physical) = self.locate(target).ok_or(CommonError::CursorOverrun {
            position: target,
            length: self.total,
        })?;
        self.load_block(idx, logical, physical)?;
        self.position = target;
        Ok(())
    }

    fn read_to_buf(&mut self, buf: &mut [u8]) -> CommonResult<usize> {
        let mut copied = 0usize;
        while copied < buf.len() && self.position < self.total {
            let (start, end) = match self.current_range() {
                Some((start, end)) if self.position < end => (start, end),
                _ => {
                    let (idx, logical, physical) = match self.current {
                        Some((idx, logical, physical)) if idx + 1 < self.infos.len() => (
                            idx + 1,
                            logical + self.infos[idx].decompressed(),
                            physical + self.infos[idx].physical_size(),
                        ),
                        _ => break,
                    };
                    self.load_block(idx, logical, physical)?;
                    continue;
                }
            };
            let in_block = (self.position - start) as usize;
            let n = ((end - self.position) as usize).min(buf.len() - copied);
            buf[copied..copied + n].copy_from_slice(&self.buffer[in_block..in_block + n]);
            copied += n;
            self.position += n as u64;
        }
        Ok(copied)
    }
}

/// Block infos plus the physical payload that follows them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompressedBlocks {
    pub infos: Vec<BlockInfo>,
    pub payload: Vec<u8>,
}

impl CompressedBlocks {
    /// Write the info table, 32-byte alignment and the block payloads.
    pub fn write_to(&self, w: &mut BinaryWriter) {
        for info in &self.infos {
            w.write_struct(info);
        }
        w.align32();
        w.write_bytes(&self.payload);
    }
}

/// Pack padded sections into blocks of whole sections.
///
/// Each block holds at most [`BLOCK_SIZE`] logical bytes unless a single
/// section is larger. Segments that do not shrink under LZO are stored raw;
/// blocks that do not shrink at all are stored with `comp_size = 0`.
pub fn compress_sections(sections: &[Vec<u8>]) -> Result<CompressedBlocks> {
    let mut out = CompressedBlocks::default();
    let mut block: Vec<u8> = Vec::new();
    let mut block_sections = 0u32;

    for section in sections {
        if block_sections > 0 && block.len() + section.len() > BLOCK_SIZE {
            push_block(&mut out, &block, block_sections)?;
            block.clear();
            block_sections = 0;
        }
        block.extend_from_slice(section);
        block_sections += 1;
    }
    if block_sections > 0 {
        push_block(&mut out, &block, block_sections)?;
    }
    Ok(out)
}

fn push_block(out: &mut CompressedBlocks, data: &[u8], sec_count: u32) -> Result<()> {
    let mut segments = Vec::with_capacity(data.len() / 2);
    for chunk in data.chunks(SEGMENT_SIZE) {
        let packed = lzo_compress(chunk)?;
        if packed.len() < chunk.len() {
            segments.extend_from_slice(&(packed.len() as i16).to_be_bytes());
            segments.extend_from_slice(&packed);
        } else {
            segments.extend_from_slice(&(-(chunk.len() as i32) as i16).to_be_bytes());
            segments.extend_from_slice(chunk);
        }
    }

    let decomp = data.len() as u32;
    if segments.len() >= data.len() {
        out.infos.push(BlockInfo::new(decomp, decomp, 0, sec_count));
        out.payload.extend_from_slice(data);
    } else {
        let comp = segments.len() as u64;
        let padded = round_up_32(comp);
        out.infos
            .push(BlockInfo::new(padded as u32, decomp, comp as u32, sec_count));
        out.payload.resize(out.payload.len() + (padded - comp) as usize, 0);
        out.payload.extend_from_slice(&segments);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    /// Deterministic incompressible filler.
    fn noise(len: usize, seed: u32) -> Vec<u8> {
        let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            })
            .collect()
    }

    fn sections() -> Vec<Vec<u8>> {
        vec![
            vec![0x11; 0x60],
            noise(0x8000, 1),
            vec![0u8; 0x1_8000],
            (0..0x9000u32).map(|i| (i / 64) as u8).collect(),
            noise(0x40, 2),
        ]
    }

    fn encode(blocks: &CompressedBlocks) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        blocks.write_to(&mut w);
        w.into_inner()
    }

    #[test]
    fn test_blocks_cover_whole_sections() {
        let blocks = compress_sections(&sections()).unwrap();
        assert!(blocks.infos.len() >= 2);
        let covered: u32 = blocks.infos.iter().map(|i| i.sec_count.get()).sum();
        assert_eq!(covered, 5);
        assert!(blocks.infos.iter().all(|i| i.decompressed() <= BLOCK_SIZE as u64 || i.sec_count.get() == 1));
    }

    #[test]
    fn test_stream_reproduces_sections() {
        let secs = sections();
        let blocks = compress_sections(&secs).unwrap();
        let mut source = EntryReadStream::from_vec(encode(&blocks)).unwrap();
        let mut stream = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();

        let expected: Vec<u8> = secs.concat();
        assert_eq!(stream.length(), expected.len() as u64);
        let mut all = vec![0u8; expected.len() + 100];
        let read = stream.read_to_buf(&mut all).unwrap();
        assert_eq!(read, expected.len());
        assert_eq!(&all[..read], &expected[..]);
    }

    #[test]
    fn test_recompress_identical() {
        let secs = sections();
        let blocks = compress_sections(&secs).unwrap();
        let mut source = EntryReadStream::from_vec(encode(&blocks)).unwrap();
        let mut stream = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();
        let sizes: Vec<u32> = secs.iter().map(|s| s.len() as u32).collect();

        let mut decoded = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            stream.seek_to_section(i, &sizes).unwrap();
            decoded.push(stream.read_vec(*size as usize).unwrap());
        }
        assert_eq!(compress_sections(&decoded).unwrap(), blocks);
    }

    #[test]
    fn test_mixed_segments_decode() {
        // One block: a raw segment then an LZO segment.
        let raw = noise(0x20, 7);
        let plain = vec![0xABu8; 0x400];
        let lzo = lzo_compress(&plain).unwrap();
        let mut segments = Vec::new();
        segments.extend_from_slice(&(-(raw.len() as i16)).to_be_bytes());
        segments.extend_from_slice(&raw);
        segments.extend_from_slice(&(lzo.len() as i16).to_be_bytes());
        segments.extend_from_slice(&lzo);
        let comp = segments.len() as u64;

        let mut w = BinaryWriter::new();
        w.write_struct(&BlockInfo::new(0x500, (raw.len() + plain.len()) as u32, comp as u32, 2));
        w.align32();
        w.pad((round_up_32(comp) - comp) as usize);
        w.write_bytes(&segments);

        let mut source = EntryReadStream::from_vec(w.into_inner()).unwrap();
        let mut stream = BlockDecompressionStream::new(&mut source, 1).unwrap();
        assert_eq!(stream.read_vec(raw.len()).unwrap(), raw);
        assert_eq!(stream.read_vec(plain.len()).unwrap(), plain);
    }

    #[test]
    fn test_seek_within_and_across_blocks() {
        let secs = sections();
        let expected: Vec<u8> = secs.concat();
        let blocks = compress_sections(&secs).unwrap();
        let mut source = EntryReadStream::from_vec(encode(&blocks)).unwrap();
        let mut stream = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();

        let last = expected.len() - 16;
        stream.seek(last as i64, SeekOrigin::Begin).unwrap();
        assert_eq!(stream.read_vec(16).unwrap(), &expected[last..]);
        assert_eq!(stream.current_block(), Some(blocks.infos.len() - 1));

        stream.seek(0x70, SeekOrigin::Begin).unwrap();
        assert_eq!(stream.current_block(), Some(0));
        stream.seek(-0x10, SeekOrigin::Current).unwrap();
        assert_eq!(stream.read_u8().unwrap(), expected[0x60]);
        stream.seek(-1, SeekOrigin::End).unwrap();
        assert_eq!(stream.read_u8().unwrap(), expected[expected.len() - 1]);
    }

    #[test]
    fn test_seek_at_total_fails() {
        let blocks = compress_sections(&[vec![1u8; 64]]).unwrap();
        let mut source = EntryReadStream::from_vec(encode(&blocks)).unwrap();
        let mut stream = BlockDecompressionStream::new(&mut source, 1).unwrap();
        assert!(stream.seek(64, SeekOrigin::Begin).is_err());
        assert!(stream.seek(0, SeekOrigin::End).is_err());
        assert!(stream.seek(63, SeekOrigin::Begin).is_ok());
        assert!(stream.seek_to_section(1, &[64]).is_err());
    }

    #[test]
    fn test_empty_trailing_section() {
        let blocks = compress_sections(&[vec![1u8; 64], Vec::new()]).unwrap();
        let mut source = EntryReadStream::from_vec(encode(&blocks)).unwrap();
        let mut stream = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();
        let sizes = [64, 0];

        stream.seek_to_section(1, &sizes).unwrap();
        assert_eq!(stream.position(), 64);
        let mut buf = [0u8; 4];
        assert_eq!(stream.read_to_buf(&mut buf).unwrap(), 0);

        stream.seek_to_section(0, &sizes).unwrap();
        assert_eq!(stream.read_u8().unwrap(), 1);
        assert!(stream.seek_to_section(2, &sizes).is_err());
    }

    #[test]
    fn test_decomp_infos_zero_compressed_size() {
        let blocks = compress_sections(&sections()).unwrap();
        let mut source = EntryReadStream::from_vec(encode(&blocks)).unwrap();
        let stream = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();
        let mut w = BinaryWriter::new();
        stream.write_decomp_infos(&mut w);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), blocks.infos.len() * BlockInfo::SIZE);
        for (chunk, info) in bytes.chunks(BlockInfo::SIZE).zip(&blocks.infos) {
            assert_eq!(&chunk[8..12], &[0, 0, 0, 0]);
            assert_eq!(&chunk[4..8], info.decomp_size.as_bytes());
        }
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        fn section_sizes() -> impl Strategy<Value = Vec<u32>> {
            prop::collection::vec((1u32..0x400).prop_map(|n| n * 32), 1..24)
        }

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(32))]

            /// Seeking straight to a section yields the same bytes as
            /// skipping every earlier section from the stream start.
            #[test]
            fn seek_to_section_matches_sequential(sizes in section_sizes(), seed in any::<u32>()) {
                let secs: Vec<Vec<u8>> = sizes
                    .iter()
                    .enumerate()
                    .map(|(i, &s)| if i % 2 == 0 { noise(s as usize, seed ^ i as u32) } else { vec![i as u8; s as usize] })
                    .collect();
                let blocks = compress_sections(&secs).unwrap();
                let bytes = encode(&blocks);

                for k in 0..sizes.len() {
                    let mut source = EntryReadStream::from_vec(bytes.clone()).unwrap();
                    let mut direct = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();
                    direct.seek_to_section(k, &sizes).unwrap();
                    let a = direct.read_vec(sizes[k] as usize).unwrap();

                    let mut source = EntryReadStream::from_vec(bytes.clone()).unwrap();
                    let mut sequential = BlockDecompressionStream::new(&mut source, blocks.infos.len() as u32).unwrap();
                    for size in &sizes[..k] {
                        let _ = sequential.read_vec(*size as usize).unwrap();
                    }
                    let b = sequential.read_vec(sizes[k] as usize).unwrap();

                    prop_assert_eq!(&a, &b);
                    prop_assert_eq!(&a, &secs[k]);
                }
            }
        }
    }
}
