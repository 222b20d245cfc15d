//! Payload compression for PAK entries.
//!
//! Three schemes are in use across the releases: a zlib stream, a run of
//! `u16`-length-prefixed LZO segments, and the `CMPD` block table. All of
//! them carry the decompressed size up front.

use std::io::{Read, Write};

use byteorder::{BigEndian, ByteOrder};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use zerocopy::byteorder::big_endian::U32;
use zerocopy::IntoBytes;

use chozo_common::{BinaryReader, EntryCompression};

use crate::format::CmpdBlock;
use crate::{Error, Result};

/// Largest logical run covered by one LZO segment.
pub const LZO_SEGMENT_SIZE: usize = 0x4000;

/// Largest logical size of one `CMPD` block.
pub const CMPD_BLOCK_SIZE: usize = 0x20000;

/// Decompress zlib-compressed data with known output size.
pub fn decompress_zlib_sized(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut output = Vec::with_capacity(expected_size);
    decoder
        .read_to_end(&mut output)
        .map_err(|e| Error::Decompression(e.to_string()))?;
    if output.len() != expected_size {
        return Err(Error::SizeMismatch {
            expected: expected_size,
            actual: output.len(),
        });
    }
    Ok(output)
}

/// Decompress one LZO segment into `dst`, returning the bytes produced.
pub fn lzo_decompress_into(src: &[u8], dst: &mut [u8]) -> Result<usize> {
    lzokay::decompress::decompress(src, dst).map_err(|e| Error::Decompression(format!("LZO: {:?}", e)))
}

/// Compress one LZO segment.
pub fn lzo_compress(src: &[u8]) -> Result<Vec<u8>> {
    lzokay::compress::compress(src).map_err(|e| Error::Decompression(format!("LZO: {:?}", e)))
}

/// Decompress `u16`-length-prefixed LZO segments until `expected_size`
/// bytes are produced.
pub fn decompress_lzo_segments(data: &[u8], expected_size: usize) -> Result<Vec<u8>> {
    let mut output = vec![0u8; expected_size];
    let mut produced = 0usize;
    let mut pos = 0usize;

    while produced < expected_size {
        if pos + 2 > data.len() {
            return Err(Error::SizeMismatch {
                expected: expected_size,
                actual: produced,
            });
        }
        let len = BigEndian::read_u16(&data[pos..]) as usize;
        pos += 2;
        let segment = data.get(pos..pos + len).ok_or(Error::SizeMismatch {
            expected: expected_size,
            actual: produced,
        })?;
        pos += len;
        produced += lzo_decompress_into(segment, &mut output[produced..])?;
    }

    Ok(output)
}

/// Compress into `u16`-length-prefixed LZO segments of at most
/// [`LZO_SEGMENT_SIZE`] logical bytes each.
pub fn compress_lzo_segments(data: &[u8]) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(data.len() / 2 + 16);
    for chunk in data.chunks(LZO_SEGMENT_SIZE) {
        let compressed = lzo_compress(chunk)?;
        let mut len = [0u8; 2];
        BigEndian::write_u16(&mut len, compressed.len() as u16);
        output.extend_from_slice(&len);
        output.extend_from_slice(&compressed);
    }
    Ok(output)
}

/// Decompress a `CMPD` payload.
pub fn decompress_cmpd(data: &[u8]) -> Result<Vec<u8>> {
    let mut reader = BinaryReader::new(data);
    let magic: [u8; 4] = reader.read_struct()?;
    if magic != CmpdBlock::MAGIC {
        return Err(Error::InvalidMagic {
            what: "CMPD",
            expected: u32::from_be_bytes(CmpdBlock::MAGIC),
            actual: u32::from_be_bytes(magic),
        });
    }
    let count: U32 = reader.read_struct()?;
    let mut blocks = Vec::with_capacity(count.get() as usize);
    for _ in 0..count.get() {
        blocks.push(reader.read_struct::<CmpdBlock>()?);
    }

    let total: usize = blocks.iter().map(|b| b.decompressed_size.get() as usize).sum();
    let mut output = Vec::with_capacity(total);
    for block in &blocks {
        let body = reader.read_bytes(block.compressed())?;
        if block.is_stored() {
            output.extend_from_slice(body);
        } else {
            output.extend(decompress_lzo_segments(body, block.decompressed_size.get() as usize)?);
        }
    }
    Ok(output)
}

/// Build a `CMPD` payload, storing blocks that do not shrink.
pub fn compress_cmpd(data: &[u8]) -> Result<Vec<u8>> {
    let mut blocks = Vec::new();
    let mut bodies = Vec::new();
    for chunk in data.chunks(CMPD_BLOCK_SIZE) {
        let compressed = compress_lzo_segments(chunk)?;
        let body = if compressed.len() < chunk.len() {
            compressed
        } else {
            chunk.to_vec()
        };
        blocks.push(CmpdBlock {
            compressed_size: U32::new(body.len() as u32),
            decompressed_size: U32::new(chunk.len() as u32),
        });
        bodies.push(body);
    }

    let mut output = Vec::new();
    output.extend_from_slice(&CmpdBlock::MAGIC);
    output.extend_from_slice(U32::new(blocks.len() as u32).as_bytes());
    for block in &blocks {
        output.extend_from_slice(block.as_bytes());
    }
    for body in bodies {
        output.extend(body);
    }
    Ok(output)
}

/// Decode a compressed entry payload for the given scheme.
pub fn decompress_entry(scheme: EntryCompression, data: &[u8]) -> Result<Vec<u8>> {
    match scheme {
        EntryCompression::Cmpd => decompress_cmpd(data),
        EntryCompression::Zlib | EntryCompression::LzoSegments => {
            let mut reader = BinaryReader::new(data);
            let size: U32 = reader.read_struct()?;
            let body = reader.remaining_bytes();
            if scheme == EntryCompression::Zlib {
                decompress_zlib_sized(body, size.get() as usize)
            } else {
                decompress_lzo_segments(body, size.get() as usize)
            }
        }
    }
}

/// Encode an entry payload for the given scheme.
pub fn compress_entry(scheme: EntryCompression, data: &[u8]) -> Result<Vec<u8>> {
    match scheme {
        EntryCompression::Cmpd => compress_cmpd(data),
        EntryCompression::Zlib => {
            let mut output = U32::new(data.len() as u32).as_bytes().to_vec();
            let mut encoder = ZlibEncoder::new(&mut output, Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?;
            Ok(output)
        }
        EntryCompression::LzoSegments => {
            let mut output = U32::new(data.len() as u32).as_bytes().to_vec();
            output.extend(compress_lzo_segments(data)?);
            Ok(output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        (0..40_000u32).flat_map(|i| ((i / 7) as u16).to_be_bytes()).collect()
    }

    #[test]
    fn test_zlib_roundtrip() {
        let original = sample();
        let packed = compress_entry(EntryCompression::Zlib, &original).unwrap();
        assert_eq!(decompress_entry(EntryCompression::Zlib, &packed).unwrap(), original);
    }

    #[test]
    fn test_lzo_segments_span_multiple_segments() {
        let original = sample();
        let packed = compress_entry(EntryCompression::LzoSegments, &original).unwrap();
        assert!(packed.len() < original.len());
        assert_eq!(decompress_entry(EntryCompression::LzoSegments, &packed).unwrap(), original);
    }

    #[test]
    fn test_cmpd_stored_block() {
        // Incompressible input keeps the block stored.
        let original: Vec<u8> = (0..64u32).map(|i| (i.wrapping_mul(2654435761) >> 24) as u8).collect();
        let packed = compress_cmpd(&original).unwrap();
        assert_eq!(&packed[..4], b"CMPD");
        assert_eq!(decompress_cmpd(&packed).unwrap(), original);
    }

    #[test]
    fn test_cmpd_rejects_bad_magic() {
        assert!(decompress_cmpd(b"XXXX\0\0\0\0").is_err());
    }

    #[test]
    fn test_truncated_lzo_fails() {
        assert!(decompress_lzo_segments(&[0x00, 0x10, 0x01], 32).is_err());
    }
}
