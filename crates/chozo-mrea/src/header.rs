//! MREA headers for the three generations.
//!
//! Every header carries the area transform, mesh count and the
//! section-size table, and names the sections the walker needs. Mp1 and
//! Mp2 name them with fixed fields; Mp3 uses a table of FourCC-tagged
//! indices.

use chozo_common::math::Transform;
use chozo_common::{BinaryWriter, FourCC, Generation, ReadStream};
use tracing::debug;

use crate::{Error, Result};

/// `0xDEADBEEF`.
pub const MREA_MAGIC: u32 = 0xDEAD_BEEF;

/// Indices into the section-size table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectionSlots {
    /// Material set; meshes follow it.
    pub geometry: u32,
    pub arot: u32,
    /// First script layer section (Mp2/Mp3 have one per layer).
    pub scly: u32,
    pub collision: u32,
    pub unknown: u32,
    pub lights: u32,
    pub visi: u32,
    pub path: u32,
    /// Generated-object layer (Mp2/Mp3).
    pub scgn: Option<u32>,
    /// Mp2 bounding volume hierarchy section.
    pub bvh: Option<u32>,
    /// Mp2 visibility bitmap section.
    pub bitmap: Option<u32>,
    pub egmc: Option<u32>,
    /// Mp3 dependency section.
    pub deps: Option<u32>,
}

impl SectionSlots {
    fn named(&self) -> Vec<(&'static str, u32)> {
        let mut out = vec![
            ("geometry", self.geometry),
            ("arot", self.arot),
            ("scly", self.scly),
            ("collision", self.collision),
            ("unknown", self.unknown),
            ("lights", self.lights),
            ("visi", self.visi),
            ("path", self.path),
        ];
        let optional = [
            ("scgn", self.scgn),
            ("bvh", self.bvh),
            ("bitmap", self.bitmap),
            ("egmc", self.egmc),
            ("deps", self.deps),
        ];
        out.extend(optional.iter().filter_map(|(n, v)| v.map(|v| (*n, v))));
        out
    }
}

const MP3_TAGS: [&[u8; 4]; 11] = [
    b"AROT", b"COLI", b"DEPS", b"EGMC", b"LITE", b"PFL2", b"PVS!", b"RSOS", b"SGEN", b"SOBJ",
    b"WOBJ",
];

/// Decoded area header.
#[derive(Debug, Clone, PartialEq)]
pub struct MreaHeader {
    pub generation: Generation,
    pub transform: Transform,
    pub mesh_count: u32,
    /// Script layer sections (Mp2/Mp3). Mp1 counts layers inside SCLY.
    pub scly_layer_count: u32,
    pub slots: SectionSlots,
    /// Compressed blocks following the header (Mp2/Mp3).
    pub block_count: u32,
    pub sec_sizes: Vec<u32>,
}

impl MreaHeader {
    pub fn new(generation: Generation) -> Self {
        Self {
            generation,
            transform: Transform::identity(),
            mesh_count: 0,
            scly_layer_count: 0,
            slots: SectionSlots::default(),
            block_count: 0,
            sec_sizes: Vec::new(),
        }
    }

    /// Read the header, leaving the stream at the 32-byte aligned end of
    /// the header region (block infos for Mp2/Mp3, section data for Mp1).
    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let magic = r.read_u32()?;
        if magic != MREA_MAGIC {
            return Err(Error::InvalidMagic {
                what: "MREA",
                expected: MREA_MAGIC,
                actual: magic,
            });
        }
        let version = r.read_u32()?;
        let generation = Generation::from_mrea_version(version).ok_or(Error::UnsupportedVersion {
            what: "MREA",
            version,
        })?;

        let mut header = Self::new(generation);
        header.transform = Transform::read(r)?;
        header.mesh_count = r.read_u32()?;

        let mut index_count = 0;
        let sec_count = match generation {
            Generation::Mp1 => {
                let sec_count = r.read_u32()?;
                let s = &mut header.slots;
                s.geometry = r.read_u32()?;
                s.scly = r.read_u32()?;
                s.collision = r.read_u32()?;
                s.unknown = r.read_u32()?;
                s.lights = r.read_u32()?;
                s.visi = r.read_u32()?;
                s.path = r.read_u32()?;
                s.arot = r.read_u32()?;
                sec_count
            }
            Generation::Mp2 => {
                header.scly_layer_count = r.read_u32()?;
                let sec_count = r.read_u32()?;
                let s = &mut header.slots;
                s.geometry = r.read_u32()?;
                s.scly = r.read_u32()?;
                s.scgn = Some(r.read_u32()?);
                s.collision = r.read_u32()?;
                s.unknown = r.read_u32()?;
                s.lights = r.read_u32()?;
                s.visi = r.read_u32()?;
                s.path = r.read_u32()?;
                let bvh = r.read_u32()?;
                s.bvh = Some(bvh);
                s.bitmap = Some(r.read_u32()?);
                s.egmc = Some(r.read_u32()?);
                // AROT has no field of its own; it directly precedes the BVH.
                s.arot = bvh.saturating_sub(1);
                header.block_count = r.read_u32()?;
                r.skip(12)?;
                sec_count
            }
            Generation::Mp3 => {
                header.scly_layer_count = r.read_u32()?;
                let sec_count = r.read_u32()?;
                header.block_count = r.read_u32()?;
                index_count = r.read_u32()?;
                r.skip(20)?;
                sec_count
            }
        };

        header.sec_sizes = (0..sec_count)
            .map(|_| r.read_u32())
            .collect::<chozo_common::Result<_>>()?;

        if generation == Generation::Mp3 {
            header.read_mp3_slots(r, index_count)?;
        }
        r.seek_align32()?;
        header.validate()?;
        Ok(header)
    }

    fn read_mp3_slots<R: ReadStream + ?Sized>(&mut self, r: &mut R, count: u32) -> Result<()> {
        let mut seen = [false; MP3_TAGS.len()];
        for _ in 0..count {
            let tag = r.read_fourcc()?;
            let idx = r.read_u32()?;
            let s = &mut self.slots;
            match &tag.0 {
                b"AROT" => s.arot = idx,
                b"COLI" => s.collision = idx,
                b"DEPS" => s.deps = Some(idx),
                b"EGMC" => s.egmc = Some(idx),
                b"LITE" => s.lights = idx,
                b"PFL2" => s.path = idx,
                b"PVS!" => s.visi = idx,
                b"RSOS" => s.unknown = idx,
                b"SGEN" => s.scgn = Some(idx),
                b"SOBJ" => s.scly = idx,
                b"WOBJ" => s.geometry = idx,
                _ => {
                    debug!(%tag, idx, "ignoring unknown MREA section tag");
                    continue;
                }
            }
            if let Some(pos) = MP3_TAGS.iter().position(|t| **t == tag.0) {
                seen[pos] = true;
            }
        }
        for (tag, _) in MP3_TAGS.iter().zip(seen).filter(|(_, seen)| !seen) {
            if **tag != *b"DEPS" && **tag != *b"EGMC" && **tag != *b"SGEN" {
                return Err(Error::SectionIndex {
                    slot: "mp3 index table",
                    index: u32::from_be_bytes(**tag),
                    count: self.sec_count(),
                });
            }
        }
        Ok(())
    }

    /// Every named slot must index into the size table.
    pub fn validate(&self) -> Result<()> {
        let count = self.sec_count();
        for (slot, index) in self.slots.named() {
            if index >= count {
                return Err(Error::SectionIndex { slot, index, count });
            }
        }
        Ok(())
    }

    #[inline]
    pub fn sec_count(&self) -> u32 {
        self.sec_sizes.len() as u32
    }

    /// Logical offset of section `idx` relative to section 0.
    pub fn section_offset(&self, idx: usize) -> u64 {
        self.sec_sizes[..idx.min(self.sec_sizes.len())]
            .iter()
            .map(|&s| s as u64)
            .sum()
    }

    /// Sum of all (padded) section sizes.
    pub fn sections_total(&self) -> u64 {
        self.section_offset(self.sec_sizes.len())
    }

    /// Write the header region, padded to 32 bytes.
    pub fn write(&self, w: &mut BinaryWriter) {
        let start = w.len();
        let s = &self.slots;
        w.write_u32(MREA_MAGIC);
        w.write_u32(self.generation.mrea_version());
        self.transform.write(w);
        w.write_u32(self.mesh_count);
        match self.generation {
            Generation::Mp1 => {
                w.write_u32(self.sec_count());
                for v in [s.geometry, s.scly, s.collision, s.unknown, s.lights, s.visi, s.path, s.arot] {
                    w.write_u32(v);
                }
            }
            Generation::Mp2 => {
                w.write_u32(self.scly_layer_count);
                w.write_u32(self.sec_count());
                for v in [
                    s.geometry,
                    s.scly,
                    s.scgn.unwrap_or(0),
                    s.collision,
                    s.unknown,
                    s.lights,
                    s.visi,
                    s.path,
                    s.bvh.unwrap_or(0),
                    s.bitmap.unwrap_or(0),
                    s.egmc.unwrap_or(0),
                ] {
                    w.write_u32(v);
                }
                w.write_u32(self.block_count);
                w.pad(12);
            }
            Generation::Mp3 => {
                let table = self.mp3_table();
                w.write_u32(self.scly_layer_count);
                w.write_u32(self.sec_count());
                w.write_u32(self.block_count);
                w.write_u32(table.len() as u32);
                w.pad(20);
                for size in &self.sec_sizes {
                    w.write_u32(*size);
                }
                for (tag, idx) in table {
                    w.write_fourcc(tag);
                    w.write_u32(idx);
                }
                pad_from(w, start);
                return;
            }
        }
        for size in &self.sec_sizes {
            w.write_u32(*size);
        }
        pad_from(w, start);
    }

    fn mp3_table(&self) -> Vec<(FourCC, u32)> {
        let s = &self.slots;
        let entries = [
            (b"AROT", Some(s.arot)),
            (b"COLI", Some(s.collision)),
            (b"DEPS", s.deps),
            (b"EGMC", s.egmc),
            (b"LITE", Some(s.lights)),
            (b"PFL2", Some(s.path)),
            (b"PVS!", Some(s.visi)),
            (b"RSOS", Some(s.unknown)),
            (b"SGEN", s.scgn),
            (b"SOBJ", Some(s.scly)),
            (b"WOBJ", Some(s.geometry)),
        ];
        entries
            .into_iter()
            .filter_map(|(tag, idx)| idx.map(|i| (FourCC::new(tag), i)))
            .collect()
    }
}

fn pad_from(w: &mut BinaryWriter, start: usize) {
    let len = w.len() - start;
    w.pad(chozo_common::round_up_32_usize(len) - len);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    fn sample(g: Generation) -> MreaHeader {
        let mut h = MreaHeader::new(g);
        h.transform.rows[1][3] = -4.0;
        h.mesh_count = 1;
        h.sec_sizes = vec![32; 20];
        h.slots = SectionSlots {
            geometry: 0,
            arot: 8,
            scly: 9,
            collision: 10,
            unknown: 11,
            lights: 12,
            visi: 13,
            path: 14,
            ..SectionSlots::default()
        };
        match g {
            Generation::Mp1 => {}
            Generation::Mp2 => {
                h.scly_layer_count = 1;
                h.block_count = 2;
                h.slots.bvh = Some(9);
                h.slots.bitmap = Some(10);
                h.slots.scly = 11;
                h.slots.scgn = Some(12);
                h.slots.collision = 13;
                h.slots.unknown = 14;
                h.slots.lights = 15;
                h.slots.visi = 16;
                h.slots.path = 17;
                h.slots.egmc = Some(18);
            }
            Generation::Mp3 => {
                h.scly_layer_count = 1;
                h.block_count = 1;
                h.slots.scgn = Some(15);
                h.slots.egmc = Some(16);
                h.slots.deps = Some(17);
            }
        }
        h
    }

    #[test]
    fn test_header_each_generation() {
        for g in Generation::ALL {
            let header = sample(g);
            let mut w = BinaryWriter::new();
            header.write(&mut w);
            assert_eq!(w.len() % 32, 0);
            let len = w.len() as u64;
            w.pad(32);
            let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
            let back = MreaHeader::read(&mut r).unwrap();
            assert_eq!(back, header, "generation {}", g);
            assert_eq!(r.position(), len);
        }
    }

    #[test]
    fn test_mp1_fixed_header_size() {
        let mut h = sample(Generation::Mp1);
        h.sec_sizes.clear();
        h.slots = SectionSlots::default();
        let mut w = BinaryWriter::new();
        h.write(&mut w);
        assert_eq!(w.len(), 96);
    }

    #[test]
    fn test_slot_out_of_range_rejected() {
        let mut h = sample(Generation::Mp1);
        h.slots.path = 20;
        assert!(matches!(h.validate(), Err(Error::SectionIndex { slot: "path", .. })));
    }

    #[test]
    fn test_bad_magic_and_version() {
        let mut w = BinaryWriter::new();
        w.write_u32(0x1234_5678);
        w.pad(60);
        let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
        assert!(matches!(MreaHeader::read(&mut r), Err(Error::InvalidMagic { .. })));

        let mut w = BinaryWriter::new();
        w.write_u32(MREA_MAGIC);
        w.write_u32(0x7);
        w.pad(60);
        let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
        assert!(matches!(MreaHeader::read(&mut r), Err(Error::UnsupportedVersion { .. })));
    }

    #[test]
    fn test_section_offsets() {
        let mut h = sample(Generation::Mp1);
        h.sec_sizes = vec![64, 32, 96];
        assert_eq!(h.section_offset(0), 0);
        assert_eq!(h.section_offset(2), 96);
        assert_eq!(h.sections_total(), 192);
    }
}
