//! PAK archive reader.
//!
//! The entry table is parsed once when the archive is opened; payloads are
//! decoded lazily, one entry at a time, into an owned buffer.

use std::fs::File;
use std::ops::Deref;
use std::path::Path;

use memmap2::Mmap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, trace};

use chozo_common::{
    BinaryReader, EntryReadStream, FourCC, Generation, PakFormat, ReadStream, ResourceId,
};

use crate::decompress;
use crate::format::{ClassicEntry, ClassicHeader, SectionRecord, SectionedEntry, SectionedHeader};
use crate::{Error, PakEntry, Result};

/// Archive name prefixes that are shared across the whole release (Mp3).
const SHAREABLE_PREFIXES: [&str; 5] = ["metroid", "frontend", "rs5fe", "universearea", "mp1fe"];

/// Whether an archive of this name keeps its resources to itself.
///
/// Only Mp3 ships per-level duplicated archives; for it, every archive whose
/// name does not start with one of the shared prefixes is no-share.
pub fn is_no_share_name(name: &str, generation: Generation) -> bool {
    if generation != Generation::Mp3 {
        return false;
    }
    let lower = name.to_ascii_lowercase();
    !SHAREABLE_PREFIXES.iter().any(|p| lower.starts_with(p))
}

enum Backing {
    Mapped(Mmap),
    Owned(Vec<u8>),
}

impl Deref for Backing {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Backing::Mapped(m) => m,
            Backing::Owned(v) => v,
        }
    }
}

/// A parsed PAK archive.
pub struct PakArchive {
    data: Backing,
    name: String,
    generation: Generation,
    no_share: bool,
    entries: Vec<PakEntry>,
    index: FxHashMap<ResourceId, usize>,
    dupe_mreas: FxHashSet<ResourceId>,
}

impl PakArchive {
    /// Open and memory-map an archive.
    pub fn open<P: AsRef<Path>>(path: P, generation: Generation) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        Self::parse(Backing::Mapped(mmap), name, generation)
    }

    /// Parse an archive held in memory.
    pub fn from_bytes(name: impl Into<String>, data: Vec<u8>, generation: Generation) -> Result<Self> {
        Self::parse(Backing::Owned(data), name.into(), generation)
    }

    fn parse(data: Backing, name: String, generation: Generation) -> Result<Self> {
        let (entries, names) = match generation.pak_format() {
            PakFormat::Classic => parse_classic(&data)?,
            PakFormat::Sectioned => parse_sectioned(&data)?,
        };

        let mut archive = Self {
            no_share: is_no_share_name(&name, generation),
            data,
            name,
            generation,
            entries: Vec::with_capacity(entries.len()),
            index: FxHashMap::default(),
            dupe_mreas: FxHashSet::default(),
        };

        // First occurrence wins. The MREA following a duplicate carries the
        // duplicated resources.
        let mut pending_dupe = false;
        for mut entry in entries {
            if archive.index.contains_key(&entry.id()) {
                trace!(archive = %archive.name, id = %entry.id(), "duplicate entry");
                pending_dupe = true;
                continue;
            }
            if pending_dupe && entry.kind() == FourCC::new(b"MREA") {
                archive.dupe_mreas.insert(entry.id());
                pending_dupe = false;
            }
            if let Some(name) = names.get(&entry.id()) {
                entry.set_name(name.clone());
            }
            archive.index.insert(entry.id(), archive.entries.len());
            archive.entries.push(entry);
        }

        debug!(
            archive = %archive.name,
            entries = archive.entries.len(),
            no_share = archive.no_share,
            "parsed archive"
        );
        Ok(archive)
    }

    /// Get the archive file name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File name without extension.
    pub fn base_name(&self) -> &str {
        self.name.rsplit_once('.').map_or(&self.name, |(base, _)| base)
    }

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Whether this archive's resources are excluded from sharing.
    #[inline]
    pub fn is_no_share(&self) -> bool {
        self.no_share
    }

    /// Override the name-derived no-share flag.
    pub fn set_no_share(&mut self, no_share: bool) {
        self.no_share = no_share;
    }

    #[inline]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Entries in table order.
    #[inline]
    pub fn entries(&self) -> &[PakEntry] {
        &self.entries
    }

    /// Entries of one type.
    pub fn entries_of_kind(&self, kind: FourCC) -> impl Iterator<Item = &PakEntry> + '_ {
        self.entries.iter().filter(move |e| e.kind() == kind)
    }

    /// Entries that appear in the name table.
    pub fn named_entries(&self) -> impl Iterator<Item = &PakEntry> + '_ {
        self.entries.iter().filter(|e| e.name().is_some())
    }

    /// Look an entry up by id.
    pub fn lookup(&self, id: ResourceId) -> Option<&PakEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    /// Find a named entry (case-insensitive).
    pub fn find_named(&self, name: &str) -> Option<&PakEntry> {
        self.entries
            .iter()
            .find(|e| e.name().is_some_and(|n| n.eq_ignore_ascii_case(name)))
    }

    /// Whether the MREA `id` follows a duplicated entry in the table.
    pub fn mrea_has_dupe_resources(&self, id: ResourceId) -> bool {
        self.dupe_mreas.contains(&id)
    }

    /// Read and decompress an entry's payload.
    pub fn read_entry(&self, entry: &PakEntry) -> Result<Vec<u8>> {
        let start = entry.offset();
        let end = start + entry.size() as u64;
        if end > self.data.len() as u64 {
            return Err(Error::PayloadOutOfBounds {
                id: entry.id(),
                kind: entry.kind(),
                offset: start,
                size: entry.size() as u64,
                length: self.data.len() as u64,
            });
        }

        let stored = &self.data[start as usize..end as usize];
        if entry.is_compressed() {
            decompress::decompress_entry(self.generation.entry_compression(), stored)
        } else {
            Ok(stored.to_vec())
        }
    }

    /// Read an entry by id.
    pub fn read_id(&self, id: ResourceId) -> Result<Vec<u8>> {
        let entry = self.lookup(id).ok_or(Error::EntryNotFound(id))?;
        self.read_entry(entry)
    }

    /// Decode an entry into a bounded stream positioned at its start.
    pub fn begin_read_stream(&self, entry: &PakEntry) -> Result<EntryReadStream> {
        let data = self.read_entry(entry)?;
        if data.is_empty() {
            return Err(Error::EmptyEntry(entry.id()));
        }
        Ok(EntryReadStream::new(data, 0)?)
    }
}

type ParsedTable = (Vec<PakEntry>, FxHashMap<ResourceId, String>);

fn parse_classic(data: &[u8]) -> Result<ParsedTable> {
    let mut reader = BinaryReader::new(data);
    let header: ClassicHeader = reader.read_struct()?;
    if header.version() != 0x0003_0005 {
        return Err(Error::UnsupportedVersion {
            what: "PAK",
            version: header.version(),
        });
    }

    let name_count = reader.read_u32()?;
    let mut names = FxHashMap::default();
    for _ in 0..name_count {
        let _kind = reader.read_fourcc()?;
        let id = ResourceId::new32(reader.read_u32()?);
        let len = reader.read_u32()? as usize;
        let name = String::from_utf8_lossy(reader.read_bytes(len)?).into_owned();
        names.entry(id).or_insert(name);
    }

    let entry_count = reader.read_u32()?;
    let mut entries = Vec::with_capacity(entry_count as usize);
    for _ in 0..entry_count {
        let raw: ClassicEntry = reader.read_struct()?;
        entries.push(PakEntry::new(
            ResourceId::new32(raw.id.get()),
            FourCC(raw.kind),
            raw.size.get(),
            raw.offset.get() as u64,
            raw.compressed.get() != 0,
        ));
    }

    Ok((entries, names))
}

fn parse_sectioned(data: &[u8]) -> Result<ParsedTable> {
    let mut reader = BinaryReader::new(data);
    let header: SectionedHeader = reader.read_struct()?;
    if header.version.get() != SectionedHeader::VERSION {
        return Err(Error::UnsupportedVersion {
            what: "PAK",
            version: header.version.get(),
        });
    }

    reader.set_offset(header.header_size.get() as usize)?;
    let section_count = reader.read_u32()?;
    let mut sections = Vec::with_capacity(section_count as usize);
    for _ in 0..section_count {
        sections.push(reader.read_struct::<SectionRecord>()?);
    }

    let mut names = FxHashMap::default();
    let mut entries = Vec::new();
    let mut raw_entries = Vec::new();
    let mut data_start = None;
    let mut section_start = SectionedHeader::DIRECTORY_END;

    for section in &sections {
        let mut body = BinaryReader::new(data);
        body.set_offset(section_start)?;
        match section.id {
            SectionedHeader::STRN => {
                let count = body.read_u32()?;
                for _ in 0..count {
                    let name = body.read_cstr()?.to_string();
                    let _kind = body.read_fourcc()?;
                    let id = ResourceId::new64(body.read_u64()?);
                    names.entry(id).or_insert(name);
                }
            }
            SectionedHeader::RSHD => {
                let count = body.read_u32()?;
                for _ in 0..count {
                    raw_entries.push(body.read_struct::<SectionedEntry>()?);
                }
            }
            SectionedHeader::DATA => data_start = Some(section_start as u64),
            other => {
                debug!(section = %FourCC(other), "skipping unknown archive section");
            }
        }
        section_start += section.size.get() as usize;
    }

    let data_start = data_start.ok_or(Error::InvalidMagic {
        what: "DATA section",
        expected: u32::from_be_bytes(SectionedHeader::DATA),
        actual: 0,
    })?;

    for raw in raw_entries {
        entries.push(PakEntry::new(
            ResourceId::new64(raw.id.get()),
            FourCC(raw.kind),
            raw.size.get(),
            data_start + raw.offset.get() as u64,
            raw.compressed.get() != 0,
        ));
    }

    Ok((entries, names))
}

impl std::fmt::Debug for PakArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakArchive")
            .field("name", &self.name)
            .field("generation", &self.generation)
            .field("entries", &self.entries.len())
            .field("no_share", &self.no_share)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PakBuilder;

    fn id(v: u32) -> ResourceId {
        ResourceId::new32(v)
    }

    #[test]
    fn test_no_share_heuristic() {
        assert!(!is_no_share_name("Metroid1.pak", Generation::Mp3));
        assert!(!is_no_share_name("FrontEnd.pak", Generation::Mp3));
        assert!(is_no_share_name("Worlds.pak", Generation::Mp3));
        assert!(!is_no_share_name("Worlds.pak", Generation::Mp1));
    }

    #[test]
    fn test_classic_lookup_and_read() {
        let mut builder = PakBuilder::new(Generation::Mp1);
        builder.add_named(id(0x10), FourCC::new(b"STRG"), "WorldName", b"hello".to_vec());
        builder.add_compressed(id(0x20), FourCC::new(b"TXTR"), vec![7u8; 4096]);
        let pak = PakArchive::from_bytes("Metroid1.pak", builder.build().unwrap(), Generation::Mp1)
            .unwrap();

        assert_eq!(pak.entry_count(), 2);
        assert_eq!(pak.base_name(), "Metroid1");
        let strg = pak.lookup(id(0x10)).unwrap();
        assert_eq!(strg.name(), Some("WorldName"));
        assert_eq!(pak.read_entry(strg).unwrap(), b"hello");
        assert!(pak.lookup(id(0x20)).unwrap().is_compressed());
        assert_eq!(pak.read_id(id(0x20)).unwrap(), vec![7u8; 4096]);
        assert!(pak.lookup(id(0x30)).is_none());
        assert_eq!(pak.find_named("worldname").unwrap().id(), id(0x10));
        assert_eq!(pak.read_id(id(0x30)).unwrap_err().kind(), chozo_common::ErrorKind::Missing);
    }

    #[test]
    fn test_sectioned_lookup_and_read() {
        let mut builder = PakBuilder::new(Generation::Mp3);
        let big = ResourceId::new64(0x0123_4567_89AB_CDEF);
        builder.add_named(big, FourCC::new(b"MLVL"), "Level", vec![1, 2, 3, 4]);
        builder.add_compressed(ResourceId::new64(2), FourCC::new(b"TXTR"), vec![9u8; 70_000]);
        let pak =
            PakArchive::from_bytes("Worlds.pak", builder.build().unwrap(), Generation::Mp3).unwrap();

        assert!(pak.is_no_share());
        assert_eq!(pak.lookup(big).unwrap().name(), Some("Level"));
        assert_eq!(pak.read_id(big).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(pak.read_id(ResourceId::new64(2)).unwrap(), vec![9u8; 70_000]);
    }

    #[test]
    fn test_duplicate_marks_next_mrea() {
        let mut builder = PakBuilder::new(Generation::Mp2);
        builder.add(id(1), FourCC::new(b"TXTR"), vec![1]);
        builder.add(id(2), FourCC::new(b"MREA"), vec![2]);
        builder.add(id(1), FourCC::new(b"TXTR"), vec![3]);
        builder.add(id(3), FourCC::new(b"MREA"), vec![4]);
        let pak =
            PakArchive::from_bytes("Metroid2.pak", builder.build().unwrap(), Generation::Mp2).unwrap();

        assert_eq!(pak.entry_count(), 3);
        assert_eq!(pak.read_id(id(1)).unwrap(), vec![1]);
        assert!(!pak.mrea_has_dupe_resources(id(2)));
        assert!(pak.mrea_has_dupe_resources(id(3)));
    }

    #[test]
    fn test_bad_version_is_unsupported() {
        let data = vec![0, 4, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let err = PakArchive::from_bytes("x.pak", data, Generation::Mp1).unwrap_err();
        assert_eq!(err.kind(), chozo_common::ErrorKind::Unsupported);
    }

    #[test]
    fn test_empty_entry_stream_fails() {
        let mut builder = PakBuilder::new(Generation::Mp1);
        builder.add(id(5), FourCC::new(b"DUMB"), Vec::new());
        let pak = PakArchive::from_bytes("a.pak", builder.build().unwrap(), Generation::Mp1).unwrap();
        let entry = pak.lookup(id(5)).unwrap().clone();
        assert!(pak.begin_read_stream(&entry).is_err());
    }

    #[test]
    fn test_open_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Metroid4.pak");
        let mut builder = PakBuilder::new(Generation::Mp1);
        builder.add(id(9), FourCC::new(b"CMDL"), vec![0xAB; 100]);
        builder.write_to(&path).unwrap();

        let pak = PakArchive::open(&path, Generation::Mp1).unwrap();
        assert_eq!(pak.name(), "Metroid4.pak");
        let mut stream = pak.begin_read_stream(pak.lookup(id(9)).unwrap()).unwrap();
        assert_eq!(stream.length(), 100);
        assert_eq!(stream.read_u8().unwrap(), 0xAB);
    }
}
