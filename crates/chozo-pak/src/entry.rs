//! PAK archive entry.

use chozo_common::{FourCC, ResourceId};

/// An entry (resource) within a PAK archive.
///
/// This contains metadata about the resource, not the payload itself.
/// Use [`PakArchive::read_entry`](crate::PakArchive::read_entry) or
/// [`PakArchive::begin_read_stream`](crate::PakArchive::begin_read_stream)
/// to get the decoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PakEntry {
    id: ResourceId,
    kind: FourCC,
    size: u32,
    offset: u64,
    compressed: bool,
    name: Option<String>,
}

impl PakEntry {
    pub(crate) fn new(
        id: ResourceId,
        kind: FourCC,
        size: u32,
        offset: u64,
        compressed: bool,
    ) -> Self {
        Self {
            id,
            kind,
            size,
            offset,
            compressed,
            name: None,
        }
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    /// Resource id.
    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Type code, e.g. `MREA`.
    #[inline]
    pub fn kind(&self) -> FourCC {
        self.kind
    }

    /// Stored payload size in bytes.
    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Absolute payload offset within the archive.
    #[inline]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the payload is compressed.
    #[inline]
    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// Name from the archive name table, if any.
    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `<name>_<id>` for named entries, `<TYPE>_<id>` otherwise.
    pub fn best_name(&self) -> String {
        match &self.name {
            Some(name) => format!("{}_{}", name, self.id),
            None => format!("{}_{}", self.kind, self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_name() {
        let mut entry = PakEntry::new(ResourceId::new32(0x10), FourCC::new(b"TXTR"), 32, 64, false);
        assert_eq!(entry.best_name(), "TXTR_00000010");
        entry.set_name("Door".to_string());
        assert_eq!(entry.best_name(), "Door_00000010");
        assert_eq!(entry.name(), Some("Door"));
    }
}
