//! VISI precomputed visibility.
//!
//! The codec does not regenerate visibility. Decode dumps the section
//! verbatim to a `.visi` sidecar and lists the entity ids in a metadata
//! file. Cook copies the `.visi` sidecar back in whenever it is longer than
//! [`MIN_RECYCLE_LEN`]; the metadata file is optional and only compared
//! against the cooked light count.

use serde::{Deserialize, Serialize};

use chozo_common::{BinaryReader, BinaryWriter, ReadStream};

use crate::Result;

/// `'VISI'`.
pub const VISI_MAGIC: u32 = 0x5649_5349;

/// Shortest `.visi` sidecar worth recycling.
pub const MIN_RECYCLE_LEN: u64 = 26;

/// Counts and entity list from a VISI header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisiInfo {
    pub feature_count: u32,
    pub light_count: u32,
    pub layer2_light_count: u32,
    pub entity_ids: Vec<u32>,
}

/// Whether `bytes` start with the VISI magic.
pub fn has_visi_magic(bytes: &[u8]) -> bool {
    bytes.len() >= 4 && bytes[..4] == VISI_MAGIC.to_be_bytes()
}

impl VisiInfo {
    /// Parse the header of a VISI section.
    pub fn parse(bytes: &[u8]) -> Result<Option<Self>> {
        if !has_visi_magic(bytes) {
            return Ok(None);
        }
        let mut r = BinaryReader::new_at(bytes, 4);
        let _version = r.read_u32()?;
        r.skip(2)?;
        let feature_count = r.read_u32()?;
        let light_count = r.read_u32()?;
        let layer2_light_count = r.read_u32()?;
        let entity_count = r.read_u32()?;
        r.skip(8)?;
        let mut entity_ids = Vec::with_capacity(entity_count as usize);
        for _ in 0..entity_count {
            entity_ids.push(r.read_u32()?);
        }
        Ok(Some(Self {
            feature_count,
            light_count,
            layer2_light_count,
            entity_ids,
        }))
    }

    /// Encode a header with no visibility payload.
    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u32(VISI_MAGIC);
        w.write_u32(2);
        w.write_u8(1);
        w.write_u8(1);
        w.write_u32(self.feature_count);
        w.write_u32(self.light_count);
        w.write_u32(self.layer2_light_count);
        w.write_u32(self.entity_ids.len() as u32);
        w.pad(8);
        for id in &self.entity_ids {
            w.write_u32(*id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visi_header() {
        let info = VisiInfo {
            feature_count: 5,
            light_count: 2,
            layer2_light_count: 1,
            entity_ids: vec![0x10, 0x20],
        };
        let mut w = BinaryWriter::new();
        info.write(&mut w);
        w.align32();
        let bytes = w.into_inner();
        assert!(bytes.len() as u64 > MIN_RECYCLE_LEN);
        assert_eq!(VisiInfo::parse(&bytes).unwrap(), Some(info));
    }

    #[test]
    fn test_absent_visi() {
        assert_eq!(VisiInfo::parse(&[0; 4]).unwrap(), None);
        assert_eq!(VisiInfo::parse(&[]).unwrap(), None);
    }
}
