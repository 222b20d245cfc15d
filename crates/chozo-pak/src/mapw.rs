//! MAPW world map chunks: one MAPA id per level area, in area order.

use chozo_common::{BinaryWriter, EntryReadStream, IdWidth, ReadStream, ResourceId};

use crate::{Error, Result};

pub const MAPW_MAGIC: u32 = 0xDEAD_F00D;

/// Decode the MAPA id list.
pub fn read_mapw(data: &[u8], width: IdWidth) -> Result<Vec<ResourceId>> {
    let mut r = EntryReadStream::from_vec(data.to_vec())?;
    let magic = r.read_u32()?;
    if magic != MAPW_MAGIC {
        return Err(Error::InvalidMagic {
            what: "MAPW",
            expected: MAPW_MAGIC,
            actual: magic,
        });
    }
    let _version = r.read_u32()?;
    let count = r.read_u32()?;
    let mut mapas = Vec::with_capacity(count as usize);
    for _ in 0..count {
        mapas.push(r.read_id(width)?);
    }
    Ok(mapas)
}

/// Encode a MAPA id list.
pub fn write_mapw(mapas: &[ResourceId]) -> Vec<u8> {
    let mut w = BinaryWriter::new();
    w.write_u32(MAPW_MAGIC);
    w.write_u32(1);
    w.write_u32(mapas.len() as u32);
    for id in mapas {
        w.write_id(*id);
    }
    w.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapw_ids() {
        let ids = vec![ResourceId::new32(7), ResourceId::new32(9)];
        assert_eq!(read_mapw(&write_mapw(&ids), IdWidth::Bits32).unwrap(), ids);
        assert!(read_mapw(&[0u8; 12], IdWidth::Bits32).is_err());
    }
}
