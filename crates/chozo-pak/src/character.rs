//! CHAR character definitions.
//!
//! Only the head of the chunk is decoded: the base model/skin pair, the
//! overlay (attachment) model/skin pairs and the skeleton. Animation data
//! that follows is ignored.

use chozo_common::{BinaryWriter, EntryReadStream, FourCC, IdWidth, ReadStream, ResourceId};

use crate::Result;

/// An overlay model sharing the character's skeleton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterOverlay {
    pub kind: FourCC,
    pub cmdl: ResourceId,
    pub cskr: ResourceId,
}

/// Decoded character head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Character {
    pub name: String,
    pub cmdl: ResourceId,
    pub cskr: ResourceId,
    pub overlays: Vec<CharacterOverlay>,
    pub cinf: ResourceId,
}

impl Character {
    pub fn read(data: &[u8], width: IdWidth) -> Result<Self> {
        let mut r = EntryReadStream::from_vec(data.to_vec())?;
        let _unknown = r.read_u16()?;
        let name = r.read_cstring()?;
        let cmdl = r.read_id(width)?;
        let cskr = r.read_id(width)?;
        let count = r.read_u32()?;
        let mut overlays = Vec::with_capacity(count as usize);
        for _ in 0..count {
            overlays.push(CharacterOverlay {
                kind: r.read_fourcc()?,
                cmdl: r.read_id(width)?,
                cskr: r.read_id(width)?,
            });
        }
        let cinf = r.read_id(width)?;
        Ok(Self {
            name,
            cmdl,
            cskr,
            overlays,
            cinf,
        })
    }

    /// Encode the head fields only.
    pub fn write(&self) -> Vec<u8> {
        let mut w = BinaryWriter::new();
        w.write_u16(0);
        w.write_cstring(&self.name);
        w.write_id(self.cmdl);
        w.write_id(self.cskr);
        w.write_u32(self.overlays.len() as u32);
        for o in &self.overlays {
            w.write_fourcc(o.kind);
            w.write_id(o.cmdl);
            w.write_id(o.cskr);
        }
        w.write_id(self.cinf);
        w.into_inner()
    }

    /// Every `(model, skin)` pair bound to this character's skeleton.
    pub fn rig_pairs(&self) -> impl Iterator<Item = (ResourceId, ResourceId)> + '_ {
        std::iter::once((self.cmdl, self.cskr)).chain(self.overlays.iter().map(|o| (o.cmdl, o.cskr)))
    }
}
