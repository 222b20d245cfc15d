//! Area material set.
//!
//! The set lists the textures used by the area's meshes and one material
//! record per surface kind. Only the fields the codec needs are decoded
//! (texture indices and the vertex attribute layout); the rest of each
//! record is carried through untouched.

use serde::{Deserialize, Serialize};

use chozo_common::{BinaryWriter, IdWidth, ReadStream, ResourceId};

use crate::{Error, Result};

/// Number of 2-bit GX attribute fields in `vertex_attr_flags`
/// (position, normal, two colors, eight texture coordinates).
const ATTRIBUTE_FIELDS: u32 = 12;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub flags: u32,
    pub texture_indices: Vec<u32>,
    pub vertex_attr_flags: u32,
    #[serde(with = "crate::serde_hex")]
    pub extra: Vec<u8>,
}

impl Material {
    /// Index values stored per display-list vertex.
    pub fn attribute_count(&self) -> usize {
        (0..ATTRIBUTE_FIELDS)
            .filter(|i| (self.vertex_attr_flags >> (i * 2)) & 3 != 0)
            .count()
    }

    fn encoded_len(&self) -> usize {
        12 + self.texture_indices.len() * 4 + self.extra.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MaterialSet {
    pub textures: Vec<ResourceId>,
    pub materials: Vec<Material>,
}

impl MaterialSet {
    pub fn read<R: ReadStream + ?Sized>(r: &mut R, width: IdWidth) -> Result<Self> {
        let texture_count = r.read_u32()?;
        let mut textures = Vec::with_capacity(texture_count as usize);
        for _ in 0..texture_count {
            textures.push(r.read_id(width)?);
        }

        let material_count = r.read_u32()?;
        let mut ends = Vec::with_capacity(material_count as usize);
        for _ in 0..material_count {
            ends.push(r.read_u32()? as u64);
        }

        let base = r.position();
        let mut materials = Vec::with_capacity(ends.len());
        let mut start = 0u64;
        for end in ends {
            r.seek((base + start) as i64, chozo_common::SeekOrigin::Begin)?;
            let flags = r.read_u32()?;
            let tex_count = r.read_u32()?;
            let mut texture_indices = Vec::with_capacity(tex_count as usize);
            for _ in 0..tex_count {
                texture_indices.push(r.read_u32()?);
            }
            let vertex_attr_flags = r.read_u32()?;
            let consumed = r.position() - base;
            if consumed > end {
                return Err(Error::Scene(format!(
                    "material record overruns its end offset {:#x}",
                    end
                )));
            }
            let extra = r.read_vec((end - consumed) as usize)?;
            materials.push(Material {
                flags,
                texture_indices,
                vertex_attr_flags,
                extra,
            });
            start = end;
        }

        Ok(Self {
            textures,
            materials,
        })
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u32(self.textures.len() as u32);
        for id in &self.textures {
            w.write_id(*id);
        }
        w.write_u32(self.materials.len() as u32);
        let mut end = 0u32;
        for m in &self.materials {
            end += m.encoded_len() as u32;
            w.write_u32(end);
        }
        for m in &self.materials {
            w.write_u32(m.flags);
            w.write_u32(m.texture_indices.len() as u32);
            for idx in &m.texture_indices {
                w.write_u32(*idx);
            }
            w.write_u32(m.vertex_attr_flags);
            w.write_bytes(&m.extra);
        }
    }

    /// Attribute count of material `idx`.
    pub fn attribute_count(&self, idx: u32) -> Result<usize> {
        self.materials
            .get(idx as usize)
            .map(Material::attribute_count)
            .ok_or_else(|| {
                Error::Scene(format!(
                    "surface references material {} of {}",
                    idx,
                    self.materials.len()
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    fn sample() -> MaterialSet {
        MaterialSet {
            textures: vec![ResourceId::new32(0xAA), ResourceId::new32(0xBB)],
            materials: vec![
                Material {
                    flags: 0x8,
                    texture_indices: vec![0, 1],
                    // position, normal, tex0
                    vertex_attr_flags: 0b11_00_00_11_11,
                    extra: vec![1, 2, 3, 4, 5, 6, 7, 8],
                },
                Material {
                    flags: 0,
                    texture_indices: vec![],
                    vertex_attr_flags: 0b11,
                    extra: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_material_set_rewrite() {
        let set = sample();
        let mut w = BinaryWriter::new();
        set.write(&mut w);
        w.pad(32);
        let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
        assert_eq!(MaterialSet::read(&mut r, IdWidth::Bits32).unwrap(), set);
    }

    #[test]
    fn test_attribute_count() {
        let set = sample();
        assert_eq!(set.attribute_count(0).unwrap(), 3);
        assert_eq!(set.attribute_count(1).unwrap(), 1);
        assert!(set.attribute_count(2).is_err());
    }
}
