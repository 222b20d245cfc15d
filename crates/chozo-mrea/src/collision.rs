//! DeafBabe collision meshes.

use serde::{Deserialize, Serialize};

use chozo_common::math::{Aabb, Vec3};
use chozo_common::{BinaryWriter, ReadStream};

use crate::{Error, Result};

/// `0xDEAFBABE`.
pub const DEAFBABE_MAGIC: u32 = 0xDEAF_BABE;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollisionMesh {
    /// 3 for Mp1, 4 for Mp2/Mp3.
    pub version: u32,
    pub aabb: Aabb,
    pub root_node_type: u32,
    /// Serialized BSP tree, carried through as-is.
    #[serde(with = "crate::serde_hex")]
    pub bsp: Vec<u8>,
    pub materials: Vec<u32>,
    pub vert_materials: Vec<u8>,
    pub edge_materials: Vec<u8>,
    pub tri_materials: Vec<u8>,
    pub edges: Vec<[u16; 2]>,
    pub tri_edges: Vec<u16>,
    /// Version 4 only.
    pub unknown: Vec<u16>,
    pub verts: Vec<Vec3>,
}

fn read_bytes<R: ReadStream + ?Sized>(r: &mut R) -> Result<Vec<u8>> {
    let n = r.read_u32()?;
    Ok(r.read_vec(n as usize)?)
}

fn read_u16s<R: ReadStream + ?Sized>(r: &mut R) -> Result<Vec<u16>> {
    let n = r.read_u32()?;
    let mut out = Vec::with_capacity(n as usize);
    for _ in 0..n {
        out.push(r.read_u16()?);
    }
    Ok(out)
}

impl CollisionMesh {
    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let _unknown = r.read_u32()?;
        let _size = r.read_u32()?;
        let magic = r.read_u32()?;
        if magic != DEAFBABE_MAGIC {
            return Err(Error::InvalidMagic {
                what: "collision",
                expected: DEAFBABE_MAGIC,
                actual: magic,
            });
        }
        let version = r.read_u32()?;
        if !(3..=4).contains(&version) {
            return Err(Error::UnsupportedVersion {
                what: "collision",
                version,
            });
        }
        let aabb = Aabb::read(r)?;
        let root_node_type = r.read_u32()?;
        let bsp = read_bytes(r)?;

        let n = r.read_u32()?;
        let materials = (0..n).map(|_| r.read_u32()).collect::<chozo_common::Result<_>>()?;
        let vert_materials = read_bytes(r)?;
        let edge_materials = read_bytes(r)?;
        let tri_materials = read_bytes(r)?;

        let n = r.read_u32()?;
        let mut edges = Vec::with_capacity(n as usize);
        for _ in 0..n {
            edges.push([r.read_u16()?, r.read_u16()?]);
        }
        let tri_edges = read_u16s(r)?;
        let unknown = if version >= 4 { read_u16s(r)? } else { Vec::new() };

        let n = r.read_u32()?;
        let mut verts = Vec::with_capacity(n as usize);
        for _ in 0..n {
            verts.push(r.read_vec3()?);
        }

        Ok(Self {
            version,
            aabb,
            root_node_type,
            bsp,
            materials,
            vert_materials,
            edge_materials,
            tri_materials,
            edges,
            tri_edges,
            unknown,
            verts,
        })
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        let mut body = BinaryWriter::new();
        body.write_u32(DEAFBABE_MAGIC);
        body.write_u32(self.version);
        self.aabb.write(&mut body);
        body.write_u32(self.root_node_type);
        body.write_u32(self.bsp.len() as u32);
        body.write_bytes(&self.bsp);
        body.write_u32(self.materials.len() as u32);
        for m in &self.materials {
            body.write_u32(*m);
        }
        for list in [&self.vert_materials, &self.edge_materials, &self.tri_materials] {
            body.write_u32(list.len() as u32);
            body.write_bytes(list);
        }
        body.write_u32(self.edges.len() as u32);
        for [a, b] in &self.edges {
            body.write_u16(*a);
            body.write_u16(*b);
        }
        let mut lists = vec![&self.tri_edges];
        if self.version >= 4 {
            lists.push(&self.unknown);
        }
        for list in lists {
            body.write_u32(list.len() as u32);
            for v in list {
                body.write_u16(*v);
            }
        }
        body.write_u32(self.verts.len() as u32);
        for v in &self.verts {
            body.write_vec3(*v);
        }

        w.write_u32(1);
        w.write_u32(body.len() as u32);
        w.write_bytes(body.as_slice());
    }

    /// Triangle count implied by the edge index list.
    pub fn triangle_count(&self) -> usize {
        self.tri_edges.len() / 3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    fn sample(version: u32) -> CollisionMesh {
        CollisionMesh {
            version,
            aabb: Aabb::new([-1.0; 3], [1.0; 3]),
            root_node_type: 1,
            bsp: vec![0xAB; 20],
            materials: vec![0x0008_0000, 0x0010_0000],
            vert_materials: vec![0, 0, 1],
            edge_materials: vec![0, 1, 1],
            tri_materials: vec![1],
            edges: vec![[0, 1], [1, 2], [2, 0]],
            tri_edges: vec![0, 1, 2],
            unknown: if version >= 4 { vec![7] } else { vec![] },
            verts: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    #[test]
    fn test_collision_both_versions() {
        for version in [3, 4] {
            let mesh = sample(version);
            let mut w = BinaryWriter::new();
            mesh.write(&mut w);
            w.align32();
            let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
            let back = CollisionMesh::read(&mut r).unwrap();
            assert_eq!(back, mesh);
            assert_eq!(back.triangle_count(), 1);
        }
    }

    #[test]
    fn test_bad_collision_magic() {
        let mut w = BinaryWriter::new();
        w.write_u32(1);
        w.write_u32(8);
        w.write_u32(0x1234_5678);
        w.pad(32);
        let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
        assert!(CollisionMesh::read(&mut r).is_err());
    }
}
