//! AROT area octree.
//!
//! The octree partitions the area bounds and records, per node, which
//! meshes overlap it as a bitmap. A node's `subdiv_flags` say which axes it
//! splits (1 = X, 2 = Y, 4 = Z); a branch therefore has 2, 4 or 8 children,
//! ordered by their upper/lower choice on each split axis with X in the
//! lowest bit. Leaves have no flags and no children.
//!
//! Cook rebuilds the tree from mesh bounds; decode only needs [`Arot::read`]
//! for inspection.

use chozo_common::math::Aabb;
use chozo_common::{BinaryWriter, ReadStream};

use crate::{Error, Result};

/// `'AROT'`.
pub const AROT_MAGIC: u32 = 0x4152_4F54;

const MAX_DEPTH: u32 = 3;
const MIN_MODELS: usize = 8;
const MIN_SUBDIV: f32 = 10.0;

fn child_count(flags: u16) -> usize {
    if flags == 0 {
        0
    } else {
        1 << (flags & 7).count_ones()
    }
}

/// Expand the compact child index into an octant index using `flags`.
fn octant_of(child: usize, flags: u16) -> usize {
    let mut octant = 0;
    let mut bit = 0;
    for axis in 0..3 {
        if flags & (1 << axis) != 0 {
            if child & (1 << bit) != 0 {
                octant |= 1 << axis;
            }
            bit += 1;
        }
    }
    octant
}

fn child_box(aabb: &Aabb, octant: usize, flags: u16) -> Aabb {
    let mut out = *aabb;
    if flags & 1 != 0 {
        out = out.split_x(octant & 1 != 0);
    }
    if flags & 2 != 0 {
        out = out.split_y(octant & 2 != 0);
    }
    if flags & 4 != 0 {
        out = out.split_z(octant & 4 != 0);
    }
    out
}

struct BuildNode {
    meshes: Vec<u32>,
    flags: u16,
    children: Vec<BuildNode>,
}

impl BuildNode {
    fn build(aabb: &Aabb, parent: &[u32], boxes: &[Aabb], depth: u32) -> Self {
        let meshes: Vec<u32> = parent
            .iter()
            .copied()
            .filter(|&i| boxes[i as usize].intersects(aabb))
            .collect();
        let leaf = |meshes| BuildNode {
            meshes,
            flags: 0,
            children: Vec::new(),
        };
        if depth >= MAX_DEPTH || meshes.len() < MIN_MODELS {
            return leaf(meshes);
        }

        let ext = aabb.extents();
        let mut flags = 0u16;
        for (axis, e) in ext.iter().enumerate() {
            if *e > MIN_SUBDIV {
                flags |= 1 << axis;
            }
        }
        if flags == 0 {
            return leaf(meshes);
        }

        let children: Vec<BuildNode> = (0..child_count(flags))
            .map(|c| {
                let sub = child_box(aabb, octant_of(c, flags), flags);
                BuildNode::build(&sub, &meshes, boxes, depth + 1)
            })
            .collect();
        // Splitting gained nothing when every child still sees every mesh.
        if children
            .iter()
            .all(|c| c.flags == 0 && c.meshes.len() == meshes.len())
        {
            return leaf(meshes);
        }
        BuildNode {
            meshes,
            flags,
            children,
        }
    }

    fn flatten(&self, nodes: &mut Vec<ArotNode>, bitmaps: &mut Vec<Vec<u32>>, words: usize) -> u16 {
        let mut bitmap = vec![0u32; words];
        for &m in &self.meshes {
            bitmap[m as usize / 32] |= 1 << (m % 32);
        }
        let bitmap_idx = match bitmaps.iter().position(|b| *b == bitmap) {
            Some(i) => i,
            None => {
                bitmaps.push(bitmap);
                bitmaps.len() - 1
            }
        } as u16;

        let idx = nodes.len();
        nodes.push(ArotNode {
            bitmap: bitmap_idx,
            flags: self.flags,
            children: Vec::new(),
        });
        let children: Vec<u16> = self
            .children
            .iter()
            .map(|c| c.flatten(nodes, bitmaps, words))
            .collect();
        nodes[idx].children = children;
        idx as u16
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArotNode {
    pub bitmap: u16,
    pub flags: u16,
    pub children: Vec<u16>,
}

/// Decoded or freshly built octree.
#[derive(Debug, Clone, PartialEq)]
pub struct Arot {
    pub mesh_count: u32,
    pub aabb: Aabb,
    pub bitmaps: Vec<Vec<u32>>,
    /// Pre-order; node 0 is the root.
    pub nodes: Vec<ArotNode>,
}

impl Arot {
    /// Build the octree over `mesh_boxes` inside `full`.
    pub fn build(full: &Aabb, mesh_boxes: &[Aabb]) -> Self {
        let all: Vec<u32> = (0..mesh_boxes.len() as u32).collect();
        let root = BuildNode::build(full, &all, mesh_boxes, 0);
        let words = mesh_boxes.len().div_ceil(32);
        let mut nodes = Vec::new();
        let mut bitmaps = Vec::new();
        root.flatten(&mut nodes, &mut bitmaps, words);
        Self {
            mesh_count: mesh_boxes.len() as u32,
            aabb: *full,
            bitmaps,
            nodes,
        }
    }

    fn words(&self) -> usize {
        (self.mesh_count as usize).div_ceil(32)
    }

    /// Meshes overlapping node `idx`.
    pub fn meshes_of(&self, idx: usize) -> Vec<u32> {
        let Some(bitmap) = self.nodes.get(idx).and_then(|n| self.bitmaps.get(n.bitmap as usize)) else {
            return Vec::new();
        };
        (0..self.mesh_count)
            .filter(|&m| bitmap[m as usize / 32] & (1 << (m % 32)) != 0)
            .collect()
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        let start = w.len();
        w.write_u32(AROT_MAGIC);
        w.write_u32(1);
        w.write_u32(self.bitmaps.len() as u32);
        w.write_u32(self.mesh_count);
        w.write_u32(self.nodes.len() as u32);
        self.aabb.write(w);
        let len = w.len() - start;
        w.pad(chozo_common::round_up_32_usize(len) - len);

        for bitmap in &self.bitmaps {
            for word in bitmap {
                w.write_u32(*word);
            }
        }
        let mut offset = 0u32;
        for node in &self.nodes {
            w.write_u32(offset);
            offset += 4 + 2 * node.children.len() as u32;
        }
        for node in &self.nodes {
            w.write_u16(node.bitmap);
            w.write_u16(node.flags);
            for child in &node.children {
                w.write_u16(*child);
            }
        }
    }

    pub fn read<R: ReadStream + ?Sized>(r: &mut R) -> Result<Self> {
        let start = r.position();
        let magic = r.read_u32()?;
        if magic != AROT_MAGIC {
            return Err(Error::InvalidMagic {
                what: "AROT",
                expected: AROT_MAGIC,
                actual: magic,
            });
        }
        let version = r.read_u32()?;
        if version != 1 {
            return Err(Error::UnsupportedVersion {
                what: "AROT",
                version,
            });
        }
        let bitmap_count = r.read_u32()?;
        let mesh_count = r.read_u32()?;
        let node_count = r.read_u32()?;
        let aabb = Aabb::read(r)?;
        let len = r.position() - start;
        r.skip(chozo_common::round_up_32(len) - len)?;

        let mut arot = Self {
            mesh_count,
            aabb,
            bitmaps: Vec::with_capacity(bitmap_count as usize),
            nodes: Vec::with_capacity(node_count as usize),
        };
        let words = arot.words();
        for _ in 0..bitmap_count {
            let mut bitmap = Vec::with_capacity(words);
            for _ in 0..words {
                bitmap.push(r.read_u32()?);
            }
            arot.bitmaps.push(bitmap);
        }
        r.skip(node_count as u64 * 4)?;
        for _ in 0..node_count {
            let bitmap = r.read_u16()?;
            let flags = r.read_u16()?;
            let mut children = Vec::with_capacity(child_count(flags));
            for _ in 0..child_count(flags) {
                children.push(r.read_u16()?);
            }
            arot.nodes.push(ArotNode {
                bitmap,
                flags,
                children,
            });
        }
        Ok(arot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chozo_common::EntryReadStream;

    fn grid(n: usize, spacing: f32) -> Vec<Aabb> {
        (0..n)
            .map(|i| {
                let x = (i % 4) as f32 * spacing;
                let y = ((i / 4) % 4) as f32 * spacing;
                let z = (i / 16) as f32 * spacing;
                Aabb::new([x, y, z], [x + 1.0, y + 1.0, z + 1.0])
            })
            .collect()
    }

    fn full(boxes: &[Aabb]) -> Aabb {
        boxes.iter().fold(Aabb::empty(), |acc, b| acc.union(b))
    }

    #[test]
    fn test_few_meshes_single_leaf() {
        let boxes = grid(3, 50.0);
        let arot = Arot::build(&full(&boxes), &boxes);
        assert_eq!(arot.nodes.len(), 1);
        assert_eq!(arot.nodes[0].flags, 0);
        assert_eq!(arot.meshes_of(0), vec![0, 1, 2]);
    }

    #[test]
    fn test_split_covers_every_mesh() {
        let boxes = grid(32, 40.0);
        let arot = Arot::build(&full(&boxes), &boxes);
        let root = &arot.nodes[0];
        assert_eq!(root.flags, 7);
        assert_eq!(root.children.len(), 8);

        let mut seen = vec![false; boxes.len()];
        for (i, node) in arot.nodes.iter().enumerate() {
            if node.flags == 0 {
                for m in arot.meshes_of(i) {
                    seen[m as usize] = true;
                }
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn test_flat_area_splits_two_axes() {
        let boxes: Vec<Aabb> = (0..16)
            .map(|i| {
                let x = (i % 4) as f32 * 30.0;
                let y = (i / 4) as f32 * 30.0;
                Aabb::new([x, y, 0.0], [x + 1.0, y + 1.0, 1.0])
            })
            .collect();
        let arot = Arot::build(&full(&boxes), &boxes);
        assert_eq!(arot.nodes[0].flags, 3);
        assert_eq!(arot.nodes[0].children.len(), 4);
    }

    #[test]
    fn test_write_then_read() {
        let boxes = grid(40, 25.0);
        let arot = Arot::build(&full(&boxes), &boxes);
        let mut w = BinaryWriter::new();
        arot.write(&mut w);
        w.pad(32);
        let mut r = EntryReadStream::from_vec(w.into_inner()).unwrap();
        assert_eq!(Arot::read(&mut r).unwrap(), arot);
    }

    #[test]
    fn test_empty_area() {
        let arot = Arot::build(&Aabb::empty(), &[]);
        assert_eq!(arot.nodes.len(), 1);
        assert!(arot.meshes_of(0).is_empty());
    }
}
