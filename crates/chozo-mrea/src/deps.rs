//! Mp3 `DEPS` dependency section and per-layer dependency results.

use serde::{Deserialize, Serialize};

use chozo_common::{BinaryWriter, FourCC, IdWidth, ReadStream, ResourceId};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AreaDependency {
    pub id: ResourceId,
    pub kind: FourCC,
}

/// Dependency list partitioned by layer offsets. The partition after the
/// last script layer belongs to the area itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaDependencies {
    pub dependencies: Vec<AreaDependency>,
    pub layer_offsets: Vec<u32>,
}

impl AreaDependencies {
    pub fn read<R: ReadStream + ?Sized>(r: &mut R, width: IdWidth) -> Result<Self> {
        let count = r.read_u32()?;
        let mut dependencies = Vec::with_capacity(count as usize);
        for _ in 0..count {
            dependencies.push(AreaDependency {
                id: r.read_id(width)?,
                kind: r.read_fourcc()?,
            });
        }
        let count = r.read_u32()?;
        let mut layer_offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            layer_offsets.push(r.read_u32()?);
        }
        Ok(Self {
            dependencies,
            layer_offsets,
        })
    }

    pub fn write(&self, w: &mut BinaryWriter) {
        w.write_u32(self.dependencies.len() as u32);
        for dep in &self.dependencies {
            w.write_id(dep.id);
            w.write_fourcc(dep.kind);
        }
        w.write_u32(self.layer_offsets.len() as u32);
        for offset in &self.layer_offsets {
            w.write_u32(*offset);
        }
    }

    /// One slice per offset, each running to the next offset.
    pub fn partitions(&self) -> Vec<&[AreaDependency]> {
        let len = self.dependencies.len();
        self.layer_offsets
            .iter()
            .enumerate()
            .map(|(i, &start)| {
                let start = (start as usize).min(len);
                let end = self
                    .layer_offsets
                    .get(i + 1)
                    .map_or(len, |&e| (e as usize).clamp(start, len));
                &self.dependencies[start..end]
            })
            .collect()
    }
}

/// Resource ids an area references, split the way the router files them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerDeps {
    /// Ids referenced from each script layer.
    pub layers: Vec<Vec<ResourceId>>,
    /// Ids owned by the area as a whole.
    pub area: Vec<ResourceId>,
}
