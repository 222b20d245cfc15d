//! Per-archive uniqueness classification.

use std::path::{Path, PathBuf};

use chozo_common::ResourceId;

use crate::level::Level;

/// Narrowest scope referencing a resource within one archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniqueKind {
    /// Not referenced by any level of the archive.
    NotFound,
    /// Referenced from more than one level.
    Pak,
    Level,
    Area,
    Layer,
}

/// Where a resource lives inside its archive's directory.
///
/// Indices point into the archive's level tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueResult {
    pub kind: UniqueKind,
    pub level: Option<usize>,
    pub area: Option<usize>,
    pub layer: Option<usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Hit {
    Level(usize),
    Area(usize, usize),
    Layer(usize, usize, usize),
}

impl Hit {
    fn level(self) -> usize {
        match self {
            Hit::Level(l) | Hit::Area(l, _) | Hit::Layer(l, _, _) => l,
        }
    }

    fn area(self) -> Option<(usize, usize)> {
        match self {
            Hit::Level(_) => None,
            Hit::Area(l, a) | Hit::Layer(l, a, _) => Some((l, a)),
        }
    }
}

impl UniqueResult {
    pub const NOT_FOUND: UniqueResult = UniqueResult {
        kind: UniqueKind::NotFound,
        level: None,
        area: None,
        layer: None,
    };

    const PAK: UniqueResult = UniqueResult {
        kind: UniqueKind::Pak,
        level: None,
        area: None,
        layer: None,
    };

    fn level(level: usize) -> Self {
        Self {
            kind: UniqueKind::Level,
            level: Some(level),
            area: None,
            layer: None,
        }
    }

    /// Classify `id` against an archive's levels.
    ///
    /// A level's own MLVL is scoped to that level. Otherwise every layer,
    /// area and level set holding the id is collected and the narrowest
    /// scope covering all of them wins.
    pub fn classify(levels: &[Level], id: ResourceId) -> Self {
        let mut hits = Vec::new();
        for (li, level) in levels.iter().enumerate() {
            if level.mlvl_id == id {
                return Self::level(li);
            }
            if level.resources.contains(&id) {
                hits.push(Hit::Level(li));
            }
            for (ai, area) in level.areas.iter().enumerate() {
                for (yi, layer) in area.layers.iter().enumerate() {
                    if layer.resources.contains(&id) {
                        hits.push(Hit::Layer(li, ai, yi));
                    }
                }
                if area.resources.contains(&id) {
                    hits.push(Hit::Area(li, ai));
                }
            }
        }

        let Some(&first) = hits.first() else {
            return Self::NOT_FOUND;
        };
        if hits.len() == 1 {
            if let Hit::Layer(l, a, y) = first {
                return Self {
                    kind: UniqueKind::Layer,
                    level: Some(l),
                    area: Some(a),
                    layer: Some(y),
                };
            }
        }
        if let Some((l, a)) = first.area() {
            if hits.iter().all(|h| h.area() == Some((l, a))) {
                return Self {
                    kind: UniqueKind::Area,
                    level: Some(l),
                    area: Some(a),
                    layer: None,
                };
            }
        }
        if hits.iter().all(|h| h.level() == first.level()) {
            return Self::level(first.level());
        }
        Self::PAK
    }

    /// Directory under `pak_dir` this result maps to.
    pub fn unique_dir(&self, pak_dir: &Path, levels: &[Level]) -> PathBuf {
        let mut dir = pak_dir.to_path_buf();
        let Some(level) = self.level.and_then(|l| levels.get(l)) else {
            return dir;
        };
        dir.push(&level.name);
        let Some(area) = self.area.and_then(|a| level.areas.get(a)) else {
            return dir;
        };
        dir.push(&area.name);
        if let Some(layer) = self.layer.and_then(|y| area.layers.get(y)) {
            dir.push(&layer.dir_name);
        }
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{Area, Layer};
    use chozo_common::math::Transform;
    use rustc_hash::FxHashSet;

    fn id(v: u32) -> ResourceId {
        ResourceId::new32(v)
    }

    fn set(ids: &[u32]) -> FxHashSet<ResourceId> {
        ids.iter().map(|&v| id(v)).collect()
    }

    fn area(mrea: u32, name: &str, layers: &[&[u32]], own: &[u32]) -> Area {
        Area {
            mrea_id: id(mrea),
            name_id: ResourceId::invalid(chozo_common::IdWidth::Bits32),
            name: name.to_string(),
            transform: Transform::identity(),
            path_id: None,
            layers: layers
                .iter()
                .enumerate()
                .map(|(i, ids)| Layer {
                    name: format!("L{}", i),
                    dir_name: format!("{:02} L{}", i, i),
                    active: true,
                    resources: set(ids),
                })
                .collect(),
            resources: set(own),
        }
    }

    fn levels() -> Vec<Level> {
        vec![
            Level {
                mlvl_id: id(0x50),
                name: "World_00000050".to_string(),
                world_name_id: id(0),
                world_name: None,
                mapas: Vec::new(),
                areas: vec![
                    area(0x1000, "00 Hall", &[&[1, 2], &[2, 3]], &[4, 0x1000]),
                    area(0x2000, "01 Tower", &[&[5]], &[4, 6, 0x2000]),
                ],
                resources: set(&[9]),
            },
            Level {
                mlvl_id: id(0x60),
                name: "Other_00000060".to_string(),
                world_name_id: id(0),
                world_name: None,
                mapas: Vec::new(),
                areas: vec![area(0x3000, "00 Pit", &[&[6]], &[0x3000])],
                resources: FxHashSet::default(),
            },
        ]
    }

    #[test]
    fn test_narrowest_scope() {
        let levels = levels();
        let c = |v| UniqueResult::classify(&levels, id(v));

        let one_layer = c(1);
        assert_eq!(one_layer.kind, UniqueKind::Layer);
        assert_eq!((one_layer.level, one_layer.area, one_layer.layer), (Some(0), Some(0), Some(0)));

        assert_eq!(c(2).kind, UniqueKind::Area);
        assert_eq!(c(0x1000).kind, UniqueKind::Area);
        assert_eq!(c(4).kind, UniqueKind::Level);
        assert_eq!(c(9).kind, UniqueKind::Level);
        assert_eq!(c(0x60), UniqueResult::level(1));
        assert_eq!(c(6).kind, UniqueKind::Pak);
        assert_eq!(c(0x7777), UniqueResult::NOT_FOUND);
    }

    #[test]
    fn test_unique_dirs() {
        let levels = levels();
        let pak = Path::new("/w/Metroid2");
        let dir = |v| UniqueResult::classify(&levels, id(v)).unique_dir(pak, &levels);

        assert_eq!(dir(1), PathBuf::from("/w/Metroid2/World_00000050/00 Hall/00 L0"));
        assert_eq!(dir(5), PathBuf::from("/w/Metroid2/World_00000050/01 Tower/00 L0"));
        assert_eq!(dir(3), PathBuf::from("/w/Metroid2/World_00000050/00 Hall/01 L1"));
        assert_eq!(dir(2), PathBuf::from("/w/Metroid2/World_00000050/00 Hall"));
        assert_eq!(dir(4), PathBuf::from("/w/Metroid2/World_00000050"));
        assert_eq!(dir(6), PathBuf::from("/w/Metroid2"));
        assert_eq!(dir(0x7777), PathBuf::from("/w/Metroid2"));
    }
}
