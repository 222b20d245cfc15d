//! Scene-bridge output.
//!
//! Decoding an area produces a stream of [`SceneCommand`]s for an external
//! scene tool. [`JsonSceneSink`] records them into one scene file per area;
//! cook reads the same file back through [`AreaScene`].
//!
//! Object names are derived from the area name plus mesh, light or
//! material indices, so re-extracting an area yields identical names.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use chozo_common::math::Transform;
use chozo_common::ResourceId;

use crate::collision::CollisionMesh;
use crate::deps::AreaDependencies;
use crate::lights::Light;
use crate::material::{Material, MaterialSet};
use crate::mesh::Mesh;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum SceneCommand {
    SetSceneName {
        name: String,
    },
    /// Row-major 3x4 area-to-world transform, Z up.
    SetAreaTransform {
        transform: Transform,
    },
    RegisterTextures {
        textures: Vec<ResourceId>,
    },
    RegisterMaterial {
        index: u32,
        name: String,
        material: Material,
    },
    CreateMesh {
        index: u32,
        name: String,
        mesh: Mesh,
    },
    ParentObject {
        child: String,
        parent: String,
    },
    CreateCollision {
        name: String,
        collision: CollisionMesh,
    },
    CreateLight {
        name: String,
        layer: u32,
        light: Light,
    },
    /// Resources the area names by id: its path graph, the Mp2/Mp3 EGMC
    /// and the Mp3 dependency table.
    SetReferences {
        path: Option<ResourceId>,
        egmc: Option<ResourceId>,
        dependencies: Option<AreaDependencies>,
    },
    /// Link the level's background scene.
    LinkWorld {
        path: String,
    },
}

/// Receiver of scene-construction commands.
pub trait SceneSink {
    fn emit(&mut self, command: SceneCommand) -> Result<()>;
}

impl SceneSink for Vec<SceneCommand> {
    fn emit(&mut self, command: SceneCommand) -> Result<()> {
        self.push(command);
        Ok(())
    }
}

/// Everything recorded for one area.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AreaScene {
    pub commands: Vec<SceneCommand>,
}

impl AreaScene {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn name(&self) -> Option<&str> {
        self.commands.iter().find_map(|c| match c {
            SceneCommand::SetSceneName { name } => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn transform(&self) -> Transform {
        self.commands
            .iter()
            .find_map(|c| match c {
                SceneCommand::SetAreaTransform { transform } => Some(*transform),
                _ => None,
            })
            .unwrap_or_default()
    }

    /// Rebuild the material set from the texture and material commands.
    pub fn material_set(&self) -> Result<MaterialSet> {
        let mut set = MaterialSet::default();
        for c in &self.commands {
            match c {
                SceneCommand::RegisterTextures { textures } => set.textures = textures.clone(),
                SceneCommand::RegisterMaterial { index, material, .. } => {
                    if *index as usize != set.materials.len() {
                        return Err(Error::Scene(format!(
                            "material {} registered out of order",
                            index
                        )));
                    }
                    set.materials.push(material.clone());
                }
                _ => {}
            }
        }
        Ok(set)
    }

    /// Meshes in index order.
    pub fn meshes(&self) -> Result<Vec<&Mesh>> {
        let mut meshes = Vec::new();
        for c in &self.commands {
            if let SceneCommand::CreateMesh { index, mesh, .. } = c {
                if *index as usize != meshes.len() {
                    return Err(Error::Scene(format!("mesh {} created out of order", index)));
                }
                meshes.push(mesh);
            }
        }
        Ok(meshes)
    }

    pub fn collision(&self) -> Option<&CollisionMesh> {
        self.commands.iter().find_map(|c| match c {
            SceneCommand::CreateCollision { collision, .. } => Some(collision),
            _ => None,
        })
    }

    /// Lights grouped by layer (0 and 1).
    pub fn lights(&self) -> Result<[Vec<Light>; 2]> {
        let mut layers: [Vec<Light>; 2] = Default::default();
        for c in &self.commands {
            if let SceneCommand::CreateLight { layer, light, name } = c {
                let slot = layers
                    .get_mut(*layer as usize)
                    .ok_or_else(|| Error::Scene(format!("light {} on layer {}", name, layer)))?;
                slot.push(light.clone());
            }
        }
        Ok(layers)
    }

    pub fn path_id(&self) -> Option<ResourceId> {
        self.commands.iter().find_map(|c| match c {
            SceneCommand::SetReferences { path, .. } => *path,
            _ => None,
        })
    }

    pub fn egmc(&self) -> Option<ResourceId> {
        self.commands.iter().find_map(|c| match c {
            SceneCommand::SetReferences { egmc, .. } => *egmc,
            _ => None,
        })
    }

    pub fn dependencies(&self) -> Option<&AreaDependencies> {
        self.commands.iter().find_map(|c| match c {
            SceneCommand::SetReferences { dependencies, .. } => dependencies.as_ref(),
            _ => None,
        })
    }
}

/// Records commands and writes them as one JSON scene file.
pub struct JsonSceneSink {
    path: PathBuf,
    scene: AreaScene,
}

impl JsonSceneSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scene: AreaScene::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the scene file and hand back what was recorded.
    pub fn finish(self) -> Result<AreaScene> {
        self.scene.save(&self.path)?;
        Ok(self.scene)
    }
}

impl SceneSink for JsonSceneSink {
    fn emit(&mut self, command: SceneCommand) -> Result<()> {
        self.scene.commands.push(command);
        Ok(())
    }
}

/// `<dir>/<stem>.<ext>` beside a `<stem>.scene.json` file.
pub fn scene_sidecar(scene_path: &Path, ext: &str) -> PathBuf {
    let file = scene_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = file
        .strip_suffix(".scene.json")
        .or_else(|| file.rsplit_once('.').map(|(s, _)| s))
        .unwrap_or(&file);
    scene_path.with_file_name(format!("{}.{}", stem, ext))
}
