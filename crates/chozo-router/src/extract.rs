//! Parallel extraction driver.
//!
//! Each archive is extracted by one rayon task holding its own
//! [`RouterScope`]. Output paths are claimed through [`ResourceLocks`] so
//! two archives carrying the same shared resource never write it at once;
//! the loser skips it.

use std::fs;
use std::path::{Path, PathBuf};

use chozo_common::{FourCC, Generation, ResourceId};
use chozo_mrea::{extract_area, AreaLayout};
use chozo_pak::{PakArchive, PakEntry, Strg};
use crossbeam_channel::Sender;
use glob::MatchOptions;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::locks::ResourceLocks;
use crate::router::{PakRouter, RouterScope};
use crate::{Error, Result};

const MREA: FourCC = FourCC::new(b"MREA");
const STRG: FourCC = FourCC::new(b"STRG");

/// Extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Rewrite outputs that already exist.
    pub force: bool,
    pub generation: Generation,
    /// Worker count; rayon's default when `None`.
    pub threads: Option<usize>,
}

impl ExtractOptions {
    pub fn new(generation: Generation) -> Self {
        Self {
            force: false,
            generation,
            threads: None,
        }
    }
}

/// Result of extracting one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    Extracted,
    /// Output already present.
    Skipped,
    /// Another worker is writing the same output.
    Locked,
}

/// Progress reported while extracting.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractEvent {
    ArchiveStarted {
        archive: String,
        entries: usize,
    },
    EntryFinished {
        archive: String,
        id: ResourceId,
        kind: FourCC,
        outcome: ExtractOutcome,
    },
    ArchiveFinished {
        archive: String,
    },
}

/// Counts per outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub extracted: usize,
    pub skipped: usize,
    pub locked: usize,
}

impl ExtractStats {
    fn record(&mut self, outcome: ExtractOutcome) {
        match outcome {
            ExtractOutcome::Extracted => self.extracted += 1,
            ExtractOutcome::Skipped => self.skipped += 1,
            ExtractOutcome::Locked => self.locked += 1,
        }
    }

    fn merge(mut self, other: ExtractStats) -> ExtractStats {
        self.extracted += other.extracted;
        self.skipped += other.skipped;
        self.locked += other.locked;
        self
    }

    pub fn total(&self) -> usize {
        self.extracted + self.skipped + self.locked
    }
}

/// Open every `*.pak` in `game_dir`, sorted by file name.
pub fn discover_archives(game_dir: &Path, generation: Generation) -> Result<Vec<PakArchive>> {
    let pattern = format!("{}/*.pak", glob::Pattern::escape(&game_dir.to_string_lossy()));
    let options = MatchOptions {
        case_sensitive: false,
        ..MatchOptions::new()
    };
    let mut paths: Vec<PathBuf> = glob::glob_with(&pattern, options)?
        .filter_map(|p| p.ok())
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(Error::NoArchives(game_dir.to_path_buf()));
    }
    paths
        .iter()
        .map(|p| PakArchive::open(p, generation).map_err(Error::from))
        .collect()
}

/// Extract every archive the router holds.
pub fn extract_all(
    router: &PakRouter,
    options: &ExtractOptions,
    events: Option<&Sender<ExtractEvent>>,
) -> Result<ExtractStats> {
    if router.archive_count() > 0 && router.generation() != options.generation {
        return Err(Error::GenerationMismatch {
            archive: router.archive(0).map(|a| a.name().to_string()).unwrap_or_default(),
            expected: options.generation,
            actual: router.generation(),
        });
    }

    let locks = ResourceLocks::new();
    let run = || {
        (0..router.archive_count())
            .into_par_iter()
            .map(|index| extract_archive(router, index, &locks, options, events))
            .try_reduce(ExtractStats::default, |a, b| Ok(a.merge(b)))
    };
    let stats = match options.threads {
        Some(threads) => rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()?
            .install(run)?,
        None => run()?,
    };

    info!(
        extracted = stats.extracted,
        skipped = stats.skipped,
        locked = stats.locked,
        "extraction finished"
    );
    Ok(stats)
}

fn send(events: Option<&Sender<ExtractEvent>>, event: ExtractEvent) {
    if let Some(tx) = events {
        tx.send(event).ok();
    }
}

fn extract_archive(
    router: &PakRouter,
    index: usize,
    locks: &ResourceLocks,
    options: &ExtractOptions,
    events: Option<&Sender<ExtractEvent>>,
) -> Result<ExtractStats> {
    let (Some(scope), Some(archive)) = (router.enter_archive(index), router.archive(index)) else {
        return Ok(ExtractStats::default());
    };
    let name = archive.name().to_string();
    info!(archive = %name, levels = %router.level_string(index), "extracting archive");
    send(
        events,
        ExtractEvent::ArchiveStarted {
            archive: name.clone(),
            entries: archive.entry_count(),
        },
    );

    let mut stats = ExtractStats::default();
    for entry in archive.entries() {
        let outcome = if entry.kind() == MREA {
            extract_mrea(router, &scope, archive, entry, locks, options)?
        } else {
            extract_resource(router, &scope, archive, entry, locks, options)?
        };
        stats.record(outcome);
        send(
            events,
            ExtractEvent::EntryFinished {
                archive: name.clone(),
                id: entry.id(),
                kind: entry.kind(),
                outcome,
            },
        );
    }

    send(events, ExtractEvent::ArchiveFinished { archive: name });
    Ok(stats)
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

/// Raw payload to the cooked path; name strings and overridden resources
/// also get a working file.
fn extract_resource(
    router: &PakRouter,
    scope: &RouterScope,
    archive: &PakArchive,
    entry: &PakEntry,
    locks: &ResourceLocks,
    options: &ExtractOptions,
) -> Result<ExtractOutcome> {
    let id = entry.id();
    let cooked = router.get_cooked_required(id, Some(scope))?;
    let working = if entry.kind() == STRG {
        Some(router.get_working_required(id, Some(scope))?)
    } else {
        router.override_path(id).map(Path::to_path_buf)
    };

    let Some(_guard) = locks.try_lock(&cooked) else {
        debug!(id = %id, path = %cooked.display(), "output locked by another worker");
        return Ok(ExtractOutcome::Locked);
    };
    let done = cooked.exists() && working.as_ref().map_or(true, |w| w.exists());
    if done && !options.force {
        return Ok(ExtractOutcome::Skipped);
    }

    let data = archive.read_entry(entry)?;
    write_file(&cooked, &data)?;
    if let Some(working) = working {
        if entry.kind() == STRG {
            let strg = Strg::read(&data)?;
            write_file(&working, serde_json::to_string_pretty(&strg)?.as_bytes())?;
        } else {
            write_file(&working, &data)?;
        }
    }
    Ok(ExtractOutcome::Extracted)
}

fn extract_mrea(
    router: &PakRouter,
    scope: &RouterScope,
    archive: &PakArchive,
    entry: &PakEntry,
    locks: &ResourceLocks,
    options: &ExtractOptions,
) -> Result<ExtractOutcome> {
    let id = entry.id();
    let scene_path = router.get_working_required(id, Some(scope))?;
    let cooked = router.get_cooked_required(id, Some(scope))?;

    let Some(_guard) = locks.try_lock(&scene_path) else {
        debug!(id = %id, path = %scene_path.display(), "area locked by another worker");
        return Ok(ExtractOutcome::Locked);
    };
    if scene_path.exists() && !options.force {
        return Ok(ExtractOutcome::Skipped);
    }

    let file_name = scene_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut layout = AreaLayout {
        area_dir: scene_path.parent().map(Path::to_path_buf).unwrap_or_default(),
        area_name: file_name
            .strip_suffix(".scene.json")
            .map_or_else(|| entry.best_name(), str::to_string),
        ..AreaLayout::default()
    };
    if let Some((_, level, area)) = router.find_area(id, Some(scope)) {
        layout.layers = area.layers.iter().map(|l| (l.name.clone(), l.active)).collect();
        layout.world_link = router
            .get_working(level.mlvl_id, Some(scope), true)
            .map(|p| p.display().to_string());
    }
    if router.generation().has_block_compression() {
        layout.decomp_path = Some(cooked.with_extension("decomp"));
    }
    if router.mrea_has_dupe_resources(id, Some(scope)) {
        debug!(id = %id, "area follows duplicated resources");
    }

    let output = extract_area(archive.read_entry(entry)?, &layout)?;
    for (what, reference) in [("path graph", output.area.path_id), ("EGMC", output.area.egmc_id)] {
        if let Some(reference) = reference {
            if router.lookup_entry(reference, Some(scope), true, false).is_none() {
                debug!(area = %id, id = %reference, "{} not in any archive", what);
            }
        }
    }
    Ok(ExtractOutcome::Extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RouterPaths;
    use chozo_mrea::{cook_area, get_path_id, AreaScene, CookOptions, SceneCommand};
    use chozo_pak::{Dependency, Mlvl, MlvlArea, PakBuilder};

    fn id(v: u32) -> ResourceId {
        ResourceId::new32(v)
    }

    fn cooked_area(dir: &Path) -> Vec<u8> {
        let src = dir.join("src").join("area.scene.json");
        AreaScene {
            commands: vec![SceneCommand::SetReferences {
                path: Some(id(0x900)),
                egmc: None,
                dependencies: None,
            }],
        }
        .save(&src)
        .unwrap();
        cook_area(&src, &CookOptions::new(Generation::Mp1)).unwrap()
    }

    fn tallon(dir: &Path) -> PakArchive {
        let mut mlvl = Mlvl::new(Generation::Mp1);
        mlvl.world_name_id = id(0x101);
        let mut area = MlvlArea::new(id(0x103), id(0x1000), id(0));
        area.set_layer_dependencies(&[
            vec![Dependency {
                id: id(0x77),
                kind: FourCC::new(b"TXTR"),
            }],
            vec![],
        ]);
        mlvl.push_area(area, &[("Default", true)]);

        let mut builder = PakBuilder::new(Generation::Mp1);
        builder
            .add_named(id(0x50), FourCC::new(b"MLVL"), "Tallon", mlvl.write())
            .add(id(0x101), STRG, Strg::single("Tallon Overworld").write())
            .add(id(0x103), STRG, Strg::single("Landing Site").write())
            .add(id(0x1000), MREA, cooked_area(dir))
            .add(id(0x900), FourCC::new(b"PATH"), vec![0xAB; 12])
            .add(id(0x77), FourCC::new(b"TXTR"), vec![0xCD; 40]);
        PakArchive::from_bytes("Tallon.pak", builder.build().unwrap(), Generation::Mp1).unwrap()
    }

    #[test]
    fn test_extract_release() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RouterPaths::new(dir.path().join("w"), dir.path().join("c"));
        let router = PakRouter::build(vec![tallon(dir.path())], paths, |_| {}).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let mut options = ExtractOptions::new(Generation::Mp1);
        options.threads = Some(2);
        let stats = extract_all(&router, &options, Some(&tx)).unwrap();
        assert_eq!(stats.extracted, 6);
        assert_eq!(stats.total(), 6);

        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(&events[0], ExtractEvent::ArchiveStarted { entries: 6, .. }));
        assert!(matches!(events.last(), Some(ExtractEvent::ArchiveFinished { .. })));

        let level_dir = dir.path().join("w/Tallon/Tallon_00000050");
        let area_dir = level_dir.join("00 Landing Site");
        let scene = area_dir.join("MREA_00001000.scene.json");
        assert!(scene.exists());
        assert_eq!(fs::read(area_dir.join("!path_00000900.path")).unwrap(), vec![0xAB; 12]);
        let name = fs::read_to_string(level_dir.join("!name_00000101.json")).unwrap();
        assert!(name.contains("Tallon Overworld"));
        assert!(area_dir.join("!name_00000103.json").exists());
        assert_eq!(
            fs::read(dir.path().join("c/Tallon/Tallon_00000050/00 Landing Site/00 Default/TXTR_00000077.txtr"))
                .unwrap(),
            vec![0xCD; 40]
        );
        assert!(dir.path().join("c/Tallon/PATH_00000900.path").exists());

        // The extracted area cooks again and keeps its path graph.
        let recooked = cook_area(&scene, &CookOptions::new(Generation::Mp1)).unwrap();
        assert_eq!(get_path_id(recooked).unwrap(), Some(id(0x900)));

        let again = extract_all(&router, &options, None).unwrap();
        assert_eq!(again.skipped, 6);
        assert_eq!(again.extracted, 0);

        options.force = true;
        let forced = extract_all(&router, &options, None).unwrap();
        assert_eq!(forced.extracted, 6);
    }

    #[test]
    fn test_generation_checked() {
        let dir = tempfile::tempdir().unwrap();
        let paths = RouterPaths::new(dir.path().join("w"), dir.path().join("c"));
        let router = PakRouter::build(vec![tallon(dir.path())], paths, |_| {}).unwrap();
        let err = extract_all(&router, &ExtractOptions::new(Generation::Mp2), None).unwrap_err();
        assert!(matches!(err, Error::GenerationMismatch { .. }));
    }

    #[test]
    fn test_discover_archives() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            discover_archives(dir.path(), Generation::Mp1),
            Err(Error::NoArchives(_))
        ));

        let empty = PakBuilder::new(Generation::Mp1).build().unwrap();
        fs::write(dir.path().join("b.pak"), &empty).unwrap();
        fs::write(dir.path().join("A.PAK"), &empty).unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();
        let archives = discover_archives(dir.path(), Generation::Mp1).unwrap();
        let names: Vec<_> = archives.iter().map(|a| a.name().to_string()).collect();
        assert_eq!(names, vec!["A.PAK", "b.pak"]);
    }
}
