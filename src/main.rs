//! Chozo CLI - Command-line tool for Metroid Prime archive extraction.
//!
//! This is the main entry point for the chozo command-line application.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use chozo::mrea::SceneCommand;
use chozo::prelude::*;

/// Chozo - Metroid Prime PAK extraction, routing and re-cooking tool
#[derive(Parser)]
#[command(name = "chozo")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List contents of a PAK archive
    PakList {
        /// Path to the PAK file
        #[arg(short, long)]
        pak: PathBuf,

        /// Game generation (mp1, mp2, mp3)
        #[arg(short, long, default_value = "mp1")]
        generation: Generation,

        /// Filter pattern on entry names (glob-style)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,
    },

    /// Route and extract every archive of a release
    Extract {
        /// Directory holding the release's PAK files
        #[arg(short = 'i', long, env = "CHOZO_GAME_DIR")]
        game_dir: PathBuf,

        /// Working (editable) output root
        #[arg(short, long, env = "CHOZO_WORKING_DIR")]
        working: PathBuf,

        /// Cooked (binary) output root
        #[arg(short, long, env = "CHOZO_COOKED_DIR")]
        cooked: PathBuf,

        /// Game generation (mp1, mp2, mp3)
        #[arg(short, long, default_value = "mp1")]
        generation: Generation,

        /// Rewrite outputs that already exist
        #[arg(short, long)]
        force: bool,

        /// Worker threads
        #[arg(short, long)]
        threads: Option<usize>,
    },

    /// Print the structure of an area
    AreaInfo {
        /// Raw MREA file, or a PAK file when --id is given
        #[arg(short, long)]
        input: PathBuf,

        /// Area id inside the PAK (hex)
        #[arg(long)]
        id: Option<String>,

        /// Game generation (mp1, mp2, mp3)
        #[arg(short, long, default_value = "mp1")]
        generation: Generation,
    },

    /// Cook an extracted area scene back into an MREA
    CookArea {
        /// Scene file written by extract
        #[arg(short, long)]
        scene: PathBuf,

        /// Output MREA file
        #[arg(short, long)]
        output: PathBuf,

        /// Game generation (mp1, mp2, mp3)
        #[arg(short, long, default_value = "mp1")]
        generation: Generation,

        /// Store sections without block compression
        #[arg(long)]
        no_compress: bool,
    },

    /// Build a PAK from a directory of cooked `<name>_<id>.<type>` files
    PakBuild {
        /// Directory of cooked files
        #[arg(short, long, env = "CHOZO_COOKED_DIR")]
        input: PathBuf,

        /// Output PAK file
        #[arg(short, long)]
        output: PathBuf,

        /// Game generation (mp1, mp2, mp3)
        #[arg(short, long, default_value = "mp1")]
        generation: Generation,

        /// Compress unnamed entries
        #[arg(short, long)]
        compress: bool,
    },
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::PakList {
            pak,
            generation,
            filter,
            detailed,
        } => cmd_pak_list(&pak, generation, filter.as_deref(), detailed),
        Commands::Extract {
            game_dir,
            working,
            cooked,
            generation,
            force,
            threads,
        } => cmd_extract(
            &game_dir,
            RouterPaths::new(working, cooked),
            ExtractOptions {
                force,
                generation,
                threads,
            },
        ),
        Commands::AreaInfo { input, id, generation } => cmd_area_info(&input, id.as_deref(), generation),
        Commands::CookArea {
            scene,
            output,
            generation,
            no_compress,
        } => cmd_cook_area(&scene, &output, generation, no_compress),
        Commands::PakBuild {
            input,
            output,
            generation,
            compress,
        } => cmd_pak_build(&input, &output, generation, compress),
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

fn bar_style() -> Result<ProgressStyle> {
    Ok(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
        .progress_chars("#>-"))
}

fn cmd_pak_list(pak: &Path, generation: Generation, filter: Option<&str>, detailed: bool) -> Result<()> {
    let archive = PakArchive::open(pak, generation).context("Failed to open PAK archive")?;
    let pattern = filter
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid filter pattern")?;
    let options = glob::MatchOptions {
        case_sensitive: false,
        ..glob::MatchOptions::new()
    };

    let mut count = 0;
    for entry in archive.entries() {
        let name = entry.best_name();
        if let Some(pattern) = &pattern {
            if !pattern.matches_with(&name, options) {
                continue;
            }
        }

        if detailed {
            println!(
                "{} {} {:>10} {:#010x} {} {}",
                entry.kind(),
                entry.id(),
                entry.size(),
                entry.offset(),
                if entry.is_compressed() { "C" } else { " " },
                name
            );
        } else {
            println!("{}", name);
        }
        count += 1;
    }

    println!("\nTotal: {} entries{}", count, if archive.is_no_share() { " (no-share)" } else { "" });

    Ok(())
}

fn cmd_extract(game_dir: &Path, paths: RouterPaths, options: ExtractOptions) -> Result<()> {
    let start = Instant::now();
    let archives = discover_archives(game_dir, options.generation).context("Failed to open archives")?;
    let total_entries: usize = archives.iter().map(PakArchive::entry_count).sum();
    info!(archives = archives.len(), entries = total_entries, "opened release");

    let pb = ProgressBar::new(100);
    pb.set_style(bar_style()?);
    pb.set_message("indexing levels");
    let router = PakRouter::build(archives, paths, |p| pb.set_position((p * 100.0) as u64))
        .context("Failed to build resource router")?;
    pb.finish_and_clear();
    info!("Routed release in {:?}", start.elapsed());

    let pb = ProgressBar::new(total_entries as u64);
    pb.set_style(bar_style()?);

    let (tx, rx) = crossbeam_channel::unbounded();
    let router = &router;
    let stats = std::thread::scope(|s| {
        let worker = s.spawn(move || extract_all(router, &options, Some(&tx)));
        for event in rx.iter() {
            match event {
                ExtractEvent::ArchiveStarted { archive, .. } => pb.set_message(archive),
                ExtractEvent::EntryFinished { .. } => pb.inc(1),
                ExtractEvent::ArchiveFinished { archive } => pb.println(format!("finished {}", archive)),
            }
        }
        worker
            .join()
            .map_err(|_| anyhow!("extraction worker panicked"))
    })??;

    pb.finish_with_message("Done");
    println!(
        "Extracted {} resources in {:?} ({} skipped, {} held by other workers)",
        stats.extracted,
        start.elapsed(),
        stats.skipped,
        stats.locked
    );

    Ok(())
}

fn cmd_area_info(input: &Path, id: Option<&str>, generation: Generation) -> Result<()> {
    let data = match id {
        Some(id) => {
            let archive = PakArchive::open(input, generation).context("Failed to open PAK archive")?;
            let id = ResourceId::parse_hex(id, generation.id_width()).context("Invalid area id")?;
            archive.read_id(id).context("Failed to read area")?
        }
        None => fs::read(input).context("Failed to read area file")?,
    };

    let header = read_header(&data).context("Failed to read area header")?;
    println!("Generation:     {}", header.generation);
    println!("Sections:       {}", header.sec_sizes.len());
    println!("Blocks:         {}", header.block_count);
    println!("Payload bytes:  {}", data.len());

    let mut commands: Vec<SceneCommand> = Vec::new();
    let area = decode_area(data, &DecodeContext::new("area"), &mut commands).context("Failed to decode area")?;
    println!("Textures:       {}", area.materials.textures.len());
    println!("Materials:      {}", area.materials.materials.len());
    println!("Meshes:         {}", area.mesh_count);
    println!("Script layers:  {}", area.layers.len());
    for (i, layer) in area.layers.iter().enumerate() {
        println!("  {:02}: {} objects", i, layer.objects.len());
    }
    if let Some(generated) = &area.generated {
        println!("Generated:      {} objects", generated.objects.len());
    }
    println!("Collision:      {}", if area.collision.is_some() { "yes" } else { "no" });
    println!("Lights:         {}", area.lights.total());
    println!("VISI:           {}", if area.visi.is_some() { "yes" } else { "no" });
    if let Some(path) = area.path_id {
        println!("Path graph:     {}", path);
    }
    if let Some(egmc) = area.egmc_id {
        println!("EGMC:           {}", egmc);
    }
    println!("Scene commands: {}", commands.len());

    Ok(())
}

fn cmd_cook_area(scene: &Path, output: &Path, generation: Generation, no_compress: bool) -> Result<()> {
    let mut options = CookOptions::new(generation);
    if no_compress {
        options.compress_blocks = false;
    }

    let start = Instant::now();
    let bytes = cook_area(scene, &options).context("Failed to cook area")?;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output, &bytes).context("Failed to write output file")?;

    println!("Cooked {} bytes in {:?}", bytes.len(), start.elapsed());

    Ok(())
}

/// Split `<name>_<id>.<type>` into its parts.
fn parse_cooked_name(path: &Path, generation: Generation) -> Option<(Option<String>, ResourceId, FourCC)> {
    let ext = path.extension()?.to_str()?.to_ascii_uppercase();
    let kind: [u8; 4] = ext.as_bytes().try_into().ok()?;
    let stem = path.file_stem()?.to_str()?;
    let (name, hex) = stem.rsplit_once('_')?;
    if hex.len() != generation.id_width().bytes() * 2 {
        return None;
    }
    let id = ResourceId::parse_hex(hex, generation.id_width()).ok()?;
    let name = (name != ext).then(|| name.to_string());
    Some((name, id, FourCC(kind)))
}

fn cmd_pak_build(input: &Path, output: &Path, generation: Generation, compress: bool) -> Result<()> {
    let mut files: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(bar_style()?);

    let mut builder = PakBuilder::new(generation);
    for path in &files {
        pb.inc(1);
        let Some((name, id, kind)) = parse_cooked_name(path, generation) else {
            warn!(path = %path.display(), "skipping file without a <name>_<id>.<type> name");
            continue;
        };
        let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        match name {
            Some(name) => builder.add_named(id, kind, name, data),
            None if compress => builder.add_compressed(id, kind, data),
            None => builder.add(id, kind, data),
        };
    }
    pb.finish_and_clear();

    builder.write_to(output).context("Failed to write PAK archive")?;
    println!("Wrote {} entries to {}", builder.len(), output.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cooked_name() {
        let (name, id, kind) =
            parse_cooked_name(Path::new("/c/Shared/Door_0000ABCD.txtr"), Generation::Mp1).unwrap();
        assert_eq!(name.as_deref(), Some("Door"));
        assert_eq!(id, ResourceId::new32(0xABCD));
        assert_eq!(kind, FourCC::new(b"TXTR"));

        let (name, _, _) = parse_cooked_name(Path::new("TXTR_00000001.txtr"), Generation::Mp1).unwrap();
        assert!(name.is_none());

        assert!(parse_cooked_name(Path::new("MREA_00000001.decomp"), Generation::Mp1).is_none());
        assert!(parse_cooked_name(Path::new("TXTR_00000001.txtr"), Generation::Mp3).is_none());
        assert!(parse_cooked_name(Path::new("readme.txt"), Generation::Mp1).is_none());
    }

    #[test]
    fn test_cli_parses_extract_env() {
        std::env::set_var("CHOZO_GAME_DIR", "/game");
        let cli = Cli::try_parse_from(["chozo", "extract", "-w", "/w", "-c", "/c", "-g", "mp2"]).unwrap();
        match cli.command {
            Commands::Extract {
                game_dir, generation, ..
            } => {
                assert_eq!(game_dir, PathBuf::from("/game"));
                assert_eq!(generation, Generation::Mp2);
            }
            _ => panic!("expected extract"),
        }
    }
}
