//! tabplus CLI - anti-warping tabs and brim post-processing
//!
//! Generates tab solids, places tabs along a footprint and rewrites the
//! brim of sliced G-code.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tabplus_gcode::{rewrite_text, BrimMode, CompressSettings, DuplicateSettings};
use tabplus_math::{Point2, Point3};
use tabplus_mesh::{write_stl, TriangleMesh};
use tabplus_place::{Footprint, MemoryProfile, PlacementEngine, Scene, SceneNode, TabConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::FileConfig;

#[derive(Parser)]
#[command(name = "tabplus")]
#[command(about = "Anti-warping tabs and brim post-processing", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// TOML file with [tab], [profile] and [brim] tables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a tab solid and write it as binary STL
    Tab {
        /// Tab diameter (mm)
        #[arg(long)]
        diameter: Option<f64>,
        /// Generate a capsule instead of a plain cylinder
        #[arg(long)]
        capsule: bool,
        /// Height of the picked point above the bed (mm)
        #[arg(long, default_value_t = 0.0)]
        height: f64,
        /// Layer-count multiplier
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        layer_count: Option<u32>,
        /// Output STL file
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Place tabs along a footprint and print their positions as JSON
    Place {
        /// JSON array of [x, y] bed coordinates
        #[arg(long)]
        footprint: PathBuf,
    },
    /// Rewrite the brim of a G-code file
    Brim {
        #[command(subcommand)]
        mode: BrimCommand,
    },
}

#[derive(Subcommand)]
enum BrimCommand {
    /// Replay the first-layer brim on the next layers
    Duplicate {
        /// Number of layers that receive the brim again
        #[arg(long)]
        layers: Option<u32>,
        /// Input G-code
        input: PathBuf,
        /// Output G-code
        output: PathBuf,
    },
    /// Print the first-layer brim lower with reduced flow
    Compress {
        /// Brim height (mm)
        #[arg(long)]
        reduce: Option<f64>,
        /// First layer height of the print (mm)
        #[arg(long)]
        layer_height_0: Option<f64>,
        /// 1-based extruder whose skirt is compressed
        #[arg(long)]
        extruder: Option<u32>,
        /// Show progress messages on the printer display
        #[arg(long)]
        lcd: bool,
        /// Input G-code
        input: PathBuf,
        /// Output G-code
        output: PathBuf,
    },
}

#[derive(Serialize)]
struct PlacementOutput {
    tabs: Vec<[f64; 3]>,
    notices: Vec<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let file = FileConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Tab {
            diameter,
            capsule,
            height,
            layer_count,
            output,
        } => {
            let mut tab = file.tab.clone();
            if let Some(d) = diameter {
                tab.diameter = d;
            }
            if capsule {
                tab.capsule = true;
            }
            if let Some(n) = layer_count {
                tab.layer_count = n;
            }
            export_tab(&file, tab, height, &output)?;
        }
        Commands::Place { footprint } => {
            place(&file, &footprint)?;
        }
        Commands::Brim { mode } => {
            let (mode, input, output) = brim_mode(&file, mode);
            rewrite_file(&mode, &input, &output)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn export_tab(file: &FileConfig, tab: TabConfig, height: f64, output: &Path) -> Result<()> {
    let profile = MemoryProfile::new(&file.profile);
    let engine = PlacementEngine::new(tab);
    let mesh = engine.tab_solid(&profile, height)?.build()?;
    write_stl(&mesh, output).with_context(|| format!("writing {}", output.display()))?;
    info!(
        triangles = mesh.num_triangles(),
        path = %output.display(),
        "Exported tab"
    );
    Ok(())
}

fn place(file: &FileConfig, footprint: &Path) -> Result<()> {
    let json = fs::read_to_string(footprint)
        .with_context(|| format!("reading {}", footprint.display()))?;
    let points: Vec<[f64; 2]> =
        serde_json::from_str(&json).with_context(|| format!("parsing {}", footprint.display()))?;
    let hull = Footprint::new(points.iter().map(|p| Point2::new(p[0], p[1])).collect());

    let out = place_tabs(file, hull)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn place_tabs(file: &FileConfig, hull: Footprint) -> Result<PlacementOutput> {
    let mut scene = Scene::new();
    let model = scene.add(SceneNode::model("footprint", TriangleMesh::new(), hull));
    let mut profile = MemoryProfile::new(&file.profile);
    let mut engine = PlacementEngine::new(file.tab.clone());
    engine.place_auto(&mut scene, &mut profile)?;
    // No renderer listens here; drop the notifications.
    let events = scene.drain_events();
    debug!(events = events.len(), "Drained scene events");

    let tabs = scene
        .get(model)
        .map(|m| m.children().to_vec())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|id| scene.get(id))
        .map(|n| position_array(&n.position))
        .collect();
    Ok(PlacementOutput {
        tabs,
        notices: engine.take_notices().iter().map(ToString::to_string).collect(),
    })
}

fn position_array(p: &Point3) -> [f64; 3] {
    [p.x, p.y, p.z]
}

fn brim_mode(file: &FileConfig, command: BrimCommand) -> (BrimMode, PathBuf, PathBuf) {
    let brim = &file.brim;
    match command {
        BrimCommand::Duplicate {
            layers,
            input,
            output,
        } => {
            let mut settings = DuplicateSettings::default();
            if let Some(n) = layers.or(brim.layers) {
                settings.layers = n;
            }
            (BrimMode::Duplicate(settings), input, output)
        }
        BrimCommand::Compress {
            reduce,
            layer_height_0,
            extruder,
            lcd,
            input,
            output,
        } => {
            let mut settings = CompressSettings {
                layer_height_0: layer_height_0.unwrap_or(file.profile.layer_height_0),
                lcd_feedback: lcd || brim.lcd_feedback.unwrap_or(false),
                ..Default::default()
            };
            if let Some(r) = reduce.or(brim.reduce) {
                settings.reduce = r;
            }
            if let Some(e) = extruder.or(brim.extruder) {
                settings.extruder = e;
            }
            (BrimMode::Compress(settings), input, output)
        }
    }
}

fn rewrite_file(mode: &BrimMode, input: &Path, output: &Path) -> Result<()> {
    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let (rewritten, report) = rewrite_text(&text, mode)
        .with_context(|| format!("rewriting {}", input.display()))?;
    fs::write(output, rewritten).with_context(|| format!("writing {}", output.display()))?;
    info!(
        replays = report.replays,
        sections = report.sections_compressed,
        blocks = report.blocks_changed,
        path = %output.display(),
        "Brim rewrite complete"
    );
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
