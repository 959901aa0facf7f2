use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use kaleidoscope::{
    arrangement::Arrangement,
    config::{parse_size, parse_triangle, Settings},
    kaleidoscope::Variant,
    pixels::{run_pass, PassStats, PixelBuffers, PointMap},
};

/// Reduces a grid of plane points to the fundamental domain of a
/// reflection group and reports where they landed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON settings file, overridden by the options below
    #[arg(long)]
    settings: Option<PathBuf>,

    /// JSON circle arrangement to map with instead of a triangle
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Dihedral orders of the triangle, like "7 3 2"
    #[arg(long)]
    triangle: Option<String>,

    #[arg(long, value_enum)]
    variant: Option<Variant>,

    /// Grid size, like 640x480
    #[arg(long)]
    size: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::new(),
    };
    if let Some(triangle) = args.triangle {
        parse_triangle(&triangle)?;
        settings.triangle = triangle;
    }
    if let Some(variant) = args.variant {
        settings.variant = variant;
    }
    if let Some(size) = &args.size {
        let (width, height) = parse_size(size)?;
        settings.grid.width = width;
        settings.grid.height = height;
    }
    if args.preset.is_some() {
        settings.preset = args.preset;
    }

    let stats = match &settings.preset {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("failed to read preset {path:?}"))?;
            let mut arrangement = Arrangement::from_json(&json)
                .with_context(|| format!("failed to load preset {path:?}"))?;
            arrangement.max_iterations = settings.max_iterations;
            log::info!(
                "mapping with {} circles bounding {} regions",
                arrangement.circles().count(),
                arrangement.regions().polygons().len()
            );
            render(&arrangement, &settings)
        }
        None => {
            let kaleidoscope = settings
                .kaleidoscope()
                .context("invalid triangle in settings")?;
            log::info!(
                "mapping with triangle {:?} ({:?} variant)",
                settings.triangle()?,
                settings.variant
            );
            render(&kaleidoscope, &settings)
        }
    };
    print!("{stats}");
    Ok(())
}

fn render(map: &impl PointMap, settings: &Settings) -> PassStats {
    let len = settings.grid.width * settings.grid.height;
    let mut x = vec![0.; len];
    let mut y = vec![0.; len];
    let mut structure = vec![0; len];
    let mut scale = vec![1.; len];
    let mut buffers =
        PixelBuffers::new(&mut x, &mut y, &mut structure).with_scale(&mut scale);
    buffers.fill_grid(settings.grid.width, settings.grid.half_extent);
    run_pass(map, &mut buffers)
}
