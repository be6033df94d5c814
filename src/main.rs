use std::path::PathBuf;
use std::process;
use std::time::Instant;

use clap::Parser;

use spline_terrain::erosion::{ErosionParams, ErosionPreset};
use spline_terrain::export::{export_png, export_preview, write_raw_f32, write_raw_u8};
use spline_terrain::terrain::{build_scene, Scene};
use spline_terrain::Result;

#[derive(Parser, Debug)]
#[command(name = "spline_terrain")]
#[command(about = "Generate heightmaps from elevation curves with a multigrid solver")]
struct Args {
    /// Scene file (JSON with `params` and `splines`); a demo scene is used when omitted
    #[arg(short = 'i', long)]
    scene: Option<PathBuf>,

    /// Output path prefix; writes <prefix>.raw, <prefix>.r8, <prefix>.png and <prefix>_preview.png
    #[arg(short, long, default_value = "terrain")]
    output: String,

    /// Override the output resolution exponent (grid is 2^n + 1)
    #[arg(short, long)]
    resolution_exp: Option<u32>,

    /// Enable erosion with a preset (none, gentle, normal)
    #[arg(short, long)]
    erosion: Option<ErosionPreset>,

    /// Override the scene seed
    #[arg(short, long)]
    seed: Option<u64>,

    /// Write the scene actually used next to the outputs
    #[arg(long)]
    save_scene: bool,
}

fn main() {
    let args = Args::parse();
    if let Err(err) = run(args) {
        eprintln!("error: {}", err);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let mut scene = match &args.scene {
        Some(path) => {
            println!("Loading scene {}", path.display());
            Scene::load(path)?
        }
        None => {
            println!("No scene given, using the demo scene");
            Scene::demo(0)?
        }
    };

    if let Some(seed) = args.seed {
        scene.seed = seed;
    }
    if let Some(exp) = args.resolution_exp {
        scene.params.resolution_exp = exp;
    }
    if let Some(preset) = args.erosion {
        scene.params.erosion_enabled = preset.enabled();
        scene.params.erosion = ErosionParams::from_preset(preset);
        println!("Erosion: {} ({})", preset, preset.description());
    }
    scene.params.validate()?;

    let width = scene.params.resolution();
    println!("Seed: {}", scene.seed);
    println!("Grid: {}x{} over {} world units", width, width, scene.params.terrain_size());
    println!("Curves: {}", scene.splines.len());

    let start = Instant::now();
    let output = build_scene(&scene)?;
    println!("Solved in {:.2?}", start.elapsed());
    println!("  Levels: {:?}", output.report.visited_widths);
    if let Some(stats) = &output.report.erosion {
        println!("  Erosion: {}", stats);
    }

    let (lo, hi) = output.height.min_max();
    println!(
        "  Height range: {:.2} to {:.2} world units",
        lo * output.max_height,
        hi * output.max_height
    );

    let raw = format!("{}.raw", args.output);
    write_raw_f32(&output.height, &raw)?;
    println!("Wrote {}", raw);

    let r8 = format!("{}.r8", args.output);
    write_raw_u8(&output.height, &r8)?;
    println!("Wrote {}", r8);

    let png = format!("{}.png", args.output);
    export_png(&output.height, &png)?;
    println!("Wrote {}", png);

    let preview = format!("{}_preview.png", args.output);
    export_preview(&output.height, &preview)?;
    println!("Wrote {}", preview);

    if args.save_scene {
        let path = format!("{}.json", args.output);
        std::fs::write(&path, scene.to_json()?)?;
        println!("Wrote {}", path);
    }

    Ok(())
}
