//! Profiling tool to identify performance bottlenecks

use std::time::{Duration, Instant};

use spline_terrain::erosion::{ErosionParams, HydraulicErosion};
use spline_terrain::multigrid::pass::{ParallelPasses, PassScheduler, SerialPasses};
use spline_terrain::multigrid::MultigridSolver;
use spline_terrain::raster::rasterize_levels;
use spline_terrain::terrain::Scene;
use spline_terrain::Result;

fn main() {
    if let Err(err) = profile() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn profile() -> Result<()> {
    let mut scene = Scene::demo(1337)?;
    scene.params.resolution_exp = 9;
    let seeds = scene.seeds();
    let width = scene.params.resolution();

    println!("=== Performance Profiling ===");
    println!("Grid: {}x{} ({} cells)", width, width, width * width);
    println!("Curves: {}, samplings: {}", scene.splines.len(), scene.params.spline_samplings);
    println!();

    let start = Instant::now();
    let levels = rasterize_levels(&scene.splines, &scene.params)?;
    let raster_time = start.elapsed();
    println!("Rasterization ({} levels): {:?}", levels.len(), raster_time);

    let parallel_time = time_solve(&scene, ParallelPasses)?;
    let serial_time = time_solve(&scene, SerialPasses)?;

    let solver = MultigridSolver::new(&scene.params, &seeds, ParallelPasses);
    let (grids, _) = solver.solve(&mut rasterize_levels(&scene.splines, &scene.params)?)?;

    let params = ErosionParams::default();
    let ticks = 200;
    println!("\nErosion parameters:");
    println!("  Ticks: {}", ticks);
    println!("  Time step: {}", params.time_delta);
    println!("  Rain interval: {}", params.rain_interval);
    println!();

    let start = Instant::now();
    let mut erosion = HydraulicErosion::new(&grids.height, params, seeds.erosion, ParallelPasses)?;
    erosion.load_params(&grids.erosion)?;
    erosion.run(ticks, None);
    let erosion_time = start.elapsed();
    println!("Erosion at full resolution: {:?}", erosion_time);
    println!("  {}", erosion.stats());

    let total = raster_time + parallel_time + erosion_time;
    let share = |d: Duration| 100.0 * d.as_secs_f64() / total.as_secs_f64();
    println!("\n=== Summary ===");
    println!("Rasterization:    {:>8.2}% ({:?})", share(raster_time), raster_time);
    println!("Solve (parallel): {:>8.2}% ({:?})", share(parallel_time), parallel_time);
    println!("Erosion:          {:>8.2}% ({:?})", share(erosion_time), erosion_time);
    println!("─────────────────────────────────");
    println!("Total:            {:?}", total);
    println!(
        "Serial solve took {:?} ({:.1}x the parallel solve)",
        serial_time,
        serial_time.as_secs_f64() / parallel_time.as_secs_f64().max(1e-9)
    );
    Ok(())
}

fn time_solve<S: PassScheduler + Clone>(scene: &Scene, scheduler: S) -> Result<Duration> {
    let seeds = scene.seeds();
    let mut levels = rasterize_levels(&scene.splines, &scene.params)?;
    let name = scheduler.name();
    let solver = MultigridSolver::new(&scene.params, &seeds, scheduler);
    let start = Instant::now();
    solver.solve(&mut levels)?;
    let elapsed = start.elapsed();
    println!("Solve ({}): {:?}", name, elapsed);
    Ok(elapsed)
}
