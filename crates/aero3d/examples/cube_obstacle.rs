//! Airflow around a cube - solves, traces and dumps streamlines as JSON
//!
//! Set `"solver": { "obstacles": "mirrored_neumann" }` in a config file to see
//! streamlines bend around the body.
//!
//! Run with: RUST_LOG=debug cargo run --example cube_obstacle -p aero3d --release [config.json] [out.json]

use aero3d::{AirflowSimulation3D, GridDims, ObstacleTreatment, OccupancyGrid, SimulationConfig};
use std::path::Path;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config = match args.next() {
        Some(path) => SimulationConfig::load_json(Path::new(&path))?,
        None => SimulationConfig {
            resolution: GridDims::new(48, 32, 32),
            ..SimulationConfig::default()
        },
    };
    let out_path = args.next();

    // Cube of a quarter of the cross-section, a third of the way downstream
    let dims = config.resolution;
    let side = (dims.ny.min(dims.nz) / 4).max(1);
    let x0 = dims.nx / 3;
    let y0 = dims.ny.saturating_sub(side) / 2;
    let z0 = dims.nz.saturating_sub(side) / 2;
    let mut geometry = OccupancyGrid::new(dims);
    geometry.fill_box([x0, y0, z0], [x0 + side, y0 + side, z0 + side]);

    println!("=== CUBE OBSTACLE ===");
    println!("Grid: {}, solid cells: {}", dims, geometry.solid_count());
    println!(
        "Inflow: {}, iterations: {}, omega: {}, obstacles: {:?}",
        config.solver.inflow_speed, config.solver.iterations, config.solver.omega, config.solver.obstacles
    );
    if config.solver.obstacles == ObstacleTreatment::VelocityMask {
        println!("(velocity mask only: streamlines stop at the body instead of bending round it)");
    }

    let sim = AirflowSimulation3D::new(config).with_geometry(geometry);
    let fields = sim.run_with_fields()?;
    let output = &fields.output;

    println!(
        "Solve: {} iterations, last max update {:.3e}, {:.1} ms",
        output.report.iterations_run, output.report.final_max_update, output.report.elapsed_ms
    );
    println!("Max |v|: {:.3}", fields.velocity.max_magnitude());

    let deviations: Vec<f32> = output
        .streamlines
        .iter()
        .map(|s| s.max_lateral_deviation())
        .collect();
    let max_dev = deviations.iter().cloned().fold(0.0, f32::max);
    let straight = deviations.iter().filter(|&&d| d < 0.5).count();
    println!(
        "Streamlines: {} ({} straight, max lateral deviation {:.3})",
        output.streamlines.len(),
        straight,
        max_dev
    );

    let json = serde_json::to_string_pretty(output)?;
    match out_path {
        Some(path) => {
            std::fs::write(&path, json)?;
            println!("Wrote {}", path);
        }
        None => println!("{}", json),
    }

    Ok(())
}
