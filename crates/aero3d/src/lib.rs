//! 3D Potential-Flow Airflow Estimation
//!
//! Approximates steady airflow around a voxelized solid. A scalar potential
//! is relaxed toward Laplace's equation between a fixed inlet (x = 0) and
//! outlet (x = nx - 1), velocity is taken as its gradient, and streamlines are
//! traced from seeds on the inlet face with forward Euler steps.
//!
//! # Example
//!
//! ```
//! use aero3d::{AirflowSimulation3D, GridDims, OccupancyGrid, SimulationConfig};
//!
//! let dims = GridDims::cubic(16);
//! let mut geometry = OccupancyGrid::new(dims);
//! geometry.fill_box([6, 6, 6], [10, 10, 10]);
//!
//! let mut config = SimulationConfig::default();
//! config.resolution = dims;
//! config.solver.inflow_speed = 1.0;
//!
//! let sim = AirflowSimulation3D::new(config).with_geometry(geometry);
//! let output = sim.run().unwrap();
//! assert_eq!(output.streamlines.len(), 16);
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod grid;
pub mod potential;
pub mod serde_utils;
pub mod streamline;
pub mod velocity;

pub use config::SimulationConfig;
pub use error::{FlowError, FlowResult};
pub use glam::Vec3;
pub use grid::{GridDims, OccupancyGrid};
pub use potential::{
    ObstacleTreatment, PotentialField, PotentialSolution, PotentialSolver, RelaxationScheme,
    SolveReport, SolverParams,
};
pub use streamline::{
    inlet_seeds, integrate_streamline, trace_streamlines, IntegrationParams, SamplingStrategy,
    Streamline, Termination,
};
pub use velocity::{derive_velocity, VelocityField};

use serde::{Deserialize, Serialize};

/// Result of one simulation request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationOutput {
    pub resolution: GridDims,
    pub inflow_speed: f32,
    pub report: SolveReport,
    pub streamlines: Vec<Streamline>,
}

/// Everything a run produced, including the intermediate fields.
#[derive(Clone, Debug)]
pub struct SimulationFields {
    pub potential: PotentialField,
    pub velocity: VelocityField,
    pub output: SimulationOutput,
}

/// Airflow pipeline: geometry in, streamlines out.
///
/// Holds the request configuration and the most recently loaded geometry.
/// Each [`AirflowSimulation3D::run`] is independent; nothing is cached
/// between runs.
#[derive(Clone, Debug, Default)]
pub struct AirflowSimulation3D {
    pub config: SimulationConfig,
    geometry: Option<OccupancyGrid>,
}

impl AirflowSimulation3D {
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            geometry: None,
        }
    }

    pub fn with_geometry(mut self, geometry: OccupancyGrid) -> Self {
        self.geometry = Some(geometry);
        self
    }

    /// Replace the geometry, returning the previous one.
    pub fn set_geometry(&mut self, geometry: OccupancyGrid) -> Option<OccupancyGrid> {
        self.geometry.replace(geometry)
    }

    pub fn clear_geometry(&mut self) -> Option<OccupancyGrid> {
        self.geometry.take()
    }

    pub fn geometry(&self) -> Option<&OccupancyGrid> {
        self.geometry.as_ref()
    }

    /// Solve, derive velocity and trace inlet streamlines.
    pub fn run(&self) -> FlowResult<SimulationOutput> {
        self.run_with_fields().map(|fields| fields.output)
    }

    /// Like [`AirflowSimulation3D::run`], keeping the potential and velocity fields.
    pub fn run_with_fields(&self) -> FlowResult<SimulationFields> {
        let geometry = self.geometry.as_ref().ok_or_else(|| {
            FlowError::MissingInput("no geometry loaded; nothing to simulate".to_string())
        })?;
        self.config.validate()?;

        let config = &self.config;
        log::info!(
            "Simulating {} grid ({} solid cells), inflow {}, {} iterations",
            config.resolution,
            geometry.solid_count(),
            config.solver.inflow_speed,
            config.solver.iterations
        );

        let solver = PotentialSolver::new(config.resolution, geometry)?;
        let PotentialSolution { field, report } = solver.solve(&config.solver)?;

        let velocity = derive_velocity(&field, geometry)?;
        log::debug!("Velocity derived, max |v| = {:.4}", velocity.max_magnitude());

        let seeds = inlet_seeds(config.resolution, config.seed_stride)?;
        let streamlines = trace_streamlines(&velocity, &seeds, &config.integration)?;

        log::info!(
            "Simulation done: {} streamlines, solve took {:.1} ms",
            streamlines.len(),
            report.elapsed_ms
        );

        Ok(SimulationFields {
            potential: field,
            velocity,
            output: SimulationOutput {
                resolution: config.resolution,
                inflow_speed: config.solver.inflow_speed,
                report,
                streamlines,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(n: usize) -> SimulationConfig {
        SimulationConfig {
            resolution: GridDims::cubic(n),
            solver: SolverParams::with_inflow(1.0, 50),
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_run_without_geometry_is_missing_input() {
        let sim = AirflowSimulation3D::new(small_config(8));
        let err = sim.run().unwrap_err();
        assert!(matches!(err, FlowError::MissingInput(_)));
    }

    #[test]
    fn test_run_with_wrong_resolution() {
        let sim = AirflowSimulation3D::new(small_config(8))
            .with_geometry(OccupancyGrid::new(GridDims::cubic(6)));
        let err = sim.run().unwrap_err();
        assert!(matches!(err, FlowError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_run_empty_domain() {
        let sim = AirflowSimulation3D::new(small_config(8))
            .with_geometry(OccupancyGrid::new(GridDims::cubic(8)));
        let output = sim.run().unwrap();

        assert_eq!(output.resolution, GridDims::cubic(8));
        assert_eq!(output.inflow_speed, 1.0);
        assert_eq!(output.report.iterations_run, 50);
        // stride 4 on an 8x8 inlet: y, z in {0, 4}
        assert_eq!(output.streamlines.len(), 4);
        for line in &output.streamlines {
            assert_eq!(line.termination, Termination::ExitedDomain);
            assert!(line.max_lateral_deviation() < 1e-4);
        }
    }

    #[test]
    fn test_set_geometry_replaces_previous() {
        let mut sim = AirflowSimulation3D::new(small_config(4));
        assert!(sim.set_geometry(OccupancyGrid::new(GridDims::cubic(4))).is_none());
        let previous = sim.set_geometry(OccupancyGrid::new(GridDims::cubic(4)));
        assert!(previous.is_some());
        assert!(sim.clear_geometry().is_some());
        assert!(sim.geometry().is_none());
    }

    #[test]
    fn test_output_serializes() {
        let sim = AirflowSimulation3D::new(small_config(4))
            .with_geometry(OccupancyGrid::new(GridDims::cubic(4)));
        let output = sim.run().unwrap();
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["resolution"]["nx"], 4);
        assert!(json["streamlines"][0]["points"][0].is_array());
        let back: SimulationOutput = serde_json::from_value(json).unwrap();
        assert_eq!(back, output);
    }
}
