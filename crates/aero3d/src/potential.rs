//! Velocity-potential solver for uniform flow along +X.
//!
//! Relaxes Laplace(phi) = 0 with a 6-neighbor stencil:
//! phi_new = phi + omega * (avg_of_6_neighbors - phi)
//!
//! Boundary conditions:
//! - Inlet (x = 0): Dirichlet, phi = 0
//! - Outlet (x = nx-1): Dirichlet, phi = (nx-1) * inflow_speed
//! - Side walls: clamped (neighbor outside the grid = the edge cell itself)
//! - Obstacles: ignored during relaxation by default, velocity is masked
//!   afterwards. This is not a no-penetration condition, flow only "sees" a
//!   body through the masked velocity. `ObstacleTreatment::MirroredNeumann`
//!   is available when the potential itself should bend around the body.

use std::time::Instant;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INFLOW_SPEED, DEFAULT_ITERATIONS, DEFAULT_OMEGA, DEFAULT_RUNAWAY_FACTOR,
};
use crate::error::{FlowError, FlowResult};
use crate::grid::{GridDims, OccupancyGrid};

/// Order in which cells are relaxed within one iteration.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelaxationScheme {
    /// Two half-sweeps over (i+j+k) even then odd cells. Each half-sweep only
    /// reads the other color, so it parallelizes and stays deterministic.
    /// Stable for 0 < omega < 2.
    #[default]
    RedBlack,
    /// Every cell from a snapshot of the previous iteration. Over-relaxed
    /// Jacobi (omega > 1) amplifies high-frequency error and diverges unless
    /// the field is already a fixed point.
    Jacobi,
}

/// How occupied cells take part in relaxation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleTreatment {
    /// Relax straight through solids; velocity is zeroed inside them later.
    #[default]
    VelocityMask,
    /// Freeze solid cells and mirror the fluid cell's own value across solid
    /// faces (zero normal gradient).
    MirroredNeumann,
}

/// Parameters of one potential solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverParams {
    /// Far-field speed along +X
    pub inflow_speed: f32,
    /// Iteration cap
    pub iterations: usize,
    /// Over-relaxation factor
    pub omega: f32,
    /// Stop early once the largest per-cell update drops below this
    pub tolerance: Option<f32>,
    /// |phi| above `runaway_factor * max(outlet potential, inflow_speed)` counts as divergence
    pub runaway_factor: f32,
    pub scheme: RelaxationScheme,
    pub obstacles: ObstacleTreatment,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            inflow_speed: DEFAULT_INFLOW_SPEED,
            iterations: DEFAULT_ITERATIONS,
            omega: DEFAULT_OMEGA,
            tolerance: None,
            runaway_factor: DEFAULT_RUNAWAY_FACTOR,
            scheme: RelaxationScheme::default(),
            obstacles: ObstacleTreatment::default(),
        }
    }
}

impl SolverParams {
    pub fn with_inflow(inflow_speed: f32, iterations: usize) -> Self {
        Self {
            inflow_speed,
            iterations,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> FlowResult<()> {
        if !self.inflow_speed.is_finite() || self.inflow_speed <= 0.0 {
            return Err(FlowError::invalid(
                "solver.inflow_speed",
                self.inflow_speed,
                "must be finite and positive",
            ));
        }
        if self.iterations == 0 {
            return Err(FlowError::invalid(
                "solver.iterations",
                self.iterations,
                "must be positive",
            ));
        }
        if !self.omega.is_finite() || self.omega <= 0.0 || self.omega >= 2.0 {
            return Err(FlowError::invalid(
                "solver.omega",
                self.omega,
                "must be in (0, 2)",
            ));
        }
        if let Some(tol) = self.tolerance {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(FlowError::invalid(
                    "solver.tolerance",
                    tol,
                    "must be finite and positive",
                ));
            }
        }
        if !self.runaway_factor.is_finite() || self.runaway_factor <= 1.0 {
            return Err(FlowError::invalid(
                "solver.runaway_factor",
                self.runaway_factor,
                "must be finite and greater than 1",
            ));
        }
        Ok(())
    }
}

/// Scalar potential, one value per cell.
#[derive(Clone, Debug, PartialEq)]
pub struct PotentialField {
    dims: GridDims,
    values: Vec<f32>,
}

impl PotentialField {
    /// Linear ramp phi = i * inflow_speed, the exact uniform-flow solution.
    pub fn uniform_flow(dims: GridDims, inflow_speed: f32) -> Self {
        let mut values = vec![0.0; dims.cell_count()];
        if !dims.is_empty() {
            values.par_chunks_mut(dims.slab_len()).for_each(|slab| {
                for (local, phi) in slab.iter_mut().enumerate() {
                    *phi = (local % dims.nx) as f32 * inflow_speed;
                }
            });
        }
        Self { dims, values }
    }

    /// Wrap precomputed values. Length must match `dims`.
    pub fn from_vec(dims: GridDims, values: Vec<f32>) -> FlowResult<Self> {
        if values.len() != dims.cell_count() {
            return Err(FlowError::invalid(
                "potential.values",
                values.len(),
                "length must equal nx * ny * nz",
            ));
        }
        Ok(Self { dims, values })
    }

    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize, k: usize) -> f32 {
        self.values[self.dims.index(i, j, k)]
    }

    /// All values on the YZ plane at x = `i`, one Z slab after another.
    pub fn face_values(&self, i: usize) -> Vec<f32> {
        assert!(i < self.dims.nx, "face {} outside 0..{}", i, self.dims.nx);
        let mut out = Vec::with_capacity(self.dims.ny * self.dims.nz);
        for k in 0..self.dims.nz {
            for j in 0..self.dims.ny {
                out.push(self.get(i, j, k));
            }
        }
        out
    }

    /// Largest absolute value (NaN if any value is NaN).
    pub fn max_abs(&self) -> f32 {
        self.values
            .iter()
            .fold(0.0f32, |acc, &v| if v.is_nan() || acc.is_nan() { f32::NAN } else { acc.max(v.abs()) })
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

/// Summary of one solve.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveReport {
    pub iterations_run: usize,
    /// Largest |phi_new - phi_old| in the last iteration
    pub final_max_update: f32,
    /// True if the tolerance stopped the solve before the cap
    pub converged: bool,
    pub elapsed_ms: f64,
}

/// A solved potential and how it got there.
#[derive(Clone, Debug)]
pub struct PotentialSolution {
    pub field: PotentialField,
    pub report: SolveReport,
}

/// Relaxation solver bound to one occupancy grid.
///
/// The solver holds no field state; every [`PotentialSolver::solve`] starts
/// from the uniform-flow ramp and returns a fresh field.
#[derive(Clone, Copy, Debug)]
pub struct PotentialSolver<'a> {
    resolution: GridDims,
    occupancy: &'a OccupancyGrid,
}

impl<'a> PotentialSolver<'a> {
    /// Bind a solver configured for `resolution` to `occupancy`.
    ///
    /// Fails with `ShapeMismatch` when the grid was voxelized at a different
    /// resolution.
    pub fn new(resolution: GridDims, occupancy: &'a OccupancyGrid) -> FlowResult<Self> {
        if resolution.is_empty() {
            return Err(FlowError::MissingInput(format!(
                "solver resolution {} has no cells",
                resolution
            )));
        }
        if occupancy.dims() != resolution {
            return Err(FlowError::ShapeMismatch {
                expected: resolution,
                actual: occupancy.dims(),
            });
        }
        Ok(Self {
            resolution,
            occupancy,
        })
    }

    pub fn resolution(&self) -> GridDims {
        self.resolution
    }

    pub fn occupancy(&self) -> &'a OccupancyGrid {
        self.occupancy
    }

    /// Run the relaxation.
    pub fn solve(&self, params: &SolverParams) -> FlowResult<PotentialSolution> {
        self.solve_observed(params, |_, _| {})
    }

    /// Run the relaxation, calling `observer(iteration, field)` after each
    /// iteration once the boundary faces have been re-imposed.
    pub fn solve_observed(
        &self,
        params: &SolverParams,
        mut observer: impl FnMut(usize, &PotentialField),
    ) -> FlowResult<PotentialSolution> {
        params.validate()?;
        let start = Instant::now();
        let dims = self.resolution;

        let mut field = PotentialField::uniform_flow(dims, params.inflow_speed);
        let mut scratch = vec![0.0f32; dims.cell_count()];

        let outlet_phi = dims.nx.saturating_sub(1) as f32 * params.inflow_speed;
        let runaway_limit = params.runaway_factor * outlet_phi.max(params.inflow_speed);

        let mut report = SolveReport {
            iterations_run: 0,
            final_max_update: 0.0,
            converged: false,
            elapsed_ms: 0.0,
        };

        for iteration in 1..=params.iterations {
            let stats = match params.scheme {
                RelaxationScheme::RedBlack => {
                    let red = self.relax_pass(&field.values, &mut scratch, params, Some(0));
                    std::mem::swap(&mut field.values, &mut scratch);
                    let black = self.relax_pass(&field.values, &mut scratch, params, Some(1));
                    std::mem::swap(&mut field.values, &mut scratch);
                    red.merge(black)
                }
                RelaxationScheme::Jacobi => {
                    let all = self.relax_pass(&field.values, &mut scratch, params, None);
                    std::mem::swap(&mut field.values, &mut scratch);
                    all
                }
            };

            pin_dirichlet_faces(&mut field, params.inflow_speed);

            report.iterations_run = iteration;
            report.final_max_update = stats.max_update;

            if stats.non_finite || stats.max_abs > runaway_limit {
                let max_abs = if stats.non_finite { f32::INFINITY } else { stats.max_abs };
                log::warn!(
                    "Potential solve diverged at iteration {} (max |phi| = {}, omega = {}, scheme = {:?})",
                    iteration,
                    max_abs,
                    params.omega,
                    params.scheme
                );
                return Err(FlowError::NumericalDivergence { iteration, max_abs });
            }

            observer(iteration, &field);

            if iteration % 50 == 0 {
                log::debug!(
                    "relaxation iter {}/{}: max update {:.3e}",
                    iteration,
                    params.iterations,
                    stats.max_update
                );
            }

            if let Some(tol) = params.tolerance {
                if stats.max_update < tol {
                    report.converged = true;
                    break;
                }
            }
        }

        if params.tolerance.is_some() && !report.converged {
            log::warn!(
                "Potential solve hit the {} iteration cap before tolerance (last max update {:.3e})",
                params.iterations,
                report.final_max_update
            );
        }

        report.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        log::info!(
            "Solved potential on {} grid: {} iterations, max update {:.3e}, {:.1} ms",
            dims,
            report.iterations_run,
            report.final_max_update,
            report.elapsed_ms
        );

        Ok(PotentialSolution { field, report })
    }

    /// One relaxation pass from `src` into `dst`, parallel over Z slabs.
    ///
    /// `parity` restricts updates to cells with (i+j+k) % 2 == parity; every
    /// other cell is copied unchanged. Dirichlet faces are never relaxed.
    fn relax_pass(
        &self,
        src: &[f32],
        dst: &mut [f32],
        params: &SolverParams,
        parity: Option<usize>,
    ) -> PassStats {
        let dims = self.resolution;
        let solid = self.occupancy.cells();
        let omega = params.omega;
        let mirror = params.obstacles == ObstacleTreatment::MirroredNeumann;

        dst.par_chunks_mut(dims.slab_len())
            .enumerate()
            .map(|(k, out)| {
                let mut stats = PassStats::default();
                for j in 0..dims.ny {
                    for i in 0..dims.nx {
                        let idx = dims.index(i, j, k);
                        let old = src[idx];

                        let relaxed = i > 0
                            && i + 1 < dims.nx
                            && parity.map_or(true, |p| (i + j + k) % 2 == p)
                            && !(mirror && solid[idx]);

                        let new = if relaxed {
                            let avg = neighbor_average(src, solid, dims, i, j, k, mirror);
                            // Increment form keeps an exact fixed point exact
                            old + omega * (avg - old)
                        } else {
                            old
                        };

                        out[j * dims.nx + i] = new;
                        stats.observe(old, new);
                    }
                }
                stats
            })
            .reduce(PassStats::default, PassStats::merge)
    }
}

/// Average of the 6 axis neighbors of (i, j, k).
///
/// Neighbors outside the grid take the center value. With `mirror`, so do
/// solid neighbors.
#[inline]
fn neighbor_average(
    src: &[f32],
    solid: &[bool],
    dims: GridDims,
    i: usize,
    j: usize,
    k: usize,
    mirror: bool,
) -> f32 {
    let center = src[dims.index(i, j, k)];
    let sample = |ii: usize, jj: usize, kk: usize| {
        let n = dims.index(ii, jj, kk);
        if mirror && solid[n] {
            center
        } else {
            src[n]
        }
    };

    let x_minus = if i > 0 { sample(i - 1, j, k) } else { center };
    let x_plus = if i + 1 < dims.nx { sample(i + 1, j, k) } else { center };
    let y_minus = if j > 0 { sample(i, j - 1, k) } else { center };
    let y_plus = if j + 1 < dims.ny { sample(i, j + 1, k) } else { center };
    let z_minus = if k > 0 { sample(i, j, k - 1) } else { center };
    let z_plus = if k + 1 < dims.nz { sample(i, j, k + 1) } else { center };

    (x_minus + x_plus + y_minus + y_plus + z_minus + z_plus) / 6.0
}

/// Re-impose inlet phi = 0 and outlet phi = (nx-1) * inflow_speed.
pub fn pin_dirichlet_faces(field: &mut PotentialField, inflow_speed: f32) {
    let dims = field.dims;
    if dims.is_empty() {
        return;
    }
    let outlet = dims.nx - 1;
    let outlet_phi = outlet as f32 * inflow_speed;

    field
        .values
        .par_chunks_mut(dims.slab_len())
        .for_each(|slab| {
            for j in 0..dims.ny {
                slab[j * dims.nx] = 0.0;
                slab[j * dims.nx + outlet] = outlet_phi;
            }
        });
}

#[derive(Clone, Copy, Debug, Default)]
struct PassStats {
    max_update: f32,
    max_abs: f32,
    non_finite: bool,
}

impl PassStats {
    #[inline]
    fn observe(&mut self, old: f32, new: f32) {
        if !new.is_finite() {
            self.non_finite = true;
            return;
        }
        self.max_update = self.max_update.max((new - old).abs());
        self.max_abs = self.max_abs.max(new.abs());
    }

    fn merge(self, other: PassStats) -> PassStats {
        PassStats {
            max_update: self.max_update.max(other.max_update),
            max_abs: self.max_abs.max(other.max_abs),
            non_finite: self.non_finite || other.non_finite,
        }
    }
}
