//! Streamline tracing through a cell-centered velocity field.
//!
//! Positions are in grid units: cell (i, j, k) has its center at (i, j, k).
//! Integration is forward Euler: x_{n+1} = x_n + v(x_n) * dt.

use glam::Vec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_DT, DEFAULT_MAX_STEPS};
use crate::error::{FlowError, FlowResult};
use crate::grid::GridDims;
use crate::serde_utils::{deserialize_points, serialize_points};
use crate::velocity::VelocityField;

/// How velocity is read at a fractional position.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingStrategy {
    /// Velocity of the nearest cell, no interpolation
    #[default]
    Nearest,
    /// Trilinear blend of the 8 surrounding cells
    Trilinear,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegrationParams {
    /// Euler step size
    pub dt: f32,
    /// Step budget per streamline
    pub max_steps: usize,
    pub sampling: SamplingStrategy,
}

impl Default for IntegrationParams {
    fn default() -> Self {
        Self {
            dt: DEFAULT_DT,
            max_steps: DEFAULT_MAX_STEPS,
            sampling: SamplingStrategy::default(),
        }
    }
}

impl IntegrationParams {
    pub fn validate(&self) -> FlowResult<()> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(FlowError::invalid(
                "integration.dt",
                self.dt,
                "must be finite and positive",
            ));
        }
        Ok(())
    }
}

/// Why a streamline stopped growing.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// All `max_steps` steps were taken
    StepBudget,
    /// The next position's nearest cell was outside the grid
    ExitedDomain,
}

/// Ordered positions visited by one seed, seed first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Streamline {
    #[serde(serialize_with = "serialize_points", deserialize_with = "deserialize_points")]
    pub points: Vec<Vec3>,
    pub termination: Termination,
}

impl Streamline {
    pub fn seed(&self) -> Vec3 {
        self.points[0]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of Euler steps that produced a point.
    pub fn steps(&self) -> usize {
        self.points.len() - 1
    }

    /// Largest distance from the seed across the flow axis (in Y/Z).
    pub fn max_lateral_deviation(&self) -> f32 {
        let seed = self.seed();
        self.points
            .iter()
            .map(|p| ((p.y - seed.y).powi(2) + (p.z - seed.z).powi(2)).sqrt())
            .fold(0.0, f32::max)
    }

    /// Points as plain `[x, y, z]` arrays.
    pub fn to_nested(&self) -> Vec<[f32; 3]> {
        self.points.iter().map(|p| p.to_array()).collect()
    }
}

/// Seeds on the inlet face (x = 0) at every `stride`-th cell along Y and Z.
///
/// Ordered Y-major, then Z. Yields ceil(ny/stride) * ceil(nz/stride) seeds.
pub fn inlet_seeds(dims: GridDims, stride: usize) -> FlowResult<Vec<Vec3>> {
    if stride == 0 {
        return Err(FlowError::invalid("seed_stride", stride, "must be positive"));
    }
    if dims.is_empty() {
        return Ok(Vec::new());
    }

    let mut seeds = Vec::with_capacity(dims.ny.div_ceil(stride) * dims.nz.div_ceil(stride));
    for y in (0..dims.ny).step_by(stride) {
        for z in (0..dims.nz).step_by(stride) {
            seeds.push(Vec3::new(0.0, y as f32, z as f32));
        }
    }
    Ok(seeds)
}

#[inline]
fn sample(field: &VelocityField, pos: Vec3, strategy: SamplingStrategy) -> Option<Vec3> {
    match strategy {
        SamplingStrategy::Nearest => field.sample_nearest(pos),
        SamplingStrategy::Trilinear => field.sample_trilinear(pos),
    }
}

/// Trace one streamline from `seed`.
///
/// Each step samples velocity at the current position; a position whose
/// nearest cell is outside the grid is never sampled and never stored.
pub fn integrate_streamline(field: &VelocityField, seed: Vec3, params: &IntegrationParams) -> Streamline {
    let dims = field.dims();
    let mut points = Vec::with_capacity(params.max_steps + 1);
    points.push(seed);

    let mut pos = seed;
    for _ in 0..params.max_steps {
        let Some(velocity) = sample(field, pos, params.sampling) else {
            return Streamline {
                points,
                termination: Termination::ExitedDomain,
            };
        };

        let next = pos + velocity * params.dt;
        if !dims.contains_point(next) {
            return Streamline {
                points,
                termination: Termination::ExitedDomain,
            };
        }

        points.push(next);
        pos = next;
    }

    Streamline {
        points,
        termination: Termination::StepBudget,
    }
}

/// Trace one streamline per seed, in seed order.
pub fn trace_streamlines(
    field: &VelocityField,
    seeds: &[Vec3],
    params: &IntegrationParams,
) -> FlowResult<Vec<Streamline>> {
    params.validate()?;

    // Seeds are independent; collect() keeps input order
    let streamlines: Vec<Streamline> = seeds
        .par_iter()
        .map(|&seed| integrate_streamline(field, seed, params))
        .collect();

    let exited = streamlines
        .iter()
        .filter(|s| s.termination == Termination::ExitedDomain)
        .count();
    log::debug!(
        "Traced {} streamlines ({} exited the domain, {} hit the step budget)",
        streamlines.len(),
        exited,
        streamlines.len() - exited
    );

    Ok(streamlines)
}
