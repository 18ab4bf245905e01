//! Velocity field as the discrete gradient of the potential.
//!
//! v = grad(phi), centered differences in the interior and one-sided
//! differences on the grid edges. Velocity is zeroed inside solid cells.

use glam::Vec3;
use rayon::prelude::*;

use crate::error::{FlowError, FlowResult};
use crate::grid::{GridDims, OccupancyGrid};
use crate::potential::PotentialField;

/// Cell-centered velocity, stored as three scalar fields.
#[derive(Clone, Debug, PartialEq)]
pub struct VelocityField {
    dims: GridDims,
    vx: Vec<f32>,
    vy: Vec<f32>,
    vz: Vec<f32>,
}

impl VelocityField {
    /// Zero velocity everywhere.
    pub fn zeros(dims: GridDims) -> Self {
        let n = dims.cell_count();
        Self {
            dims,
            vx: vec![0.0; n],
            vy: vec![0.0; n],
            vz: vec![0.0; n],
        }
    }

    /// Build from a function of the cell indices. Mostly useful for tests and
    /// for feeding the integrator an analytic field.
    pub fn from_fn(dims: GridDims, mut f: impl FnMut(usize, usize, usize) -> Vec3) -> Self {
        let mut field = Self::zeros(dims);
        for k in 0..dims.nz {
            for j in 0..dims.ny {
                for i in 0..dims.nx {
                    let idx = dims.index(i, j, k);
                    let v = f(i, j, k);
                    field.vx[idx] = v.x;
                    field.vy[idx] = v.y;
                    field.vz[idx] = v.z;
                }
            }
        }
        field
    }

    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// X component (flow axis).
    pub fn vx(&self) -> &[f32] {
        &self.vx
    }

    pub fn vy(&self) -> &[f32] {
        &self.vy
    }

    pub fn vz(&self) -> &[f32] {
        &self.vz
    }

    /// Velocity at cell (i, j, k).
    #[inline]
    pub fn at(&self, i: usize, j: usize, k: usize) -> Vec3 {
        let idx = self.dims.index(i, j, k);
        Vec3::new(self.vx[idx], self.vy[idx], self.vz[idx])
    }

    /// Velocity of the nearest cell, or `None` if that cell is outside the grid.
    #[inline]
    pub fn sample_nearest(&self, pos: Vec3) -> Option<Vec3> {
        if !self.dims.contains_point(pos) {
            return None;
        }
        let (i, j, k) = self.dims.nearest_cell(pos);
        Some(self.at(i as usize, j as usize, k as usize))
    }

    /// Trilinear interpolation between the 8 surrounding cell centers.
    ///
    /// Returns `None` under the same rule as [`VelocityField::sample_nearest`]
    /// so both strategies stop streamlines at the same place. Corners past
    /// the last cell are clamped to it.
    pub fn sample_trilinear(&self, pos: Vec3) -> Option<Vec3> {
        if !self.dims.contains_point(pos) {
            return None;
        }
        let max = Vec3::new(
            (self.dims.nx - 1) as f32,
            (self.dims.ny - 1) as f32,
            (self.dims.nz - 1) as f32,
        );
        let p = pos.clamp(Vec3::ZERO, max);
        let base = p.floor();
        let t = p - base;

        let i0 = base.x as usize;
        let j0 = base.y as usize;
        let k0 = base.z as usize;
        let i1 = (i0 + 1).min(self.dims.nx - 1);
        let j1 = (j0 + 1).min(self.dims.ny - 1);
        let k1 = (k0 + 1).min(self.dims.nz - 1);

        let c00 = self.at(i0, j0, k0).lerp(self.at(i1, j0, k0), t.x);
        let c10 = self.at(i0, j1, k0).lerp(self.at(i1, j1, k0), t.x);
        let c01 = self.at(i0, j0, k1).lerp(self.at(i1, j0, k1), t.x);
        let c11 = self.at(i0, j1, k1).lerp(self.at(i1, j1, k1), t.x);

        let c0 = c00.lerp(c10, t.y);
        let c1 = c01.lerp(c11, t.y);
        Some(c0.lerp(c1, t.z))
    }

    /// Largest speed in the field.
    pub fn max_magnitude(&self) -> f32 {
        (0..self.dims.cell_count())
            .into_par_iter()
            .map(|idx| Vec3::new(self.vx[idx], self.vy[idx], self.vz[idx]).length())
            .reduce(|| 0.0, f32::max)
    }

    /// Mean velocity over cells where `include(idx)` holds.
    pub fn mean_velocity(&self, include: impl Fn(usize) -> bool) -> Vec3 {
        let mut sum = Vec3::ZERO;
        let mut count = 0usize;
        for idx in 0..self.dims.cell_count() {
            if include(idx) {
                sum += Vec3::new(self.vx[idx], self.vy[idx], self.vz[idx]);
                count += 1;
            }
        }
        sum / count.max(1) as f32
    }

    pub fn is_finite(&self) -> bool {
        self.vx.iter().chain(&self.vy).chain(&self.vz).all(|v| v.is_finite())
    }
}

/// Gradient of `phi` along one axis at position `p` of `n`, given the values
/// at p-1, p and p+1 (out-of-range ones unused).
#[inline]
fn axis_gradient(p: usize, n: usize, prev: f32, here: f32, next: f32) -> f32 {
    if n < 2 {
        0.0
    } else if p == 0 {
        next - here
    } else if p == n - 1 {
        here - prev
    } else {
        (next - prev) * 0.5
    }
}

/// Derive v = grad(phi) and zero it inside solids.
pub fn derive_velocity(
    potential: &PotentialField,
    occupancy: &OccupancyGrid,
) -> FlowResult<VelocityField> {
    let dims = potential.dims();
    if occupancy.dims() != dims {
        return Err(FlowError::ShapeMismatch {
            expected: dims,
            actual: occupancy.dims(),
        });
    }

    let mut field = VelocityField::zeros(dims);
    if dims.is_empty() {
        return Ok(field);
    }

    let phi = potential.values();
    let solid = occupancy.cells();
    let slab = dims.slab_len();

    field
        .vx
        .par_chunks_mut(slab)
        .zip(field.vy.par_chunks_mut(slab))
        .zip(field.vz.par_chunks_mut(slab))
        .enumerate()
        .for_each(|(k, ((vx, vy), vz))| {
            for j in 0..dims.ny {
                for i in 0..dims.nx {
                    let idx = dims.index(i, j, k);
                    let local = j * dims.nx + i;

                    if solid[idx] {
                        vx[local] = 0.0;
                        vy[local] = 0.0;
                        vz[local] = 0.0;
                        continue;
                    }

                    let here = phi[idx];
                    let at = |ii: usize, jj: usize, kk: usize| phi[dims.index(ii, jj, kk)];

                    let x_prev = if i > 0 { at(i - 1, j, k) } else { here };
                    let x_next = if i + 1 < dims.nx { at(i + 1, j, k) } else { here };
                    let y_prev = if j > 0 { at(i, j - 1, k) } else { here };
                    let y_next = if j + 1 < dims.ny { at(i, j + 1, k) } else { here };
                    let z_prev = if k > 0 { at(i, j, k - 1) } else { here };
                    let z_next = if k + 1 < dims.nz { at(i, j, k + 1) } else { here };

                    vx[local] = axis_gradient(i, dims.nx, x_prev, here, x_next);
                    vy[local] = axis_gradient(j, dims.ny, y_prev, here, y_next);
                    vz[local] = axis_gradient(k, dims.nz, z_prev, here, z_next);
                }
            }
        });

    log::debug!(
        "Derived velocity on {} grid ({} solid cells masked)",
        dims,
        occupancy.solid_count()
    );

    Ok(field)
}
