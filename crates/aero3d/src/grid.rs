//! Grid dimensions and the boolean occupancy grid handed in by the voxelizer.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{FlowError, FlowResult};

/// Cell counts along each axis. Flow runs along +X.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct GridDims {
    /// Number of cells in X direction (flow axis)
    pub nx: usize,
    /// Number of cells in Y direction
    pub ny: usize,
    /// Number of cells in Z direction
    pub nz: usize,
}

impl GridDims {
    pub const fn new(nx: usize, ny: usize, nz: usize) -> Self {
        Self { nx, ny, nz }
    }

    /// Same extent on every axis.
    pub const fn cubic(n: usize) -> Self {
        Self::new(n, n, n)
    }

    #[inline]
    pub fn cell_count(&self) -> usize {
        self.nx * self.ny * self.nz
    }

    /// Cells in one Z slab (an XY plane). Slabs are the unit of parallel work.
    #[inline]
    pub fn slab_len(&self) -> usize {
        self.nx * self.ny
    }

    /// True if any axis has zero extent.
    pub fn is_empty(&self) -> bool {
        self.cell_count() == 0
    }

    /// Index into cell-centered arrays. X varies fastest, then Y, then Z.
    #[inline]
    pub fn index(&self, i: usize, j: usize, k: usize) -> usize {
        k * self.nx * self.ny + j * self.nx + i
    }

    /// Inverse of [`GridDims::index`].
    #[inline]
    pub fn coords(&self, idx: usize) -> (usize, usize, usize) {
        let slab = self.slab_len();
        let k = idx / slab;
        let rem = idx % slab;
        (rem % self.nx, rem / self.nx, k)
    }

    /// Check if signed cell indices are within bounds.
    #[inline]
    pub fn contains(&self, i: i32, j: i32, k: i32) -> bool {
        i >= 0
            && (i as usize) < self.nx
            && j >= 0
            && (j as usize) < self.ny
            && k >= 0
            && (k as usize) < self.nz
    }

    /// Nearest integer cell to a (possibly fractional) grid-space position.
    ///
    /// Positions are in cell units with cell centers at integer coordinates,
    /// so this rounds each axis rather than flooring it.
    #[inline]
    pub fn nearest_cell(&self, pos: Vec3) -> (i32, i32, i32) {
        (
            pos.x.round() as i32,
            pos.y.round() as i32,
            pos.z.round() as i32,
        )
    }

    /// True if the nearest cell to `pos` is inside the grid.
    #[inline]
    pub fn contains_point(&self, pos: Vec3) -> bool {
        if !pos.is_finite() {
            return false;
        }
        let (i, j, k) = self.nearest_cell(pos);
        self.contains(i, j, k)
    }
}

impl fmt::Display for GridDims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.nx, self.ny, self.nz)
    }
}

/// Boolean 3D array marking solid cells (true = inside the body).
///
/// Produced outside this crate by voxelizing a mesh. The solver and the
/// velocity deriver only ever borrow it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OccupancyGrid {
    dims: GridDims,
    solid: Vec<bool>,
}

impl OccupancyGrid {
    /// Create an all-fluid grid.
    pub fn new(dims: GridDims) -> Self {
        Self {
            dims,
            solid: vec![false; dims.cell_count()],
        }
    }

    /// Wrap a flat voxel array laid out as described by [`GridDims::index`].
    pub fn from_vec(dims: GridDims, solid: Vec<bool>) -> FlowResult<Self> {
        if dims.is_empty() || solid.is_empty() {
            return Err(FlowError::MissingInput(format!(
                "occupancy grid {} has no cells",
                dims
            )));
        }
        if solid.len() != dims.cell_count() {
            return Err(FlowError::invalid(
                "occupancy.cells",
                solid.len(),
                "length must equal nx * ny * nz",
            ));
        }
        Ok(Self { dims, solid })
    }

    /// Build a grid by evaluating `f(i, j, k)` for every cell.
    pub fn from_fn(dims: GridDims, mut f: impl FnMut(usize, usize, usize) -> bool) -> Self {
        let mut solid = Vec::with_capacity(dims.cell_count());
        for k in 0..dims.nz {
            for j in 0..dims.ny {
                for i in 0..dims.nx {
                    solid.push(f(i, j, k));
                }
            }
        }
        Self { dims, solid }
    }

    #[inline]
    pub fn dims(&self) -> GridDims {
        self.dims
    }

    /// Flat view of the occupancy flags.
    pub fn cells(&self) -> &[bool] {
        &self.solid
    }

    #[inline]
    pub fn cell_index(&self, i: usize, j: usize, k: usize) -> usize {
        self.dims.index(i, j, k)
    }

    /// Check if a cell is solid. Cells outside the grid are open.
    #[inline]
    pub fn is_solid(&self, i: usize, j: usize, k: usize) -> bool {
        if i < self.dims.nx && j < self.dims.ny && k < self.dims.nz {
            self.solid[self.cell_index(i, j, k)]
        } else {
            false
        }
    }

    /// Mark a cell as solid. Out-of-range indices are ignored.
    pub fn set_solid(&mut self, i: usize, j: usize, k: usize) {
        if i < self.dims.nx && j < self.dims.ny && k < self.dims.nz {
            let idx = self.cell_index(i, j, k);
            self.solid[idx] = true;
        }
    }

    /// Clear a solid cell back to fluid.
    pub fn clear_solid(&mut self, i: usize, j: usize, k: usize) {
        if i < self.dims.nx && j < self.dims.ny && k < self.dims.nz {
            let idx = self.cell_index(i, j, k);
            self.solid[idx] = false;
        }
    }

    /// Mark the half-open box `min..max` as solid, clipped to the grid.
    pub fn fill_box(&mut self, min: [usize; 3], max: [usize; 3]) {
        let hi = [
            max[0].min(self.dims.nx),
            max[1].min(self.dims.ny),
            max[2].min(self.dims.nz),
        ];
        for k in min[2]..hi[2] {
            for j in min[1]..hi[1] {
                for i in min[0]..hi[0] {
                    let idx = self.cell_index(i, j, k);
                    self.solid[idx] = true;
                }
            }
        }
    }

    /// Number of solid cells.
    pub fn solid_count(&self) -> usize {
        self.solid.iter().filter(|&&s| s).count()
    }
}
