//! Tuned constants and request defaults for the airflow pipeline.
//!
//! Speeds are in grid cells per unit time; positions are in cell units.

// =============================================================================
// RELAXATION
// =============================================================================

/// Over-relaxation factor. Tuned, not derived: higher converges faster until
/// it stops converging at all.
pub const DEFAULT_OMEGA: f32 = 1.8;

/// A potential larger than this multiple of the outlet potential is runaway
pub const DEFAULT_RUNAWAY_FACTOR: f32 = 1.0e3;

// =============================================================================
// SIMULATION REQUEST
// =============================================================================

/// Cells per axis of the default simulation grid
pub const DEFAULT_RESOLUTION: usize = 64;

/// Wind speed of a default simulation request
pub const DEFAULT_INFLOW_SPEED: f32 = 10.0;

/// Relaxation iterations of a default simulation request
pub const DEFAULT_ITERATIONS: usize = 200;

// =============================================================================
// STREAMLINES
// =============================================================================

/// Inlet seeds are placed on every Nth cell along Y and Z
pub const DEFAULT_SEED_STRIDE: usize = 4;

/// Euler step size
pub const DEFAULT_DT: f32 = 0.5;

/// Step budget per streamline
pub const DEFAULT_MAX_STEPS: usize = 100;
