//! Simulation request configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! { "resolution": { "nx": 32, "ny": 32, "nz": 32 }, "solver": { "inflow_speed": 4.0 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_RESOLUTION, DEFAULT_SEED_STRIDE};
use crate::error::{FlowError, FlowResult};
use crate::grid::GridDims;
use crate::potential::SolverParams;
use crate::streamline::IntegrationParams;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Grid the geometry was voxelized at
    pub resolution: GridDims,
    pub solver: SolverParams,
    pub integration: IntegrationParams,
    /// Seed every Nth inlet cell along Y and Z
    pub seed_stride: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            resolution: GridDims::cubic(DEFAULT_RESOLUTION),
            solver: SolverParams::default(),
            integration: IntegrationParams::default(),
            seed_stride: DEFAULT_SEED_STRIDE,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> FlowResult<()> {
        if self.resolution.is_empty() {
            return Err(FlowError::invalid(
                "resolution",
                self.resolution,
                "every axis must have at least one cell",
            ));
        }
        if self.seed_stride == 0 {
            return Err(FlowError::invalid(
                "seed_stride",
                self.seed_stride,
                "must be positive",
            ));
        }
        self.solver.validate()?;
        self.integration.validate()?;
        Ok(())
    }

    pub fn from_json_str(json: &str) -> FlowResult<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a configuration from a JSON file.
    pub fn load_json(path: &Path) -> FlowResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Save configuration to a JSON file.
    pub fn save_json(&self, path: &Path) -> FlowResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
