//! Recovery run configuration
//!
//! One TOML file describes every detector in a run: its grid shape, its
//! calorimeter id, and (optionally) the list of dead towers.

use crate::core_modules::dead_map::DeadTowerMap;
use crate::core_modules::geometry::{GeometryContainer, GridCoord, GridShape};
use crate::error::RecoveryError;
use crate::pipeline::RecoveryPipeline;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level run configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Directory for per-event PNG heatmaps; no snapshots when unset
    #[serde(default)]
    pub snapshot_dir: Option<PathBuf>,

    #[serde(default)]
    pub detectors: Vec<DetectorConfig>,
}

/// One calorimeter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub name: String,

    #[serde(default = "default_calo_id")]
    pub calo_id: u8,

    pub eta_bins: u32,
    pub phi_bins: u32,

    /// `[bineta, binphi]` pairs. Omitting the key runs the detector without a dead map.
    #[serde(default)]
    pub dead_towers: Option<Vec<[u32; 2]>>,
}

fn default_calo_id() -> u8 {
    1
}

impl RecoveryConfig {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecoveryError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, RecoveryError> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), RecoveryError> {
        if self.detectors.is_empty() {
            return Err(RecoveryError::InvalidConfig("no detectors configured".to_string()));
        }
        for (i, detector) in self.detectors.iter().enumerate() {
            if self.detectors[..i].iter().any(|d| d.name == detector.name) {
                return Err(RecoveryError::InvalidConfig(format!(
                    "detector {} configured twice",
                    detector.name
                )));
            }
            detector.dead_map()?;
        }
        Ok(())
    }
}

impl DetectorConfig {
    pub fn shape(&self) -> Result<GridShape, RecoveryError> {
        GridShape::new(self.eta_bins, self.phi_bins)
    }

    /// Full-grid geometry for this detector.
    pub fn geometry(&self) -> Result<GeometryContainer, RecoveryError> {
        Ok(GeometryContainer::full_grid(self.calo_id, self.shape()?))
    }

    /// `Ok(None)` when no dead towers are listed. Every listed tower must lie on the grid.
    pub fn dead_map(&self) -> Result<Option<DeadTowerMap>, RecoveryError> {
        let Some(towers) = &self.dead_towers else {
            return Ok(None);
        };

        let shape = self.shape()?;
        let mut dead_map = DeadTowerMap::new(self.calo_id);
        for &[bineta, binphi] in towers {
            let coord = GridCoord::new(bineta, binphi);
            if !shape.contains(coord) {
                return Err(RecoveryError::InvalidConfig(format!(
                    "dead tower ({bineta}, {binphi}) outside {} grid {}x{}",
                    self.name,
                    shape.eta_bins(),
                    shape.phi_bins()
                )));
            }
            dead_map.add_dead_tower(coord)?;
        }
        Ok(Some(dead_map))
    }

    pub fn build_pipeline(&self) -> Result<RecoveryPipeline, RecoveryError> {
        RecoveryPipeline::new(self.name.clone(), Some(self.geometry()?), self.dead_map()?)
    }
}
