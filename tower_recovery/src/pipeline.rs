// THEORY:
// The `pipeline` module is the top-level API for one detector. A `RecoveryPipeline`
// is built once per run from typed handles (geometry, optional dead map) and then
// called once per event with that event's tower store.
//
// It adds three things on top of the stateless `interpolator`:
// 1.  **Setup Validation**: No geometry, no pipeline. `new` fails instead of handing
//     out something that would fail every cycle.
// 2.  **Degraded Mode**: A run without a dead map is valid. Each cycle then recovers
//     nothing, and the condition is announced a single time per pipeline.
// 3.  **Abort Latch**: A corrupt dead map (a dead tower the geometry does not know)
//     ends the run. The first failing cycle returns the cause; every later cycle
//     returns `RunAborted`.

use crate::core_modules::dead_map::DeadTowerMap;
use crate::core_modules::geometry::GeometryContainer;
use crate::core_modules::interpolator::interpolator;
use crate::core_modules::tower_container::TowerContainer;
use crate::error::RecoveryError;

// Re-export key data structures for the public API.
pub use crate::core_modules::geometry::{GridCoord, GridShape};
pub use crate::core_modules::interpolator::RecoveryStats;

/// Dead tower recovery for a single detector.
pub struct RecoveryPipeline {
    detector: String,
    geometry: GeometryContainer,
    dead_map: Option<DeadTowerMap>,
    /// Set once the missing dead map has been reported.
    missing_dead_map_reported: bool,
    aborted: bool,
    cycles: u64,
}

impl RecoveryPipeline {
    pub fn new(
        detector: impl Into<String>,
        geometry: Option<GeometryContainer>,
        dead_map: Option<DeadTowerMap>,
    ) -> Result<Self, RecoveryError> {
        let detector = detector.into();
        let Some(geometry) = geometry else {
            tracing::error!(detector = %detector, "tower geometry missing, bailing out");
            return Err(RecoveryError::MissingGeometry { detector });
        };

        geometry.identify();
        if let Some(dead_map) = &dead_map {
            tracing::info!(detector = %detector, "using dead map");
            dead_map.identify();
        }

        Ok(Self {
            detector,
            geometry,
            dead_map,
            missing_dead_map_reported: false,
            aborted: false,
            cycles: 0,
        })
    }

    /// Recovers dead towers in `towers` for one event.
    pub fn run_one_cycle(&mut self, towers: &mut TowerContainer) -> Result<RecoveryStats, RecoveryError> {
        if self.aborted {
            return Err(RecoveryError::RunAborted);
        }
        self.cycles += 1;

        let stats = match &self.dead_map {
            Some(dead_map) => match interpolator::interpolate(dead_map, &self.geometry, towers) {
                Ok(stats) => stats,
                Err(err) => {
                    tracing::error!(detector = %self.detector, cycle = self.cycles, error = %err, "aborting run");
                    self.aborted = true;
                    return Err(err);
                }
            },
            None => {
                if !self.missing_dead_map_reported {
                    self.missing_dead_map_reported = true;
                    tracing::info!(detector = %self.detector, "missing dead map, doing nothing");
                }
                RecoveryStats::default()
            }
        };

        tracing::debug!(
            detector = %self.detector,
            cycle = self.cycles,
            recovery_energy = stats.recovered_energy,
            recovered_towers = stats.recovered_towers,
            output_sum_energy = towers.total_energy(),
            "cycle complete"
        );
        Ok(stats)
    }

    /// Replaces the dead map for subsequent cycles. `None` switches to degraded mode.
    pub fn set_dead_map(&mut self, dead_map: Option<DeadTowerMap>) {
        self.dead_map = dead_map;
    }

    pub fn detector(&self) -> &str {
        &self.detector
    }

    pub fn geometry(&self) -> &GeometryContainer {
        &self.geometry
    }

    pub fn dead_map(&self) -> Option<&DeadTowerMap> {
        self.dead_map.as_ref()
    }

    pub fn has_dead_map(&self) -> bool {
        self.dead_map.is_some()
    }

    pub fn missing_dead_map_reported(&self) -> bool {
        self.missing_dead_map_reported
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }
}
