// THEORY:
// The `interpolator` is the engine of the recovery layer. For every tower in the
// dead map it estimates the missing energy as the plain average of its live
// neighbors on the detector grid, and writes that estimate back into the tower
// store.
//
// Algorithm, per dead tower in ascending key order:
// 1.  **Resolve**: Look the key up in the geometry. A dead tower the geometry does
//     not know is a corrupt dead map, and the whole run stops.
// 2.  **Neighborhood**: Visit the eight surrounding bins. Both axes are periodic, so
//     an index that runs off one edge is folded back onto the other with a single
//     add or subtract of the bin count.
// 3.  **Selection**: A neighbor contributes only if it is not dead AND the store
//     holds a measurement for it. These are separate conditions.
// 4.  **Recovery**: With at least one contributor, the mean is stored for the dead
//     tower (insert or overwrite) and counted in the cycle's `RecoveryStats`. With
//     none, the tower is left alone.
//
// Towers are processed one after another against the same store. A dead neighbor
// is always skipped by step 3, so a value recovered earlier in the pass is only
// ever read back once the dead map no longer flags that tower.
//
// Like the other stateless utilities, the `interpolator` keeps no memory between
// calls. Reporting and error latching belong to the `RecoveryPipeline`.

use crate::core_modules::dead_map::DeadTowerMap;
use crate::core_modules::geometry::{GeometryContainer, GridCoord};
use crate::core_modules::tower_container::TowerContainer;
use crate::error::RecoveryError;

/// Summary of one recovery pass.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RecoveryStats {
    /// Sum of every value written for a dead tower.
    pub recovered_energy: f64,
    /// Number of dead towers that received a value.
    pub recovered_towers: usize,
}

pub mod interpolator {
    use super::*;

    /// The eight neighbors of a bin as (eta, phi) offsets.
    pub const NEIGHBOR_OFFSETS: [(i64, i64); 8] = [
        (1, 0),
        (1, 1),
        (0, 1),
        (-1, 1),
        (-1, 0),
        (-1, -1),
        (0, -1),
        (1, -1),
    ];

    /// Fills every dead tower that has at least one usable neighbor.
    /// All three inputs must describe the same calorimeter. On error the store may
    /// already hold values for towers processed earlier in the pass, but no stats
    /// are returned.
    pub fn interpolate(
        dead_map: &DeadTowerMap,
        geometry: &GeometryContainer,
        towers: &mut TowerContainer,
    ) -> Result<RecoveryStats, RecoveryError> {
        if dead_map.calo_id() != geometry.calo_id() || towers.calo_id() != geometry.calo_id() {
            return Err(RecoveryError::CaloMismatch {
                dead_map: dead_map.calo_id(),
                geometry: geometry.calo_id(),
                towers: towers.calo_id(),
            });
        }

        let eta_bins = geometry.eta_bins();
        let phi_bins = geometry.phi_bins();
        let mut stats = RecoveryStats::default();

        for &key in dead_map.dead_towers() {
            let coord = geometry
                .coordinate_of(key)
                .ok_or(RecoveryError::UnknownDeadTower { key })?;

            // Inclusive upper bound. `bineta == eta_bins` is accepted and folded to
            // bin 0 by the wrap below.
            if coord.bineta > eta_bins || coord.binphi > phi_bins {
                return Err(RecoveryError::BinOutOfRange {
                    bineta: coord.bineta,
                    binphi: coord.binphi,
                    eta_bins,
                    phi_bins,
                });
            }

            match average_live_neighbors(coord, dead_map, geometry, towers) {
                Some(energy) => {
                    towers.set(key, energy);
                    stats.recovered_energy += energy;
                    stats.recovered_towers += 1;
                    tracing::trace!(
                        key,
                        bineta = coord.bineta,
                        binphi = coord.binphi,
                        energy,
                        "recovered dead tower"
                    );
                }
                None => {
                    tracing::trace!(
                        key,
                        bineta = coord.bineta,
                        binphi = coord.binphi,
                        "no neighbor towers found"
                    );
                }
            }
        }

        Ok(stats)
    }

    /// Mean energy of the live, measured neighbors of `coord`.
    fn average_live_neighbors(
        coord: GridCoord,
        dead_map: &DeadTowerMap,
        geometry: &GeometryContainer,
        towers: &TowerContainer,
    ) -> Option<f64> {
        let eta_bins = geometry.eta_bins() as i64;
        let phi_bins = geometry.phi_bins() as i64;

        let mut sum = 0.0;
        let mut n_neighbor = 0usize;
        for (deta, dphi) in NEIGHBOR_OFFSETS {
            let ieta = wrap_index(coord.bineta as i64 + deta, eta_bins);
            let iphi = wrap_index(coord.binphi as i64 + dphi, phi_bins);
            let neighbor = GridCoord::new(ieta as u32, iphi as u32);

            if dead_map.is_dead(neighbor) {
                continue;
            }
            let Some(energy) = towers.get_at(neighbor) else {
                continue;
            };

            tracing::trace!(ieta, iphi, energy, "neighbor");
            sum += energy;
            n_neighbor += 1;
        }

        (n_neighbor > 0).then(|| sum / n_neighbor as f64)
    }

    /// Folds an index that is at most one bin count out of range back onto the
    /// axis. A single correction per direction, not a modulo.
    pub fn wrap_index(index: i64, bins: i64) -> i64 {
        let mut index = index;
        if index >= bins {
            index -= bins;
        }
        if index < 0 {
            index += bins;
        }
        index
    }
}
