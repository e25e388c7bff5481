// THEORY:
// The `DeadTowerMap` is the per-run list of towers flagged non-functional by an
// upstream classification step. It is a read-only input to the interpolator: the
// interpolator walks it to find towers to fill and queries it to exclude dead
// neighbors from the average.
//
// Membership is kept in a `BTreeSet`, so walking the map always visits towers in
// ascending key order. Two runs over the same inputs therefore fill towers in the
// same sequence.

use crate::core_modules::geometry::GridCoord;
use crate::core_modules::tower_key::{TowerKey, encode_tower_key};
use crate::error::RecoveryError;
use std::collections::BTreeSet;

/// Set of dead towers for one calorimeter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadTowerMap {
    calo_id: u8,
    dead_towers: BTreeSet<TowerKey>,
}

impl DeadTowerMap {
    pub fn new(calo_id: u8) -> Self {
        Self {
            calo_id,
            dead_towers: BTreeSet::new(),
        }
    }

    /// Flags the tower at `coord` as dead and returns its key.
    pub fn add_dead_tower(&mut self, coord: GridCoord) -> Result<TowerKey, RecoveryError> {
        let key = encode_tower_key(self.calo_id, coord.bineta, coord.binphi)?;
        self.dead_towers.insert(key);
        Ok(key)
    }

    /// Flags a tower by key. The key is not checked against any geometry.
    pub fn add_dead_key(&mut self, key: TowerKey) {
        self.dead_towers.insert(key);
    }

    pub fn dead_towers(&self) -> &BTreeSet<TowerKey> {
        &self.dead_towers
    }

    pub fn is_dead_tower(&self, key: TowerKey) -> bool {
        self.dead_towers.contains(&key)
    }

    /// A coordinate that cannot be encoded was never flagged, so it is not dead.
    pub fn is_dead(&self, coord: GridCoord) -> bool {
        encode_tower_key(self.calo_id, coord.bineta, coord.binphi).is_ok_and(|key| self.is_dead_tower(key))
    }

    pub fn calo_id(&self) -> u8 {
        self.calo_id
    }

    pub fn len(&self) -> usize {
        self.dead_towers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dead_towers.is_empty()
    }

    pub fn identify(&self) {
        tracing::info!(calo_id = self.calo_id, dead_towers = self.len(), "dead tower map");
    }
}
