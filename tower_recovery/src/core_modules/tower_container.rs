// THEORY:
// The `TowerContainer` is the per-cycle readings store: a sparse map from tower key
// to calibrated energy. It is owned by the caller and handed to the pipeline by
// mutable reference for the duration of one cycle.
//
// Absence of an entry means "nothing measured here this cycle". It says nothing
// about whether the tower is dead; the dead map answers that.

use crate::core_modules::geometry::GridCoord;
use crate::core_modules::tower_key::{TowerKey, encode_tower_key};
use crate::error::RecoveryError;
use std::collections::BTreeMap;

/// Sparse store of tower energies for one calorimeter and one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TowerContainer {
    calo_id: u8,
    towers: BTreeMap<TowerKey, f64>,
}

impl TowerContainer {
    pub fn new(calo_id: u8) -> Self {
        Self {
            calo_id,
            towers: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: TowerKey) -> Option<f64> {
        self.towers.get(&key).copied()
    }

    pub fn get_at(&self, coord: GridCoord) -> Option<f64> {
        self.get(self.key_of(coord).ok()?)
    }

    /// Inserts or overwrites the energy for `key`.
    pub fn set(&mut self, key: TowerKey, energy: f64) {
        self.towers.insert(key, energy);
    }

    pub fn set_at(&mut self, coord: GridCoord, energy: f64) -> Result<TowerKey, RecoveryError> {
        let key = self.key_of(coord)?;
        self.set(key, energy);
        Ok(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (TowerKey, f64)> + '_ {
        self.towers.iter().map(|(key, energy)| (*key, *energy))
    }

    /// Sum of every stored energy.
    pub fn total_energy(&self) -> f64 {
        self.towers.values().sum()
    }

    pub fn calo_id(&self) -> u8 {
        self.calo_id
    }

    pub fn len(&self) -> usize {
        self.towers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.towers.is_empty()
    }

    fn key_of(&self, coord: GridCoord) -> Result<TowerKey, RecoveryError> {
        encode_tower_key(self.calo_id, coord.bineta, coord.binphi)
    }
}
