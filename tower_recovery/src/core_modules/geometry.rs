// THEORY:
// The `geometry` module describes where towers sit. It answers two questions for
// the interpolator: "which grid bin does this key occupy?" and "which key lives at
// this grid bin?". It does not know anything about energies or dead status.
//
// Key architectural principles:
// 1.  **Sparse Registry**: A `GeometryContainer` only knows the towers that were
//     registered with it. Looking up an unregistered key returns `None`, which is
//     how a dead map that references a non-existent tower gets caught.
// 2.  **Fixed Shape**: The `GridShape` is set at construction and never changes for
//     the lifetime of the container. Both axes wrap at their bin count.
// 3.  **Key Codec**: Coordinates and keys are converted with `tower_key`, using the
//     container's calorimeter id.

use crate::core_modules::tower_key::{MAX_INDEX, TowerKey, encode_tower_key, pack};
use crate::error::RecoveryError;
use std::collections::BTreeMap;

/// A position on the detector grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    /// Index along the eta axis.
    pub bineta: u32,
    /// Index along the phi axis.
    pub binphi: u32,
}

impl GridCoord {
    pub fn new(bineta: u32, binphi: u32) -> Self {
        Self { bineta, binphi }
    }
}

/// Number of bins along each axis of a toroidal grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    eta_bins: u32,
    phi_bins: u32,
}

impl GridShape {
    /// Both axes need at least one bin and must fit the 12-bit key fields.
    pub fn new(eta_bins: u32, phi_bins: u32) -> Result<Self, RecoveryError> {
        if eta_bins == 0 || phi_bins == 0 {
            return Err(RecoveryError::EmptyGrid { eta_bins, phi_bins });
        }
        if eta_bins > MAX_INDEX || phi_bins > MAX_INDEX {
            return Err(RecoveryError::GridTooLarge {
                eta_bins,
                phi_bins,
                max: MAX_INDEX,
            });
        }
        Ok(Self { eta_bins, phi_bins })
    }

    pub fn eta_bins(&self) -> u32 {
        self.eta_bins
    }

    pub fn phi_bins(&self) -> u32 {
        self.phi_bins
    }

    pub fn num_towers(&self) -> usize {
        self.eta_bins as usize * self.phi_bins as usize
    }

    /// Whether `coord` is a bin of this grid (strict bounds on both axes).
    pub fn contains(&self, coord: GridCoord) -> bool {
        coord.bineta < self.eta_bins && coord.binphi < self.phi_bins
    }
}

/// Registry of tower positions for one calorimeter.
#[derive(Debug, Clone)]
pub struct GeometryContainer {
    calo_id: u8,
    shape: GridShape,
    towers: BTreeMap<TowerKey, GridCoord>,
}

impl GeometryContainer {
    /// Creates an empty geometry. Towers must be registered with `add_tower`.
    pub fn new(calo_id: u8, shape: GridShape) -> Self {
        Self {
            calo_id,
            shape,
            towers: BTreeMap::new(),
        }
    }

    /// Creates a geometry with every bin of the grid registered.
    pub fn full_grid(calo_id: u8, shape: GridShape) -> Self {
        let mut geometry = Self::new(calo_id, shape);
        // `GridShape` caps both axes at `MAX_INDEX`, so every bin packs.
        for bineta in 0..shape.eta_bins() {
            for binphi in 0..shape.phi_bins() {
                let key = pack(calo_id, bineta, binphi);
                geometry.towers.insert(key, GridCoord::new(bineta, binphi));
            }
        }
        geometry
    }

    /// Registers a tower at `coord` and returns its key.
    pub fn add_tower(&mut self, coord: GridCoord) -> Result<TowerKey, RecoveryError> {
        let key = self.key_at(coord)?;
        self.towers.insert(key, coord);
        Ok(key)
    }

    pub fn calo_id(&self) -> u8 {
        self.calo_id
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn eta_bins(&self) -> u32 {
        self.shape.eta_bins()
    }

    pub fn phi_bins(&self) -> u32 {
        self.shape.phi_bins()
    }

    pub fn num_towers(&self) -> usize {
        self.towers.len()
    }

    /// Grid position of a registered tower, `None` for unknown keys.
    pub fn coordinate_of(&self, key: TowerKey) -> Option<GridCoord> {
        self.towers.get(&key).copied()
    }

    /// Key of the tower at `coord`, whether or not it is registered.
    pub fn key_at(&self, coord: GridCoord) -> Result<TowerKey, RecoveryError> {
        encode_tower_key(self.calo_id, coord.bineta, coord.binphi)
    }

    pub fn identify(&self) {
        tracing::info!(
            calo_id = self.calo_id,
            eta_bins = self.eta_bins(),
            phi_bins = self.phi_bins(),
            towers = self.towers.len(),
            "tower geometry"
        );
    }
}
