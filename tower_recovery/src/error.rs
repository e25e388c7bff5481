//! Error types for dead tower recovery

use crate::core_modules::tower_key::TowerKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("tower geometry missing for detector {detector}")]
    MissingGeometry { detector: String },

    #[error("invalid dead tower ID {key:#010x}")]
    UnknownDeadTower { key: TowerKey },

    #[error("tower bin ({bineta}, {binphi}) outside grid {eta_bins}x{phi_bins}")]
    BinOutOfRange {
        bineta: u32,
        binphi: u32,
        eta_bins: u32,
        phi_bins: u32,
    },

    #[error("tower index ({bineta}, {binphi}) does not fit a key, max {max} per axis")]
    IndexOverflow { bineta: u32, binphi: u32, max: u32 },

    #[error("calorimeter mismatch: dead map {dead_map}, geometry {geometry}, towers {towers}")]
    CaloMismatch { dead_map: u8, geometry: u8, towers: u8 },

    #[error("grid needs at least one bin per axis, got {eta_bins}x{phi_bins}")]
    EmptyGrid { eta_bins: u32, phi_bins: u32 },

    #[error("grid {eta_bins}x{phi_bins} exceeds {max} bins per axis")]
    GridTooLarge { eta_bins: u32, phi_bins: u32, max: u32 },

    #[error("run aborted by an earlier fatal error")]
    RunAborted,

    #[error("unknown detector: {0}")]
    UnknownDetector(String),

    #[error("detector actor for {0} is gone")]
    ActorGone(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
