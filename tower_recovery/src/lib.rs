// THEORY:
// This file is the entry point for the `tower_recovery` library crate. It exposes
// the `RecoveryPipeline` (one detector, one cycle at a time), the multi-detector
// `DetectorPool`, and the container types a caller fills each cycle.
//
// The interpolation itself lives in `core_modules::interpolator` and only sees
// typed handles: a geometry, a dead map, and the mutable tower store. Everything
// that locates those inputs (config files, event streams) stays outside the core.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use error::RecoveryError;
