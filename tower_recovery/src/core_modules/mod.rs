pub mod dead_map;
pub mod geometry;
pub mod interpolator;
pub mod tower_container;
pub mod tower_key;
pub mod utils;
