// Renders a tower store as a PNG heatmap, one pixel per grid bin. Eta runs along
// the x axis and phi along y. Gray level is energy relative to the hottest tower;
// dead towers are tinted red so recovered values stand out.

use crate::core_modules::dead_map::DeadTowerMap;
use crate::core_modules::geometry::{GeometryContainer, GridCoord};
use crate::core_modules::tower_container::TowerContainer;
use crate::error::RecoveryError;
use image::ImageEncoder;
use std::path::Path;

const CHANNELS: usize = 4;

/// Builds the RGBA buffer for `save_heatmap`.
pub fn render_heatmap(
    towers: &TowerContainer,
    geometry: &GeometryContainer,
    dead_map: Option<&DeadTowerMap>,
) -> Vec<u8> {
    let width = geometry.eta_bins() as usize;
    let height = geometry.phi_bins() as usize;
    let mut buffer = vec![0u8; width * height * CHANNELS];

    let max_energy = towers.iter().map(|(_, energy)| energy).fold(0.0_f64, f64::max);

    for binphi in 0..height {
        for bineta in 0..width {
            let coord = GridCoord::new(bineta as u32, binphi as u32);
            let energy = towers.get_at(coord).unwrap_or(0.0);
            let intensity = if max_energy > 0.0 {
                ((energy.max(0.0) / max_energy) * 255.0).round() as u8
            } else {
                0
            };

            let offset = (binphi * width + bineta) * CHANNELS;
            let pixel = &mut buffer[offset..offset + CHANNELS];
            if dead_map.is_some_and(|dead_map| dead_map.is_dead(coord)) {
                pixel.copy_from_slice(&[255, intensity / 2, intensity / 2, 255]);
            } else {
                pixel.copy_from_slice(&[intensity, intensity, intensity, 255]);
            }
        }
    }

    buffer
}

/// Writes the heatmap of `towers` to `path` as a PNG.
pub fn save_heatmap(
    path: impl AsRef<Path>,
    towers: &TowerContainer,
    geometry: &GeometryContainer,
    dead_map: Option<&DeadTowerMap>,
) -> Result<(), RecoveryError> {
    let buffer = render_heatmap(towers, geometry, dead_map);
    let output = std::fs::File::create(path)?;
    let encoder = image::codecs::png::PngEncoder::new(output);

    encoder.write_image(
        &buffer,
        geometry.eta_bins(),
        geometry.phi_bins(),
        image::ExtendedColorType::Rgba8,
    )?;

    Ok(())
}
