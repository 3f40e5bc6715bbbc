/// Heightmap sampling utilities for terrain intersection
use crate::engine::assets::bounds::PointCloudBounds;
use bevy::prelude::*;

/// Sample heightmap at normalised coordinates with bilinear interpolation.
/// Returns `None` when the image has no CPU-side data to sample.
pub fn sample_heightmap_bilinear(
    heightmap_image: &Image,
    norm_x: f32,
    norm_z: f32,
    bounds: &PointCloudBounds,
) -> Option<f32> {
    let data = heightmap_image.data.as_ref()?;
    let width = heightmap_image.width() as usize;
    let height = heightmap_image.height() as usize;
    if width == 0 || height == 0 {
        return None;
    }

    // Convert normalized coords to continuous pixel space
    let pixel_x_f = norm_x * (width - 1) as f32;
    let pixel_z_f = norm_z * (height - 1) as f32;

    let x0 = pixel_x_f.floor() as usize;
    let z0 = pixel_z_f.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let z1 = (z0 + 1).min(height - 1);

    let wx = pixel_x_f - x0 as f32;
    let wz = pixel_z_f - z0 as f32;

    // Sample four corners
    let h00 = sample_height_at_pixel(data, x0, z0, width, height);
    let h10 = sample_height_at_pixel(data, x1, z0, width, height);
    let h01 = sample_height_at_pixel(data, x0, z1, width, height);
    let h11 = sample_height_at_pixel(data, x1, z1, width, height);

    // Bilinear interpolation
    let h_top = h00 * (1.0 - wx) + h10 * wx;
    let h_bottom = h01 * (1.0 - wx) + h11 * wx;
    let normalized_height = h_top * (1.0 - wz) + h_bottom * wz;

    // Denormalise to world coordinates
    Some(bounds.min_y() as f32 + normalized_height * (bounds.max_y() - bounds.min_y()) as f32)
}

/// Sample height at specific pixel coordinates (R32F, one f32 per texel).
fn sample_height_at_pixel(data: &[u8], x: usize, z: usize, width: usize, height: usize) -> f32 {
    if x >= width || z >= height {
        return 0.0;
    }

    let pixel_index = (z * width + x) * 4; // 4 bytes per f32
    if pixel_index + 4 > data.len() {
        return 0.0;
    }

    let height_bytes = &data[pixel_index..pixel_index + 4];
    f32::from_le_bytes([
        height_bytes[0],
        height_bytes[1],
        height_bytes[2],
        height_bytes[3],
    ])
}
