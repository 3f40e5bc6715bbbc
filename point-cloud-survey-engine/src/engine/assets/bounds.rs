use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// 3D spatial bounds defining scene extents in world coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundsData {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
    pub min_z: f64,
    pub max_z: f64,
}

/// Point cloud bounds metadata loaded alongside the scene textures.
#[derive(Resource, Debug, Clone, Serialize, Deserialize, Asset, TypePath)]
pub struct PointCloudBounds {
    pub bounds: BoundsData,
    pub total_points: usize,
    pub loaded_points: usize,
    pub texture_size: u32,
}

impl PointCloudBounds {
    /// Calculate center point for camera positioning and scene navigation.
    pub fn center(&self) -> Vec3 {
        Vec3::new(
            ((self.bounds.max_x + self.bounds.min_x) * 0.5) as f32,
            ((self.bounds.max_y + self.bounds.min_y) * 0.5) as f32,
            ((self.bounds.max_z + self.bounds.min_z) * 0.5) as f32,
        )
    }

    /// Calculate size dimensions for sampling and fallback calculations.
    pub fn size(&self) -> Vec3 {
        Vec3::new(
            (self.bounds.max_x - self.bounds.min_x) as f32,
            (self.bounds.max_y - self.bounds.min_y) as f32,
            (self.bounds.max_z - self.bounds.min_z) as f32,
        )
    }

    /// Get ground height for camera collision and fallback intersections.
    pub fn ground_height(&self) -> f32 {
        self.bounds.min_y as f32
    }

    /// Radius of the bounding sphere enclosing the cloud. Used as the depth
    /// reference when a rectangle corner has no sampled geometry under it.
    pub fn bounding_radius(&self) -> f32 {
        self.size().length() * 0.5
    }

    pub fn min_y(&self) -> f64 {
        self.bounds.min_y
    }
    pub fn max_y(&self) -> f64 {
        self.bounds.max_y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> PointCloudBounds {
        PointCloudBounds {
            bounds: BoundsData {
                min_x: -10.0,
                max_x: 30.0,
                min_y: 0.0,
                max_y: 8.0,
                min_z: -5.0,
                max_z: 5.0,
            },
            total_points: 1_000,
            loaded_points: 1_000,
            texture_size: 64,
        }
    }

    #[test]
    fn center_and_size() {
        let b = bounds();
        assert_eq!(b.center(), Vec3::new(10.0, 4.0, 0.0));
        assert_eq!(b.size(), Vec3::new(40.0, 8.0, 10.0));
    }

    #[test]
    fn bounding_radius_encloses_the_extents() {
        let b = bounds();
        let radius = b.bounding_radius();
        assert!((radius - Vec3::new(40.0, 8.0, 10.0).length() * 0.5).abs() < 1e-6);
    }
}
