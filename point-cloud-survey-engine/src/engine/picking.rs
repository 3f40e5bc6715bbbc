use crate::engine::assets::bounds::PointCloudBounds;
use crate::engine::scene::heightmap::sample_heightmap_bilinear;
use bevy::prelude::*;

/// Scene-side picking contract the survey tools resolve points through.
///
/// Point-cloud surfaces are sparse: any of these can fail at a screen
/// position with no sampled geometry underneath it, and callers treat every
/// failure as "no result at that sample" rather than an error.
pub trait SceneQuery {
    /// Size of the visible canvas in pixels. Samples outside it are skipped.
    fn viewport_size(&self) -> Vec2;

    /// Exact-pixel world position, if renderable geometry is sampled there.
    fn pick_exact(&self, screen: Vec2) -> Option<Vec3>;

    /// Topmost object under the pixel, used to filter target-only picks.
    fn pick_object(&self, screen: Vec2) -> Option<Entity>;

    /// Camera ray through the pixel.
    fn cast_ray(&self, screen: Vec2) -> Option<Ray3d>;

    /// Ray intersection with the terrain surface.
    fn intersect_terrain(&self, ray: &Ray3d) -> Option<Vec3>;

    /// Projection onto the reference surface, the final fallback tier.
    fn project_onto_ellipsoid(&self, screen: Vec2) -> Option<Vec3>;
}

/// `SceneQuery` backed by the viewport camera and the target's heightmap.
///
/// Borrowed fresh inside each input system; holds no state across frames.
pub struct CameraSceneQuery<'a> {
    pub camera: &'a Camera,
    pub camera_transform: &'a GlobalTransform,
    pub window_size: Vec2,
    pub heightmap: Option<&'a Image>,
    pub bounds: &'a PointCloudBounds,
    pub target: Entity,
    /// Camera height above ground, drives the raymarch step size.
    pub view_height: f32,
}

impl SceneQuery for CameraSceneQuery<'_> {
    fn viewport_size(&self) -> Vec2 {
        self.window_size
    }

    fn pick_exact(&self, screen: Vec2) -> Option<Vec3> {
        let ray = self.cast_ray(screen)?;
        let heightmap = self.heightmap?;
        raymarch_heightmap(&ray, heightmap, self.bounds, self.view_height)
    }

    fn pick_object(&self, screen: Vec2) -> Option<Entity> {
        // The bound cloud is the only pickable object in the scene; a hit
        // inside its footprint is a hit on the target.
        self.pick_exact(screen).map(|_| self.target)
    }

    fn cast_ray(&self, screen: Vec2) -> Option<Ray3d> {
        self.camera
            .viewport_to_world(self.camera_transform, screen)
            .ok()
    }

    fn intersect_terrain(&self, ray: &Ray3d) -> Option<Vec3> {
        intersect_plane(ray, self.bounds.ground_height())
    }

    fn project_onto_ellipsoid(&self, screen: Vec2) -> Option<Vec3> {
        // The local frame's reference surface is the plane through the
        // geodetic origin, y = 0 in engine coordinates.
        let ray = self.cast_ray(screen)?;
        intersect_plane(&ray, 0.0)
    }
}

/// March a ray against the heightmap with adaptive steps, refining the
/// crossing with a short binary search. Returns `None` when the ray leaves
/// the footprint without crossing the surface.
pub fn raymarch_heightmap(
    ray: &Ray3d,
    heightmap: &Image,
    bounds: &PointCloudBounds,
    view_height: f32,
) -> Option<Vec3> {
    let base_step = (view_height * 0.01).clamp(0.1, 2.0);
    let max_distance = view_height * 3.0;
    let mut t = 0.0;
    let mut last_height_diff = f32::INFINITY;

    while t < max_distance {
        let test_point = ray.origin + *ray.direction * t;

        if let Some((norm_x, norm_z)) = normalised_footprint(test_point, bounds) {
            let terrain_height = sample_heightmap_bilinear(heightmap, norm_x, norm_z, bounds)?;
            let height_diff = test_point.y - terrain_height;

            if height_diff <= 0.0 {
                // Crossed the surface; refine between the last two samples.
                if last_height_diff.is_finite() && last_height_diff > 0.0 {
                    let refined_t =
                        binary_search_crossing(ray, t - base_step, t, heightmap, bounds, 5);
                    let p = ray.origin + *ray.direction * refined_t;
                    let (nx, nz) = normalised_footprint(p, bounds)?;
                    let h = sample_heightmap_bilinear(heightmap, nx, nz, bounds)?;
                    return Some(Vec3::new(p.x, h, p.z));
                }
                return Some(Vec3::new(test_point.x, terrain_height, test_point.z));
            }
            last_height_diff = height_diff;
        }

        // Finer steps once the ray closes in on the surface.
        let step = if last_height_diff.is_finite() && last_height_diff < base_step * 2.0 {
            base_step * 0.1
        } else {
            base_step
        };
        t += step;
    }

    None
}

fn binary_search_crossing(
    ray: &Ray3d,
    t_start: f32,
    t_end: f32,
    heightmap: &Image,
    bounds: &PointCloudBounds,
    iterations: usize,
) -> f32 {
    let mut low = t_start;
    let mut high = t_end;

    for _ in 0..iterations {
        let mid = (low + high) * 0.5;
        let test_point = ray.origin + *ray.direction * mid;

        if let Some((nx, nz)) = normalised_footprint(test_point, bounds) {
            if let Some(terrain_height) = sample_heightmap_bilinear(heightmap, nx, nz, bounds) {
                if test_point.y > terrain_height {
                    low = mid;
                } else {
                    high = mid;
                }
            }
        }
    }

    (low + high) * 0.5
}

fn normalised_footprint(point: Vec3, bounds: &PointCloudBounds) -> Option<(f32, f32)> {
    let norm_x = (point.x as f64 - bounds.bounds.min_x) / (bounds.bounds.max_x - bounds.bounds.min_x);
    let norm_z = (point.z as f64 - bounds.bounds.min_z) / (bounds.bounds.max_z - bounds.bounds.min_z);

    if (0.0..=1.0).contains(&norm_x) && (0.0..=1.0).contains(&norm_z) {
        Some((norm_x as f32, norm_z as f32))
    } else {
        None
    }
}

fn intersect_plane(ray: &Ray3d, plane_y: f32) -> Option<Vec3> {
    if ray.direction.y.abs() < 0.001 {
        return None;
    }
    let t = (plane_y - ray.origin.y) / ray.direction.y;
    if t > 0.0 {
        Some(ray.origin + *ray.direction * t)
    } else {
        None
    }
}
