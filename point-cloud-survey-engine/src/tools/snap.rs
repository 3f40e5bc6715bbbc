use crate::engine::picking::SceneQuery;
use bevy::prelude::*;
use constants::render_settings::{
    SNAP_RADIUS_DEFAULT_PX, SNAP_RADIUS_MAX_PX, SNAP_RADIUS_MIN_PX, SNAP_SAMPLE_STEP_PX,
};

/// User-facing snap configuration.
#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct SnapSettings {
    pub enabled: bool,
    pub radius_px: f32,
    /// Only accept neighbourhood hits that belong to the survey target.
    pub target_only: bool,
}

impl Default for SnapSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_px: SNAP_RADIUS_DEFAULT_PX,
            target_only: false,
        }
    }
}

impl SnapSettings {
    pub fn set_radius(&mut self, radius_px: f32) {
        self.radius_px = radius_px.clamp(SNAP_RADIUS_MIN_PX, SNAP_RADIUS_MAX_PX);
    }
}

/// Outcome of a screen-to-world resolution.
///
/// `snapped` is true when the point came from a neighbourhood sample rather
/// than an exact hit under the cursor. Consumed immediately; the only value
/// kept past the event is the measurement session's short-lived fallback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapResult {
    pub world: Vec3,
    pub screen: Vec2,
    pub snapped: bool,
}

/// Deterministic sample offsets covering the disc of `radius_px`.
///
/// Center first, then the axis cross at increasing radii, then 8-direction
/// rings at increasing radii. The fixed order is load-bearing: ties between
/// equally distant hits resolve to the earlier offset.
pub fn sample_offsets(radius_px: f32, step_px: f32) -> Vec<Vec2> {
    let mut offsets = vec![Vec2::ZERO];
    if step_px <= 0.0 {
        return offsets;
    }
    let rings = (radius_px / step_px).floor() as i32;

    for i in 1..=rings {
        let r = i as f32 * step_px;
        offsets.push(Vec2::new(r, 0.0));
        offsets.push(Vec2::new(-r, 0.0));
        offsets.push(Vec2::new(0.0, r));
        offsets.push(Vec2::new(0.0, -r));
    }

    for i in 1..=rings {
        let r = i as f32 * step_px;
        for k in 0..8 {
            // Axis directions are already covered by the cross pass.
            if k % 2 == 0 {
                continue;
            }
            let angle = k as f32 * std::f32::consts::FRAC_PI_4;
            offsets.push(Vec2::new(r * angle.cos(), r * angle.sin()));
        }
    }

    offsets
}

/// Resolve a screen coordinate into the best-available world point.
///
/// Tier order: neighbourhood scan honouring the target filter, then an
/// unfiltered exact pick, then the camera ray against the terrain, then the
/// ellipsoid projection. Returns `None` only when every tier fails.
pub fn resolve(
    query: &dyn SceneQuery,
    screen: Vec2,
    settings: &SnapSettings,
    target: Option<Entity>,
) -> Option<SnapResult> {
    let viewport = query.viewport_size();
    let in_viewport =
        |p: Vec2| p.x >= 0.0 && p.y >= 0.0 && p.x <= viewport.x && p.y <= viewport.y;

    if settings.enabled {
        let mut best: Option<(f32, Vec3, Vec2)> = None;

        for offset in sample_offsets(settings.radius_px, SNAP_SAMPLE_STEP_PX) {
            let sample = screen + offset;
            if !in_viewport(sample) {
                continue;
            }
            let Some(world) = query.pick_exact(sample) else {
                continue;
            };
            if let Some(target) = target {
                if query.pick_object(sample) != Some(target) {
                    continue;
                }
            }

            let dist_sq = offset.length_squared();
            if dist_sq == 0.0 {
                // Exact hit under the cursor short-circuits the scan.
                return Some(SnapResult {
                    world,
                    screen: sample,
                    snapped: false,
                });
            }
            // Strict comparison keeps the earliest sample on ties.
            if best.is_none_or(|(best_sq, _, _)| dist_sq < best_sq) {
                best = Some((dist_sq, world, sample));
            }
        }

        if let Some((_, world, sample)) = best {
            return Some(SnapResult {
                world,
                screen: sample,
                snapped: true,
            });
        }
    }

    // Unfiltered single pick at the exact coordinate.
    if let Some(world) = query.pick_exact(screen) {
        return Some(SnapResult {
            world,
            screen,
            snapped: false,
        });
    }

    // Camera ray against the terrain surface.
    if let Some(ray) = query.cast_ray(screen) {
        if let Some(world) = query.intersect_terrain(&ray) {
            return Some(SnapResult {
                world,
                screen,
                snapped: false,
            });
        }
    }

    // Reference surface projection as the last tier.
    query.project_onto_ellipsoid(screen).map(|world| SnapResult {
        world,
        screen,
        snapped: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scene stub: hits are registered per screen position with a half-pixel
    /// match tolerance, terrain and ellipsoid tiers are optional planes.
    struct StubScene {
        viewport: Vec2,
        hits: Vec<(Vec2, Vec3, u32)>,
        terrain: Option<Vec3>,
        ellipsoid: Option<Vec3>,
        target_index: u32,
    }

    impl StubScene {
        fn new() -> Self {
            Self {
                viewport: Vec2::new(800.0, 600.0),
                hits: Vec::new(),
                terrain: None,
                ellipsoid: None,
                target_index: 1,
            }
        }

        fn with_hit(mut self, screen: Vec2, world: Vec3) -> Self {
            self.hits.push((screen, world, self.target_index));
            self
        }

        fn with_foreign_hit(mut self, screen: Vec2, world: Vec3) -> Self {
            self.hits.push((screen, world, 99));
            self
        }

        fn hit_at(&self, screen: Vec2) -> Option<&(Vec2, Vec3, u32)> {
            self.hits
                .iter()
                .find(|(pos, _, _)| pos.distance(screen) < 0.5)
        }
    }

    impl SceneQuery for StubScene {
        fn viewport_size(&self) -> Vec2 {
            self.viewport
        }
        fn pick_exact(&self, screen: Vec2) -> Option<Vec3> {
            self.hit_at(screen).map(|(_, world, _)| *world)
        }
        fn pick_object(&self, screen: Vec2) -> Option<Entity> {
            self.hit_at(screen)
                .map(|(_, _, index)| Entity::from_raw(*index))
        }
        fn cast_ray(&self, screen: Vec2) -> Option<Ray3d> {
            Some(Ray3d::new(
                Vec3::new(screen.x, 100.0, screen.y),
                Dir3::NEG_Y,
            ))
        }
        fn intersect_terrain(&self, _ray: &Ray3d) -> Option<Vec3> {
            self.terrain
        }
        fn project_onto_ellipsoid(&self, _screen: Vec2) -> Option<Vec3> {
            self.ellipsoid
        }
    }

    fn settings() -> SnapSettings {
        SnapSettings {
            enabled: true,
            radius_px: 8.0,
            target_only: false,
        }
    }

    fn target() -> Entity {
        Entity::from_raw(1)
    }

    #[test]
    fn offsets_start_at_center_cross_before_ring() {
        let offsets = sample_offsets(8.0, 4.0);
        assert_eq!(offsets[0], Vec2::ZERO);
        // Cross pass: two radii of four axis offsets each.
        assert_eq!(offsets[1], Vec2::new(4.0, 0.0));
        assert_eq!(offsets[4], Vec2::new(0.0, -4.0));
        assert_eq!(offsets[5], Vec2::new(8.0, 0.0));
        // Ring pass starts after the cross pass, diagonals only.
        assert_eq!(offsets.len(), 1 + 8 + 8);
        let first_ring = offsets[9];
        assert!((first_ring.length() - 4.0).abs() < 1e-4);
        assert!(first_ring.x.abs() > 0.1 && first_ring.y.abs() > 0.1);
    }

    #[test]
    fn offsets_radii_increase_within_each_pass() {
        let offsets = sample_offsets(12.0, 4.0);
        let cross: Vec<f32> = offsets[1..13].iter().map(|o| o.length()).collect();
        assert!(cross.windows(2).all(|w| w[1] >= w[0] - 1e-4));
        let ring: Vec<f32> = offsets[13..].iter().map(|o| o.length()).collect();
        assert!(ring.windows(2).all(|w| w[1] >= w[0] - 1e-4));
    }

    #[test]
    fn exact_center_hit_is_not_snapped() {
        let cursor = Vec2::new(400.0, 300.0);
        let scene = StubScene::new().with_hit(cursor, Vec3::new(1.0, 2.0, 3.0));
        let result = resolve(&scene, cursor, &settings(), None).unwrap();
        assert!(!result.snapped);
        assert_eq!(result.world, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn nearest_neighbourhood_hit_wins() {
        let cursor = Vec2::new(400.0, 300.0);
        let scene = StubScene::new()
            .with_hit(cursor + Vec2::new(8.0, 0.0), Vec3::new(8.0, 0.0, 0.0))
            .with_hit(cursor + Vec2::new(0.0, 4.0), Vec3::new(4.0, 0.0, 0.0));
        let result = resolve(&scene, cursor, &settings(), None).unwrap();
        assert!(result.snapped);
        assert_eq!(result.world, Vec3::new(4.0, 0.0, 0.0));
    }

    #[test]
    fn equal_distance_ties_resolve_to_earlier_offset() {
        let cursor = Vec2::new(400.0, 300.0);
        // (+4, 0) is generated before (0, +4) in the cross pass.
        let scene = StubScene::new()
            .with_hit(cursor + Vec2::new(0.0, 4.0), Vec3::new(0.0, 0.0, 2.0))
            .with_hit(cursor + Vec2::new(4.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        let result = resolve(&scene, cursor, &settings(), None).unwrap();
        assert_eq!(result.world, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn offsets_outside_viewport_are_skipped() {
        let cursor = Vec2::new(2.0, 300.0);
        // A hit 4 px to the left sits outside the canvas and must be ignored.
        let scene = StubScene::new()
            .with_hit(cursor + Vec2::new(-4.0, 0.0), Vec3::ONE)
            .with_hit(cursor + Vec2::new(8.0, 0.0), Vec3::splat(8.0));
        let result = resolve(&scene, cursor, &settings(), None).unwrap();
        assert_eq!(result.world, Vec3::splat(8.0));
    }

    #[test]
    fn target_filter_rejects_foreign_hits_then_unfiltered_pick_applies() {
        let cursor = Vec2::new(400.0, 300.0);
        let scene = StubScene::new().with_foreign_hit(cursor, Vec3::new(5.0, 5.0, 5.0));
        let result = resolve(&scene, cursor, &settings(), Some(target())).unwrap();
        // The scan rejected the foreign hit; the unfiltered tier accepted it.
        assert!(!result.snapped);
        assert_eq!(result.world, Vec3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn falls_back_to_terrain_then_ellipsoid() {
        let cursor = Vec2::new(400.0, 300.0);

        let mut scene = StubScene::new();
        scene.terrain = Some(Vec3::new(0.0, 1.0, 0.0));
        let result = resolve(&scene, cursor, &settings(), None).unwrap();
        assert_eq!(result.world, Vec3::new(0.0, 1.0, 0.0));
        assert!(!result.snapped);

        let mut scene = StubScene::new();
        scene.ellipsoid = Some(Vec3::new(0.0, 0.0, 9.0));
        let result = resolve(&scene, cursor, &settings(), None).unwrap();
        assert_eq!(result.world, Vec3::new(0.0, 0.0, 9.0));
    }

    #[test]
    fn returns_none_when_every_tier_fails() {
        let scene = StubScene::new();
        assert!(resolve(&scene, Vec2::new(400.0, 300.0), &settings(), None).is_none());
    }

    #[test]
    fn disabled_snap_skips_the_neighbourhood_scan() {
        let cursor = Vec2::new(400.0, 300.0);
        let scene = StubScene::new().with_hit(cursor + Vec2::new(4.0, 0.0), Vec3::ONE);
        let mut cfg = settings();
        cfg.enabled = false;
        // The neighbourhood hit is invisible without the scan.
        assert!(resolve(&scene, cursor, &cfg, None).is_none());
    }

    #[test]
    fn radius_clamps_to_bounds() {
        let mut cfg = settings();
        cfg.set_radius(0.5);
        assert_eq!(cfg.radius_px, 2.0);
        cfg.set_radius(500.0);
        assert_eq!(cfg.radius_px, 30.0);
    }
}
