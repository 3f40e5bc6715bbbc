use crate::engine::assets::survey_target::SurveyTarget;
use crate::engine::camera::ViewportCamera;
use crate::engine::picking::{CameraSceneQuery, SceneQuery};
use crate::tools::clip::{ClipCollection, ClipSession};
use crate::tools::tool_manager::{ToolManager, ToolType};
use bevy::prelude::*;
use bevy::window::PrimaryWindow;

/// Two-event rectangle capture: press anchors one corner, release commits
/// the opposite one.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum RectangleCapture {
    #[default]
    Idle,
    Capturing {
        anchor: Vec2,
        current: Vec2,
    },
}

impl RectangleCapture {
    /// Anchor a new capture. Re-entry while capturing restarts from the new
    /// anchor rather than leaving a half-finished drag behind.
    pub fn begin(&mut self, anchor: Vec2) {
        *self = Self::Capturing {
            anchor,
            current: anchor,
        };
    }

    pub fn update(&mut self, position: Vec2) {
        if let Self::Capturing { current, .. } = self {
            *current = position;
        }
    }

    pub fn cancel(&mut self) -> bool {
        let was_capturing = self.is_capturing();
        *self = Self::Idle;
        was_capturing
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing { .. })
    }

    /// The four screen corners in drag order: anchor, across, opposite,
    /// back. The winding is consistent for every drag direction, so the
    /// projected clip polygon never self-intersects.
    pub fn corners(&self) -> Option<[Vec2; 4]> {
        let Self::Capturing { anchor, current } = *self else {
            return None;
        };
        Some([
            anchor,
            Vec2::new(current.x, anchor.y),
            current,
            Vec2::new(anchor.x, current.y),
        ])
    }

    /// Min corner and size of the screen rectangle, for the 2D overlay.
    pub fn screen_rect(&self) -> Option<(Vec2, Vec2)> {
        let Self::Capturing { anchor, current } = *self else {
            return None;
        };
        let min = anchor.min(current);
        let size = (anchor - current).abs();
        Some((min, size))
    }
}

/// Resolve the four screen corners into world space: exact pick first, then
/// the camera ray carried out to half the target's bounding-sphere radius.
/// Fewer than four resolutions aborts the whole rectangle; a partial clip
/// region is never applied.
pub fn resolve_rectangle_corners(
    query: &dyn SceneQuery,
    corners: [Vec2; 4],
    bounding_radius: f32,
) -> Option<Vec<Vec3>> {
    let mut resolved = Vec::with_capacity(4);
    for corner in corners {
        if let Some(world) = query.pick_exact(corner) {
            resolved.push(world);
            continue;
        }
        let Some(ray) = query.cast_ray(corner) else {
            continue;
        };
        resolved.push(ray.origin + *ray.direction * (bounding_radius * 0.5));
    }

    (resolved.len() == 4).then_some(resolved)
}

/// Marker for the 2D drag rectangle overlay node.
#[derive(Component)]
pub struct RectangleOverlayNode;

/// Input/logic: press-drag-release captures a screen rectangle and projects
/// it onto the scene as a four-vertex clip region.
pub fn clip_rectangle_system(
    tool_manager: Res<ToolManager>,
    mut clip_session: ResMut<ClipSession>,
    mut collection: ResMut<ClipCollection>,
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    viewport_camera: Res<ViewportCamera>,
    images: Res<Assets<Image>>,
    target: Option<Res<SurveyTarget>>,
    mut rpc: ResMut<crate::rpc::web_rpc::WebRpcInterface>,
) {
    if !tool_manager.is_tool_active(ToolType::ClipRectangle) {
        return;
    }
    let Some(target) = target else {
        if mouse.just_pressed(MouseButton::Left) {
            warn!("Rectangle clip rejected: no survey target bound");
        }
        return;
    };

    // Escape or right click cancels exactly this capture.
    if keyboard.just_pressed(KeyCode::Escape) || mouse.just_pressed(MouseButton::Right) {
        if clip_session.rectangle.cancel() {
            rpc.send_notification(
                "clip_capture_cancelled",
                serde_json::json!({ "shape": "rectangle" }),
            );
        }
        return;
    }

    let Ok(window) = windows.single() else {
        return;
    };
    let Ok((camera_transform, camera)) = cameras.single() else {
        return;
    };
    let Some(cursor) = window.cursor_position() else {
        return;
    };

    if mouse.just_pressed(MouseButton::Left) {
        if clip_session.begin_rectangle(cursor) {
            warn!("Polygon capture force-cancelled by rectangle capture");
        }
        rpc.send_notification(
            "clip_rectangle_started",
            serde_json::json!({ "anchor": [cursor.x, cursor.y] }),
        );
        return;
    }

    if mouse.pressed(MouseButton::Left) {
        clip_session.rectangle.update(cursor);
        return;
    }

    if mouse.just_released(MouseButton::Left) {
        clip_session.rectangle.update(cursor);
        let Some(corners) = clip_session.rectangle.corners() else {
            return;
        };
        clip_session.rectangle.cancel();

        let scene = CameraSceneQuery {
            camera,
            camera_transform,
            window_size: window.size(),
            heightmap: images.get(&target.heightmap),
            bounds: &target.bounds,
            target: target.entity,
            view_height: viewport_camera.height,
        };

        match resolve_rectangle_corners(&scene, corners, target.bounds.bounding_radius()) {
            Some(vertices) => {
                collection.apply_region(vertices);
                rpc.send_notification(
                    "clip_applied",
                    serde_json::json!({
                        "shape": "rectangle",
                        "vertex_count": 4,
                        "inverse": collection.inverse(),
                    }),
                );
            }
            None => {
                // Partial geometry never mutates the clip region.
                warn!("Rectangle clip aborted: fewer than four corners resolved");
                rpc.send_notification(
                    "clip_aborted",
                    serde_json::json!({ "reason": "unresolved corners" }),
                );
            }
        }
    }
}

/// Renderer: rebuilds the 2D drag rectangle overlay from capture state.
pub fn update_rectangle_overlay(
    mut commands: Commands,
    clip_session: Res<ClipSession>,
    existing: Query<Entity, With<RectangleOverlayNode>>,
) {
    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let Some((min, size)) = clip_session.rectangle.screen_rect() else {
        return;
    };

    commands.spawn((
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(min.x),
            top: Val::Px(min.y),
            width: Val::Px(size.x),
            height: Val::Px(size.y),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        BorderColor(Color::srgb(1.0, 1.0, 0.2)),
        BackgroundColor(Color::srgba(1.0, 1.0, 0.2, 0.08)),
        RectangleOverlayNode,
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corners_wind_consistently_for_any_drag_direction() {
        let mut capture = RectangleCapture::default();
        capture.begin(Vec2::new(10.0, 10.0));
        capture.update(Vec2::new(30.0, 40.0));
        assert_eq!(
            capture.corners().unwrap(),
            [
                Vec2::new(10.0, 10.0),
                Vec2::new(30.0, 10.0),
                Vec2::new(30.0, 40.0),
                Vec2::new(10.0, 40.0),
            ]
        );

        // Dragging up-left mirrors the winding but stays a simple quad.
        capture.begin(Vec2::new(30.0, 40.0));
        capture.update(Vec2::new(10.0, 10.0));
        assert_eq!(
            capture.corners().unwrap(),
            [
                Vec2::new(30.0, 40.0),
                Vec2::new(10.0, 40.0),
                Vec2::new(10.0, 10.0),
                Vec2::new(30.0, 10.0),
            ]
        );
    }

    #[test]
    fn screen_rect_normalises_min_and_size() {
        let mut capture = RectangleCapture::default();
        capture.begin(Vec2::new(50.0, 20.0));
        capture.update(Vec2::new(10.0, 80.0));
        let (min, size) = capture.screen_rect().unwrap();
        assert_eq!(min, Vec2::new(10.0, 20.0));
        assert_eq!(size, Vec2::new(40.0, 60.0));
    }

    #[test]
    fn cancel_reports_whether_a_capture_was_discarded() {
        let mut capture = RectangleCapture::default();
        assert!(!capture.cancel());
        capture.begin(Vec2::ZERO);
        assert!(capture.cancel());
        assert!(!capture.is_capturing());
    }

    /// Picks succeed at listed corners; rays are optional per corner.
    struct CornerStub {
        picks: Vec<(Vec2, Vec3)>,
        rays: bool,
    }

    impl SceneQuery for CornerStub {
        fn viewport_size(&self) -> Vec2 {
            Vec2::new(800.0, 600.0)
        }
        fn pick_exact(&self, screen: Vec2) -> Option<Vec3> {
            self.picks
                .iter()
                .find(|(pos, _)| pos.distance(screen) < 0.5)
                .map(|(_, world)| *world)
        }
        fn pick_object(&self, screen: Vec2) -> Option<Entity> {
            self.pick_exact(screen).map(|_| Entity::from_raw(1))
        }
        fn cast_ray(&self, screen: Vec2) -> Option<Ray3d> {
            self.rays
                .then(|| Ray3d::new(Vec3::new(screen.x, 100.0, screen.y), Dir3::NEG_Y))
        }
        fn intersect_terrain(&self, _ray: &Ray3d) -> Option<Vec3> {
            None
        }
        fn project_onto_ellipsoid(&self, _screen: Vec2) -> Option<Vec3> {
            None
        }
    }

    fn corners() -> [Vec2; 4] {
        [
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(10.0, 10.0),
            Vec2::new(0.0, 10.0),
        ]
    }

    #[test]
    fn unpicked_corners_fall_back_to_the_bounding_sphere_ray() {
        let stub = CornerStub {
            picks: vec![(Vec2::new(0.0, 0.0), Vec3::new(0.0, 5.0, 0.0))],
            rays: true,
        };
        let resolved = resolve_rectangle_corners(&stub, corners(), 40.0).unwrap();
        assert_eq!(resolved.len(), 4);
        assert_eq!(resolved[0], Vec3::new(0.0, 5.0, 0.0));
        // Ray fallback travels half the bounding radius from the origin.
        assert_eq!(resolved[1], Vec3::new(10.0, 80.0, 0.0));
    }

    #[test]
    fn three_of_four_corners_aborts() {
        let stub = CornerStub {
            picks: vec![
                (Vec2::new(0.0, 0.0), Vec3::ZERO),
                (Vec2::new(10.0, 0.0), Vec3::X),
                (Vec2::new(10.0, 10.0), Vec3::Y),
            ],
            rays: false,
        };
        assert!(resolve_rectangle_corners(&stub, corners(), 40.0).is_none());
    }
}
