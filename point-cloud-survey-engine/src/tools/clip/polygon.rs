use crate::engine::assets::survey_target::SurveyTarget;
use crate::engine::camera::ViewportCamera;
use crate::engine::picking::CameraSceneQuery;
use crate::tools::clip::{ClipCollection, ClipSession, resolve_surface_point};
use crate::tools::tool_manager::{ToolManager, ToolType};
use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy::window::PrimaryWindow;
use constants::render_settings::{DRAW_LINE_WIDTH, DRAW_VERTEX_SIZE};

/// Multi-click polygon capture: one committed vertex per left click plus a
/// non-committed trailing vertex that follows the pointer.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PolygonCapture {
    #[default]
    Idle,
    Capturing {
        vertices: Vec<Vec3>,
        preview: Option<Vec3>,
    },
}

impl PolygonCapture {
    /// Commit a vertex, entering capture on the first one.
    pub fn add_vertex(&mut self, point: Vec3) {
        match self {
            Self::Idle => {
                *self = Self::Capturing {
                    vertices: vec![point],
                    preview: None,
                };
            }
            Self::Capturing { vertices, .. } => vertices.push(point),
        }
    }

    /// Move the trailing vertex; a failed resolution keeps the previous one.
    pub fn update_preview(&mut self, point: Option<Vec3>) {
        if let Self::Capturing { preview, .. } = self {
            if let Some(point) = point {
                *preview = Some(point);
            }
        }
    }

    /// Finalise the capture: at least three committed vertices become the
    /// region, fewer are discarded. Either way the capture returns to idle.
    pub fn finalize(&mut self) -> Option<Vec<Vec3>> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Capturing { vertices, .. } => (vertices.len() >= 3).then_some(vertices),
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

    pub fn vertices(&self) -> &[Vec3] {
        match self {
            Self::Idle => &[],
            Self::Capturing { vertices, .. } => vertices,
        }
    }

    pub fn preview(&self) -> Option<Vec3> {
        match self {
            Self::Idle => None,
            Self::Capturing { preview, .. } => *preview,
        }
    }
}

/// Marker for in-progress polygon capture visualisation entities.
#[derive(Component)]
pub struct PolygonCapturePreview;

/// Input/logic: left click adds vertices, right click or Escape finalises.
pub fn clip_polygon_system(
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
    if !tool_manager.is_tool_active(ToolType::ClipPolygon) {
        return;
    }
    let Some(target) = target else {
        if mouse.just_pressed(MouseButton::Left) {
            warn!("Polygon clip rejected: no survey target bound");
        }
        return;
    };

    // Right click or Escape finalises: apply at three or more vertices,
    // discard below. The preview tears down either way.
    if keyboard.just_pressed(KeyCode::Escape) || mouse.just_pressed(MouseButton::Right) {
        let was_capturing = clip_session.polygon.is_capturing();
        match clip_session.polygon.finalize() {
            Some(vertices) => {
                let vertex_count = vertices.len();
                collection.apply_region(vertices);
                rpc.send_notification(
                    "clip_applied",
                    serde_json::json!({
                        "shape": "polygon",
                        "vertex_count": vertex_count,
                        "inverse": collection.inverse(),
                    }),
                );
            }
            None if was_capturing => {
                warn!("Polygon clip discarded: fewer than three vertices");
                rpc.send_notification(
                    "clip_aborted",
                    serde_json::json!({ "reason": "too few vertices" }),
                );
            }
            None => {}
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

    let scene = CameraSceneQuery {
        camera,
        camera_transform,
        window_size: window.size(),
        heightmap: images.get(&target.heightmap),
        bounds: &target.bounds,
        target: target.entity,
        view_height: viewport_camera.height,
    };

    let resolved = resolve_surface_point(&scene, cursor);
    clip_session.polygon.update_preview(resolved);

    if mouse.just_pressed(MouseButton::Left) {
        let Some(point) = resolved else {
            // No surface under the click at any tier: the event is ignored.
            return;
        };
        if clip_session.begin_polygon_vertex(point) {
            warn!("Rectangle capture force-cancelled by polygon capture");
        }
        rpc.send_notification(
            "clip_polygon_point_added",
            serde_json::json!({
                "point_count": clip_session.polygon.vertices().len(),
                "position": [point.x, point.y, point.z],
            }),
        );
    }
}

/// Renderer: rebuilds the capture preview from state every frame.
/// Shows committed vertices, the open edge chain, and the trailing edge to
/// the pointer.
pub fn update_polygon_capture_render(
    mut commands: Commands,
    clip_session: Res<ClipSession>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<PolygonCapturePreview>>,
) {
    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let vertices = clip_session.polygon.vertices();
    if vertices.is_empty() {
        return;
    }

    for point in vertices {
        spawn_capture_vertex(&mut commands, &mut meshes, &mut materials, *point);
    }

    for pair in vertices.windows(2) {
        spawn_capture_edge(&mut commands, &mut meshes, &mut materials, pair[0], pair[1]);
    }

    // Trailing edge from the last committed vertex to the pointer.
    if let (Some(last), Some(preview)) = (vertices.last(), clip_session.polygon.preview()) {
        spawn_capture_vertex(&mut commands, &mut meshes, &mut materials, preview);
        spawn_capture_edge(&mut commands, &mut meshes, &mut materials, *last, preview);
    }
}

fn capture_material(materials: &mut ResMut<Assets<StandardMaterial>>) -> Handle<StandardMaterial> {
    materials.add(StandardMaterial {
        base_color: Color::hsv(0., 1., 1.),
        emissive: LinearRgba::new(1., 1., 1., 1.),
        depth_bias: 0.0,
        unlit: true,
        ..default()
    })
}

fn spawn_capture_vertex(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
    position: Vec3,
) {
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(DRAW_VERTEX_SIZE))),
        MeshMaterial3d(capture_material(materials)),
        Transform::from_translation(position),
        PolygonCapturePreview,
        RenderLayers::layer(1),
    ));
}

fn spawn_capture_edge(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
    start: Vec3,
    end: Vec3,
) {
    let direction = end - start;
    let distance = direction.length();
    if distance <= 0.1 {
        return;
    }

    let midpoint = (start + end) * 0.5;
    let rotation = Quat::from_rotation_arc(Vec3::X, direction.normalize());
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(distance, DRAW_LINE_WIDTH, DRAW_LINE_WIDTH))),
        MeshMaterial3d(capture_material(materials)),
        Transform::from_translation(midpoint).with_rotation(rotation),
        PolygonCapturePreview,
        RenderLayers::layer(1),
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_vertex_enters_capture() {
        let mut capture = PolygonCapture::default();
        assert!(!capture.is_capturing());
        capture.add_vertex(Vec3::ZERO);
        assert!(capture.is_capturing());
        assert_eq!(capture.vertices(), &[Vec3::ZERO]);
    }

    #[test]
    fn finalize_applies_at_three_vertices() {
        let mut capture = PolygonCapture::default();
        capture.add_vertex(Vec3::ZERO);
        capture.add_vertex(Vec3::X);
        capture.add_vertex(Vec3::Z);
        let vertices = capture.finalize().unwrap();
        assert_eq!(vertices.len(), 3);
        assert!(!capture.is_capturing());
    }

    #[test]
    fn finalize_discards_below_three_vertices() {
        let mut capture = PolygonCapture::default();
        capture.add_vertex(Vec3::ZERO);
        capture.add_vertex(Vec3::X);
        assert!(capture.finalize().is_none());
        assert!(!capture.is_capturing());
    }

    #[test]
    fn finalize_while_idle_is_a_no_op() {
        let mut capture = PolygonCapture::default();
        assert!(capture.finalize().is_none());
    }

    #[test]
    fn preview_survives_failed_resolution() {
        let mut capture = PolygonCapture::default();
        capture.add_vertex(Vec3::ZERO);
        capture.update_preview(Some(Vec3::X));
        capture.update_preview(None);
        assert_eq!(capture.preview(), Some(Vec3::X));
    }

    #[test]
    fn preview_is_ignored_while_idle() {
        let mut capture = PolygonCapture::default();
        capture.update_preview(Some(Vec3::X));
        assert_eq!(capture.preview(), None);
        assert!(!capture.is_capturing());
    }
}
