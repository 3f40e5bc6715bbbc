use crate::engine::assets::survey_target::SurveyTarget;
use crate::engine::camera::ViewportCamera;
use crate::engine::picking::CameraSceneQuery;
use crate::engine::shading::{PointShading, ShadingParams};
use crate::tools::snap::{self, SnapResult, SnapSettings};
use crate::tools::tool_manager::{ToolManager, ToolType};
use bevy::prelude::*;
use bevy::render::view::RenderLayers;
use bevy::window::PrimaryWindow;
use constants::coordinate_system::{
    Geodetic, GeodeticOrigin, ecef_to_geodetic, engine_to_enu, surface_distance,
};
use constants::render_settings::{
    DRAW_LINE_WIDTH, DRAW_VERTEX_SIZE, MOUSE_RAYCAST_INTERSECTION_SPHERE_SIZE,
};

/// Distance formula applied between the two measured endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistanceMode {
    /// Straight-line 3D distance.
    ThreeD,
    /// Great-circle distance between the ellipsoid projections.
    Surface,
    /// Surface distance combined with the height difference.
    SurfaceWithHeight,
}

impl DistanceMode {
    /// Convert string identifier to mode for RPC compatibility.
    pub fn from_string(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "three_d" => Some(Self::ThreeD),
            "surface" => Some(Self::Surface),
            "surface_with_height" => Some(Self::SurfaceWithHeight),
            _ => None,
        }
    }

    /// Convert mode to string identifier for frontend communication.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreeD => "three_d",
            Self::Surface => "surface",
            Self::SurfaceWithHeight => "surface_with_height",
        }
    }
}

/// A committed measurement. Immutable once created; removed only by a
/// clear-all.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    pub id: u32,
    pub start: Vec3,
    pub end: Vec3,
    pub distance: f64,
    pub mode: DistanceMode,
}

/// The linear capture protocol: idle, or one start point placed with a live
/// preview endpoint following the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MeasureState {
    Idle,
    Placing {
        start: Vec3,
        preview: Option<Vec3>,
    },
}

/// Measurement session state.
///
/// All transition methods are total: they accept any current state and
/// no-op where the transition does not apply, so callers never need to
/// pre-check the state themselves.
#[derive(Resource)]
pub struct MeasureSession {
    state: MeasureState,
    pub mode: DistanceMode,
    history: Vec<MeasurementRecord>,
    next_id: u32,
    /// Marker position for the resolved cursor point. Cleared whenever
    /// resolution fails, unlike the preview endpoint which is retained.
    pub snap_indicator: Option<Vec3>,
    /// Shading configuration to restore when the session ends.
    pub prior_shading: Option<ShadingParams>,
    last_snap: Option<SnapResult>,
    miss_streak: u8,
}

impl Default for MeasureSession {
    fn default() -> Self {
        Self {
            state: MeasureState::Idle,
            mode: DistanceMode::ThreeD,
            history: Vec::new(),
            next_id: 0,
            snap_indicator: None,
            prior_shading: None,
            last_snap: None,
            miss_streak: 0,
        }
    }
}

impl MeasureSession {
    pub fn state(&self) -> &MeasureState {
        &self.state
    }

    pub fn history(&self) -> &[MeasurementRecord] {
        &self.history
    }

    pub fn is_placing(&self) -> bool {
        matches!(self.state, MeasureState::Placing { .. })
    }

    /// Record the start point. No-op while already placing: the second
    /// click belongs to [`Self::commit`].
    pub fn begin(&mut self, start: Vec3) -> bool {
        match self.state {
            MeasureState::Idle => {
                self.state = MeasureState::Placing {
                    start,
                    preview: None,
                };
                true
            }
            MeasureState::Placing { .. } => false,
        }
    }

    /// Move the preview endpoint. A failed resolution (`None`) keeps the
    /// previous preview position instead of nulling the live line out.
    pub fn update_preview(&mut self, point: Option<Vec3>) {
        if let MeasureState::Placing { preview, .. } = &mut self.state {
            if let Some(point) = point {
                *preview = Some(point);
            }
        }
    }

    /// Finalise the measurement, append it to history and return it.
    pub fn commit(&mut self, end: Vec3, origin: &GeodeticOrigin) -> Option<MeasurementRecord> {
        match self.state {
            MeasureState::Idle => None,
            MeasureState::Placing { start, .. } => {
                let record = MeasurementRecord {
                    id: self.next_id,
                    start,
                    end,
                    distance: distance_between(self.mode, start, end, origin),
                    mode: self.mode,
                };
                self.next_id += 1;
                self.history.push(record.clone());
                self.state = MeasureState::Idle;
                Some(record)
            }
        }
    }

    /// Discard the in-progress preview. Idempotent; history is untouched.
    pub fn cancel(&mut self) -> bool {
        match self.state {
            MeasureState::Idle => false,
            MeasureState::Placing { .. } => {
                self.state = MeasureState::Idle;
                true
            }
        }
    }

    /// Discard the preview and every committed record.
    pub fn clear_all(&mut self) {
        self.cancel();
        self.history.clear();
        self.snap_indicator = None;
    }

    /// Track the outcome of this event's resolution. Keeps a short-lived
    /// fallback point for strict target-only mode; two consecutive misses
    /// expire it so it never outlives the interaction it came from.
    pub fn note_resolution(&mut self, result: Option<SnapResult>) -> Option<SnapResult> {
        match result {
            Some(snap) => {
                self.miss_streak = 0;
                self.last_snap = Some(snap);
                self.snap_indicator = Some(snap.world);
                Some(snap)
            }
            None => {
                self.miss_streak = self.miss_streak.saturating_add(1);
                self.snap_indicator = None;
                if self.miss_streak >= 2 {
                    self.last_snap = None;
                }
                None
            }
        }
    }

    /// Last successful resolution, if it has not expired.
    pub fn stale_snap(&self) -> Option<SnapResult> {
        self.last_snap
    }

    pub fn take_prior_shading(&mut self) -> Option<ShadingParams> {
        self.prior_shading.take()
    }
}

/// Cancel any in-progress placement and restore the target's shading.
/// Called on cancellation and on tool deactivation.
pub fn deactivate_measure(session: &mut MeasureSession, shading: &mut PointShading) {
    session.cancel();
    session.snap_indicator = None;
    if let Some(prior) = session.take_prior_shading() {
        shading.apply(prior);
    }
}

/// Geodetic coordinates of an engine-frame point.
pub fn geodetic_of(point: Vec3, origin: &GeodeticOrigin) -> Geodetic {
    let (east, north, up) = engine_to_enu(point.x as f64, point.y as f64, point.z as f64);
    ecef_to_geodetic(origin.enu_to_ecef(east, north, up))
}

/// Distance between two engine-frame points under the given mode.
pub fn distance_between(mode: DistanceMode, a: Vec3, b: Vec3, origin: &GeodeticOrigin) -> f64 {
    match mode {
        DistanceMode::ThreeD => {
            let dx = (a.x - b.x) as f64;
            let dy = (a.y - b.y) as f64;
            let dz = (a.z - b.z) as f64;
            (dx * dx + dy * dy + dz * dz).sqrt()
        }
        DistanceMode::Surface => {
            surface_distance(&geodetic_of(a, origin), &geodetic_of(b, origin))
        }
        DistanceMode::SurfaceWithHeight => {
            let ga = geodetic_of(a, origin);
            let gb = geodetic_of(b, origin);
            let surface = surface_distance(&ga, &gb);
            let dh = ga.height - gb.height;
            (surface * surface + dh * dh).sqrt()
        }
    }
}

/// Distance label text: metres below 1 km, three-decimal kilometres up to
/// 10 km, two-decimal kilometres beyond.
pub fn format_distance(metres: f64) -> String {
    if metres < 1000.0 {
        format!("{:.2} m", metres)
    } else if metres < 10000.0 {
        format!("{:.3} km", metres / 1000.0)
    } else {
        format!("{:.2} km", metres / 1000.0)
    }
}

#[derive(Component)]
pub struct MeasurePreview;

#[derive(Component)]
pub struct CompletedMeasurementTag;

#[derive(Component)]
pub struct SnapIndicator;

#[derive(Component)]
pub struct MeasureHudText;

fn vec3_json(v: Vec3) -> serde_json::Value {
    serde_json::json!([v.x, v.y, v.z])
}

/// Input/logic: click to start, move to preview, click to finish.
/// Right click or Escape discards the preview without creating a record.
pub fn measure_tool_system(
    tool_manager: Res<ToolManager>,
    mut session: ResMut<MeasureSession>,
    mut shading: ResMut<PointShading>,
    snap_settings: Res<SnapSettings>,
    mouse: Res<ButtonInput<MouseButton>>,
    keyboard: Res<ButtonInput<KeyCode>>,
    windows: Query<&Window, With<PrimaryWindow>>,
    cameras: Query<(&GlobalTransform, &Camera), With<Camera3d>>,
    viewport_camera: Res<ViewportCamera>,
    images: Res<Assets<Image>>,
    target: Option<Res<SurveyTarget>>,
    mut rpc: ResMut<crate::rpc::web_rpc::WebRpcInterface>,
) {
    if !tool_manager.is_tool_active(ToolType::Measure) {
        return;
    }
    let Some(target) = target else {
        if mouse.just_pressed(MouseButton::Left) {
            warn!("Measurement rejected: no survey target bound");
        }
        return;
    };

    // Cancel signals tear the preview down before anything else runs.
    if keyboard.just_pressed(KeyCode::Escape) || mouse.just_pressed(MouseButton::Right) {
        if session.cancel() {
            if let Some(prior) = session.take_prior_shading() {
                shading.apply(prior);
            }
            session.snap_indicator = None;
            rpc.send_notification("measure_cancelled", serde_json::json!({}));
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

    let filter = snap_settings.target_only.then_some(target.entity);
    let resolved = snap::resolve(&scene, cursor, &snap_settings, filter);
    let effective = session.note_resolution(resolved).or_else(|| {
        // Strict target-only mode degrades to the last known snap until it
        // expires, instead of dropping the interaction entirely.
        if snap_settings.target_only {
            session.stale_snap()
        } else {
            None
        }
    });
    session.update_preview(effective.map(|snap| snap.world));

    // Live preview update
    if let MeasureState::Placing {
        start,
        preview: Some(end),
    } = *session.state()
    {
        let distance = distance_between(session.mode, start, end, &target.origin);
        rpc.send_notification(
            "measure_updated",
            serde_json::json!({
                "start": vec3_json(start),
                "end": vec3_json(end),
                "distance": distance,
                "label": format_distance(distance),
            }),
        );
    }

    if mouse.just_pressed(MouseButton::Left) {
        let Some(point) = effective else {
            // Every resolution tier failed: the click is ignored.
            rpc.send_notification("measure_resolve_failed", serde_json::json!({}));
            return;
        };

        if session.is_placing() {
            if let Some(record) = session.commit(point.world, &target.origin) {
                rpc.send_notification(
                    "measure_completed",
                    serde_json::json!({
                        "id": record.id,
                        "start": vec3_json(record.start),
                        "end": vec3_json(record.end),
                        "distance": record.distance,
                        "mode": record.mode.as_str(),
                        "label": format_distance(record.distance),
                    }),
                );
            }
        } else {
            // Enhanced shading goes on with the first placement and stays on
            // until the session ends.
            if session.prior_shading.is_none() {
                let prior = shading.apply(ShadingParams::survey());
                session.prior_shading = Some(prior);
            }
            session.begin(point.world);
            rpc.send_notification(
                "measure_started",
                serde_json::json!({
                    "position": vec3_json(point.world),
                    "snapped": point.snapped,
                }),
            );
        }
    }
}

/// Renderer: clears previous overlay entities each frame and rebuilds them
/// from session state.
pub fn update_measure_render(
    mut commands: Commands,
    session: Res<MeasureSession>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing_preview: Query<Entity, With<MeasurePreview>>,
    existing_completed: Query<Entity, With<CompletedMeasurementTag>>,
    existing_indicator: Query<Entity, With<SnapIndicator>>,
) {
    for entity in existing_preview
        .iter()
        .chain(existing_completed.iter())
        .chain(existing_indicator.iter())
    {
        commands.entity(entity).despawn();
    }

    // Snap indicator at the resolved cursor point, absent after a miss.
    if let Some(indicator) = session.snap_indicator {
        commands.spawn((
            Mesh3d(meshes.add(Sphere::new(MOUSE_RAYCAST_INTERSECTION_SPHERE_SIZE))),
            MeshMaterial3d(materials.add(overlay_material(
                &Color::hsv(0., 1., 1.),
                LinearRgba::new(1., 1., 1., 1.),
            ))),
            Transform::from_translation(indicator),
            SnapIndicator,
            RenderLayers::layer(1),
        ));
    }

    // Live preview line between the start point and the pointer.
    if let MeasureState::Placing {
        start,
        preview: Some(preview),
    } = *session.state()
    {
        spawn_endpoint(
            &mut commands,
            &mut meshes,
            &mut materials,
            start,
            MeasurePreview,
        );
        spawn_endpoint(
            &mut commands,
            &mut meshes,
            &mut materials,
            preview,
            MeasurePreview,
        );
        spawn_segment(
            &mut commands,
            &mut meshes,
            &mut materials,
            start,
            preview,
            Color::srgb(1.0, 1.0, 0.2),
            LinearRgba::new(1., 1., 0.2, 1.),
            MeasurePreview,
        );
    }

    // Committed measurements, rebuilt from history.
    for record in session.history() {
        spawn_endpoint(
            &mut commands,
            &mut meshes,
            &mut materials,
            record.start,
            CompletedMeasurementTag,
        );
        spawn_endpoint(
            &mut commands,
            &mut meshes,
            &mut materials,
            record.end,
            CompletedMeasurementTag,
        );
        spawn_segment(
            &mut commands,
            &mut meshes,
            &mut materials,
            record.start,
            record.end,
            Color::srgb(1.0, 0.27, 0.0),
            LinearRgba::new(1., 0.5, 0., 1.),
            CompletedMeasurementTag,
        );
    }
}

fn overlay_material(base: &Color, emissive: LinearRgba) -> StandardMaterial {
    StandardMaterial {
        base_color: *base,
        emissive,
        depth_bias: 0.0,
        unlit: true,
        ..default()
    }
}

fn spawn_endpoint<M: Component>(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
    position: Vec3,
    marker: M,
) {
    commands.spawn((
        Mesh3d(meshes.add(Sphere::new(DRAW_VERTEX_SIZE))),
        MeshMaterial3d(materials.add(overlay_material(
            &Color::hsv(0., 0.5, 1.),
            LinearRgba::new(1., 1., 1., 1.),
        ))),
        Transform::from_translation(position),
        marker,
        RenderLayers::layer(1),
    ));
}

#[allow(clippy::too_many_arguments)]
fn spawn_segment<M: Component>(
    commands: &mut Commands,
    meshes: &mut ResMut<Assets<Mesh>>,
    materials: &mut ResMut<Assets<StandardMaterial>>,
    start: Vec3,
    end: Vec3,
    base: Color,
    emissive: LinearRgba,
    marker: M,
) {
    let direction = end - start;
    let distance = direction.length();
    if distance <= 0.02 {
        return;
    }

    let midpoint = (start + end) * 0.5;
    let rotation = Quat::from_rotation_arc(Vec3::X, direction.normalize());
    commands.spawn((
        Mesh3d(meshes.add(Cuboid::new(distance, DRAW_LINE_WIDTH, DRAW_LINE_WIDTH))),
        MeshMaterial3d(materials.add(overlay_material(&base, emissive))),
        Transform::from_translation(midpoint).with_rotation(rotation),
        marker,
        RenderLayers::layer(1),
    ));
}

/// HUD label text: the live preview distance while placing, the last
/// committed distance otherwise.
pub fn update_measure_hud(
    session: Res<MeasureSession>,
    target: Option<Res<SurveyTarget>>,
    mut query: Query<&mut Text, With<MeasureHudText>>,
) {
    let Some(target) = target else {
        return;
    };

    let label = match *session.state() {
        MeasureState::Placing {
            start,
            preview: Some(end),
        } => Some(format_distance(distance_between(
            session.mode,
            start,
            end,
            &target.origin,
        ))),
        _ => session
            .history()
            .last()
            .map(|record| format_distance(record.distance)),
    };

    for mut text in &mut query {
        text.0 = label.clone().unwrap_or_default();
    }
}

pub struct MeasureToolPlugin;

impl Plugin for MeasureToolPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<MeasureSession>().add_systems(
            Update,
            (measure_tool_system, update_measure_render, update_measure_hud).chain(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeodeticOrigin = GeodeticOrigin {
        lon_deg: 24.1052,
        lat_deg: 56.9496,
        height: 11.0,
    };

    fn snap_at(world: Vec3) -> SnapResult {
        SnapResult {
            world,
            screen: Vec2::ZERO,
            snapped: false,
        }
    }

    #[test]
    fn three_four_five_measurement() {
        let mut session = MeasureSession::default();
        assert!(session.begin(Vec3::new(0.0, 0.0, 0.0)));
        session.update_preview(Some(Vec3::new(3.0, 4.0, 0.0)));

        let record = session.commit(Vec3::new(3.0, 4.0, 0.0), &ORIGIN).unwrap();
        assert_eq!(record.distance, 5.0);
        assert_eq!(format_distance(record.distance), "5.00 m");
        assert_eq!(session.history().len(), 1);
        assert_eq!(*session.state(), MeasureState::Idle);
    }

    #[test]
    fn commit_without_placement_is_a_no_op() {
        let mut session = MeasureSession::default();
        assert!(session.commit(Vec3::ONE, &ORIGIN).is_none());
        assert!(session.history().is_empty());
    }

    #[test]
    fn begin_while_placing_is_rejected() {
        let mut session = MeasureSession::default();
        assert!(session.begin(Vec3::ZERO));
        assert!(!session.begin(Vec3::ONE));
        assert_eq!(
            *session.state(),
            MeasureState::Placing {
                start: Vec3::ZERO,
                preview: None
            }
        );
    }

    #[test]
    fn failed_resolution_keeps_previous_preview() {
        let mut session = MeasureSession::default();
        session.begin(Vec3::ZERO);
        session.update_preview(Some(Vec3::new(1.0, 0.0, 0.0)));
        session.update_preview(None);
        assert_eq!(
            *session.state(),
            MeasureState::Placing {
                start: Vec3::ZERO,
                preview: Some(Vec3::new(1.0, 0.0, 0.0))
            }
        );
    }

    #[test]
    fn miss_clears_indicator_and_two_misses_expire_the_fallback() {
        let mut session = MeasureSession::default();
        session.note_resolution(Some(snap_at(Vec3::ONE)));
        assert_eq!(session.snap_indicator, Some(Vec3::ONE));

        session.note_resolution(None);
        assert_eq!(session.snap_indicator, None);
        assert!(session.stale_snap().is_some());

        session.note_resolution(None);
        assert!(session.stale_snap().is_none());
    }

    #[test]
    fn cancel_is_idempotent_and_preserves_history() {
        let mut session = MeasureSession::default();
        session.begin(Vec3::ZERO);
        session.commit(Vec3::X, &ORIGIN);

        session.begin(Vec3::ZERO);
        assert!(session.cancel());
        assert!(!session.cancel());
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn clear_all_discards_preview_and_history() {
        let mut session = MeasureSession::default();
        session.begin(Vec3::ZERO);
        session.commit(Vec3::X, &ORIGIN);
        session.begin(Vec3::ZERO);

        session.clear_all();
        assert_eq!(*session.state(), MeasureState::Idle);
        assert!(session.history().is_empty());
    }

    #[test]
    fn record_ids_increase_monotonically() {
        let mut session = MeasureSession::default();
        session.begin(Vec3::ZERO);
        let first = session.commit(Vec3::X, &ORIGIN).unwrap();
        session.begin(Vec3::ZERO);
        let second = session.commit(Vec3::Y, &ORIGIN).unwrap();
        assert!(second.id > first.id);
    }

    #[test]
    fn distances_are_symmetric_in_every_mode() {
        let a = Vec3::new(12.0, 3.5, -40.0);
        let b = Vec3::new(-80.0, 9.0, 17.0);
        for mode in [
            DistanceMode::ThreeD,
            DistanceMode::Surface,
            DistanceMode::SurfaceWithHeight,
        ] {
            let ab = distance_between(mode, a, b, &ORIGIN);
            let ba = distance_between(mode, b, a, &ORIGIN);
            assert!((ab - ba).abs() < 1e-9, "{mode:?}: {ab} vs {ba}");
        }
    }

    #[test]
    fn identical_points_measure_zero() {
        let p = Vec3::new(5.0, 2.0, 5.0);
        assert_eq!(distance_between(DistanceMode::ThreeD, p, p, &ORIGIN), 0.0);
        assert_eq!(distance_between(DistanceMode::Surface, p, p, &ORIGIN), 0.0);
    }

    #[test]
    fn surface_ignores_height_and_surface_with_height_recovers_it() {
        // Same footprint, 35 m apart vertically (engine Y is up).
        let low = Vec3::new(0.0, 0.0, 0.0);
        let high = Vec3::new(0.0, 35.0, 0.0);

        let surface = distance_between(DistanceMode::Surface, low, high, &ORIGIN);
        assert!(surface < 1e-3, "surface distance was {surface}");

        let with_height =
            distance_between(DistanceMode::SurfaceWithHeight, low, high, &ORIGIN);
        assert!((with_height - 35.0).abs() < 1e-3);
    }

    #[test]
    fn label_formatting_boundaries() {
        assert_eq!(format_distance(5.0), "5.00 m");
        assert_eq!(format_distance(999.99), "999.99 m");
        assert_eq!(format_distance(1000.0), "1.000 km");
        assert_eq!(format_distance(2500.0), "2.500 km");
        assert_eq!(format_distance(9999.999), "10.000 km");
        assert_eq!(format_distance(10000.0), "10.00 km");
        assert_eq!(format_distance(12340.0), "12.34 km");
    }

    #[test]
    fn distance_mode_round_trips_through_strings() {
        for mode in [
            DistanceMode::ThreeD,
            DistanceMode::Surface,
            DistanceMode::SurfaceWithHeight,
        ] {
            assert_eq!(DistanceMode::from_string(mode.as_str()), Some(mode));
        }
        assert_eq!(DistanceMode::from_string("nonsense"), None);
    }
}
