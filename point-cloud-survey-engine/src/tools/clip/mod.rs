use crate::engine::picking::SceneQuery;
use bevy::asset::RenderAssetUsages;
use bevy::prelude::*;
use bevy::render::extract_resource::ExtractResource;
use bevy::render::mesh::PrimitiveTopology;
use bevy::render::view::RenderLayers;
use constants::render_settings::{DRAW_LINE_WIDTH, DRAW_VERTEX_SIZE};

/// Two-event rectangle capture and its screen-to-world projection.
pub mod rectangle;

/// Multi-click polygon capture with a trailing preview vertex.
pub mod polygon;

pub use polygon::PolygonCapture;
pub use rectangle::RectangleCapture;

/// Maximum clip vertices the GPU uniform can carry.
pub const MAX_CLIP_VERTICES: usize = 64;

/// An applied clip boundary: three or more world vertices plus the
/// inversion flag. Non-self-intersection is not enforced; the even-odd GPU
/// test tolerates it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipRegion {
    pub vertices: Vec<Vec3>,
    pub inverse: bool,
}

/// The target object's clip assignment.
///
/// Exactly one region is active at a time; applying a new one discards and
/// rebuilds the whole collection rather than editing in place. The legacy
/// plane list exists for compatibility with the plane-based pipeline and is
/// cleared on every rebuild and on clear-all.
#[derive(Resource, Clone, Default, ExtractResource)]
pub struct ClipCollection {
    region: Option<ClipRegion>,
    legacy_planes: Vec<Vec4>,
    inverse: bool,
}

impl ClipCollection {
    pub fn region(&self) -> Option<&ClipRegion> {
        self.region.as_ref()
    }

    pub fn inverse(&self) -> bool {
        self.inverse
    }

    pub fn is_empty(&self) -> bool {
        self.region.is_none() && self.legacy_planes.is_empty()
    }

    /// Replace the active region. The previous collection is discarded
    /// wholesale; there are no incremental edits.
    pub fn apply_region(&mut self, vertices: Vec<Vec3>) {
        self.legacy_planes.clear();
        self.region = Some(ClipRegion {
            vertices,
            inverse: self.inverse,
        });
    }

    /// Toggle inversion. Valid at any time, with or without a region.
    pub fn set_inverse(&mut self, inverse: bool) {
        self.inverse = inverse;
        if let Some(region) = &mut self.region {
            region.inverse = inverse;
        }
    }

    /// Empty both representations and reset inversion.
    pub fn clear(&mut self) {
        self.region = None;
        self.legacy_planes.clear();
        self.inverse = false;
    }
}

/// Fixed-size clip region data for the point-cloud shader. Vertices carry
/// the XZ footprint in `xy`, matching the heightmap-space polygon test.
#[derive(Debug, Clone, Copy, bevy::render::render_resource::ShaderType)]
#[repr(C)]
pub struct ClipRegionUniform {
    pub vertex_count: u32,
    pub inverse: u32,
    pub _pad0: u32,
    pub _pad1: u32,
    pub vertices: [Vec4; MAX_CLIP_VERTICES],
}

impl Default for ClipRegionUniform {
    fn default() -> Self {
        Self {
            vertex_count: 0,
            inverse: 0,
            _pad0: 0,
            _pad1: 0,
            vertices: [Vec4::ZERO; MAX_CLIP_VERTICES],
        }
    }
}

/// Packed uniform state extracted to the render world.
#[derive(Resource, Clone, Default, ExtractResource)]
pub struct ClipUniformState {
    pub uniform: ClipRegionUniform,
}

/// Flatten the collection into the shader uniform.
pub fn pack_clip_uniform(collection: &ClipCollection) -> ClipRegionUniform {
    let mut uniform = ClipRegionUniform::default();
    let Some(region) = collection.region() else {
        return uniform;
    };

    uniform.inverse = region.inverse as u32;
    for (slot, vertex) in uniform
        .vertices
        .iter_mut()
        .zip(region.vertices.iter().take(MAX_CLIP_VERTICES))
    {
        *slot = Vec4::new(vertex.x, vertex.z, 0.0, 0.0);
        uniform.vertex_count += 1;
    }

    uniform
}

/// Repack the uniform when the collection changes. The render pipeline
/// receives it through resource extraction.
pub fn update_clip_region_uniform(
    collection: Res<ClipCollection>,
    mut state: ResMut<ClipUniformState>,
) {
    if !collection.is_changed() {
        return;
    }
    state.uniform = pack_clip_uniform(&collection);
}

/// The clipping session: both captures plus their mutual exclusion.
///
/// At most one capture owns the pointer channel at a time; beginning either
/// one force-cancels the other before binding input.
#[derive(Resource, Default)]
pub struct ClipSession {
    pub rectangle: RectangleCapture,
    pub polygon: PolygonCapture,
}

impl ClipSession {
    /// Anchor a rectangle capture. Returns true when a polygon capture had
    /// to be force-cancelled first.
    pub fn begin_rectangle(&mut self, anchor: Vec2) -> bool {
        let cancelled = self.polygon.cancel();
        self.rectangle.begin(anchor);
        cancelled
    }

    /// Commit a polygon vertex. Returns true when a rectangle capture had
    /// to be force-cancelled first.
    pub fn begin_polygon_vertex(&mut self, point: Vec3) -> bool {
        let cancelled = self.rectangle.cancel();
        self.polygon.add_vertex(point);
        cancelled
    }

    /// Tear down whichever capture is in progress.
    pub fn cancel_captures(&mut self) -> bool {
        let rectangle = self.rectangle.cancel();
        let polygon = self.polygon.cancel();
        rectangle || polygon
    }

    pub fn any_capturing(&self) -> bool {
        self.rectangle.is_capturing() || self.polygon.is_capturing()
    }
}

/// World-position pick with terrain and ellipsoid fallback, no
/// neighbourhood sampling. Vertex resolution for polygon capture.
pub fn resolve_surface_point(query: &dyn SceneQuery, screen: Vec2) -> Option<Vec3> {
    if let Some(world) = query.pick_exact(screen) {
        return Some(world);
    }
    if let Some(ray) = query.cast_ray(screen) {
        if let Some(world) = query.intersect_terrain(&ray) {
            return Some(world);
        }
    }
    query.project_onto_ellipsoid(screen)
}

/// Marker for the applied clip region visualisation.
#[derive(Component)]
pub struct ClipRegionOverlay;

/// Renderer: rebuilds the applied region visualisation when the collection
/// changes. Vertex markers, a closed outline, and a translucent fill.
pub fn update_clip_region_render(
    mut commands: Commands,
    collection: Res<ClipCollection>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<ClipRegionOverlay>>,
) {
    if !collection.is_changed() {
        return;
    }

    for entity in existing.iter() {
        commands.entity(entity).despawn();
    }

    let Some(region) = collection.region() else {
        return;
    };
    if region.vertices.len() < 3 {
        return;
    }

    let material = materials.add(StandardMaterial {
        base_color: Color::hsv(200., 0.8, 1.),
        emissive: LinearRgba::new(0.2, 0.6, 1., 1.),
        depth_bias: 0.0,
        unlit: true,
        ..default()
    });

    for point in &region.vertices {
        commands.spawn((
            Mesh3d(meshes.add(Sphere::new(DRAW_VERTEX_SIZE))),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(*point),
            ClipRegionOverlay,
            RenderLayers::layer(1),
        ));
    }

    // Closed outline.
    for i in 0..region.vertices.len() {
        let start = region.vertices[i];
        let end = region.vertices[(i + 1) % region.vertices.len()];
        let direction = end - start;
        let distance = direction.length();
        if distance <= 0.1 {
            continue;
        }
        let midpoint = (start + end) * 0.5;
        let rotation = Quat::from_rotation_arc(Vec3::X, direction.normalize());
        commands.spawn((
            Mesh3d(meshes.add(Cuboid::new(distance, DRAW_LINE_WIDTH, DRAW_LINE_WIDTH))),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(midpoint).with_rotation(rotation),
            ClipRegionOverlay,
            RenderLayers::layer(1),
        ));
    }

    let fill = materials.add(StandardMaterial {
        base_color: Color::srgba(0.2, 0.6, 1.0, 0.15),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        cull_mode: None,
        ..default()
    });
    commands.spawn((
        Mesh3d(meshes.add(create_region_mesh(&region.vertices))),
        MeshMaterial3d(fill),
        ClipRegionOverlay,
        RenderLayers::layer(1),
    ));
}

/// Fan-triangulated fill mesh over the region vertices. Suitable for convex
/// and simple concave shapes.
fn create_region_mesh(points: &[Vec3]) -> Mesh {
    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    );
    if points.len() < 3 {
        return mesh;
    }

    let vertices: Vec<[f32; 3]> = points.iter().map(|p| [p.x, p.y + 0.05, p.z]).collect();

    let mut indices = Vec::new();
    for i in 1..(points.len() - 1) {
        indices.extend_from_slice(&[0, i as u32, (i + 1) as u32]);
    }

    let normals: Vec<[f32; 3]> = (0..points.len()).map(|_| [0.0, 1.0, 0.0]).collect();

    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, vertices);
    mesh.insert_indices(bevy::render::mesh::Indices::U32(indices));
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh
}

pub struct ClipToolPlugin;

impl Plugin for ClipToolPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ClipSession>()
            .init_resource::<ClipCollection>()
            .init_resource::<ClipUniformState>()
            .add_systems(
                Update,
                (
                    rectangle::clip_rectangle_system,
                    rectangle::update_rectangle_overlay,
                    polygon::clip_polygon_system,
                    polygon::update_polygon_capture_render,
                    update_clip_region_render,
                    update_clip_region_uniform,
                ),
            );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Vec3> {
        vec![Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), Vec3::new(0.0, 0.0, 4.0)]
    }

    #[test]
    fn applying_a_region_replaces_the_previous_one() {
        let mut collection = ClipCollection::default();
        collection.apply_region(triangle());
        collection.apply_region(vec![Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE]);
        assert_eq!(collection.region().unwrap().vertices.len(), 4);
    }

    #[test]
    fn inversion_applies_to_current_and_future_regions() {
        let mut collection = ClipCollection::default();
        collection.set_inverse(true);
        assert!(collection.region().is_none());

        collection.apply_region(triangle());
        assert!(collection.region().unwrap().inverse);

        collection.set_inverse(false);
        assert!(!collection.region().unwrap().inverse);
    }

    #[test]
    fn clear_resets_inversion_and_empties_both_representations() {
        let mut collection = ClipCollection::default();
        collection.set_inverse(true);
        collection.apply_region(triangle());

        collection.clear();
        assert!(collection.is_empty());
        assert!(!collection.inverse());
    }

    #[test]
    fn beginning_a_rectangle_cancels_a_polygon_capture() {
        let mut session = ClipSession::default();
        session.begin_polygon_vertex(Vec3::ZERO);
        session.begin_polygon_vertex(Vec3::X);
        assert!(session.polygon.is_capturing());

        let cancelled = session.begin_rectangle(Vec2::new(5.0, 5.0));
        assert!(cancelled);
        assert!(!session.polygon.is_capturing());
        assert!(session.rectangle.is_capturing());
    }

    #[test]
    fn beginning_a_polygon_cancels_a_rectangle_capture() {
        let mut session = ClipSession::default();
        session.begin_rectangle(Vec2::ZERO);

        let cancelled = session.begin_polygon_vertex(Vec3::ZERO);
        assert!(cancelled);
        assert!(!session.rectangle.is_capturing());
        assert!(session.polygon.is_capturing());
    }

    #[test]
    fn at_most_one_capture_is_ever_active() {
        let mut session = ClipSession::default();
        session.begin_rectangle(Vec2::ZERO);
        session.begin_polygon_vertex(Vec3::ZERO);
        session.begin_rectangle(Vec2::ONE);

        let both = session.rectangle.is_capturing() && session.polygon.is_capturing();
        assert!(!both);
        assert!(session.any_capturing());
    }

    #[test]
    fn cancel_captures_tears_down_whichever_is_active() {
        let mut session = ClipSession::default();
        assert!(!session.cancel_captures());

        session.begin_polygon_vertex(Vec3::ZERO);
        assert!(session.cancel_captures());
        assert!(!session.any_capturing());
    }

    #[test]
    fn uniform_packs_footprint_and_inversion() {
        let mut collection = ClipCollection::default();
        collection.set_inverse(true);
        collection.apply_region(vec![
            Vec3::new(1.0, 7.0, 2.0),
            Vec3::new(3.0, 8.0, 4.0),
            Vec3::new(5.0, 9.0, 6.0),
        ]);

        let uniform = pack_clip_uniform(&collection);
        assert_eq!(uniform.vertex_count, 3);
        assert_eq!(uniform.inverse, 1);
        // XZ footprint only; height is irrelevant to the clip test.
        assert_eq!(uniform.vertices[0], Vec4::new(1.0, 2.0, 0.0, 0.0));
        assert_eq!(uniform.vertices[2], Vec4::new(5.0, 6.0, 0.0, 0.0));
    }

    #[test]
    fn empty_collection_packs_an_empty_uniform() {
        let uniform = pack_clip_uniform(&ClipCollection::default());
        assert_eq!(uniform.vertex_count, 0);
        assert_eq!(uniform.inverse, 0);
    }

    #[test]
    fn uniform_truncates_beyond_capacity() {
        let mut collection = ClipCollection::default();
        let many: Vec<Vec3> = (0..100)
            .map(|i| Vec3::new(i as f32, 0.0, i as f32))
            .collect();
        collection.apply_region(many);
        let uniform = pack_clip_uniform(&collection);
        assert_eq!(uniform.vertex_count, MAX_CLIP_VERTICES as u32);
    }
}
