use crate::engine::assets::bounds::{BoundsData, PointCloudBounds};
use crate::engine::assets::scene_manifest::SceneManifest;
use crate::error::EngineError;
use bevy::prelude::*;
use constants::coordinate_system::GeodeticOrigin;

/// Marker for the renderable entity the survey tools operate on.
#[derive(Component)]
pub struct SurveyCloud;

/// The single renderable object both sessions bind to: its bounds, its
/// geodetic anchor, and the heightmap that backs exact-position picking.
///
/// Exactly one target exists per scene; sessions refuse to run until it is
/// bound, and binding fails hard when the manifest describes nothing usable.
#[derive(Resource)]
pub struct SurveyTarget {
    pub entity: Entity,
    pub bounds: PointCloudBounds,
    pub origin: GeodeticOrigin,
    pub heightmap: Handle<Image>,
}

impl SurveyTarget {
    /// Bind the survey target from a loaded manifest.
    ///
    /// This is the one hard error path in the engine: a degenerate or empty
    /// terrain block means no session can ever resolve a point, so the
    /// caller must not construct any tool against it.
    pub fn bind(
        manifest: &SceneManifest,
        entity: Entity,
        heightmap: Handle<Image>,
    ) -> Result<Self, EngineError> {
        if manifest.terrain.point_count == 0 {
            return Err(EngineError::TargetUnavailable(
                "terrain contains no points".into(),
            ));
        }

        let b = manifest.terrain_bounds();
        if !bounds_usable(b) {
            return Err(EngineError::ManifestIncomplete(format!(
                "degenerate terrain bounds: x [{}, {}], z [{}, {}]",
                b.min_x, b.max_x, b.min_z, b.max_z
            )));
        }

        Ok(Self {
            entity,
            bounds: PointCloudBounds {
                bounds: b.clone(),
                total_points: manifest.terrain.point_count,
                loaded_points: manifest.terrain.point_count,
                texture_size: 0,
            },
            origin: manifest.geodetic_origin(),
            heightmap,
        })
    }
}

fn bounds_usable(b: &BoundsData) -> bool {
    b.max_x > b.min_x && b.max_z > b.min_z && b.max_y >= b.min_y
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::assets::scene_manifest::{TerrainData, TerrainTextureFiles};

    fn manifest(point_count: usize, max_x: f64) -> SceneManifest {
        let bounds = BoundsData {
            min_x: 0.0,
            max_x,
            min_y: 0.0,
            max_y: 4.0,
            min_z: 0.0,
            max_z: 20.0,
        };
        SceneManifest {
            terrain: TerrainData {
                texture_files: TerrainTextureFiles {
                    position: "pos.dds".into(),
                    colour_class: "col.dds".into(),
                    heightmap: "hgt.dds".into(),
                },
                bounds: bounds.clone(),
                point_count,
                has_colour: true,
            },
            scene_bounds: bounds,
            geodetic_origin: None,
        }
    }

    #[test]
    fn binds_a_usable_manifest() {
        let target = SurveyTarget::bind(
            &manifest(500, 20.0),
            Entity::from_raw(1),
            Handle::default(),
        );
        assert!(target.is_ok());
    }

    #[test]
    fn empty_terrain_is_a_hard_error() {
        let err = SurveyTarget::bind(
            &manifest(0, 20.0),
            Entity::from_raw(1),
            Handle::default(),
        );
        assert!(matches!(err, Err(EngineError::TargetUnavailable(_))));
    }

    #[test]
    fn degenerate_bounds_are_a_hard_error() {
        let err = SurveyTarget::bind(
            &manifest(500, 0.0),
            Entity::from_raw(1),
            Handle::default(),
        );
        assert!(matches!(err, Err(EngineError::ManifestIncomplete(_))));
    }
}
