use crate::engine::assets::bounds::BoundsData;
use bevy::prelude::*;
use constants::coordinate_system::GeodeticOrigin;
use serde::{Deserialize, Serialize};

/// Texture file references for the terrain point cloud.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainTextureFiles {
    pub position: String,
    pub colour_class: String,
    pub heightmap: String,
}

/// Terrain point cloud data with texture file references and metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainData {
    pub texture_files: TerrainTextureFiles,
    pub bounds: BoundsData,
    pub point_count: usize,
    pub has_colour: bool,
}

/// Geodetic anchor of the local scene frame as exported by the data
/// pipeline. Mirrors the JSON field names exactly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeodeticOriginData {
    pub origin_lon: f64,
    pub origin_lat: f64,
    #[serde(default)]
    pub origin_height: f64,
}

impl From<GeodeticOriginData> for GeodeticOrigin {
    fn from(data: GeodeticOriginData) -> Self {
        GeodeticOrigin {
            lon_deg: data.origin_lon,
            lat_deg: data.origin_lat,
            height: data.origin_height,
        }
    }
}

/// Complete scene manifest as a Bevy asset. Mirrors JSON structure exactly.
#[derive(Asset, Debug, Clone, Serialize, Deserialize, TypePath, Resource)]
pub struct SceneManifest {
    pub terrain: TerrainData,
    pub scene_bounds: BoundsData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geodetic_origin: Option<GeodeticOriginData>,
}

impl SceneManifest {
    /// Get terrain bounds for camera positioning and pick filtering.
    pub fn terrain_bounds(&self) -> &BoundsData {
        &self.terrain.bounds
    }

    /// Geodetic origin of the local frame. Scenes exported without one are
    /// anchored at the equator, which degrades surface distances to the
    /// tangent-plane approximation without changing their scale.
    pub fn geodetic_origin(&self) -> GeodeticOrigin {
        self.geodetic_origin
            .map(GeodeticOrigin::from)
            .unwrap_or(GeodeticOrigin {
                lon_deg: 0.0,
                lat_deg: 0.0,
                height: 0.0,
            })
    }

}
