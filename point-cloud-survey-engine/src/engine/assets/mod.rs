/// Spatial bounds metadata shared by picking and fallback geometry.
pub mod bounds;

/// Scene manifest JSON asset with terrain metadata and geodetic anchor.
pub mod scene_manifest;

/// The renderable target object sessions bind to.
pub mod survey_target;
