/// Scene metadata assets and the survey target binding.
pub mod assets;

/// Orbit camera and navigation controller.
pub mod camera;

/// Application lifecycle states.
pub mod core;

/// Screen-to-world picking facade consumed by the survey tools.
pub mod picking;

/// Terrain sampling utilities.
pub mod scene;

/// Point-cloud shading state (attenuation + eye-dome lighting).
pub mod shading;
