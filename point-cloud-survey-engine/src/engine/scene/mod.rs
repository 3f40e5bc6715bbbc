/// Bilinear heightmap sampling backing exact-position picks.
pub mod heightmap;
