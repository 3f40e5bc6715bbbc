use bevy::prelude::*;
use bevy::render::extract_component::ExtractComponent;

#[derive(
    Component,
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    ExtractComponent,
    bevy::render::render_resource::ShaderType,
)]
pub struct EDLSettings {
    pub radius: f32,
    pub strength: f32,
    pub ambient_boost: f32,
    pub contrast: f32,
}

pub const EDL_SETTINGS: EDLSettings = EDLSettings {
    radius: 3.0,
    strength: 50.0,
    ambient_boost: 0.6,
    contrast: 1.1,
};

/// Stronger EDL preset applied while a measurement is being placed.
/// Sharper depth silhouettes make sparse surfaces easier to pick.
pub const EDL_SURVEY_SETTINGS: EDLSettings = EDLSettings {
    radius: 4.0,
    strength: 100.0,
    ambient_boost: 0.8,
    contrast: 1.2,
};

/// Distance attenuation of point sprite size, in multiples of the base size.
pub const POINT_ATTENUATION: f32 = 1.0;
pub const POINT_ATTENUATION_SURVEY: f32 = 1.6;

pub const DRAW_LINE_WIDTH: f32 = 0.076;
pub const MOUSE_RAYCAST_INTERSECTION_SPHERE_SIZE: f32 = 0.125;
pub const DRAW_VERTEX_SIZE: f32 = 0.08;

// Snap sampling disc. Radius is user-adjustable inside these bounds.
pub const SNAP_RADIUS_MIN_PX: f32 = 2.0;
pub const SNAP_RADIUS_MAX_PX: f32 = 30.0;
pub const SNAP_RADIUS_DEFAULT_PX: f32 = 10.0;
pub const SNAP_SAMPLE_STEP_PX: f32 = 4.0;
