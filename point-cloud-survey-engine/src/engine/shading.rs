use bevy::prelude::*;
use constants::render_settings::{
    EDL_SETTINGS, EDL_SURVEY_SETTINGS, EDLSettings, POINT_ATTENUATION, POINT_ATTENUATION_SURVEY,
};

/// One complete shading configuration for the target cloud.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingParams {
    pub attenuation: f32,
    pub edl: EDLSettings,
}

impl ShadingParams {
    pub fn normal() -> Self {
        Self {
            attenuation: POINT_ATTENUATION,
            edl: EDL_SETTINGS,
        }
    }

    /// Enhanced preset used while a measurement is being placed: larger
    /// attenuated sprites and stronger eye-dome lighting close the visual
    /// gaps between points, which is what makes neighbourhood picks land.
    pub fn survey() -> Self {
        Self {
            attenuation: POINT_ATTENUATION_SURVEY,
            edl: EDL_SURVEY_SETTINGS,
        }
    }
}

/// Current shading of the target cloud.
///
/// The measurement session swaps in the survey preset on its first placement
/// and restores whatever was active before it on every exit path.
#[derive(Resource, Clone)]
pub struct PointShading {
    pub current: ShadingParams,
}

impl Default for PointShading {
    fn default() -> Self {
        Self {
            current: ShadingParams::normal(),
        }
    }
}

impl PointShading {
    /// Replace the active parameters, returning the prior configuration so
    /// the caller can restore it later.
    pub fn apply(&mut self, params: ShadingParams) -> ShadingParams {
        std::mem::replace(&mut self.current, params)
    }
}

/// Push shading changes onto the camera's EDL settings through change
/// detection, the same route the render pipeline reads them from.
pub fn sync_edl_settings(
    shading: Res<PointShading>,
    mut cameras: Query<&mut EDLSettings, With<Camera3d>>,
) {
    if !shading.is_changed() {
        return;
    }
    for mut edl in &mut cameras {
        *edl = shading.current.edl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_returns_prior_configuration() {
        let mut shading = PointShading::default();
        let prior = shading.apply(ShadingParams::survey());
        assert_eq!(prior, ShadingParams::normal());
        assert_eq!(shading.current, ShadingParams::survey());

        let survey = shading.apply(prior);
        assert_eq!(survey, ShadingParams::survey());
        assert_eq!(shading.current, ShadingParams::normal());
    }
}
