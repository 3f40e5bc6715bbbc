/// Coordinate transformation matrix (row-major: [x_new, y_new, z_new])
/// Default: -90° X rotation (Z→Y, -Y→Z, X→X)
pub const COORDINATE_TRANSFORM: [[f64; 3]; 3] = [
    [1.0, 0.0, 0.0],  // X = X
    [0.0, 0.0, 1.0],  // Y = Z
    [0.0, -1.0, 0.0], // Z = -Y
];

/// WGS84 semi-major axis in metres.
pub const WGS84_A: f64 = 6378137.0;
/// WGS84 first eccentricity squared.
pub const WGS84_E2: f64 = 6.69437999014e-3;
/// Mean earth radius used for great-circle arcs.
pub const WGS84_MEAN_RADIUS: f64 = 6371008.8;

/// Apply coordinate transformation matrix to ensure consistency.
/// Transforms input ENU coordinates into the engine frame.
pub fn transform_coordinates(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let input = [x, y, z];
    let mut output = [0.0; 3];

    for i in 0..3 {
        for j in 0..3 {
            output[i] += COORDINATE_TRANSFORM[i][j] * input[j];
        }
    }

    (output[0], output[1], output[2])
}

/// Inverse of [`transform_coordinates`]: engine frame back to ENU.
/// The transform is a pure rotation, so the inverse is its transpose.
pub fn engine_to_enu(x: f64, y: f64, z: f64) -> (f64, f64, f64) {
    let input = [x, y, z];
    let mut output = [0.0; 3];

    for i in 0..3 {
        for j in 0..3 {
            output[i] += COORDINATE_TRANSFORM[j][i] * input[j];
        }
    }

    (output[0], output[1], output[2])
}

/// Geodetic anchor of the local scene frame.
///
/// Scenes are exported in a local ENU frame; the origin ties that frame back
/// to the ellipsoid so surface distances can be computed in geodetic terms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeodeticOrigin {
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub height: f64,
}

impl GeodeticOrigin {
    /// ECEF position of the origin on the WGS84 ellipsoid.
    pub fn to_ecef(&self) -> [f64; 3] {
        let lat = self.lat_deg.to_radians();
        let lon = self.lon_deg.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let n0 = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
        [
            (n0 + self.height) * cos_lat * cos_lon,
            (n0 + self.height) * cos_lat * sin_lon,
            (n0 * (1.0 - WGS84_E2) + self.height) * sin_lat,
        ]
    }

    /// Convert a local ENU offset from this origin into ECEF.
    pub fn enu_to_ecef(&self, east: f64, north: f64, up: f64) -> [f64; 3] {
        let lat = self.lat_deg.to_radians();
        let lon = self.lon_deg.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();

        let origin = self.to_ecef();
        [
            origin[0] - sin_lon * east - sin_lat * cos_lon * north + cos_lat * cos_lon * up,
            origin[1] + cos_lon * east - sin_lat * sin_lon * north + cos_lat * sin_lon * up,
            origin[2] + cos_lat * north + sin_lat * up,
        ]
    }
}

/// Geodetic coordinates: latitude and longitude in radians, height in metres
/// above the ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geodetic {
    pub lat: f64,
    pub lon: f64,
    pub height: f64,
}

/// ECEF to geodetic via Bowring's closed-form approximation.
/// Sub-millimetre near the surface, which covers every surveyed scene.
pub fn ecef_to_geodetic(ecef: [f64; 3]) -> Geodetic {
    let [x, y, z] = ecef;
    let b = WGS84_A * (1.0 - WGS84_E2).sqrt();
    let p = (x * x + y * y).sqrt();

    // Polar axis: longitude is degenerate, pick 0.
    if p < 1e-9 {
        return Geodetic {
            lat: if z >= 0.0 {
                std::f64::consts::FRAC_PI_2
            } else {
                -std::f64::consts::FRAC_PI_2
            },
            lon: 0.0,
            height: z.abs() - b,
        };
    }

    let ep2 = WGS84_E2 / (1.0 - WGS84_E2);
    let theta = (z * WGS84_A).atan2(p * b);
    let (sin_t, cos_t) = theta.sin_cos();

    let lat = (z + ep2 * b * sin_t.powi(3)).atan2(p - WGS84_E2 * WGS84_A * cos_t.powi(3));
    let lon = y.atan2(x);

    let sin_lat = lat.sin();
    let n = WGS84_A / (1.0 - WGS84_E2 * sin_lat * sin_lat).sqrt();
    let height = p / lat.cos() - n;

    Geodetic { lat, lon, height }
}

/// Great-circle arc length between two geodetic positions, ignoring height.
/// Haversine form: exactly symmetric, exactly zero for coincident lat/lon.
pub fn surface_distance(a: &Geodetic, b: &Geodetic) -> f64 {
    let dlat = b.lat - a.lat;
    let dlon = b.lon - a.lon;

    let h = (dlat * 0.5).sin().powi(2)
        + a.lat.cos() * b.lat.cos() * (dlon * 0.5).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    WGS84_MEAN_RADIUS * c
}

#[cfg(test)]
mod tests {
    use super::*;

    const RIGA: GeodeticOrigin = GeodeticOrigin {
        lon_deg: 24.1052,
        lat_deg: 56.9496,
        height: 11.0,
    };

    #[test]
    fn transform_round_trips() {
        let (x, y, z) = transform_coordinates(3.0, -7.5, 12.25);
        let (e, n, u) = engine_to_enu(x, y, z);
        assert!((e - 3.0).abs() < 1e-12);
        assert!((n + 7.5).abs() < 1e-12);
        assert!((u - 12.25).abs() < 1e-12);
    }

    #[test]
    fn origin_ecef_recovers_geodetic() {
        let geo = ecef_to_geodetic(RIGA.to_ecef());
        assert!((geo.lat.to_degrees() - RIGA.lat_deg).abs() < 1e-7);
        assert!((geo.lon.to_degrees() - RIGA.lon_deg).abs() < 1e-7);
        assert!((geo.height - RIGA.height).abs() < 1e-3);
    }

    #[test]
    fn northward_enu_offset_moves_north() {
        let geo = ecef_to_geodetic(RIGA.enu_to_ecef(0.0, 100.0, 0.0));
        let origin = ecef_to_geodetic(RIGA.to_ecef());
        assert!(geo.lat > origin.lat);
        let d = surface_distance(&origin, &geo);
        assert!((d - 100.0).abs() < 0.1, "surface distance was {d}");
    }

    #[test]
    fn surface_distance_is_symmetric_and_zero_on_self() {
        let a = ecef_to_geodetic(RIGA.to_ecef());
        let b = ecef_to_geodetic(RIGA.enu_to_ecef(250.0, -40.0, 3.0));
        assert_eq!(surface_distance(&a, &a), 0.0);
        assert!((surface_distance(&a, &b) - surface_distance(&b, &a)).abs() < 1e-9);
    }

    #[test]
    fn vertical_offset_keeps_surface_distance_zero() {
        let low = ecef_to_geodetic(RIGA.enu_to_ecef(10.0, 20.0, 0.0));
        let high = ecef_to_geodetic(RIGA.enu_to_ecef(10.0, 20.0, 35.0));
        let d = surface_distance(&low, &high);
        assert!(d < 1e-3, "surface distance across heights was {d}");
        assert!((high.height - low.height - 35.0).abs() < 1e-3);
    }
}
