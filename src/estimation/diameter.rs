//! Conversions between basal area, trees per hectare and quadratic mean
//! diameter through the identity `BA = DQ² · π/40000 · TPH`.

use super::float_math::sqrt;

/// π/40000, narrowed once.
pub const PI_40K: f32 = (std::f64::consts::PI / 40_000.0) as f32;

const MAX_INPUT: f32 = 1e6;

/// Trees per hectare from basal area (m²/ha) and quadratic mean diameter (cm).
/// Returns 0 unless both inputs are positive.
pub fn trees_per_hectare(basal_area: f32, quad_mean_diameter: f32) -> f32 {
    if basal_area > 0.0 && quad_mean_diameter > 0.0 {
        basal_area / PI_40K / (quad_mean_diameter * quad_mean_diameter)
    } else {
        0.0
    }
}

/// Quadratic mean diameter from basal area and trees per hectare. Returns 0
/// for non-positive, NaN or implausibly large inputs.
pub fn quad_mean_diameter(basal_area: f32, trees_per_hectare: f32) -> f32 {
    if basal_area > MAX_INPUT
        || trees_per_hectare > MAX_INPUT
        || basal_area.is_nan()
        || trees_per_hectare.is_nan()
    {
        0.0
    } else if basal_area > 0.0 && trees_per_hectare > 0.0 {
        sqrt(basal_area / trees_per_hectare / PI_40K)
    } else {
        0.0
    }
}

/// Basal area from quadratic mean diameter and trees per hectare.
pub fn basal_area(quad_mean_diameter: f32, trees_per_hectare: f32) -> f32 {
    if quad_mean_diameter.is_nan() || trees_per_hectare.is_nan() {
        0.0
    } else {
        quad_mean_diameter * quad_mean_diameter * PI_40K * trees_per_hectare
    }
}
