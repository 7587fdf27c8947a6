//! Single-precision wrappers around the transcendental functions.
//!
//! Every function evaluates in `f64` and narrows the result, so chained
//! estimators round the same way at every stage boundary.

use crate::error::YieldError;

/// Largest logit whose exponential still fits in an `f32`.
const MAX_LOGIT: f32 = 88.0;

pub fn exp(x: f32) -> f32 {
    (x as f64).exp() as f32
}

pub fn ln(x: f32) -> f32 {
    (x as f64).ln() as f32
}

pub fn pow(base: f32, exponent: f32) -> f32 {
    (base as f64).powf(exponent as f64) as f32
}

pub fn sqrt(x: f32) -> f32 {
    (x as f64).sqrt() as f32
}

pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Logistic function of `arg`, saturating to exactly 0 or 1 outside `±radius`.
pub fn ratio(arg: f32, radius: f32) -> f32 {
    if arg < -radius {
        0.0
    } else if arg > radius {
        1.0
    } else {
        let e = exp(arg);
        e / (1.0 + e)
    }
}

/// `exp(logit)`, failing rather than overflowing to infinity.
pub fn safe_exponent(logit: f32) -> Result<f32, YieldError> {
    if logit > MAX_LOGIT {
        return Err(YieldError::processing(format!("logit {logit} exceeds 88")));
    }
    Ok(exp(logit))
}

/// `e / (1 + e)` where `e = exp(logit)`.
pub fn exponent_ratio(logit: f32) -> Result<f32, YieldError> {
    let e = safe_exponent(logit)?;
    Ok(e / (1.0 + e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_ratio_saturates_outside_radius() {
        assert_eq!(ratio(-7.5, 7.0), 0.0);
        assert_eq!(ratio(7.5, 7.0), 1.0);
        assert_approx_eq!(ratio(0.0, 7.0), 0.5, 1e-6);
    }

    #[test]
    fn test_ratio_inside_radius_is_logistic() {
        let e = (1.2f64).exp() as f32;
        assert_approx_eq!(ratio(1.2, 8.0), e / (1.0 + e), 1e-6);
    }

    #[test]
    fn test_exponent_ratio() {
        assert_approx_eq!(exponent_ratio(0.0).unwrap(), 0.5, 1e-6);
        assert!(exponent_ratio(-20.0).unwrap() < 1e-8);
    }

    #[test]
    fn test_safe_exponent_rejects_large_logit() {
        assert!(safe_exponent(88.0).is_ok());
        let err = safe_exponent(88.5).unwrap_err();
        assert!(err.to_string().contains("exceeds 88"));
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, 7.6, 20.0), 7.6);
        assert_eq!(clamp(25.0, 7.6, 20.0), 20.0);
        assert_eq!(clamp(10.0, 7.6, 20.0), 10.0);
    }
}
