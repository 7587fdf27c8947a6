//! Invariants enforced on a polygon once its layers have been computed.

use tracing::debug;

use super::diameter::{basal_area, quad_mean_diameter};
use crate::error::YieldError;
use crate::models::{LayerType, Polygon, UtilizationClass, UtilizationField, UtilizationSet};

const MAX_ACCEPTABLE_BASAL_AREA_ERROR: f32 = 0.1;
const DQ_EPS: f32 = 0.005;

/// Scale the primary layer to a fully forested hectare, then make every
/// layer and species consistent class by class: clear classes with no basal
/// area or trees, pull basal area inside the class' diameter limits and
/// recompute diameter from basal area and trees per hectare.
pub fn apply_post_create_adjustments(polygon: &mut Polygon) -> Result<(), YieldError> {
    let identifier = polygon.identifier.clone();

    if let Some(percent_forested) = polygon.percent_available {
        if percent_forested > 0.0 && percent_forested < 100.0 {
            let factor = 100.0 / percent_forested;
            debug!(polygon = %identifier, factor, "scaling primary layer to forested area");
            if let Some(primary) = polygon.layer_mut(LayerType::Primary) {
                scale_per_hectare(&mut primary.utilization, factor);
                for spec in primary.species.iter_mut() {
                    scale_per_hectare(&mut spec.utilization, factor);
                }
            }
        }
    }

    for layer in polygon.layers.iter_mut() {
        let name = format!("{identifier} {}", layer.layer_type);
        adjust_holder(&name, &mut layer.utilization)?;
        for spec in layer.species.iter_mut() {
            let name = format!("{name} {}", spec.genus);
            adjust_holder(&name, &mut spec.utilization)?;
        }
    }
    Ok(())
}

fn adjust_holder(name: &str, u: &mut UtilizationSet) -> Result<(), YieldError> {
    reset_on_missing_values(u);
    adjust_basal_area_to_match_trees_per_hectare(name, u)?;
    calculate_quad_mean_diameter(name, u)
}

/// Multiply the positive per-hectare values by `factor`. Lorey height and
/// diameter are not per-hectare values and are left alone.
fn scale_per_hectare(u: &mut UtilizationSet, factor: f32) {
    for field in UtilizationField::SUMMABLE {
        let v = u.vector_mut(field);
        for uc in UtilizationClass::ALL_CLASSES {
            if v[uc] > 0.0 {
                v[uc] *= factor;
            }
        }
    }
}

/// Clear every per-hectare value of a class lacking basal area or trees.
/// Lorey height is kept.
fn reset_on_missing_values(u: &mut UtilizationSet) {
    for uc in UtilizationClass::ALL_CLASSES {
        if u.basal_area[uc] <= 0.0 || u.trees_per_hectare[uc] <= 0.0 {
            for field in UtilizationField::SUMMABLE {
                u.vector_mut(field)[uc] = 0.0;
            }
        }
    }
}

fn adjust_basal_area_to_match_trees_per_hectare(name: &str, u: &mut UtilizationSet) -> Result<(), YieldError> {
    for uc in UtilizationClass::ALL_CLASSES {
        let tph = u.trees_per_hectare[uc];
        if tph <= 0.0 {
            continue;
        }
        let lower = basal_area(uc.low_bound() + DQ_EPS, tph);
        let upper = basal_area(uc.high_bound() - DQ_EPS, tph);
        let ba = u.basal_area[uc];

        let (adjusted, direction) = if ba < lower {
            (lower, "below")
        } else if ba > upper {
            (upper, "above")
        } else {
            continue;
        };

        let error = (ba - adjusted).abs();
        if error > MAX_ACCEPTABLE_BASAL_AREA_ERROR {
            return Err(YieldError::processing(format!(
                "{name}: basal area {ba} in class {uc} is {error} {direction} threshold, exceeding the maximum error of {MAX_ACCEPTABLE_BASAL_AREA_ERROR}"
            )));
        }
        debug!(holder = name, class = %uc, ba, adjusted, "basal area moved inside class limits");
        u.basal_area[uc] = adjusted;
    }
    Ok(())
}

/// Diameter is always recomputed; any value already held is ignored.
fn calculate_quad_mean_diameter(name: &str, u: &mut UtilizationSet) -> Result<(), YieldError> {
    for uc in UtilizationClass::ALL_CLASSES {
        let ba = u.basal_area[uc];
        if ba <= 0.0 {
            continue;
        }
        let mut dq = quad_mean_diameter(ba, u.trees_per_hectare[uc]);

        if dq < uc.low_bound() {
            dq += DQ_EPS;
            if dq < uc.low_bound() {
                return Err(YieldError::processing(format!(
                    "{name}: calculated quad-mean-diameter value {dq} in class {uc} is below lower limit {}",
                    uc.low_bound()
                )));
            }
        } else if dq > uc.high_bound() {
            dq -= DQ_EPS;
            if dq > uc.high_bound() {
                return Err(YieldError::processing(format!(
                    "{name}: calculated quad-mean-diameter value {dq} in class {uc} is above upper limit {}",
                    uc.high_bound()
                )));
            }
        }
        u.quad_mean_diameter[uc] = dq;
    }
    Ok(())
}
