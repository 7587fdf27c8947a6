//! Whole-layer estimates used when a stand is first built from inventory:
//! primary basal area and diameter, percent forest land, and the per-species
//! equation group assignment.

use tracing::{debug, info};

use super::float_math::{clamp, exp, ln, pow};
use super::Estimator;
use crate::error::YieldError;
use crate::models::{BecDefinition, Coefficients, Layer, Polygon, Species};

/// Crown closure below which basal area is estimated at this value and scaled down.
const LOW_CROWN_CLOSURE: f32 = 10.0;

const MIN_PRIMARY_BASAL_AREA: f32 = 0.05;

/// Sum of species percentages in `layer`; fails unless within 0.01 of 100.
pub fn percent_total(identifier: &str, layer: &Layer) -> Result<f32, YieldError> {
    let total = layer
        .species
        .iter()
        .map(|s| s.percent_genus as f64)
        .sum::<f64>() as f32;
    if (total - 100.0).abs() > 0.01 {
        return Err(YieldError::StandValidation(format!(
            "Polygon \"{identifier}\" has PRIMARY layer where species entries have a percentage total that does not sum to 100%."
        )));
    }
    Ok(total)
}

/// The species with the largest basal area fraction; ties go to the first listed.
pub fn lead_genus(layer: &Layer) -> Option<&Species> {
    layer.species.iter().fold(None, |best: Option<&Species>, spec| match best {
        Some(b) if b.fraction_genus >= spec.fraction_genus => Some(b),
        _ => Some(spec),
    })
}

/// Combine per-entity coefficients into one set.
///
/// Indices in `weighted` become the `weight`-weighted sum over all entities,
/// accumulated in double precision. Every other index is copied from the first
/// entity, as those coefficients are shared by all of them.
pub fn weighted_coefficient_sum<T, W, C>(
    weighted: &[i32],
    size: usize,
    index_from: i32,
    entities: &[T],
    weight: W,
    coefficients: C,
) -> Result<Coefficients, YieldError>
where
    W: Fn(&T) -> f32,
    C: Fn(&T) -> Result<Coefficients, YieldError>,
{
    let first = entities
        .first()
        .ok_or_else(|| YieldError::processing("Cannot sum coefficients over no entities"))?;

    let mut working = vec![0.0f64; size];
    for entity in entities {
        let coe = coefficients(entity)?;
        let fraction = weight(entity) as f64;
        for &i in weighted {
            if let Some(slot) = working.get_mut((i - index_from) as usize) {
                *slot += coe.coe(i) as f64 * fraction;
            }
        }
    }

    let mut result = Coefficients::empty(size, index_from);
    for &i in weighted {
        if let Some(value) = working.get((i - index_from) as usize) {
            result.set_coe(i, *value as f32);
        }
    }

    let any = coefficients(first)?;
    for i in index_from..index_from + size as i32 {
        if !weighted.contains(&i) {
            result.set_coe(i, any.coe(i));
        }
    }
    Ok(result)
}

impl Estimator<'_> {
    fn layer_coefficients(
        &self,
        weighted: &[i32],
        layer: &Layer,
        bec: &BecDefinition,
        basal_area: bool,
    ) -> Result<Coefficients, YieldError> {
        let zone = bec.decay_alias();
        weighted_coefficient_sum(
            weighted,
            9,
            0,
            &layer.species,
            |s| s.fraction_genus,
            |s| {
                if basal_area {
                    self.control.primary_basal_area_coefficients(zone, &s.genus)
                } else {
                    self.control
                        .primary_quad_mean_diameter_coefficients(zone, &s.genus)
                }
            },
        )
    }

    /// EMP040: basal area of the primary layer at the given crown closure.
    ///
    /// Fails with [`YieldError::LowValue`] when the estimate is 0.05 or less.
    pub fn estimate_primary_basal_area(
        &self,
        layer: &Layer,
        bec: &BecDefinition,
        yield_factor: f32,
        breast_height_age: f32,
        veteran_basal_area: f32,
        crown_closure: f32,
    ) -> Result<f32, YieldError> {
        let low_crown_closure = layer.crown_closure < LOW_CROWN_CLOSURE;
        let crown_closure = if low_crown_closure {
            LOW_CROWN_CLOSURE
        } else {
            crown_closure
        };

        let lead = lead_genus(layer)
            .ok_or_else(|| YieldError::processing("Layer has no species to lead it"))?;
        let coe = self.layer_coefficients(&[0, 1, 2, 3, 4, 5], layer, bec, true)?;

        let tr_age = ln(clamp(breast_height_age, 5.0, 350.0));
        let a00 = exp(coe.coe(0)) * (1.0 + coe.coe(1) * tr_age);
        let ap = exp(coe.coe(3)) + exp(coe.coe(4)) * tr_age;

        let height = layer.height.unwrap_or(0.0);
        let mut basal_area = 0.0;
        if height > coe.coe(2) - 3.0 {
            let f_height = if height <= coe.coe(2) + 3.0 {
                pow(height - (coe.coe(2) - 3.0), 2.0) / 12.0
            } else {
                height - coe.coe(2)
            };

            basal_area = a00
                * pow(crown_closure / 100.0, coe.coe(7) + coe.coe(8) * ln(height))
                * pow(f_height, ap)
                * exp(coe.coe(5) * height + coe.coe(6) * veteran_basal_area);

            basal_area *= self.control.basal_area_modifier(&lead.genus, bec.region);

            let upper = self.control.upper_bounds(bec.region, &lead.genus)?;
            basal_area = basal_area.min(upper.basal_area);

            if low_crown_closure {
                basal_area *= layer.crown_closure / LOW_CROWN_CLOSURE;
            }
        }

        basal_area *= yield_factor;

        // Anything smaller underflows later equations.
        if basal_area <= MIN_PRIMARY_BASAL_AREA {
            return Err(YieldError::LowValue {
                name: "Estimated base area".to_string(),
                value: basal_area,
                threshold: MIN_PRIMARY_BASAL_AREA,
            });
        }
        debug!(basal_area, crown_closure, "primary basal area");
        Ok(basal_area)
    }

    /// EMP041: quadratic mean diameter of the primary layer.
    pub fn estimate_primary_quad_mean_diameter(
        &self,
        layer: &Layer,
        bec: &BecDefinition,
        breast_height_age: f32,
        veteran_basal_area: f32,
    ) -> Result<f32, YieldError> {
        let lead = lead_genus(layer)
            .ok_or_else(|| YieldError::processing("Layer has no species to lead it"))?;
        let coe = self.layer_coefficients(&[0, 1, 2, 3, 4], layer, bec, false)?;

        let tr_age = ln(clamp(breast_height_age, 5.0, 350.0));
        let height = layer.height.unwrap_or(0.0);

        if height <= coe.coe(5) {
            return Ok(7.6);
        }

        let c0 = coe.coe(0);
        let c1 = exp(coe.coe(1)) + exp(coe.coe(2)) * tr_age;
        let c2 = exp(coe.coe(3)) + exp(coe.coe(4)) * tr_age;

        let mut dq = c0
            + pow(c1 * pow(height - coe.coe(5), c2), 2.0)
                * exp(coe.coe(7) * veteran_basal_area)
                * (1.0 - coe.coe(6) * layer.crown_closure / 100.0);

        dq *= self
            .control
            .quad_mean_diameter_modifier(&lead.genus, bec.region);
        dq = dq.max(7.6);

        let upper = self.control.upper_bounds(bec.region, &lead.genus)?;
        Ok(dq.min(upper.quad_mean_diameter))
    }

    /// Percent of the polygon that is stocked forest land.
    ///
    /// A supplied value is used as-is. Otherwise the yield at the layer's
    /// adjusted crown closure is compared against full (90%) closure and an
    /// age-limited gain toward 90% occupancy is added.
    pub fn estimate_percent_forest_land(&self, polygon: &Polygon, bec: &BecDefinition) -> Result<f32, YieldError> {
        if let Some(percent) = polygon.percent_available {
            return Ok(percent);
        }

        let primary = polygon.primary_layer()?;
        let veteran = polygon
            .veteran_layer()
            .filter(|v| v.height.unwrap_or(0.0) > 0.0 && v.crown_closure > 0.0);

        let age_total = primary.age_total.ok_or_else(|| {
            YieldError::StandValidation(format!(
                "Polygon \"{}\" primary layer has no total age",
                polygon.identifier
            ))
        })?;
        let years_to_breast_height = primary.years_to_breast_height.unwrap_or(0.0);

        // Crown closure is taken as linear in age up to 25 years.
        let mut crown_closure = primary.crown_closure;
        if age_total < 25.0 {
            crown_closure *= 25.0 / age_total;
        }
        if let Some(vet) = veteran {
            crown_closure += vet.crown_closure;
        }
        let crown_closure = clamp(crown_closure, 0.0, 100.0);

        let breast_height_age = (age_total - years_to_breast_height).max(5.0);
        let yield_factor = polygon.yield_factor;

        let top = self.estimate_primary_basal_area(primary, bec, yield_factor, breast_height_age, 0.0, 90.0)?;
        let hat =
            self.estimate_primary_basal_area(primary, bec, yield_factor, breast_height_age, 0.0, crown_closure)?;

        let percent_yield = if top > 0.0 && hat > 0.0 {
            (100.0 * hat / top).min(100.0)
        } else {
            90.0
        };

        let gain_max = if age_total > 125.0 {
            0.0
        } else if age_total < 25.0 {
            (90.0 - percent_yield).max(0.0)
        } else {
            (90.0 - percent_yield).max(0.0).min(125.0 - age_total)
        };

        let percent = (percent_yield + gain_max).min(100.0).floor();
        info!(polygon = %polygon.identifier, percent, "estimated percent forest land");
        Ok(percent)
    }

    /// Look up volume, decay and breakage groups for every species and derive
    /// each species' basal area fraction from its percentage.
    pub fn assign_equation_groups(&self, layer: &mut Layer, bec: &BecDefinition) -> Result<(), YieldError> {
        for spec in layer.species.iter_mut() {
            spec.volume_group = self.control.volume_group(&spec.genus, bec.volume_alias())?;
            spec.decay_group = self.control.decay_group(&spec.genus, bec.decay_alias())?;
            spec.breakage_group = self.control.breakage_group(&spec.genus, bec.decay_alias())?;
            spec.fraction_genus = spec.percent_genus / 100.0;
            debug!(
                genus = %spec.genus,
                volume_group = spec.volume_group,
                decay_group = spec.decay_group,
                breakage_group = spec.breakage_group,
                "assigned equation groups"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlMap, UpperBounds};
    use crate::models::{LayerType, Region};
    use assert_approx_eq::assert_approx_eq;
    use proptest::prelude::*;

    fn layer(species: &[(&str, f32)]) -> Layer {
        let mut layer = Layer::new(
            LayerType::Primary,
            species.iter().map(|(g, p)| Species::new(*g, *p)).collect(),
        );
        layer.crown_closure = 60.0;
        layer.height = Some(30.0);
        layer.age_total = Some(80.0);
        layer.years_to_breast_height = Some(5.0);
        layer
    }

    fn bec() -> BecDefinition {
        BecDefinition::new("CWH", Region::Coastal)
    }

    fn control() -> ControlMap {
        let mut c = ControlMap::default();
        // ba = exp(0) * (cc/100)^1 * fHeight^1
        for genus in ["B", "H"] {
            c.primary_basal_area.insert(
                ("CWH".to_string(), genus.to_string()),
                vec![0.0, 0.0, 5.0, 0.0, f32::NEG_INFINITY, 0.0, 0.0, 1.0, 0.0],
            );
            c.primary_quad_mean_diameter.insert(
                ("CWH".to_string(), genus.to_string()),
                vec![5.0, 0.0, f32::NEG_INFINITY, 0.0, f32::NEG_INFINITY, 10.0, 0.0, 0.0, 0.0],
            );
        }
        c.upper_bounds.insert(
            (Region::Coastal, "B".to_string()),
            UpperBounds {
                basal_area: 100.0,
                quad_mean_diameter: 61.1,
            },
        );
        c
    }

    #[test]
    fn test_percent_total_tolerance() {
        assert!(percent_total("p", &layer(&[("B", 60.0), ("H", 40.009)])).is_ok());
        assert!(percent_total("p", &layer(&[("B", 60.0), ("H", 39.991)])).is_ok());
        let err = percent_total("p", &layer(&[("B", 60.0), ("H", 40.02)])).unwrap_err();
        assert!(matches!(err, YieldError::StandValidation(_)));
    }

    #[test]
    fn test_lead_genus_first_of_ties() {
        let l = layer(&[("H", 50.0), ("B", 50.0)]);
        assert_eq!(lead_genus(&l).unwrap().genus, "B");
        let l = layer(&[("H", 70.0), ("B", 30.0)]);
        assert_eq!(lead_genus(&l).unwrap().genus, "H");
    }

    #[test]
    fn test_weighted_coefficient_sum() {
        let entities = [(0.25f32, vec![4.0f32, 8.0, 1.0]), (0.75, vec![8.0, 4.0, 2.0])];
        let coe = weighted_coefficient_sum(
            &[0, 1],
            3,
            0,
            &entities,
            |e| e.0,
            |e| Ok(Coefficients::new(e.1.clone(), 0)),
        )
        .unwrap();
        assert_approx_eq!(coe.coe(0), 7.0, 1e-6);
        assert_approx_eq!(coe.coe(1), 5.0, 1e-6);
        assert_eq!(coe.coe(2), 1.0);
    }

    #[test]
    fn test_weighted_coefficient_sum_requires_entities() {
        let entities: [f32; 0] = [];
        assert!(weighted_coefficient_sum(&[0], 1, 0, &entities, |e| *e, |_| Ok(Coefficients::empty(1, 0))).is_err());
    }

    #[test]
    fn test_primary_basal_area_closed_form() {
        let c = control();
        let est = Estimator::new(&c);
        let l = layer(&[("B", 60.0), ("H", 40.0)]);
        let ba = est
            .estimate_primary_basal_area(&l, &bec(), 1.0, 75.0, 0.0, 60.0)
            .unwrap();
        // ap = 1 and fHeight = 30 - 5
        assert_approx_eq!(ba, 0.6 * 25.0, 1e-4);

        let mut tall = l.clone();
        tall.height = Some(500.0);
        let capped = est
            .estimate_primary_basal_area(&tall, &bec(), 1.0, 75.0, 0.0, 60.0)
            .unwrap();
        assert_eq!(capped, 100.0);
    }

    #[test]
    fn test_primary_basal_area_low_crown_closure_scales() {
        let c = control();
        let est = Estimator::new(&c);
        let mut l = layer(&[("B", 100.0)]);
        l.height = Some(6.0);
        l.crown_closure = 5.0;
        let ba = est
            .estimate_primary_basal_area(&l, &bec(), 1.0, 5.0, 0.0, 5.0)
            .unwrap();
        // cc floored to 10, fHeight = 4^2/12, then scaled by 5/10
        assert_approx_eq!(ba, 0.1 * (16.0 / 12.0) * 0.5, 1e-5);
    }

    #[test]
    fn test_primary_basal_area_low_value() {
        let c = control();
        let est = Estimator::new(&c);
        let mut l = layer(&[("B", 100.0)]);
        l.height = Some(1.0);
        let err = est
            .estimate_primary_basal_area(&l, &bec(), 1.0, 75.0, 0.0, 60.0)
            .unwrap_err();
        match err {
            YieldError::LowValue { value, threshold, .. } => {
                assert_eq!(value, 0.0);
                assert_eq!(threshold, 0.05);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_primary_quad_mean_diameter() {
        let c = control();
        let est = Estimator::new(&c);
        let mut l = layer(&[("B", 100.0)]);
        // c1 = 1, c2 = 1: dq = 5 + (h - 10)^2
        l.height = Some(14.0);
        let dq = est
            .estimate_primary_quad_mean_diameter(&l, &bec(), 75.0, 0.0)
            .unwrap();
        assert_approx_eq!(dq, 21.0, 1e-4);

        l.height = Some(9.0);
        assert_eq!(est.estimate_primary_quad_mean_diameter(&l, &bec(), 75.0, 0.0).unwrap(), 7.6);

        l.height = Some(40.0);
        assert_eq!(est.estimate_primary_quad_mean_diameter(&l, &bec(), 75.0, 0.0).unwrap(), 61.1);
    }

    #[test]
    fn test_percent_forest_land_prefers_supplied_value() {
        let c = ControlMap::default();
        let est = Estimator::new(&c);
        let mut polygon = Polygon::new("p", "CWH");
        polygon.percent_available = Some(85.0);
        assert_eq!(est.estimate_percent_forest_land(&polygon, &bec()).unwrap(), 85.0);
    }

    #[test]
    fn test_percent_forest_land_estimated() {
        let c = control();
        let est = Estimator::new(&c);
        let mut polygon = Polygon::new("p", "CWH");
        let mut l = layer(&[("B", 100.0)]);
        l.height = Some(6.0);
        l.crown_closure = 40.0;
        l.age_total = Some(100.0);
        polygon.layers.push(l);
        // Yield is linear in crown closure: 40/90 = 44.4%, gain limited to 125 - 100.
        let percent = est.estimate_percent_forest_land(&polygon, &bec()).unwrap();
        assert_eq!(percent, 69.0);
    }

    #[test]
    fn test_assign_equation_groups() {
        let mut c = ControlMap::default();
        let mut b = bec();
        b.volume_alias = Some("CDF".to_string());
        c.volume_groups.insert(("B".to_string(), "CDF".to_string()), 7);
        c.decay_groups.insert(("B".to_string(), "CWH".to_string()), 8);
        c.breakage_groups.insert(("B".to_string(), "CWH".to_string()), 9);
        let est = Estimator::new(&c);
        let mut l = layer(&[("B", 100.0)]);
        est.assign_equation_groups(&mut l, &b).unwrap();
        let spec = &l.species[0];
        assert_eq!((spec.volume_group, spec.decay_group, spec.breakage_group), (7, 8, 9));
        assert_eq!(spec.fraction_genus, 1.0);
    }

    proptest! {
        #[test]
        fn prop_percent_total_band(delta in -0.0099f32..0.0099) {
            let l = layer(&[("B", 50.0), ("H", 50.0 + delta)]);
            prop_assert!(percent_total("p", &l).is_ok());
        }
    }
}
