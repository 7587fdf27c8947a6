//! Small (<7.5 cm) component of each species and of the layer.

use tracing::debug;

use super::diameter::{quad_mean_diameter, trees_per_hectare};
use super::float_math::{exp, ln, pow};
use super::Estimator;
use crate::error::YieldError;
use crate::models::{Layer, Region, Species};

/// Small component values for one species.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmallComponent {
    pub probability: f32,
    pub basal_area: f32,
    pub quad_mean_diameter: f32,
    pub lorey_height: f32,
    pub trees_per_hectare: f32,
    pub whole_stem_volume: f32,
}

impl Estimator<'_> {
    /// EMP080: probability a species has a small component at all.
    pub fn small_component_probability(
        &self,
        spec: &Species,
        region: Region,
        layer_breast_height_age: Option<f32>,
    ) -> Result<f32, YieldError> {
        let coe = self.control.small_probability_coefficients(&spec.genus)?;
        let coast = if region == Region::Coastal { 1.0 } else { 0.0 };
        let logit = coe.coe(1)
            + coe.coe(2) * coast
            + coe.coe(3) * layer_breast_height_age.unwrap_or(0.0)
            + coe.coe(4) * spec.utilization.lorey_height.all;
        Ok(exp(logit) / (1.0 + exp(logit)))
    }

    /// EMP081: expected small basal area given that there is some.
    pub fn conditional_expected_basal_area(&self, spec: &Species, basal_area: f32) -> Result<f32, YieldError> {
        let coe = self.control.small_basal_area_coefficients(&spec.genus)?;
        // The regional term is always evaluated as interior.
        let coast = 0.0;
        let arg = (coe.coe(1) + coe.coe(2) * coast + coe.coe(3) * basal_area)
            * exp(coe.coe(4) * spec.utilization.lorey_height.all);
        Ok(arg.max(0.0))
    }

    /// EMP082: quadratic mean diameter of the small component.
    pub fn small_component_quad_mean_diameter(&self, spec: &Species) -> Result<f32, YieldError> {
        let coe = self.control.small_quad_mean_diameter_coefficients(&spec.genus)?;
        let logit = coe.coe(1) + coe.coe(2) * spec.utilization.lorey_height.all;
        Ok(4.0 + 3.5 * exp(logit) / (1.0 + exp(logit)))
    }

    /// EMP085: lorey height of the small component.
    pub fn small_component_lorey_height(&self, spec: &Species, small_dq: f32) -> Result<f32, YieldError> {
        let coe = self.control.small_lorey_height_coefficients(&spec.genus)?;
        let a0 = coe.coe(1);
        let a1 = coe.coe(2);
        let hl = spec.utilization.lorey_height.all;
        let dq = spec.utilization.quad_mean_diameter.all();
        Ok(1.3 + (hl - 1.3) * exp(a0 * (pow(small_dq, a1) - pow(dq, a1))))
    }

    /// EMP086: mean whole-stem volume of a small tree.
    pub fn small_component_mean_volume(&self, spec: &Species, small_dq: f32, small_hl: f32) -> Result<f32, YieldError> {
        let coe = self.control.small_whole_stem_volume_coefficients(&spec.genus)?;
        Ok(exp(
            coe.coe(1) + coe.coe(2) * ln(small_dq) + coe.coe(3) * ln(small_hl) + coe.coe(4) * small_dq,
        ))
    }

    /// Run the small component chain for one species without modifying it.
    pub fn small_component(
        &self,
        spec: &Species,
        region: Region,
        layer_breast_height_age: Option<f32>,
        percent_available: Option<f32>,
    ) -> Result<SmallComponent, YieldError> {
        let probability = self.small_component_probability(spec, region, layer_breast_height_age)?;

        // Evaluated on actual, not fully stocked, basal area.
        let fraction_available = percent_available.map(|p| p / 100.0).unwrap_or(1.0);
        let basal_area = spec.utilization.basal_area.all() * fraction_available;
        let conditional = self.conditional_expected_basal_area(spec, basal_area)? / fraction_available;

        let small_ba = probability * conditional;
        let small_dq = self.small_component_quad_mean_diameter(spec)?;
        let small_hl = self.small_component_lorey_height(spec, small_dq)?;
        let mean_volume = self.small_component_mean_volume(spec, small_dq, small_hl)?;
        let small_tph = trees_per_hectare(small_ba, small_dq);

        Ok(SmallComponent {
            probability,
            basal_area: small_ba,
            quad_mean_diameter: small_dq,
            lorey_height: small_hl,
            trees_per_hectare: small_tph,
            whole_stem_volume: small_tph * mean_volume,
        })
    }

    /// Estimate the small component of every species in `layer` and of the
    /// layer itself.
    pub fn estimate_small_components(
        &self,
        layer: &mut Layer,
        region: Region,
        percent_available: Option<f32>,
    ) -> Result<(), YieldError> {
        let layer_age = layer.breast_height_age();

        let mut lorey_height_sum = 0.0f32;
        let mut basal_area_sum = 0.0f32;
        let mut trees_per_hectare_sum = 0.0f32;
        let mut volume_sum = 0.0f32;

        for spec in layer.species.iter_mut() {
            let small = self.small_component(spec, region, layer_age, percent_available)?;
            debug!(genus = %spec.genus, ?small, "small component");

            let u = &mut spec.utilization;
            u.lorey_height.small = small.lorey_height;
            u.basal_area.set_small(small.basal_area);
            u.trees_per_hectare.set_small(small.trees_per_hectare);
            u.quad_mean_diameter.set_small(small.quad_mean_diameter);
            u.whole_stem_volume.set_small(small.whole_stem_volume);

            lorey_height_sum += small.basal_area * small.lorey_height;
            basal_area_sum += small.basal_area;
            trees_per_hectare_sum += small.trees_per_hectare;
            volume_sum += small.whole_stem_volume;
        }

        let u = &mut layer.utilization;
        u.lorey_height.small = if basal_area_sum > 0.0 {
            lorey_height_sum / basal_area_sum
        } else {
            0.0
        };
        u.basal_area.set_small(basal_area_sum);
        u.trees_per_hectare.set_small(trees_per_hectare_sum);
        u.quad_mean_diameter
            .set_small(quad_mean_diameter(basal_area_sum, trees_per_hectare_sum));
        u.whole_stem_volume.set_small(volume_sum);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlMap;
    use crate::models::{LayerType, LoreyHeightVector, UtilizationVector};
    use assert_approx_eq::assert_approx_eq;

    fn control(genera: &[&str]) -> ControlMap {
        let mut c = ControlMap::default();
        for genus in genera {
            let g = genus.to_string();
            c.small_probability.insert(g.clone(), vec![0.0, 0.0, 0.0, 0.0]);
            c.small_basal_area.insert(g.clone(), vec![0.5, 1.0, 0.01, 0.0]);
            c.small_quad_mean_diameter.insert(g.clone(), vec![0.0, 0.0]);
            c.small_lorey_height.insert(g.clone(), vec![0.0, 1.0]);
            c.small_whole_stem_volume.insert(g, vec![-5.0, 0.0, 0.0, 0.0]);
        }
        c
    }

    fn species(genus: &str, ba: f32, hl: f32) -> Species {
        let mut spec = Species::new(genus, 50.0);
        spec.utilization.basal_area.set_all(ba);
        spec.utilization.quad_mean_diameter.set_all(20.0);
        spec.utilization.lorey_height = LoreyHeightVector::new(0.0, hl);
        spec
    }

    #[test]
    fn test_neutral_coefficients() {
        let c = control(&["B"]);
        let est = Estimator::new(&c);
        let spec = species("B", 10.0, 20.0);
        let small = est
            .small_component(&spec, Region::Coastal, Some(50.0), None)
            .unwrap();
        assert_approx_eq!(small.probability, 0.5, 1e-6);
        // coast term is ignored: 0.5 + 0.01 * 10
        assert_approx_eq!(small.basal_area, 0.5 * 0.6, 1e-6);
        assert_approx_eq!(small.quad_mean_diameter, 5.75, 1e-6);
        assert_approx_eq!(small.lorey_height, 20.0, 1e-5);
        let tph = trees_per_hectare(0.3, 5.75);
        assert_approx_eq!(small.trees_per_hectare, tph, 1e-3);
        assert_approx_eq!(small.whole_stem_volume, tph * (-5.0f32).exp(), 1e-4);
    }

    #[test]
    fn test_percent_available_cancels_for_linear_term() {
        let mut c = control(&["B"]);
        c.small_basal_area
            .insert("B".to_string(), vec![0.0, 0.0, 0.01, 0.0]);
        let est = Estimator::new(&c);
        let spec = species("B", 10.0, 20.0);
        let full = est.small_component(&spec, Region::Interior, None, None).unwrap();
        let half = est
            .small_component(&spec, Region::Interior, None, Some(50.0))
            .unwrap();
        assert_approx_eq!(full.basal_area, half.basal_area, 1e-6);
    }

    #[test]
    fn test_layer_aggregate() {
        let c = control(&["B", "H"]);
        let est = Estimator::new(&c);
        let mut layer = Layer::new(
            LayerType::Primary,
            vec![species("B", 10.0, 20.0), species("H", 20.0, 30.0)],
        );
        est.estimate_small_components(&mut layer, Region::Coastal, None)
            .unwrap();
        let b = &layer.species[0].utilization;
        let h = &layer.species[1].utilization;
        let total_ba = b.basal_area.small() + h.basal_area.small();
        assert_approx_eq!(layer.utilization.basal_area.small(), total_ba, 1e-6);
        let expected_hl = (b.basal_area.small() * b.lorey_height.small
            + h.basal_area.small() * h.lorey_height.small)
            / total_ba;
        assert_approx_eq!(layer.utilization.lorey_height.small, expected_hl, 1e-4);
        assert_approx_eq!(
            layer.utilization.trees_per_hectare.small(),
            b.trees_per_hectare.small() + h.trees_per_hectare.small(),
            1e-3
        );
    }

    #[test]
    fn test_zero_small_basal_area_gives_zero_height() {
        let mut c = control(&["B"]);
        c.small_basal_area
            .insert("B".to_string(), vec![-1.0, 0.0, 0.0, 0.0]);
        let est = Estimator::new(&c);
        let mut layer = Layer::new(LayerType::Primary, vec![species("B", 10.0, 20.0)]);
        est.estimate_small_components(&mut layer, Region::Coastal, None)
            .unwrap();
        assert_eq!(layer.utilization.basal_area.small(), 0.0);
        assert_eq!(layer.utilization.lorey_height.small, 0.0);
        assert_eq!(layer.utilization.quad_mean_diameter.small(), 0.0);
        assert_eq!(layer.utilization.trees_per_hectare, UtilizationVector::zeros());
    }

    #[test]
    fn test_missing_coefficients() {
        let c = control(&["B"]);
        let est = Estimator::new(&c);
        let mut layer = Layer::new(LayerType::Primary, vec![species("H", 10.0, 20.0)]);
        assert!(est
            .estimate_small_components(&mut layer, Region::Coastal, None)
            .is_err());
    }
}
