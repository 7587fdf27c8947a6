//! Breaks each species' ALL values down into utilization classes and rolls
//! the species back up into the layer.

use tracing::{debug, trace};

use super::diameter::{quad_mean_diameter, trees_per_hectare};
use super::float_math::{clamp, exp};
use super::reconcile::reconcile_components;
use super::volume::VolumeContext;
use super::Estimator;
use crate::config::{CompatibilityVariableMode, ProcessingContext, VolumeComputeMode};
use crate::control::ControlMap;
use crate::error::YieldError;
use crate::models::{
    BecDefinition, CopyRule, Layer, LoreyHeightVector, Species, UtilizationClass, UtilizationField,
    UtilizationSet, UtilizationVector, VolumeVariable,
};

/// Adjustment terms for the close-utilization, net-of-decay and
/// net-of-decay-and-waste stages.
#[derive(Debug, Default)]
struct VolumeAdjustments {
    close_utilization: UtilizationVector,
    decay: UtilizationVector,
    decay_waste: UtilizationVector,
}

/// Computes utilization components for the layers of one polygon.
#[derive(Debug, Clone, Copy)]
pub struct UtilizationComputer<'a> {
    estimator: Estimator<'a>,
    context: ProcessingContext,
}

impl<'a> UtilizationComputer<'a> {
    pub fn new(control: &'a ControlMap, context: ProcessingContext) -> Self {
        Self {
            estimator: Estimator::new(control),
            context,
        }
    }

    pub fn estimator(&self) -> Estimator<'a> {
        self.estimator
    }

    /// Decompose every species of the primary layer into utilization
    /// classes, then aggregate the layer and refresh species fractions.
    pub fn compute_primary(
        &self,
        bec: &BecDefinition,
        layer: &mut Layer,
        volume_mode: VolumeComputeMode,
        compatibility_mode: CompatibilityVariableMode,
    ) -> Result<(), YieldError> {
        debug!(
            species = layer.species.len(),
            genera = %layer.genera().join(", "),
            "computing primary layer utilization components"
        );
        let breast_height_age = layer.breast_height_age().unwrap_or(0.0);

        for spec in layer.species.iter_mut() {
            self.compute_species(bec, spec, breast_height_age, volume_mode, compatibility_mode)?;
        }

        compute_layer_from_species(layer);

        let layer_basal_area = layer.utilization.basal_area.all();
        for spec in layer.species.iter_mut() {
            if layer_basal_area > 0.0 {
                spec.fraction_genus = spec.utilization.basal_area.all() / layer_basal_area;
            }
            debug!(genus = %spec.genus, fraction = spec.fraction_genus, "species basal area fraction");
        }
        Ok(())
    }

    fn compute_species(
        &self,
        bec: &BecDefinition,
        spec: &mut Species,
        breast_height_age: f32,
        volume_mode: VolumeComputeMode,
        compatibility_mode: CompatibilityVariableMode,
    ) -> Result<(), YieldError> {
        let lorey_height = spec.utilization.lorey_height.all;
        let basal_area = spec.utilization.basal_area.all();
        let dq = spec.utilization.quad_mean_diameter.all();
        let tph = spec.utilization.trees_per_hectare.all();
        debug!(genus = %spec.genus, lorey_height, dq, basal_area, tph, "working with species");

        if volume_mode == VolumeComputeMode::ByUtilWithWholeStemBySpec {
            let mean_volume = self
                .estimator
                .whole_stem_volume_per_tree(spec.volume_group, lorey_height, dq)?;
            spec.utilization.whole_stem_volume.set_all(tph * mean_volume);
        }

        let mut est = UtilizationSet::default();
        est.basal_area.set_all(basal_area);
        est.quad_mean_diameter.set_all(dq);
        est.trees_per_hectare.set_all(tph);
        est.whole_stem_volume
            .set_all(spec.utilization.whole_stem_volume.all());

        let mut adjust = VolumeAdjustments::default();

        self.estimator
            .quad_mean_diameter_by_utilization(bec, &mut est.quad_mean_diameter, &spec.genus)?;
        self.estimator.basal_area_by_utilization(
            bec,
            &est.quad_mean_diameter,
            &mut est.basal_area,
            &spec.genus,
        )?;

        for uc in UtilizationClass::BANDS {
            est.trees_per_hectare[uc] =
                trees_per_hectare(est.basal_area[uc], est.quad_mean_diameter[uc]);
        }

        reconcile_components(
            &mut est.basal_area,
            &mut est.trees_per_hectare,
            &mut est.quad_mean_diameter,
        )?;

        if compatibility_mode != CompatibilityVariableMode::None {
            apply_compatibility_variables(spec, &mut est);
        }

        for uc in UtilizationClass::BANDS {
            est.trees_per_hectare[uc] =
                trees_per_hectare(est.basal_area[uc], est.quad_mean_diameter[uc]);
        }

        // Diameters may have moved, so reconcile again.
        reconcile_components(
            &mut est.basal_area,
            &mut est.trees_per_hectare,
            &mut est.quad_mean_diameter,
        )?;

        if volume_mode == VolumeComputeMode::Zero {
            return Err(YieldError::processing(format!(
                "Volume compute mode {volume_mode:?} is not supported when computing utilization components"
            )));
        }

        self.estimator.whole_stem_volume(
            UtilizationClass::All,
            adjust.close_utilization[UtilizationClass::Over225],
            spec.volume_group,
            lorey_height,
            &est.quad_mean_diameter,
            &est.basal_area,
            &mut est.whole_stem_volume,
        )?;

        if compatibility_mode == CompatibilityVariableMode::All {
            let cv = spec.compatibility();
            let mut whole_stem_sum = 0.0f32;
            for uc in UtilizationClass::BANDS {
                est.whole_stem_volume[uc] *= exp(cv.volume(uc, VolumeVariable::WholeStem));
                whole_stem_sum += est.whole_stem_volume[uc];
            }
            est.whole_stem_volume.set_all(whole_stem_sum);

            for uc in UtilizationClass::BANDS {
                adjust.close_utilization[uc] = cv.volume(uc, VolumeVariable::CloseUtilization);
                adjust.decay[uc] = cv.volume(uc, VolumeVariable::NetOfDecay);
                adjust.decay_waste[uc] = cv.volume(uc, VolumeVariable::NetOfDecayAndWaste);
            }
        }

        self.volume_chain(
            UtilizationClass::All,
            spec,
            bec,
            lorey_height,
            breast_height_age,
            &adjust,
            &mut est,
        )?;

        let u = &mut spec.utilization;
        for field in [
            UtilizationField::BasalArea,
            UtilizationField::TreesPerHectare,
            UtilizationField::QuadMeanDiameter,
        ] {
            u.vector_mut(field).merge_from(est.vector(field), CopyRule::IfBand);
        }
        for field in UtilizationField::VOLUMES {
            u.vector_mut(field)
                .merge_from(est.vector(field), CopyRule::IfNotSmall);
        }
        Ok(())
    }

    /// Close-utilization through breakage for `target`. The whole-stem vector
    /// in `est` must already be filled in.
    #[allow(clippy::too_many_arguments)]
    fn volume_chain(
        &self,
        target: UtilizationClass,
        spec: &Species,
        bec: &BecDefinition,
        lorey_height: f32,
        breast_height_age: f32,
        adjust: &VolumeAdjustments,
        est: &mut UtilizationSet,
    ) -> Result<(), YieldError> {
        let dq = est.quad_mean_diameter;
        let ctx = VolumeContext {
            genus: &spec.genus,
            region: bec.region,
            volume_group: spec.volume_group,
            decay_group: spec.decay_group,
            breakage_group: spec.breakage_group,
            lorey_height,
            breast_height_age,
            quad_mean_diameter: &dq,
        };

        self.estimator.close_utilization_volume(
            target,
            &adjust.close_utilization,
            &ctx,
            &est.whole_stem_volume,
            &mut est.close_utilization_volume,
        )?;
        self.estimator.net_decay_volume(
            target,
            &adjust.decay,
            &ctx,
            &est.close_utilization_volume,
            &mut est.cu_volume_net_of_decay,
        )?;
        self.estimator.net_decay_and_waste_volume(
            target,
            &adjust.decay_waste,
            &ctx,
            &est.close_utilization_volume,
            &est.cu_volume_net_of_decay,
            &mut est.cu_volume_net_of_decay_and_waste,
        )?;
        if self.context.is_start() {
            self.estimator.net_decay_waste_and_breakage_volume(
                target,
                &ctx,
                &est.close_utilization_volume,
                &est.cu_volume_net_of_decay_and_waste,
                &mut est.cu_volume_net_of_decay_waste_and_breakage,
            )?;
        }
        Ok(())
    }

    /// Compute a veteran layer, whose trees all fall in the 22.5+ cm class.
    ///
    /// Volumes use the per-genus veteran adjustments rather than
    /// compatibility variables. Afterwards every class except 22.5+ is zeroed
    /// and ALL is set equal to it.
    pub fn compute_veteran(&self, bec: &BecDefinition, layer: &mut Layer) -> Result<(), YieldError> {
        trace!(age_total = ?layer.age_total, "computing veteran layer utilization components");
        let breast_height_age = layer.breast_height_age().unwrap_or(0.0);
        let target = UtilizationClass::Over225;

        for spec in layer.species.iter_mut() {
            let lorey_height = spec.utilization.lorey_height.all;
            let basal_area = spec.utilization.basal_area.large();
            let tph = spec.utilization.trees_per_hectare.large();
            let dq = spec.utilization.quad_mean_diameter.large();

            let mut est = UtilizationSet::default();
            est.trees_per_hectare.set_all(tph);
            est.trees_per_hectare.set_large(tph);
            est.quad_mean_diameter.set_all(dq);
            est.quad_mean_diameter.set_large(dq);
            est.basal_area.set_all(basal_area);
            est.basal_area.set_large(basal_area);

            let coe = self
                .estimator
                .control()
                .veteran_volume_adjustment_coefficients(&spec.genus)?;
            let mut adjust = VolumeAdjustments::default();
            adjust.close_utilization[target] = coe.coe(2);
            adjust.decay[target] = coe.coe(3);
            adjust.decay_waste[target] = coe.coe(4);

            self.estimator.whole_stem_volume(
                target,
                coe.coe(1),
                spec.volume_group,
                lorey_height,
                &est.quad_mean_diameter,
                &est.basal_area,
                &mut est.whole_stem_volume,
            )?;
            self.volume_chain(
                target,
                spec,
                bec,
                lorey_height,
                breast_height_age,
                &adjust,
                &mut est,
            )?;

            for field in UtilizationField::ALL {
                let v = est.vector_mut(field);
                for uc in UtilizationClass::ALL_BUT_LARGEST {
                    v[uc] = 0.0;
                }
                v.set_all(v.large());
            }
            est.lorey_height = spec.utilization.lorey_height;
            debug!(genus = %spec.genus, basal_area, "veteran species computed");
            spec.utilization = est;
        }

        compute_layer_from_species(layer);
        Ok(())
    }
}

/// Nudge band basal area and diameter by the species' compatibility
/// variables, then rescale the bands back to the ALL basal area.
fn apply_compatibility_variables(spec: &Species, est: &mut UtilizationSet) {
    let cv = spec.compatibility();
    let mut basal_area_sum = 0.0f32;
    for uc in UtilizationClass::BANDS {
        let ba = (est.basal_area[uc] + cv.basal_area(uc)).max(0.0);
        est.basal_area[uc] = ba;
        basal_area_sum += ba;

        let dq = est.quad_mean_diameter[uc] + cv.quad_mean_diameter(uc);
        est.quad_mean_diameter[uc] = clamp(dq, uc.low_bound(), uc.high_bound());
    }

    if basal_area_sum > 0.0 {
        let multiplier = est.basal_area.all() / basal_area_sum;
        for uc in UtilizationClass::BANDS {
            est.basal_area[uc] *= multiplier;
        }
    }
}

/// Set a layer's utilization from its species: summable vectors are summed,
/// lorey height is the basal-area-weighted mean and diameter is derived
/// from basal area and trees per hectare.
pub fn compute_layer_from_species(layer: &mut Layer) {
    let mut total = UtilizationSet::sum_summable(layer.species.iter().map(|s| &s.utilization));

    let mut lorey_height = LoreyHeightVector::new(0.0, 0.0);
    for spec in &layer.species {
        let u = &spec.utilization;
        lorey_height.small += u.lorey_height.small * u.basal_area.small();
        lorey_height.all += u.lorey_height.all * u.basal_area.all();
    }
    if total.basal_area.small() > 0.0 {
        lorey_height.small /= total.basal_area.small();
    }
    if total.basal_area.all() > 0.0 {
        lorey_height.all /= total.basal_area.all();
    }
    total.lorey_height = lorey_height;

    for uc in UtilizationClass::ALL_CLASSES {
        total.quad_mean_diameter[uc] =
            quad_mean_diameter(total.basal_area[uc], total.trees_per_hectare[uc]);
    }

    layer.utilization = total;
}
