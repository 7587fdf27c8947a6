//! Height, species diameter, utilization-class decomposition and yield
//! estimators.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::diameter::{quad_mean_diameter, trees_per_hectare};
use super::float_math::{clamp, exp, exponent_ratio, ln, pow, safe_exponent, sqrt};
use super::Estimator;
use crate::control::ComponentSizeLimits;
use crate::error::YieldError;
use crate::models::genus::GENERA;
use crate::models::{BecDefinition, Coefficients, Region, UtilizationClass, UtilizationVector};

/// Ratio of mean to full-occupancy basal area yield.
pub const EMPIRICAL_OCCUPANCY: f32 = 0.85;

const SPECIES_SPLIT_CONSTANT: f32 = 0.00441786467;

/// Smallest diameter a diameter-yield estimate may return, cm.
const MIN_YIELD_DIAMETER: f32 = 7.6;

impl Estimator<'_> {
    fn height_multiplier(&self, genus: &str, region: Region, tph_primary: f32) -> Result<f32, YieldError> {
        let coe = self.control.primary_height_coefficients(genus, region)?;
        Ok(coe.coe(0) - coe.coe(1) + coe.coe(1) * exp(coe.coe(2) * (tph_primary - 100.0)))
    }

    /// EMP050: lorey height of the primary species from the lead species'
    /// dominant height.
    pub fn primary_height_from_lead_height(
        &self,
        lead_height: f32,
        genus: &str,
        region: Region,
        tph_primary: f32,
    ) -> Result<f32, YieldError> {
        Ok(1.3 + (lead_height - 1.3) * self.height_multiplier(genus, region, tph_primary)?)
    }

    /// EMP050, inverted: dominant height of the lead species from the
    /// primary species' lorey height.
    pub fn lead_height_from_primary_height(
        &self,
        primary_height: f32,
        genus: &str,
        region: Region,
        tph_primary: f32,
    ) -> Result<f32, YieldError> {
        Ok(1.3 + (primary_height - 1.3) / self.height_multiplier(genus, region, tph_primary)?)
    }

    /// EMP051: initial lorey height of the primary species.
    pub fn primary_height_from_lead_height_initial(
        &self,
        lead_height: f32,
        genus: &str,
        region: Region,
    ) -> Result<f32, YieldError> {
        let coe = self.control.initial_primary_height_coefficients(genus, region)?;
        Ok(1.3 + coe.coe(1) * pow(lead_height - 1.3, coe.coe(2)))
    }

    /// EMP053: lorey height of a non-primary species.
    pub fn non_primary_lorey_height(
        &self,
        genus: &str,
        primary_genus: &str,
        bec: &BecDefinition,
        lead_height: f32,
        primary_height: f32,
    ) -> Result<f32, YieldError> {
        let (equation, coe) = self
            .control
            .non_primary_height_coefficients(genus, primary_genus, bec.region)?;
        let height = if equation == 1 { lead_height } else { primary_height };
        Ok(1.3 + coe.coe(1) * pow(height - 1.3, coe.coe(2)))
    }

    /// EMP061: size limits for a genus in a region.
    pub fn component_size_limits(&self, genus: &str, region: Region) -> Result<ComponentSizeLimits, YieldError> {
        self.control.component_size_limits(genus, region)
    }

    /// EMP060: quadratic mean diameter of one species, found by splitting the
    /// stand into that species and everything else.
    ///
    /// `fractions` holds the basal area fraction of every species in the layer.
    #[allow(clippy::too_many_arguments)]
    pub fn species_quad_mean_diameter(
        &self,
        genus: &str,
        species_lorey_height: f32,
        fractions: &HashMap<String, f32>,
        region: Region,
        stand_quad_mean_diameter: f32,
        stand_basal_area: f32,
        stand_trees_per_hectare: f32,
        stand_lorey_height: f32,
    ) -> Result<f32, YieldError> {
        let min_dq = MIN_YIELD_DIAMETER.min(stand_quad_mean_diameter);
        let fraction = fractions.get(genus).copied().ok_or_else(|| {
            YieldError::processing(format!("No basal area fraction given for species {genus}"))
        })?;

        if fraction >= 1.0 || stand_quad_mean_diameter < min_dq {
            return Ok(stand_quad_mean_diameter);
        }

        let fraction_rest = 1.0 - fraction;

        let first = self.control.species_quad_mean_diameter_coefficients(GENERA[0])?;
        let mut a0 = first.coe(0);
        let mut a1 = first.coe(1);
        let a2 = first.coe(2);

        for other in &GENERA[1..] {
            if *other == genus {
                let coe = self.control.species_quad_mean_diameter_coefficients(other)?;
                a0 += coe.coe(0);
                a1 += coe.coe(1);
            } else {
                let other_fraction = fractions.get(*other).copied().unwrap_or(0.0);
                if other_fraction > 0.0 {
                    let coe = self.control.species_quad_mean_diameter_coefficients(other)?;
                    let mult = -other_fraction / fraction_rest;
                    a0 += mult * coe.coe(0);
                    a1 -= mult * coe.coe(1);
                }
            }
        }

        let hl1 = species_lorey_height.max(4.0);
        let hl2 = (stand_lorey_height - species_lorey_height * fraction) / fraction_rest;
        let hl_ratio = clamp((hl1 - 3.0) / (hl2 - 3.0), 0.05, 20.0);

        let r = exp(a0 + a1 * ln(hl_ratio) + a2 * ln(stand_quad_mean_diameter));

        let ba1 = fraction * stand_basal_area;
        let ba2 = stand_basal_area - ba1;

        let tph1 = if (((r - 1.0).abs()) as f64) < 0.0005 {
            fraction * stand_trees_per_hectare
        } else {
            let c = SPECIES_SPLIT_CONSTANT;
            let aa = (r - 1.0) * c;
            let bb = c * (1.0 - r) * stand_trees_per_hectare + ba1 + ba2 * r;
            let cc = -ba1 * stand_trees_per_hectare;
            let term = bb * bb - 4.0 * aa * cc;
            if term <= 0.0 {
                return Err(YieldError::processing(format!(
                    "Term for trees per hectare calculation when estimating quadratic mean diameter for species {genus} was {term} but should be positive."
                )));
            }
            let tph1 = (-bb + sqrt(term)) / (2.0 * aa);
            if tph1 <= 0.0 || tph1 > stand_trees_per_hectare {
                return Err(YieldError::processing(format!(
                    "Trees per hectare 1 for species {genus} was {tph1} but should be positive and less than or equal to stand trees per hectare {stand_trees_per_hectare}"
                )));
            }
            tph1
        };

        let dq1 = quad_mean_diameter(ba1, tph1);
        let tph2 = stand_trees_per_hectare - tph1;
        let dq2 = quad_mean_diameter(ba2, tph2);
        let limits = self.component_size_limits(genus, region)?;

        let split = SpeciesSplit {
            stand_trees_per_hectare,
            min_dq,
            lorey_height: species_lorey_height,
            ba1,
            ba2,
        };
        let dq = split.clamp(&limits, dq1, tph2, dq2);
        debug!(genus, dq, "species quadratic mean diameter");
        Ok(dq)
    }

    /// EMP070: split the ALL basal area across the four diameter bands.
    pub fn basal_area_by_utilization(
        &self,
        bec: &BecDefinition,
        dq: &UtilizationVector,
        ba: &mut UtilizationVector,
        genus: &str,
    ) -> Result<(), YieldError> {
        let dq_all = dq.all();
        let mut b = UtilizationVector::zeros();
        b.set_all(ba.all());

        for uc in UtilizationClass::BANDS_BUT_LARGEST {
            let coe = self
                .control
                .basal_area_by_utilization_coefficients(uc.index(), genus, bec.growth_alias())?;
            let a0 = coe.coe(1);
            let a1 = coe.coe(2);

            let logit = if uc == UtilizationClass::U75To125 {
                a0 + a1 * pow(dq_all, 0.25)
            } else {
                a0 + a1 * dq_all
            };
            let previous = uc.previous().map(|p| b[p]).unwrap_or(0.0);
            b[uc] = previous * exponent_ratio(logit)?;

            if uc == UtilizationClass::U75To125 && dq_all < UtilizationClass::U125To175.low_bound() {
                let ba12_max = (1.0
                    - pow(
                        (dq[UtilizationClass::U75To125] - 7.4) / (dq_all - 7.4),
                        2.0,
                    ))
                    * b.all();
                b[uc] = b[uc].min(ba12_max);
            }
        }

        ba[UtilizationClass::U75To125] = ba.all() - b[UtilizationClass::U75To125];
        ba[UtilizationClass::U125To175] = b[UtilizationClass::U75To125] - b[UtilizationClass::U125To175];
        ba[UtilizationClass::U175To225] = b[UtilizationClass::U125To175] - b[UtilizationClass::U175To225];
        ba[UtilizationClass::Over225] = b[UtilizationClass::U175To225];
        Ok(())
    }

    /// EMP071: quadratic mean diameter of each band from the ALL diameter.
    pub fn quad_mean_diameter_by_utilization(
        &self,
        bec: &BecDefinition,
        dq: &mut UtilizationVector,
        genus: &str,
    ) -> Result<(), YieldError> {
        let dq07 = dq.all();
        trace!(genus, bec = %bec.alias, dq07, "estimating diameter by utilization class");

        for uc in UtilizationClass::BANDS {
            let coe = self
                .control
                .quad_mean_diameter_by_utilization_coefficients(uc.index(), genus, bec.growth_alias())?;
            let a0 = coe.coe(1);
            let a1 = coe.coe(2);
            let a2 = coe.coe(3);

            match uc {
                UtilizationClass::U75To125 => {
                    let low = UtilizationClass::U75To125.low_bound();
                    if dq07 < low + 0.0001 {
                        // Resets the ALL value; the band itself keeps what it held.
                        dq.set_all(low);
                    } else {
                        let logit = a1 / a0 * (dq07 - low);
                        dq[uc] = (low + a0 * pow(1.0 - safe_exponent(logit)?, a2)).min(dq07);
                    }
                }
                UtilizationClass::U125To175 | UtilizationClass::U175To225 => {
                    let logit = a0 + a1 * pow(dq07 / UtilizationClass::U75To125.low_bound(), a2);
                    dq[uc] = uc.low_bound() + 5.0 * exponent_ratio(logit)?;
                }
                UtilizationClass::Over225 => {
                    let a3 = coe.coe(4);
                    let logit = a2 + a1 * pow(dq07, a3);
                    dq[uc] = UtilizationClass::Over225
                        .low_bound()
                        .max(dq07 + a0 * (1.0 - exponent_ratio(logit)?));
                }
                UtilizationClass::Small | UtilizationClass::All => {}
            }
            debug!(class = %uc, dq = dq[uc], "band diameter");
        }
        Ok(())
    }

    /// EMP106: basal area yield of the primary layer.
    #[allow(clippy::too_many_arguments)]
    pub fn basal_area_yield(
        &self,
        coefficients: &Coefficients,
        yield_age_limit: i32,
        dominant_height: f32,
        breast_height_age: f32,
        veteran_basal_area: Option<f32>,
        full_occupancy: bool,
        upper_bound: f32,
    ) -> Result<f32, YieldError> {
        let mut age = breast_height_age;
        if yield_age_limit > 0 {
            age = age.min(yield_age_limit as f32 * 100.0);
        }
        if age <= 0.0 {
            return Err(YieldError::StandValidation("Age was not positive".to_string()));
        }
        let tr_age = ln(age);

        let a00 = (coefficients.coe(0) + coefficients.coe(1) * tr_age).max(0.0);
        let ap = (coefficients.coe(3) + coefficients.coe(4) * tr_age).max(0.0);
        let a2 = coefficients.coe(2);

        let mut bap = if dominant_height <= a2 {
            0.0
        } else {
            let bap = a00
                * pow(dominant_height - a2, ap)
                * exp(coefficients.coe(5) * dominant_height + coefficients.coe(6) * veteran_basal_area.unwrap_or(0.0));
            bap.min(upper_bound)
        };

        if full_occupancy {
            bap /= EMPIRICAL_OCCUPANCY;
        }
        Ok(bap)
    }

    /// EMP107: quadratic mean diameter yield of the primary layer.
    pub fn quad_mean_diameter_yield(
        &self,
        coefficients: &Coefficients,
        dominant_height: f32,
        breast_height_age: f32,
        upper_bound: f32,
    ) -> Result<f32, YieldError> {
        if dominant_height <= 5.0 {
            return Ok(MIN_YIELD_DIAMETER);
        }
        if breast_height_age <= 0.0 {
            return Err(YieldError::StandValidation(format!(
                "Primary breast height age must be positive but was {breast_height_age}"
            )));
        }
        let tr_age = ln(breast_height_age);
        let c0 = coefficients.coe(0);
        let c1 = (coefficients.coe(1) + coefficients.coe(2) * tr_age).max(0.0);
        let c2 = (coefficients.coe(3) + coefficients.coe(4) * tr_age).max(0.0);

        let dq = c0 + c1 * pow(dominant_height - 5.0, c2);
        Ok(clamp(dq, MIN_YIELD_DIAMETER, upper_bound))
    }
}

/// Fixed inputs of the EMP060 clamp step.
struct SpeciesSplit {
    stand_trees_per_hectare: f32,
    min_dq: f32,
    lorey_height: f32,
    ba1: f32,
    ba2: f32,
}

impl SpeciesSplit {
    /// Bring the species diameter inside its limits, re-deriving the rest of
    /// the stand each time a limit fires.
    fn clamp(&self, limits: &ComponentSizeLimits, mut dq1: f32, mut tph2: f32, mut dq2: f32) -> f32 {
        let total = self.stand_trees_per_hectare;

        if dq2 < self.min_dq {
            dq2 = self.min_dq;
            tph2 = trees_per_hectare(self.ba2, dq2);
            let tph1 = total - tph2;
            dq1 = quad_mean_diameter(self.ba1, tph1);
        }

        let dq_min_sp = self
            .min_dq
            .max(limits.min_quad_mean_diameter_lorey_height_ratio * self.lorey_height);
        let dq_max_sp = MIN_YIELD_DIAMETER.max(
            limits
                .quad_mean_diameter_maximum
                .min(limits.max_quad_mean_diameter_lorey_height_ratio * self.lorey_height),
        );

        if dq1 < dq_min_sp {
            dq1 = dq_min_sp;
            // The complement is taken from the other partition's own density,
            // as the published equations do.
            tph2 = total - tph2;
        }

        if dq1 > dq_max_sp {
            dq1 = dq_max_sp;
            tph2 = total - tph2;

            dq2 = if tph2 > 0.0 && self.ba2 > 0.0 {
                quad_mean_diameter(self.ba2, tph2)
            } else {
                1000.0
            };

            // Rarely the species must be allowed past its maximum.
            if dq2 < self.min_dq {
                dq2 = self.min_dq;
                tph2 = trees_per_hectare(self.ba2, dq2);
                let tph1 = total - tph2;
                dq1 = quad_mean_diameter(self.ba1, tph1);
            }
        }
        dq1
    }
}
