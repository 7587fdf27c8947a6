//! The five-stage volume chain: whole stem, close utilization, net of decay,
//! net of decay and waste, net of decay, waste and breakage.
//!
//! Each stage reads the previous stage's vector and writes its own, either for
//! one band or, when the target is [`UtilizationClass::All`], for every band
//! followed by storing the band sum into ALL.

use tracing::trace;

use super::float_math::{clamp, exp, ln, ratio};
use super::Estimator;
use crate::error::YieldError;
use crate::models::{Region, UtilizationClass, UtilizationVector};

/// Run `processor` over the bands of `input`, writing into `output`.
///
/// A band whose input satisfies `skip` is set to `default` whatever the target.
fn estimate_utilization<F, S>(
    input: &UtilizationVector,
    output: &mut UtilizationVector,
    target: UtilizationClass,
    skip: S,
    default: f32,
    mut processor: F,
) -> Result<(), YieldError>
where
    F: FnMut(UtilizationClass, f32) -> Result<f32, YieldError>,
    S: Fn(f32) -> bool,
{
    for uc in UtilizationClass::BANDS {
        let value = input[uc];
        if skip(value) {
            output[uc] = default;
            continue;
        }
        if target != UtilizationClass::All && target != uc {
            continue;
        }
        output[uc] = processor(uc, value)?;
    }
    Ok(())
}

/// Scale the bands so they sum to ALL.
fn normalize_bands(components: &mut UtilizationVector) -> Result<f32, YieldError> {
    let sum = components.band_sum();
    if sum <= 0.0 {
        return Err(YieldError::processing(format!(
            "Total volume {sum} was not positive."
        )));
    }
    let k = components.all() / sum;
    for uc in UtilizationClass::BANDS {
        components[uc] *= k;
    }
    Ok(k)
}

/// Inputs shared by every stage of the chain for one species.
#[derive(Debug, Clone, Copy)]
pub struct VolumeContext<'v> {
    pub genus: &'v str,
    pub region: Region,
    pub volume_group: i32,
    pub decay_group: i32,
    pub breakage_group: i32,
    pub lorey_height: f32,
    pub breast_height_age: f32,
    pub quad_mean_diameter: &'v UtilizationVector,
}

impl Estimator<'_> {
    /// EMP090: whole-stem volume per tree from lorey height and diameter.
    pub fn whole_stem_volume_per_tree(
        &self,
        volume_group: i32,
        lorey_height: f32,
        quad_mean_diameter: f32,
    ) -> Result<f32, YieldError> {
        let coe = self
            .control
            .total_stand_whole_stem_volume_coefficients(volume_group)?;
        let dq = quad_mean_diameter;
        let hl = lorey_height;
        let log_mean_volume = coe.coe(0)
            + coe.coe(1) * ln(dq)
            + coe.coe(2) * ln(hl)
            + coe.coe(3) * dq
            + coe.coe(4) / dq
            + coe.coe(5) * hl
            + coe.coe(6) * dq * dq
            + coe.coe(7) * hl * dq
            + coe.coe(8) * hl / dq;
        Ok(exp(log_mean_volume))
    }

    /// EMP091: whole-stem volume by band from basal area. For the ALL target
    /// the bands are then rescaled to the ALL volume already held in `whole_stem`.
    #[allow(clippy::too_many_arguments)]
    pub fn whole_stem_volume(
        &self,
        target: UtilizationClass,
        adjust: f32,
        volume_group: i32,
        lorey_height: f32,
        quad_mean_diameter: &UtilizationVector,
        basal_area: &UtilizationVector,
        whole_stem: &mut UtilizationVector,
    ) -> Result<(), YieldError> {
        let dq_all = quad_mean_diameter.all();
        estimate_utilization(
            basal_area,
            whole_stem,
            target,
            |x| x < 0.0,
            0.0,
            |uc, ba| {
                let coe = self
                    .control
                    .whole_stem_by_utilization_coefficients(uc.index(), volume_group)?;
                let mut arg = coe.coe(0)
                    + coe.coe(1) * ln(lorey_height)
                    + coe.coe(2) * ln(quad_mean_diameter[uc]);
                arg += if uc != UtilizationClass::Over225 {
                    coe.coe(3) * ln(dq_all)
                } else {
                    coe.coe(3) * dq_all
                };
                if uc == target {
                    arg += adjust;
                }
                Ok(ba * exp(arg))
            },
        )?;

        if target == UtilizationClass::All {
            let k = normalize_bands(whole_stem)?;
            trace!(k, "whole stem volume normalized");
        }
        Ok(())
    }

    /// EMP092: close-utilization volume by band.
    pub fn close_utilization_volume(
        &self,
        target: UtilizationClass,
        adjust: &UtilizationVector,
        ctx: &VolumeContext<'_>,
        whole_stem: &UtilizationVector,
        close_utilization: &mut UtilizationVector,
    ) -> Result<(), YieldError> {
        estimate_utilization(whole_stem, close_utilization, target, |_| false, 0.0, |uc, ws| {
            let coe = self
                .control
                .close_utilization_coefficients(uc.index(), ctx.volume_group)?;
            let arg = coe.coe(1)
                + coe.coe(2) * ctx.quad_mean_diameter[uc]
                + coe.coe(3) * ctx.lorey_height
                + adjust[uc];
            Ok(ws * ratio(arg, 7.0))
        })?;

        if target == UtilizationClass::All {
            close_utilization.store_band_sum();
        }
        Ok(())
    }

    /// EMP093: close-utilization volume net of decay by band.
    pub fn net_decay_volume(
        &self,
        target: UtilizationClass,
        adjust: &UtilizationVector,
        ctx: &VolumeContext<'_>,
        close_utilization: &UtilizationVector,
        net_decay: &mut UtilizationVector,
    ) -> Result<(), YieldError> {
        let dq_all = ctx.quad_mean_diameter.all();
        let age_tr = (ctx.breast_height_age as f64).max(20.0).ln() as f32;
        let modifier = self.control.decay_modifier(ctx.genus, ctx.region);

        estimate_utilization(close_utilization, net_decay, target, |_| false, 0.0, |uc, cu| {
            let coe = self.control.net_decay_coefficients(uc.index(), ctx.decay_group)?;
            let dq = if uc != UtilizationClass::Over225 {
                dq_all
            } else {
                ctx.quad_mean_diameter[uc]
            };
            let mut arg = coe.coe(1) + coe.coe(2) * ln(dq) + coe.coe(3) * age_tr;
            arg += adjust[uc] + modifier;
            Ok(cu * ratio(arg, 8.0))
        })?;

        if target == UtilizationClass::All {
            net_decay.store_band_sum();
        }
        Ok(())
    }

    /// EMP094: close-utilization volume net of decay and waste by band.
    pub fn net_decay_and_waste_volume(
        &self,
        target: UtilizationClass,
        adjust: &UtilizationVector,
        ctx: &VolumeContext<'_>,
        close_utilization: &UtilizationVector,
        net_decay: &UtilizationVector,
        net_decay_waste: &mut UtilizationVector,
    ) -> Result<(), YieldError> {
        let modifier = self.control.waste_modifier(ctx.genus, ctx.region);

        estimate_utilization(net_decay, net_decay_waste, target, |_| false, 0.0, |uc, nd| {
            if nd.is_nan() || nd <= 0.0 {
                return Ok(0.0);
            }
            let coe = self.control.net_decay_waste_coefficients(ctx.genus)?;
            let mut a0 = coe.coe(0);
            if uc == UtilizationClass::Over225 {
                a0 += coe.coe(5);
            }
            let cu = close_utilization[uc];
            let frd = 1.0 - nd / cu;

            let mut arg = a0
                + coe.coe(1) * frd
                + coe.coe(3) * ln(ctx.quad_mean_diameter[uc])
                + coe.coe(4) * ln(ctx.lorey_height);
            arg += modifier;
            arg = clamp(arg, -10.0, 10.0);

            let frw = ((1.0 - exp(coe.coe(2) * frd)) * exp(arg) / (1.0 + exp(arg)) * (1.0 - frd)).min(frd);
            let mut result = cu * (1.0 - frd - frw);

            // Adjustments apply after frw is bounded by frd.
            if adjust[uc] != 0.0 {
                let r = result / nd;
                if r < 1.0 && r > 0.0 {
                    let arg = clamp(ln(r / (1.0 - r)) + adjust[uc], -10.0, 10.0);
                    result = exp(arg) / (1.0 + exp(arg)) * nd;
                }
            }
            Ok(result)
        })?;

        if target == UtilizationClass::All {
            net_decay_waste.store_band_sum();
        }
        Ok(())
    }

    /// EMP095: close-utilization volume net of decay, waste and breakage by band.
    pub fn net_decay_waste_and_breakage_volume(
        &self,
        target: UtilizationClass,
        ctx: &VolumeContext<'_>,
        close_utilization: &UtilizationVector,
        net_decay_waste: &UtilizationVector,
        net_breakage: &mut UtilizationVector,
    ) -> Result<(), YieldError> {
        let coe = self.control.net_breakage_coefficients(ctx.breakage_group)?;
        let (a1, a2, a3, a4) = (coe.coe(1), coe.coe(2), coe.coe(3), coe.coe(4));

        estimate_utilization(net_decay_waste, net_breakage, target, |_| false, 0.0, |uc, nw| {
            if nw <= 0.0 {
                return Ok(0.0);
            }
            let percent_broken = clamp(a1 + a2 * ln(ctx.quad_mean_diameter[uc]), a3, a4);
            let broken = (percent_broken / 100.0 * close_utilization[uc]).min(nw);
            Ok(nw - broken)
        })?;

        if target == UtilizationClass::All {
            net_breakage.store_band_sum();
        }
        Ok(())
    }
}
