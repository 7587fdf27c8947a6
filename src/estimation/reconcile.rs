//! Reconciliation of the band basal area, trees per hectare and diameter
//! vectors against the ALL values they must add up to.
//!
//! Three modes exist. Mode 1 applies when even every band at its lowest
//! diameter cannot supply the stand's trees: diameters drop to their low
//! bounds and basal area moves down from the upper bands. Mode 2 rescales band
//! diameters by a common factor, pinning the worst bound violator on each
//! pass. Mode 3 puts every tree in the single band that fits the ALL diameter
//! and is the fallback when mode 2 runs out of basal area or trees.

use tracing::trace;

use super::diameter::{quad_mean_diameter, trees_per_hectare};
use super::float_math::sqrt;
use crate::error::YieldError;
use crate::models::{UtilizationClass, UtilizationVector};

const MODE_1_AVAILABILITY_CLASSES: [UtilizationClass; 3] = [
    UtilizationClass::Over225,
    UtilizationClass::U175To225,
    UtilizationClass::U125To175,
];

const MAX_MODE_2_ITERATIONS: usize = 4;

fn band_sum_f64(v: &UtilizationVector) -> f32 {
    UtilizationClass::BANDS
        .iter()
        .map(|&uc| v[uc] as f64)
        .sum::<f64>() as f32
}

/// Make the bands of `ba`, `tph` and `dq` consistent with each other and with
/// their ALL values.
pub fn reconcile_components(
    ba: &mut UtilizationVector,
    tph: &mut UtilizationVector,
    dq: &mut UtilizationVector,
) -> Result<(), YieldError> {
    if ba.all() == 0.0 {
        for uc in UtilizationClass::BANDS {
            tph[uc] = 0.0;
            ba[uc] = 0.0;
        }
        return Ok(());
    }

    let mut ba_sum = 0.0f32;
    for uc in UtilizationClass::BANDS {
        ba_sum += ba[uc];
    }
    if ((ba_sum - ba.all()).abs() as f64) > 0.00003 * ba_sum as f64 {
        return Err(YieldError::processing(format!(
            "Computed base areas for {}+ components do not sum to expected total",
            UtilizationClass::U75To125.low_bound()
        )));
    }

    let dq0 = quad_mean_diameter(ba.all(), tph.all());
    if dq0 < UtilizationClass::U75To125.low_bound() {
        return Err(YieldError::processing(format!(
            "Quadratic mean diameter computed from total base area and trees per hectare is less than {} cm",
            UtilizationClass::U75To125.low_bound()
        )));
    }

    let tph_sum_high = UtilizationClass::BANDS
        .iter()
        .map(|&uc| trees_per_hectare(ba[uc], uc.low_bound()) as f64)
        .sum::<f64>() as f32;

    if tph_sum_high < tph.all() {
        trace!(tph_sum_high, tph_all = tph.all(), "reconciling in mode 1");
        reconcile_mode_1(ba, tph, dq, tph_sum_high);
        Ok(())
    } else {
        reconcile_mode_2_check(ba, tph, dq)
    }
}

/// Mode 1: band diameters go to their low bounds and basal area shifts down
/// until the bands can hold the stand's trees.
pub fn reconcile_mode_1(
    ba: &mut UtilizationVector,
    tph: &mut UtilizationVector,
    dq: &mut UtilizationVector,
    tph_sum_high: f32,
) {
    let mut tph_need = tph.all() - tph_sum_high;

    for uc in UtilizationClass::BANDS {
        dq[uc] = uc.low_bound();
    }

    for uc in MODE_1_AVAILABILITY_CLASSES {
        let Some(prev) = uc.previous() else { continue };
        let tph_avail = trees_per_hectare(ba[uc], prev.low_bound()) - trees_per_hectare(ba[uc], uc.low_bound());

        if tph_avail < tph_need {
            ba[prev] += ba[uc];
            ba[uc] = 0.0;
            tph_need -= tph_avail;
        } else {
            let ba_move = ba[uc] * tph_need / tph_avail;
            ba[prev] += ba_move;
            ba[uc] -= ba_move;
            break;
        }
    }

    for uc in UtilizationClass::BANDS {
        tph[uc] = trees_per_hectare(ba[uc], dq[uc]);
    }
}

/// Enter mode 2 only when the bands are not already consistent.
pub fn reconcile_mode_2_check(
    ba: &mut UtilizationVector,
    tph: &mut UtilizationVector,
    dq: &mut UtilizationVector,
) -> Result<(), YieldError> {
    let tph_sum = band_sum_f64(tph);

    if (tph_sum - tph.all()).abs() / tph_sum > 0.00001 {
        trace!(tph_sum, tph_all = tph.all(), "reconciling in mode 2");
        return reconcile_mode_2(ba, tph, dq);
    }

    for uc in UtilizationClass::BANDS {
        if ba[uc] > 0.0 {
            if tph[uc] <= 0.0 {
                trace!(class = %uc, "band has basal area but no trees, reconciling in mode 2");
                return reconcile_mode_2(ba, tph, dq);
            }
            let d_want = quad_mean_diameter(ba[uc], tph[uc]);
            let dq_i = dq[uc];
            if dq_i >= uc.low_bound() && dq_i <= uc.high_bound() && (d_want - dq_i).abs() < 0.00001 {
                return Ok(());
            }
        }
    }
    Ok(())
}

/// Mode 2: scale band diameters so the implied trees add up, pinning the
/// worst out-of-bounds band at its limit on each iteration.
pub fn reconcile_mode_2(
    ba: &mut UtilizationVector,
    tph: &mut UtilizationVector,
    dq: &mut UtilizationVector,
) -> Result<(), YieldError> {
    let mut n = 0;
    let mut ba_fixed = 0.0f32;
    let mut tph_fixed = 0.0f32;
    let mut limited = [false; 6];
    let mut dq_trial = UtilizationVector::zeros();

    loop {
        n += 1;
        if n > MAX_MODE_2_ITERATIONS {
            return Err(YieldError::processing(format!(
                "Mode 2 component reconciliation iterations exceeded {MAX_MODE_2_ITERATIONS}"
            )));
        }

        let sum = UtilizationClass::BANDS
            .iter()
            .map(|&uc| {
                let ba_i = ba[uc];
                let dq_i = dq[uc];
                if ba_i != 0.0 && !limited[uc.ordinal()] {
                    (ba_i / (dq_i * dq_i)) as f64
                } else {
                    0.0
                }
            })
            .sum::<f64>() as f32;

        let ba_all = ba.all() - ba_fixed;
        let tph_all = tph.all() - tph_fixed;

        if ba_all <= 0.0 || tph_all <= 0.0 {
            trace!(ba_all, tph_all, "nothing left to distribute, reconciling in mode 3");
            return reconcile_mode_3(ba, tph, dq);
        }

        let dq_all = quad_mean_diameter(ba_all, tph_all);
        let k = dq_all * dq_all / ba_all * sum;
        let sqrt_k = sqrt(k);

        for uc in UtilizationClass::BANDS {
            if !limited[uc.ordinal()] && ba[uc] > 0.0 {
                dq_trial[uc] = dq[uc] * sqrt_k;
            }
        }

        let mut violation: Option<(UtilizationClass, bool)> = None;
        let mut worst = 0.0f32;
        for uc in UtilizationClass::BANDS {
            if ba[uc] > 0.0 && dq_trial[uc] < uc.low_bound() {
                let v = 1.0 - dq_trial[uc] / uc.low_bound();
                if v > worst {
                    worst = v;
                    violation = Some((uc, true));
                }
            }
            if dq_trial[uc] > uc.high_bound() {
                let v = dq_trial[uc] / uc.high_bound() - 1.0;
                if v > worst {
                    worst = v;
                    violation = Some((uc, false));
                }
            }
        }

        let Some((uc, low)) = violation else { break };

        dq_trial[uc] = if low { uc.low_bound() } else { uc.high_bound() };
        limited[uc.ordinal()] = true;
        ba_fixed += ba[uc];
        tph_fixed += trees_per_hectare(ba[uc], dq_trial[uc]);
    }

    for uc in UtilizationClass::BANDS {
        dq[uc] = dq_trial[uc];
        tph[uc] = trees_per_hectare(ba[uc], dq[uc]);
    }

    let ba_sum = band_sum_f64(ba);
    let tph_sum = band_sum_f64(tph);
    if ((ba_sum - ba.all()).abs() as f64) > 0.0002 * ba_sum as f64 {
        return Err(YieldError::processing("Failed to reconcile Base Area"));
    }
    if ((tph_sum - tph.all()).abs() as f64) > 0.0002 * tph_sum as f64 {
        return Err(YieldError::processing("Failed to reconcile Trees per Hectare"));
    }
    Ok(())
}

/// Mode 3: every tree goes into the first band whose upper bound exceeds the
/// ALL diameter.
pub fn reconcile_mode_3(
    ba: &mut UtilizationVector,
    tph: &mut UtilizationVector,
    dq: &mut UtilizationVector,
) -> Result<(), YieldError> {
    for uc in UtilizationClass::BANDS {
        ba[uc] = 0.0;
        tph[uc] = 0.0;
        dq[uc] = uc.low_bound() + 2.5;
    }

    let target = UtilizationClass::BANDS
        .into_iter()
        .find(|uc| dq.all() < uc.high_bound())
        .ok_or_else(|| {
            YieldError::processing(format!(
                "No utilization class can hold a quadratic mean diameter of {}",
                dq.all()
            ))
        })?;

    ba[target] = ba.all();
    tph[target] = tph.all();
    dq[target] = dq.all();
    Ok(())
}
