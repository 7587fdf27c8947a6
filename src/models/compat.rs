use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::YieldError;
use crate::models::UtilizationClass;

/// The four volume stages a compatibility variable can correct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VolumeVariable {
    WholeStem,
    CloseUtilization,
    NetOfDecay,
    NetOfDecayAndWaste,
}

impl VolumeVariable {
    pub const ALL: [VolumeVariable; 4] = [
        VolumeVariable::WholeStem,
        VolumeVariable::CloseUtilization,
        VolumeVariable::NetOfDecay,
        VolumeVariable::NetOfDecayAndWaste,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

/// Quantities tracked for the small (<7.5 cm) class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UtilizationClassVariable {
    BasalArea,
    QuadMeanDiameter,
    LoreyHeight,
    WholeStemVolume,
}

impl UtilizationClassVariable {
    pub const ALL: [UtilizationClassVariable; 4] = [
        UtilizationClassVariable::BasalArea,
        UtilizationClassVariable::QuadMeanDiameter,
        UtilizationClassVariable::LoreyHeight,
        UtilizationClassVariable::WholeStemVolume,
    ];

    pub fn ordinal(self) -> usize {
        self as usize
    }
}

fn band_position(uc: UtilizationClass) -> Option<usize> {
    uc.is_band().then(|| uc.ordinal() - 2)
}

/// Per-species additive corrections that nudge regression estimates toward
/// previously observed values. Only the four diameter bands carry basal
/// area, diameter and volume corrections; other classes read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CompatibilityVariables {
    /// `[band][volume variable]`
    pub volume: [[f32; 4]; 4],
    pub basal_area: [f32; 4],
    pub quad_mean_diameter: [f32; 4],
    /// Indexed by [`UtilizationClassVariable`]
    pub small: [f32; 4],
}

impl CompatibilityVariables {
    pub fn volume(&self, uc: UtilizationClass, vv: VolumeVariable) -> f32 {
        band_position(uc)
            .map(|b| self.volume[b][vv.ordinal()])
            .unwrap_or(0.0)
    }

    pub fn basal_area(&self, uc: UtilizationClass) -> f32 {
        band_position(uc).map(|b| self.basal_area[b]).unwrap_or(0.0)
    }

    pub fn quad_mean_diameter(&self, uc: UtilizationClass) -> f32 {
        band_position(uc)
            .map(|b| self.quad_mean_diameter[b])
            .unwrap_or(0.0)
    }

    pub fn small(&self, variable: UtilizationClassVariable) -> f32 {
        self.small[variable.ordinal()]
    }

    /// Decay the variables by one growth year.
    pub fn decay(&mut self, adjustments: &CompVarAdjustments) -> Result<(), YieldError> {
        for ucv in UtilizationClassVariable::ALL {
            self.small[ucv.ordinal()] *= adjustments.value(UtilizationClass::Small, ucv)?;
        }
        for uc in UtilizationClass::BANDS {
            let b = uc.ordinal() - 2;
            self.basal_area[b] *= adjustments.value(uc, UtilizationClassVariable::BasalArea)?;
            self.quad_mean_diameter[b] *=
                adjustments.value(uc, UtilizationClassVariable::QuadMeanDiameter)?;
            for vv in VolumeVariable::ALL {
                self.volume[b][vv.ordinal()] *= adjustments.volume_value(uc, vv)?;
            }
        }
        Ok(())
    }
}

/// Year-over-year decay multipliers for compatibility variables, stored by
/// their numbered slot (1 to 98). Slots not given default to 1.0.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompVarAdjustments {
    values: BTreeMap<usize, f32>,
}

impl CompVarAdjustments {
    pub const MIN_INDEX: usize = 1;
    pub const MAX_INDEX: usize = 98;

    const SMALL_START: usize = 1;
    const BASAL_AREA_START: usize = 5;
    const QUAD_MEAN_DIAMETER_START: usize = 15;
    const VOLUME_OFFSETS: [usize; 4] = [11, 21, 31, 41];
    const LOREY_HEIGHT_PRIMARY: usize = 51;
    const LOREY_HEIGHT_OTHER: usize = 52;

    pub fn new(values: BTreeMap<usize, f32>) -> Result<Self, YieldError> {
        if let Some(bad) = values
            .keys()
            .find(|&&k| !(Self::MIN_INDEX..=Self::MAX_INDEX).contains(&k))
        {
            return Err(YieldError::ParseError(format!(
                "Compatibility variable adjustment index {bad} is outside {}..={}",
                Self::MIN_INDEX,
                Self::MAX_INDEX
            )));
        }
        Ok(Self { values })
    }

    fn slot(&self, index: usize) -> f32 {
        self.values.get(&index).copied().unwrap_or(1.0)
    }

    pub fn value(&self, uc: UtilizationClass, variable: UtilizationClassVariable) -> Result<f32, YieldError> {
        if uc == UtilizationClass::Small {
            return Ok(self.slot(Self::SMALL_START + variable.ordinal()));
        }
        match (band_position(uc), variable) {
            (Some(b), UtilizationClassVariable::BasalArea) => Ok(self.slot(Self::BASAL_AREA_START + b)),
            (Some(b), UtilizationClassVariable::QuadMeanDiameter) => {
                Ok(self.slot(Self::QUAD_MEAN_DIAMETER_START + b))
            }
            _ => Err(YieldError::processing(format!(
                "No compatibility variable adjustment for {uc:?} and {variable:?}"
            ))),
        }
    }

    pub fn volume_value(&self, uc: UtilizationClass, vv: VolumeVariable) -> Result<f32, YieldError> {
        band_position(uc)
            .map(|b| self.slot(Self::VOLUME_OFFSETS[b] + vv.ordinal()))
            .ok_or_else(|| {
                YieldError::processing(format!("No volume adjustment for utilization class {uc:?}"))
            })
    }

    pub fn lorey_height_primary(&self) -> f32 {
        self.slot(Self::LOREY_HEIGHT_PRIMARY)
    }

    pub fn lorey_height_other(&self) -> f32 {
        self.slot(Self::LOREY_HEIGHT_OTHER)
    }
}
