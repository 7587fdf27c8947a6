//! Run settings, read from an optional TOML file.
//!
//! ```toml
//! context = "start"
//! volume_mode = "by_util"
//! compatibility_mode = "none"
//! control_variables = [0, 0, 0, 0, 0, 1]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::YieldError;

/// Which program is driving the engine. Breakage volumes are only estimated
/// when starting from empirical inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingContext {
    #[default]
    Start,
    Forward,
}

impl ProcessingContext {
    pub fn is_start(self) -> bool {
        self == ProcessingContext::Start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeComputeMode {
    /// Volumes are left at zero
    Zero,
    /// Volumes by utilization class from the species' whole-stem volume
    #[default]
    ByUtil,
    /// As `ByUtil`, first estimating species whole-stem volume from height and diameter
    ByUtilWithWholeStemBySpec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompatibilityVariableMode {
    #[default]
    None,
    /// Apply basal area and diameter corrections only
    NoVolume,
    /// Apply basal area, diameter and volume corrections
    All,
}

/// Up to ten integer switches addressed by one-based element number.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ControlVariables(Vec<i32>);

impl ControlVariables {
    pub const MAX_ELEMENTS: usize = 10;

    /// Caps the age used by the yield equations, in centuries.
    pub const YIELD_AGE_LIMIT: usize = 2;
    /// Allows primary species details to be rewritten during growth.
    pub const UPDATE_DURING_GROWTH: usize = 6;

    pub fn new(values: Vec<i32>) -> Result<Self, YieldError> {
        if values.len() > Self::MAX_ELEMENTS {
            return Err(YieldError::ParseError(format!(
                "At most {} control variables may be given, found {}",
                Self::MAX_ELEMENTS,
                values.len()
            )));
        }
        Ok(Self(values))
    }

    /// Value of element `element` (1-based); elements not given read as 0.
    pub fn get(&self, element: usize) -> Result<i32, YieldError> {
        if !(1..=Self::MAX_ELEMENTS).contains(&element) {
            return Err(YieldError::processing(format!(
                "Control variable element {element} is outside 1..={}",
                Self::MAX_ELEMENTS
            )));
        }
        Ok(self.0.get(element - 1).copied().unwrap_or(0))
    }
}

/// Everything that selects how a run behaves, as opposed to the coefficient
/// data it runs on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    pub context: ProcessingContext,
    pub volume_mode: VolumeComputeMode,
    pub compatibility_mode: CompatibilityVariableMode,
    pub control_variables: ControlVariables,
    pub estimate_small_components: bool,
    pub post_create_adjustments: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            context: ProcessingContext::Start,
            volume_mode: VolumeComputeMode::ByUtil,
            compatibility_mode: CompatibilityVariableMode::None,
            control_variables: ControlVariables::default(),
            estimate_small_components: true,
            post_create_adjustments: true,
        }
    }
}

impl RunSettings {
    pub fn from_toml_str(text: &str) -> Result<Self, YieldError> {
        let settings: RunSettings = toml::from_str(text)?;
        if settings.control_variables.0.len() > ControlVariables::MAX_ELEMENTS {
            return Err(YieldError::ParseError(format!(
                "At most {} control variables may be given",
                ControlVariables::MAX_ELEMENTS
            )));
        }
        Ok(settings)
    }

    /// Settings from `path`, or the defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, YieldError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "settings file not found, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}
