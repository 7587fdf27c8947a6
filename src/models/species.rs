use serde::{Deserialize, Serialize};

use crate::models::genus::genus_index;
use crate::models::{CompatibilityVariables, UtilizationSet};

/// Site attributes of a species: its height, age and site index.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    /// Site index, m at 50 years breast-height age
    pub site_index: Option<f32>,
    /// Dominant height, m
    pub height: Option<f32>,
    /// Total age, years
    pub age_total: Option<f32>,
    pub years_to_breast_height: Option<f32>,
    pub site_curve_number: Option<i32>,
}

impl Site {
    pub fn breast_height_age(&self) -> Option<f32> {
        match (self.age_total, self.years_to_breast_height) {
            (Some(age), Some(ytbh)) => Some(age - ytbh),
            _ => None,
        }
    }
}

/// One genus within a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    /// SP0 genus code, e.g. "PL"
    pub genus: String,
    /// Percent of the layer's basal area
    pub percent_genus: f32,
    /// Fraction of the layer's basal area; derived from `percent_genus` when absent
    #[serde(default)]
    pub fraction_genus: f32,
    #[serde(default)]
    pub volume_group: i32,
    #[serde(default)]
    pub decay_group: i32,
    #[serde(default)]
    pub breakage_group: i32,
    #[serde(default)]
    pub site: Option<Site>,
    #[serde(default)]
    pub utilization: UtilizationSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<CompatibilityVariables>,
}

impl Species {
    pub fn new(genus: impl Into<String>, percent_genus: f32) -> Self {
        Self {
            genus: genus.into(),
            percent_genus,
            fraction_genus: percent_genus / 100.0,
            volume_group: 0,
            decay_group: 0,
            breakage_group: 0,
            site: None,
            utilization: UtilizationSet::default(),
            compatibility: None,
        }
    }

    /// One-based genus index; unknown genera sort last.
    pub fn genus_index(&self) -> usize {
        genus_index(&self.genus).unwrap_or(usize::MAX)
    }

    pub fn compatibility(&self) -> CompatibilityVariables {
        self.compatibility.unwrap_or_default()
    }
}
