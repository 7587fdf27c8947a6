use serde::{Deserialize, Serialize};

use crate::error::YieldError;
use crate::models::genus::is_known_genus;
use crate::models::{Species, UtilizationSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayerType {
    Primary,
    Veteran,
}

impl std::fmt::Display for LayerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LayerType::Primary => write!(f, "Primary"),
            LayerType::Veteran => write!(f, "Veteran"),
        }
    }
}

/// A canopy layer of a polygon and the species growing in it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub layer_type: LayerType,
    /// Crown closure, percent
    #[serde(default)]
    pub crown_closure: f32,
    /// Dominant height of the leading species, m
    #[serde(default)]
    pub height: Option<f32>,
    #[serde(default)]
    pub age_total: Option<f32>,
    #[serde(default)]
    pub years_to_breast_height: Option<f32>,
    pub species: Vec<Species>,
    #[serde(default)]
    pub utilization: UtilizationSet,
}

impl Layer {
    pub fn new(layer_type: LayerType, species: Vec<Species>) -> Self {
        let mut layer = Self {
            layer_type,
            crown_closure: 0.0,
            height: None,
            age_total: None,
            years_to_breast_height: None,
            species,
            utilization: UtilizationSet::default(),
        };
        layer.sort_species();
        layer
    }

    pub fn breast_height_age(&self) -> Option<f32> {
        match (self.age_total, self.years_to_breast_height) {
            (Some(age), Some(ytbh)) => Some(age - ytbh),
            _ => None,
        }
    }

    /// Put species into genus-index order, the order in which they are processed.
    pub fn sort_species(&mut self) {
        self.species.sort_by_key(|s| s.genus_index());
    }

    pub fn species_by_genus(&self, genus: &str) -> Option<&Species> {
        self.species.iter().find(|s| s.genus == genus)
    }

    pub fn species_by_genus_mut(&mut self, genus: &str) -> Option<&mut Species> {
        self.species.iter_mut().find(|s| s.genus == genus)
    }

    pub fn genera(&self) -> Vec<&str> {
        self.species.iter().map(|s| s.genus.as_str()).collect()
    }

    /// Check the layer is structurally usable.
    pub fn validate(&self) -> Result<(), YieldError> {
        if self.species.is_empty() {
            return Err(YieldError::StandValidation(format!(
                "{} layer has no species",
                self.layer_type
            )));
        }
        for spec in &self.species {
            if !is_known_genus(&spec.genus) {
                return Err(YieldError::StandValidation(format!(
                    "{} layer has unknown genus \"{}\"",
                    self.layer_type, spec.genus
                )));
            }
            if spec.percent_genus < 0.0 || spec.percent_genus > 100.0 {
                return Err(YieldError::StandValidation(format!(
                    "Species {} has percentage {} outside 0-100",
                    spec.genus, spec.percent_genus
                )));
            }
        }
        for (i, spec) in self.species.iter().enumerate() {
            if self.species[..i].iter().any(|s| s.genus == spec.genus) {
                return Err(YieldError::StandValidation(format!(
                    "{} layer lists genus {} more than once",
                    self.layer_type, spec.genus
                )));
            }
        }
        if self.crown_closure < 0.0 || self.crown_closure > 100.0 {
            return Err(YieldError::StandValidation(format!(
                "Crown closure {} is outside 0-100",
                self.crown_closure
            )));
        }
        Ok(())
    }
}
