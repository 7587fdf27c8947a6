use serde::{Deserialize, Serialize};

use crate::error::YieldError;
use crate::models::{Layer, LayerType};

fn default_yield_factor() -> f32 {
    1.0
}

/// A forest polygon: one stand with a primary layer and optionally a
/// veteran layer above it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub identifier: String,
    /// Alias of the polygon's BEC zone
    pub bec: String,
    /// Percent of the polygon that is stocked forest land
    #[serde(default)]
    pub percent_available: Option<f32>,
    #[serde(default = "default_yield_factor")]
    pub yield_factor: f32,
    pub layers: Vec<Layer>,
}

impl Polygon {
    pub fn new(identifier: impl Into<String>, bec: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            bec: bec.into(),
            percent_available: None,
            yield_factor: 1.0,
            layers: Vec::new(),
        }
    }

    pub fn layer(&self, layer_type: LayerType) -> Option<&Layer> {
        self.layers.iter().find(|l| l.layer_type == layer_type)
    }

    pub fn layer_mut(&mut self, layer_type: LayerType) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.layer_type == layer_type)
    }

    /// The primary layer, which every polygon must have.
    pub fn primary_layer(&self) -> Result<&Layer, YieldError> {
        self.layer(LayerType::Primary).ok_or_else(|| self.missing_primary())
    }

    pub fn primary_layer_mut(&mut self) -> Result<&mut Layer, YieldError> {
        let err = self.missing_primary();
        self.layer_mut(LayerType::Primary).ok_or(err)
    }

    pub fn veteran_layer(&self) -> Option<&Layer> {
        self.layer(LayerType::Veteran)
    }

    fn missing_primary(&self) -> YieldError {
        YieldError::StandValidation(format!(
            "Polygon \"{}\" has no primary layer",
            self.identifier
        ))
    }

    pub fn num_species(&self) -> usize {
        self.layers.iter().map(|l| l.species.len()).sum()
    }

    /// Check the polygon and its layers are structurally usable.
    pub fn validate(&self) -> Result<(), YieldError> {
        self.primary_layer()?;
        for (i, layer) in self.layers.iter().enumerate() {
            if self.layers[..i]
                .iter()
                .any(|l| l.layer_type == layer.layer_type)
            {
                return Err(YieldError::StandValidation(format!(
                    "Polygon \"{}\" has more than one {} layer",
                    self.identifier, layer.layer_type
                )));
            }
            layer.validate()?;
        }
        if let Some(pct) = self.percent_available {
            if !(0.0..=100.0).contains(&pct) {
                return Err(YieldError::StandValidation(format!(
                    "Polygon \"{}\" has percent available {} outside 0-100",
                    self.identifier, pct
                )));
            }
        }
        Ok(())
    }
}
