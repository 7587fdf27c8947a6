//! The read-only coefficient provider every estimator draws from.

mod table;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::YieldError;
use crate::models::{BecDefinition, CompVarAdjustments, Coefficients, Region};

pub use table::LookupTable;

/// Limits on the size of one genus' trees in a region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ComponentSizeLimits {
    pub lorey_height_maximum: f32,
    pub quad_mean_diameter_maximum: f32,
    pub min_quad_mean_diameter_lorey_height_ratio: f32,
    pub max_quad_mean_diameter_lorey_height_ratio: f32,
}

/// Ceilings on the primary layer's estimated basal area and diameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpperBounds {
    pub basal_area: f32,
    pub quad_mean_diameter: f32,
}

/// Non-primary height coefficients with the equation that selects which
/// height they are applied to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonPrimaryHeightCoefficients {
    pub equation_index: i32,
    pub coefficients: Vec<f32>,
}

type GenusRegion = (String, Region);
type ClassGenusZone = (i32, String, String);
type ClassGroup = (i32, i32);
type GenusZone = (String, String);

/// Every coefficient table the engine consults, loaded once and shared
/// read-only across all polygons of a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlMap {
    pub becs: Vec<BecDefinition>,

    /// Primary lorey height from lead height (genus, region)
    pub primary_height: LookupTable<GenusRegion, Vec<f32>>,
    /// Initial primary height (genus, region)
    pub initial_primary_height: LookupTable<GenusRegion, Vec<f32>>,
    /// Non-primary lorey height (genus, primary genus, region)
    pub non_primary_height: LookupTable<(String, String, Region), NonPrimaryHeightCoefficients>,
    /// Species quadratic mean diameter by genus
    pub species_quad_mean_diameter: LookupTable<String, Vec<f32>>,
    pub component_size_limits: LookupTable<GenusRegion, ComponentSizeLimits>,

    /// Basal area by utilization class (class index, genus, growth zone)
    pub basal_area_by_utilization: LookupTable<ClassGenusZone, Vec<f32>>,
    /// Quadratic mean diameter by utilization class (class index, genus, growth zone)
    pub quad_mean_diameter_by_utilization: LookupTable<ClassGenusZone, Vec<f32>>,

    /// Whole-stem volume per tree by volume group
    pub total_stand_whole_stem_volume: LookupTable<i32, Vec<f32>>,
    /// (class index, volume group)
    pub whole_stem_by_utilization: LookupTable<ClassGroup, Vec<f32>>,
    /// (class index, volume group)
    pub close_utilization: LookupTable<ClassGroup, Vec<f32>>,
    /// (class index, decay group)
    pub net_decay: LookupTable<ClassGroup, Vec<f32>>,
    pub decay_modifiers: LookupTable<GenusRegion, f32>,
    pub waste_modifiers: LookupTable<GenusRegion, f32>,
    /// Net of decay and waste by genus
    pub net_decay_waste: LookupTable<String, Vec<f32>>,
    /// Breakage by breakage group
    pub net_breakage: LookupTable<i32, Vec<f32>>,
    /// Veteran layer volume adjustments by genus
    pub veteran_volume_adjustments: LookupTable<String, Vec<f32>>,

    pub small_probability: LookupTable<String, Vec<f32>>,
    pub small_basal_area: LookupTable<String, Vec<f32>>,
    pub small_quad_mean_diameter: LookupTable<String, Vec<f32>>,
    pub small_lorey_height: LookupTable<String, Vec<f32>>,
    pub small_whole_stem_volume: LookupTable<String, Vec<f32>>,

    /// Primary basal area yield (decay zone, genus)
    pub primary_basal_area: LookupTable<GenusZone, Vec<f32>>,
    /// Primary quadratic mean diameter yield (decay zone, genus)
    pub primary_quad_mean_diameter: LookupTable<GenusZone, Vec<f32>>,
    pub basal_area_modifiers: LookupTable<GenusRegion, f32>,
    pub quad_mean_diameter_modifiers: LookupTable<GenusRegion, f32>,
    pub upper_bounds: LookupTable<(Region, String), UpperBounds>,

    /// (genus, zone)
    pub volume_groups: LookupTable<GenusZone, i32>,
    /// (genus, zone)
    pub decay_groups: LookupTable<GenusZone, i32>,
    /// (genus, zone)
    pub breakage_groups: LookupTable<GenusZone, i32>,
    /// (genus, zone)
    pub default_equation_groups: LookupTable<GenusZone, i32>,
    /// (default equation group, inventory type group)
    pub equation_modifiers: LookupTable<(i32, i32), i32>,

    pub compatibility_adjustments: CompVarAdjustments,
}

fn coefficients(values: &[f32], index_from: i32) -> Coefficients {
    Coefficients::new(values.to_vec(), index_from)
}

impl ControlMap {
    pub fn bec(&self, alias: &str) -> Result<&BecDefinition, YieldError> {
        self.becs
            .iter()
            .find(|b| b.alias == alias)
            .ok_or_else(|| YieldError::processing(format!("Could not find BEC {alias}")))
    }

    pub fn primary_height_coefficients(&self, genus: &str, region: Region) -> Result<Coefficients, YieldError> {
        let key = (genus.to_string(), region);
        let values = self.primary_height.get(&key, "primary height")?;
        Ok(coefficients(values, 0))
    }

    pub fn initial_primary_height_coefficients(
        &self,
        genus: &str,
        region: Region,
    ) -> Result<Coefficients, YieldError> {
        let key = (genus.to_string(), region);
        let values = self.initial_primary_height.get(&key, "initial primary height")?;
        Ok(coefficients(values, 1))
    }

    /// Returns the equation index and the coefficients.
    pub fn non_primary_height_coefficients(
        &self,
        genus: &str,
        primary_genus: &str,
        region: Region,
    ) -> Result<(i32, Coefficients), YieldError> {
        let key = (genus.to_string(), primary_genus.to_string(), region);
        let entry = self.non_primary_height.get(&key, "non-primary height")?;
        Ok((entry.equation_index, coefficients(&entry.coefficients, 1)))
    }

    pub fn species_quad_mean_diameter_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        let values = self
            .species_quad_mean_diameter
            .get(&genus.to_string(), "species quad mean diameter")?;
        Ok(coefficients(values, 0))
    }

    pub fn component_size_limits(&self, genus: &str, region: Region) -> Result<ComponentSizeLimits, YieldError> {
        self.component_size_limits
            .get(&(genus.to_string(), region), "component size limit")
            .copied()
    }

    pub fn basal_area_by_utilization_coefficients(
        &self,
        class_index: i32,
        genus: &str,
        growth_zone: &str,
    ) -> Result<Coefficients, YieldError> {
        let key = (class_index, genus.to_string(), growth_zone.to_string());
        let values = self
            .basal_area_by_utilization
            .get(&key, "basal area by utilization")?;
        Ok(coefficients(values, 1))
    }

    pub fn quad_mean_diameter_by_utilization_coefficients(
        &self,
        class_index: i32,
        genus: &str,
        growth_zone: &str,
    ) -> Result<Coefficients, YieldError> {
        let key = (class_index, genus.to_string(), growth_zone.to_string());
        let values = self
            .quad_mean_diameter_by_utilization
            .get(&key, "quad mean diameter by utilization")?;
        Ok(coefficients(values, 1))
    }

    pub fn total_stand_whole_stem_volume_coefficients(&self, volume_group: i32) -> Result<Coefficients, YieldError> {
        let values = self
            .total_stand_whole_stem_volume
            .get(&volume_group, "total stand whole stem volume")?;
        Ok(coefficients(values, 0))
    }

    pub fn whole_stem_by_utilization_coefficients(
        &self,
        class_index: i32,
        volume_group: i32,
    ) -> Result<Coefficients, YieldError> {
        let values = self
            .whole_stem_by_utilization
            .get(&(class_index, volume_group), "whole stem utilization")?;
        Ok(coefficients(values, 0))
    }

    pub fn close_utilization_coefficients(&self, class_index: i32, volume_group: i32) -> Result<Coefficients, YieldError> {
        let values = self
            .close_utilization
            .get(&(class_index, volume_group), "close utilization")?;
        Ok(coefficients(values, 1))
    }

    pub fn net_decay_coefficients(&self, class_index: i32, decay_group: i32) -> Result<Coefficients, YieldError> {
        let values = self.net_decay.get(&(class_index, decay_group), "net decay")?;
        Ok(coefficients(values, 1))
    }

    pub fn decay_modifier(&self, genus: &str, region: Region) -> f32 {
        self.decay_modifiers.get_or(&(genus.to_string(), region), 0.0)
    }

    pub fn waste_modifier(&self, genus: &str, region: Region) -> f32 {
        self.waste_modifiers.get_or(&(genus.to_string(), region), 0.0)
    }

    pub fn net_decay_waste_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        let values = self.net_decay_waste.get(&genus.to_string(), "net decay waste")?;
        Ok(coefficients(values, 0))
    }

    pub fn net_breakage_coefficients(&self, breakage_group: i32) -> Result<Coefficients, YieldError> {
        let values = self.net_breakage.get(&breakage_group, "net breakage")?;
        Ok(coefficients(values, 1))
    }

    pub fn veteran_volume_adjustment_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        let values = self
            .veteran_volume_adjustments
            .get(&genus.to_string(), "veteran layer volume adjust")?;
        Ok(coefficients(values, 1))
    }

    fn small_coefficients(
        table: &LookupTable<String, Vec<f32>>,
        genus: &str,
        name: &str,
    ) -> Result<Coefficients, YieldError> {
        Ok(coefficients(table.get(&genus.to_string(), name)?, 1))
    }

    pub fn small_probability_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        Self::small_coefficients(&self.small_probability, genus, "small component probability")
    }

    pub fn small_basal_area_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        Self::small_coefficients(&self.small_basal_area, genus, "small component basal area")
    }

    pub fn small_quad_mean_diameter_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        Self::small_coefficients(
            &self.small_quad_mean_diameter,
            genus,
            "small component quad mean diameter",
        )
    }

    pub fn small_lorey_height_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        Self::small_coefficients(&self.small_lorey_height, genus, "small component lorey height")
    }

    pub fn small_whole_stem_volume_coefficients(&self, genus: &str) -> Result<Coefficients, YieldError> {
        Self::small_coefficients(
            &self.small_whole_stem_volume,
            genus,
            "small component whole stem volume",
        )
    }

    pub fn primary_basal_area_coefficients(&self, decay_zone: &str, genus: &str) -> Result<Coefficients, YieldError> {
        let key = (decay_zone.to_string(), genus.to_string());
        let values = self.primary_basal_area.get(&key, "primary basal area")?;
        Ok(coefficients(values, 0))
    }

    pub fn primary_quad_mean_diameter_coefficients(
        &self,
        decay_zone: &str,
        genus: &str,
    ) -> Result<Coefficients, YieldError> {
        let key = (decay_zone.to_string(), genus.to_string());
        let values = self
            .primary_quad_mean_diameter
            .get(&key, "primary quad mean diameter")?;
        Ok(coefficients(values, 0))
    }

    pub fn basal_area_modifier(&self, genus: &str, region: Region) -> f32 {
        self.basal_area_modifiers.get_or(&(genus.to_string(), region), 1.0)
    }

    pub fn quad_mean_diameter_modifier(&self, genus: &str, region: Region) -> f32 {
        self.quad_mean_diameter_modifiers
            .get_or(&(genus.to_string(), region), 1.0)
    }

    pub fn upper_bounds(&self, region: Region, genus: &str) -> Result<UpperBounds, YieldError> {
        self.upper_bounds
            .get(&(region, genus.to_string()), "upper bound")
            .copied()
    }

    fn group(table: &LookupTable<GenusZone, i32>, genus: &str, zone: &str, name: &str) -> Result<i32, YieldError> {
        table
            .get(&(genus.to_string(), zone.to_string()), name)
            .copied()
    }

    pub fn volume_group(&self, genus: &str, zone: &str) -> Result<i32, YieldError> {
        Self::group(&self.volume_groups, genus, zone, "volume group")
    }

    pub fn decay_group(&self, genus: &str, zone: &str) -> Result<i32, YieldError> {
        Self::group(&self.decay_groups, genus, zone, "decay group")
    }

    pub fn breakage_group(&self, genus: &str, zone: &str) -> Result<i32, YieldError> {
        Self::group(&self.breakage_groups, genus, zone, "breakage group")
    }

    pub fn default_equation_group(&self, genus: &str, zone: &str) -> Result<i32, YieldError> {
        Self::group(&self.default_equation_groups, genus, zone, "default equation group")
    }

    pub fn equation_modifier_group(&self, default_group: i32, inventory_type_group: i32) -> Option<i32> {
        self.equation_modifiers
            .find(&(default_group, inventory_type_group))
            .copied()
    }

    pub fn from_json_str(json: &str) -> Result<Self, YieldError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, YieldError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_map() -> ControlMap {
        let mut map = ControlMap {
            becs: vec![BecDefinition::new("CWH", Region::Coastal)],
            ..Default::default()
        };
        map.primary_height
            .insert(("B".to_string(), Region::Coastal), vec![1.0, 2.0, 3.0]);
        map.close_utilization.insert((2, 7), vec![-1.0, 0.1, 0.01]);
        map.basal_area_modifiers
            .insert(("B".to_string(), Region::Coastal), 0.9);
        map
    }

    #[test]
    fn test_index_from_matches_equation_convention() {
        let map = sample_map();
        let hl = map
            .primary_height_coefficients("B", Region::Coastal)
            .unwrap();
        assert_eq!(hl.coe(0), 1.0);
        let cu = map.close_utilization_coefficients(2, 7).unwrap();
        assert_eq!(cu.coe(1), -1.0);
        assert_eq!(cu.coe(3), 0.01);
    }

    #[test]
    fn test_missing_table_entry_is_processing_error() {
        let map = sample_map();
        let err = map.close_utilization_coefficients(3, 7).unwrap_err();
        assert!(matches!(err, YieldError::ProcessingError(_)));
        assert!(err.to_string().contains("close utilization"));
    }

    #[test]
    fn test_modifiers_have_neutral_defaults() {
        let map = sample_map();
        assert_eq!(map.basal_area_modifier("B", Region::Coastal), 0.9);
        assert_eq!(map.basal_area_modifier("H", Region::Coastal), 1.0);
        assert_eq!(map.decay_modifier("B", Region::Coastal), 0.0);
    }

    #[test]
    fn test_bec_lookup() {
        let map = sample_map();
        assert!(map.bec("CWH").is_ok());
        assert!(map.bec("XX").is_err());
    }

    #[test]
    fn test_json_round_trip_of_partial_map() {
        let map = sample_map();
        let json = serde_json::to_string(&map).unwrap();
        let back = ControlMap::from_json_str(&json).unwrap();
        assert_eq!(back.primary_height.len(), 1);
        assert_eq!(back.becs[0].alias, "CWH");
    }
}
