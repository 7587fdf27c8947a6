//! Columnar snapshot of one layer, used for repeated re-estimation.
//!
//! Slot 0 holds the layer itself; slots 1..=n hold the retained species in
//! genus order. Per-species site values are kept beside the utilization
//! columns so a session can read and amend them without touching the layer.

use crate::error::YieldError;
use crate::estimation::diameter::quad_mean_diameter;
use crate::models::{
    BecDefinition, Layer, LayerType, LoreyHeightVector, Species, UtilizationClass,
    UtilizationField, UtilizationSet,
};

/// Species whose ALL basal area falls below this are left out of a bank.
pub const MIN_BASAL_AREA: f32 = 0.001;

const N_CLASSES: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct Bank {
    layer: Layer,
    bec: BecDefinition,
    n_species: usize,

    pub species_names: Vec<String>,
    pub species_indices: Vec<usize>,
    pub percentages: Vec<f32>,
    pub site_indices: Vec<Option<f32>>,
    pub dominant_heights: Vec<Option<f32>>,
    pub age_totals: Vec<Option<f32>>,
    pub years_at_breast_height: Vec<Option<f32>>,
    pub years_to_breast_height: Vec<Option<f32>>,
    pub site_curve_numbers: Vec<Option<i32>>,

    /// One column per utilization field, indexed `[field][slot][class]`
    columns: Vec<Vec<[f32; N_CLASSES]>>,
    /// SMALL and ALL lorey heights, indexed `[slot]`
    pub lorey_heights: Vec<LoreyHeightVector>,
}

impl Bank {
    /// Build a bank from `layer`, keeping the species for which `retain`
    /// holds. ALL values are recalculated from the diameter bands rather than
    /// taken from the input.
    pub fn new(layer: &Layer, bec: &BecDefinition, retain: impl Fn(&Species) -> bool) -> Self {
        let mut retained: Vec<&Species> = layer.species.iter().filter(|&s| retain(s)).collect();
        retained.sort_by_key(|s| s.genus_index());
        let n_species = retained.len();
        let slots = n_species + 1;

        let mut bank = Self {
            layer: layer.clone(),
            bec: bec.clone(),
            n_species,
            species_names: vec![String::new(); slots],
            species_indices: vec![0; slots],
            percentages: vec![0.0; slots],
            site_indices: vec![None; slots],
            dominant_heights: vec![None; slots],
            age_totals: vec![None; slots],
            years_at_breast_height: vec![None; slots],
            years_to_breast_height: vec![None; slots],
            site_curve_numbers: vec![None; slots],
            columns: vec![vec![[0.0; N_CLASSES]; slots]; UtilizationField::ALL.len()],
            lorey_heights: vec![LoreyHeightVector::default(); slots],
        };

        for (i, spec) in retained.into_iter().enumerate() {
            bank.transfer_species_in(i + 1, spec);
        }
        bank.transfer_utilization_in(0, &layer.utilization);
        bank.calculate_all_values();
        bank
    }

    /// Build a bank keeping only species with at least [`MIN_BASAL_AREA`].
    pub fn with_minimum_basal_area(layer: &Layer, bec: &BecDefinition) -> Self {
        Self::new(layer, bec, |s| {
            s.utilization.basal_area.all() >= MIN_BASAL_AREA
        })
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    /// Slots of the species, 1..=n.
    pub fn indices(&self) -> std::ops::RangeInclusive<usize> {
        1..=self.n_species
    }

    pub fn bec(&self) -> &BecDefinition {
        &self.bec
    }

    pub fn layer_type(&self) -> LayerType {
        self.layer.layer_type
    }

    pub fn get(&self, field: UtilizationField, slot: usize, uc: UtilizationClass) -> f32 {
        self.columns[field_position(field)][slot][uc.ordinal()]
    }

    pub fn set(&mut self, field: UtilizationField, slot: usize, uc: UtilizationClass, value: f32) {
        self.columns[field_position(field)][slot][uc.ordinal()] = value;
    }

    /// Slot of the species with genus `genus`.
    pub fn slot_of(&self, genus: &str) -> Option<usize> {
        self.indices().find(|&i| self.species_names[i] == genus)
    }

    /// Reload the bank from an updated version of the layer it was built
    /// from. The species may change in detail but not in number or genus.
    pub fn refresh(&mut self, layer: &Layer) -> Result<(), YieldError> {
        let mut species: Vec<&Species> = layer.species.iter().collect();
        species.sort_by_key(|s| s.genus_index());

        let same_species = layer.layer_type == self.layer.layer_type
            && species.len() == self.n_species
            && species
                .iter()
                .zip(self.indices())
                .all(|(s, i)| s.genus == self.species_names[i]);
        if !same_species {
            return Err(YieldError::InvalidState(format!(
                "Cannot refresh a bank of {} species [{}] from a layer with species [{}]",
                self.n_species,
                self.species_names[1..].join(", "),
                species.iter().map(|s| s.genus.as_str()).collect::<Vec<_>>().join(", ")
            )));
        }

        self.transfer_utilization_in(0, &layer.utilization);
        for (i, spec) in species.into_iter().enumerate() {
            self.transfer_species_in(i + 1, spec);
        }
        self.layer = layer.clone();
        Ok(())
    }

    /// Copy the bank out into a layer shaped like the one it was built from.
    /// Species left out of the bank are left out of the layer.
    pub fn build_layer(&self) -> Layer {
        let mut layer = self.layer.clone();
        layer.utilization = self.utilization_out(0, &layer.utilization);

        let mut species = Vec::with_capacity(self.n_species);
        for i in self.indices() {
            let Some(original) = self
                .layer
                .species
                .iter()
                .find(|s| s.genus == self.species_names[i])
            else {
                continue;
            };
            let mut spec = original.clone();
            spec.percent_genus = self.percentages[i];
            let mut site = spec.site.take().unwrap_or_default();
            site.site_index = self.site_indices[i];
            site.height = self.dominant_heights[i];
            site.age_total = self.age_totals[i];
            site.years_to_breast_height = self.years_to_breast_height[i];
            site.site_curve_number = self.site_curve_numbers[i];
            spec.site = Some(site);
            spec.utilization = self.utilization_out(i, &spec.utilization);
            species.push(spec);
        }
        layer.species = species;
        layer
    }

    fn transfer_species_in(&mut self, slot: usize, spec: &Species) {
        self.species_names[slot] = spec.genus.clone();
        self.species_indices[slot] = spec.genus_index();
        self.percentages[slot] = spec.percent_genus;

        let site = spec.site.clone().unwrap_or_default();
        self.site_indices[slot] = site.site_index;
        self.dominant_heights[slot] = site.height;
        self.age_totals[slot] = site.age_total;
        self.years_to_breast_height[slot] = site.years_to_breast_height;
        self.years_at_breast_height[slot] = site.breast_height_age();
        self.site_curve_numbers[slot] = site.site_curve_number;

        self.transfer_utilization_in(slot, &spec.utilization);
    }

    fn transfer_utilization_in(&mut self, slot: usize, u: &UtilizationSet) {
        for field in UtilizationField::ALL {
            self.columns[field_position(field)][slot] = u.vector(field).as_array();
        }
        self.lorey_heights[slot] = u.lorey_height;
    }

    fn utilization_out(&self, slot: usize, template: &UtilizationSet) -> UtilizationSet {
        let mut u = template.clone();
        for field in UtilizationField::ALL {
            let v = u.vector_mut(field);
            for uc in UtilizationClass::ALL_CLASSES {
                v[uc] = self.get(field, slot, uc);
            }
        }
        u.lorey_height = self.lorey_heights[slot];
        u
    }

    fn sum_species(&self, field: UtilizationField, uc: UtilizationClass) -> f32 {
        let mut sum = 0.0f32;
        for i in self.indices() {
            sum += self.get(field, i, uc);
        }
        sum
    }

    fn calculate_all_values(&mut self) {
        let all = UtilizationClass::All;
        let small = UtilizationClass::Small;

        for i in self.indices() {
            for field in UtilizationField::SUMMABLE {
                let mut sum = 0.0f32;
                for uc in UtilizationClass::BANDS {
                    sum += self.get(field, i, uc);
                }
                self.set(field, i, all, sum);
            }
            let ba = self.get(UtilizationField::BasalArea, i, all);
            if ba > 0.0 {
                let tph = self.get(UtilizationField::TreesPerHectare, i, all);
                self.set(UtilizationField::QuadMeanDiameter, i, all, quad_mean_diameter(ba, tph));
            }
        }

        let mut hl_by_ba_small = 0.0f32;
        let mut ba_small = 0.0f32;
        let mut hl_by_ba_all = 0.0f32;
        for i in self.indices() {
            let hl = self.lorey_heights[i];
            hl_by_ba_small += hl.small * self.get(UtilizationField::BasalArea, i, small);
            ba_small += self.get(UtilizationField::BasalArea, i, small);
            hl_by_ba_all += hl.all * self.get(UtilizationField::BasalArea, i, all);
        }

        for field in UtilizationField::SUMMABLE {
            for uc in UtilizationClass::ALL_CLASSES {
                let sum = self.sum_species(field, uc);
                self.set(field, 0, uc, sum);
            }
        }

        let ba_all = self.get(UtilizationField::BasalArea, 0, all);
        if ba_all > 0.0 {
            let tph_all = self.get(UtilizationField::TreesPerHectare, 0, all);
            self.set(UtilizationField::QuadMeanDiameter, 0, all, quad_mean_diameter(ba_all, tph_all));
            self.lorey_heights[0].all = hl_by_ba_all / ba_all;
        }
        if ba_small > 0.0 {
            self.lorey_heights[0].small = hl_by_ba_small / ba_small;
        }
    }
}

fn field_position(field: UtilizationField) -> usize {
    UtilizationField::ALL
        .iter()
        .position(|f| *f == field)
        .unwrap_or_default()
}
