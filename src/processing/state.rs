//! Processing session over one layer: a [`Bank`] plus the details derived
//! from it that may each be established only once.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::bank::Bank;
use super::ranking::{determine_rankings, SpeciesRanking};
use crate::config::ControlVariables;
use crate::control::ControlMap;
use crate::error::YieldError;
use crate::estimation::Estimator;
use crate::models::{
    BecDefinition, CompVarAdjustments, CompatibilityVariables, Layer, UtilizationClass,
    UtilizationField,
};

/// The volume group the zone matrices assign but no equation set exists for.
const UNSUPPORTED_VOLUME_GROUP: i32 = 10;
const VOLUME_GROUP_REPLACEMENT: i32 = 11;

/// Where a session is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Bank built, nothing read or written yet
    Constructed,
    /// Bank in use by estimation passes
    Active,
    /// Bank copied back out to a layer at least once
    Materialized,
}

/// Dominant height, age and site index of the primary species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrimarySpeciesDetails {
    pub lorey_height: f32,
    pub dominant_height: f32,
    pub site_index: f32,
    pub age_total: f32,
    pub years_at_breast_height: f32,
    pub years_to_breast_height: f32,
}

/// A value that may be given once and read any number of times after.
#[derive(Debug, Clone)]
struct SetOnce<T> {
    name: &'static str,
    value: Option<T>,
}

impl<T> SetOnce<T> {
    fn new(name: &'static str) -> Self {
        Self { name, value: None }
    }

    fn set(&mut self, value: T) -> Result<(), YieldError> {
        if self.value.is_some() {
            return Err(YieldError::InvalidState(format!(
                "{} can be set once only",
                self.name
            )));
        }
        self.value = Some(value);
        Ok(())
    }

    fn replace(&mut self, value: T) {
        self.value = Some(value);
    }

    fn get(&self) -> Result<&T, YieldError> {
        self.value
            .as_ref()
            .ok_or_else(|| YieldError::InvalidState(format!("unset {}", self.name)))
    }

    fn get_mut(&mut self) -> Result<&mut T, YieldError> {
        let name = self.name;
        self.value
            .as_mut()
            .ok_or_else(|| YieldError::InvalidState(format!("unset {name}")))
    }

    fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingSession {
    bank: Bank,
    phase: SessionPhase,
    update_during_growth: bool,

    volume_groups: Vec<i32>,
    decay_groups: Vec<i32>,
    breakage_groups: Vec<i32>,

    ranking: SetOnce<SpeciesRanking>,
    site_curve_numbers: SetOnce<Vec<Option<i32>>>,
    primary_details: SetOnce<PrimarySpeciesDetails>,
    compatibility: SetOnce<Vec<CompatibilityVariables>>,
}

impl ProcessingSession {
    /// Open a session on `layer`, banking the species with a usable basal
    /// area and looking up their equation groups in `bec`'s own zone.
    pub fn new(
        control: &ControlMap,
        control_variables: &ControlVariables,
        layer: &Layer,
        bec: &BecDefinition,
    ) -> Result<Self, YieldError> {
        let bank = Bank::with_minimum_basal_area(layer, bec);
        let slots = bank.n_species() + 1;

        let mut volume_groups = vec![0; slots];
        let mut decay_groups = vec![0; slots];
        let mut breakage_groups = vec![0; slots];
        for i in bank.indices() {
            let genus = &bank.species_names[i];
            let mut volume_group = control.volume_group(genus, &bec.alias)?;
            if volume_group == UNSUPPORTED_VOLUME_GROUP {
                volume_group = VOLUME_GROUP_REPLACEMENT;
            }
            volume_groups[i] = volume_group;
            decay_groups[i] = control.decay_group(genus, &bec.alias)?;
            breakage_groups[i] = control.breakage_group(genus, &bec.alias)?;
        }

        let update_during_growth =
            control_variables.get(ControlVariables::UPDATE_DURING_GROWTH)? == 1;

        debug!(
            layer = %layer.layer_type,
            species = bank.n_species(),
            update_during_growth,
            "opened processing session"
        );

        Ok(Self {
            bank,
            phase: SessionPhase::Constructed,
            update_during_growth,
            volume_groups,
            decay_groups,
            breakage_groups,
            ranking: SetOnce::new("rankingDetails"),
            site_curve_numbers: SetOnce::new("siteCurveNumbers"),
            primary_details: SetOnce::new("primarySpeciesDetails"),
            compatibility: SetOnce::new("compatibilityVariableDetails"),
        })
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn bank(&self) -> &Bank {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut Bank {
        if self.phase == SessionPhase::Constructed {
            self.phase = SessionPhase::Active;
        }
        &mut self.bank
    }

    pub fn volume_group(&self, slot: usize) -> i32 {
        self.volume_groups[slot]
    }

    pub fn decay_group(&self, slot: usize) -> i32 {
        self.decay_groups[slot]
    }

    pub fn breakage_group(&self, slot: usize) -> i32 {
        self.breakage_groups[slot]
    }

    pub fn set_ranking(&mut self, ranking: SpeciesRanking) -> Result<(), YieldError> {
        self.ranking.set(ranking)
    }

    pub fn ranking(&self) -> Result<&SpeciesRanking, YieldError> {
        self.ranking.get()
    }

    /// Rank the banked species and lock the result into the session.
    pub fn determine_rankings(&mut self, control: &ControlMap) -> Result<&SpeciesRanking, YieldError> {
        let ranking = determine_rankings(&self.bank, control)?;
        self.ranking.set(ranking)?;
        self.ranking.get()
    }

    /// Site curve numbers by slot; slot 0 is filled from the primary species.
    pub fn set_site_curve_numbers(&mut self, numbers: Vec<Option<i32>>) -> Result<(), YieldError> {
        if numbers.len() != self.bank.n_species() + 1 {
            return Err(YieldError::InvalidState(format!(
                "expected {} site curve numbers, got {}",
                self.bank.n_species() + 1,
                numbers.len()
            )));
        }
        self.site_curve_numbers.set(numbers)
    }

    /// Site curve number of a slot. Reading slot 0 copies the primary
    /// species' curve there, so the ranking must be known.
    pub fn site_curve_number(&mut self, slot: usize) -> Result<Option<i32>, YieldError> {
        if slot == 0 {
            let primary = self.ranking.get()?.primary_index;
            let numbers = self.site_curve_numbers.get_mut()?;
            numbers[0] = numbers[primary];
            return Ok(numbers[0]);
        }
        let numbers = self.site_curve_numbers.get()?;
        numbers.get(slot).copied().ok_or_else(|| {
            YieldError::InvalidState(format!("no species in slot {slot}"))
        })
    }

    /// Record the primary species' details. They are also written into the
    /// primary's bank slot wherever the bank has no value of its own.
    ///
    /// A second call succeeds only while growth updates are enabled.
    pub fn set_primary_details(&mut self, details: PrimarySpeciesDetails) -> Result<(), YieldError> {
        let primary = self.ranking.get()?.primary_index;
        if self.primary_details.is_set() && self.update_during_growth {
            self.primary_details.replace(details);
        } else {
            self.primary_details.set(details)?;
        }

        let bank = self.bank_mut();
        fill_if_unset(&mut bank.dominant_heights[primary], details.dominant_height);
        fill_if_unset(&mut bank.site_indices[primary], details.site_index);
        fill_if_unset(&mut bank.age_totals[primary], details.age_total);
        fill_if_unset(&mut bank.years_at_breast_height[primary], details.years_at_breast_height);
        fill_if_unset(&mut bank.years_to_breast_height[primary], details.years_to_breast_height);
        Ok(())
    }

    pub fn primary_details(&self) -> Result<&PrimarySpeciesDetails, YieldError> {
        self.primary_details.get()
    }

    /// Work out the primary species' details from the bank, borrowing age
    /// and site index from the secondary species and then from any species
    /// when the primary has none, and record them.
    pub fn derive_primary_details(&mut self, estimator: &Estimator<'_>) -> Result<PrimarySpeciesDetails, YieldError> {
        let ranking = self.ranking.get()?.clone();
        let bank = &self.bank;
        let primary = ranking.primary_index;

        let lorey_height = bank.lorey_heights[primary].all;
        let dominant_height = match bank.dominant_heights[primary] {
            Some(height) if height > 0.0 => height,
            _ => {
                if lorey_height <= 0.0 {
                    return Err(YieldError::processing(format!(
                        "Neither dominant nor lorey height is available for primary species {}",
                        ranking.primary_genus
                    )));
                }
                estimator.lead_height_from_primary_height(
                    lorey_height,
                    &ranking.primary_genus,
                    bank.bec().region,
                    bank.get(UtilizationField::TreesPerHectare, primary, UtilizationClass::All),
                )?
            }
        };

        let age_slot = fallback_slot(bank, &ranking, |i| bank.age_totals[i].is_some())
            .ok_or_else(|| YieldError::processing("Age data unavailable for ALL species"))?;
        let age_total = bank.age_totals[age_slot].unwrap_or_default();
        let (years_at_breast_height, years_to_breast_height) =
            match (bank.years_at_breast_height[age_slot], bank.years_to_breast_height[age_slot]) {
                (_, Some(ytbh)) => (age_total - ytbh, ytbh),
                (Some(yabh), None) => (yabh, age_total - yabh),
                (None, None) => {
                    return Err(YieldError::processing(format!(
                        "Breast height age unavailable for species {}",
                        bank.species_names[age_slot]
                    )))
                }
            };

        let site_slot = fallback_slot(bank, &ranking, |i| bank.site_indices[i].is_some())
            .ok_or_else(|| YieldError::processing("Site Index data unavailable for ALL species"))?;
        let site_index = bank.site_indices[site_slot].unwrap_or_default();

        let details = PrimarySpeciesDetails {
            lorey_height,
            dominant_height,
            site_index,
            age_total,
            years_at_breast_height,
            years_to_breast_height,
        };
        debug!(?details, "derived primary species details");
        self.set_primary_details(details)?;
        Ok(details)
    }

    /// Advance the primary species by one growth year to `dominant_height`.
    pub fn update_primary_details_after_growth(&mut self, dominant_height: f32) -> Result<(), YieldError> {
        let details = self.primary_details.get_mut()?;
        details.dominant_height = dominant_height;
        details.age_total += 1.0;
        details.years_at_breast_height += 1.0;
        Ok(())
    }

    /// Compatibility variables for slots 1..=n, in slot order.
    pub fn set_compatibility_variables(&mut self, variables: Vec<CompatibilityVariables>) -> Result<(), YieldError> {
        if variables.len() != self.bank.n_species() {
            return Err(YieldError::InvalidState(format!(
                "expected compatibility variables for {} species, got {}",
                self.bank.n_species(),
                variables.len()
            )));
        }
        let mut by_slot = Vec::with_capacity(variables.len() + 1);
        by_slot.push(CompatibilityVariables::default());
        by_slot.extend(variables);
        self.compatibility.set(by_slot)
    }

    pub fn compatibility_variables(&self, slot: usize) -> Result<&CompatibilityVariables, YieldError> {
        self.compatibility
            .get()?
            .get(slot)
            .ok_or_else(|| YieldError::InvalidState(format!("no species in slot {slot}")))
    }

    /// Decay every species' compatibility variables by one growth year.
    pub fn update_compatibility_variables_after_growth(
        &mut self,
        adjustments: &CompVarAdjustments,
    ) -> Result<(), YieldError> {
        let variables = self.compatibility.get_mut()?;
        for cv in variables.iter_mut().skip(1) {
            cv.decay(adjustments)?;
        }
        Ok(())
    }

    /// Copy the bank back out to a layer. The session stays usable.
    pub fn materialize(&mut self) -> Layer {
        self.phase = SessionPhase::Materialized;
        let layer = self.bank.build_layer();
        info!(layer = %layer.layer_type, species = layer.species.len(), "materialized layer from bank");
        layer
    }
}

fn fill_if_unset(slot: &mut Option<f32>, value: f32) {
    if slot.map_or(true, |v| v <= 0.0) {
        *slot = Some(value);
    }
}

/// The primary slot if it satisfies `has`, else the secondary, else the
/// first species slot that does.
fn fallback_slot(bank: &Bank, ranking: &SpeciesRanking, has: impl Fn(usize) -> bool) -> Option<usize> {
    std::iter::once(ranking.primary_index)
        .chain(ranking.secondary_index)
        .chain(bank.indices())
        .find(|&i| has(i))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LayerType, Region, Site, Species, UtilizationVector};
    use assert_approx_eq::assert_approx_eq;

    fn species(genus: &str, pct: f32, site: Option<Site>) -> Species {
        let mut spec = Species::new(genus, pct);
        spec.utilization.basal_area = UtilizationVector::from_bands(0.0, 2.0, 2.0, 2.0, 2.0);
        spec.utilization.trees_per_hectare =
            UtilizationVector::from_bands(0.0, 100.0, 60.0, 30.0, 10.0);
        spec.utilization.lorey_height.all = 18.0;
        spec.site = site;
        spec
    }

    fn site(age: f32, si: Option<f32>) -> Site {
        Site {
            site_index: si,
            height: None,
            age_total: Some(age),
            years_to_breast_height: Some(6.0),
            site_curve_number: Some(34),
        }
    }

    fn control() -> ControlMap {
        let mut c = ControlMap::default();
        for genus in ["PL", "S", "B"] {
            let key = (genus.to_string(), "SBS".to_string());
            c.volume_groups.insert(key.clone(), if genus == "S" { 10 } else { 3 });
            c.decay_groups.insert(key.clone(), 5);
            c.breakage_groups.insert(key.clone(), 7);
            c.default_equation_groups.insert(key, 12);
            c.primary_height
                .insert((genus.to_string(), Region::Interior), vec![1.0, 0.0, 0.0]);
        }
        c
    }

    fn layer(specs: Vec<Species>) -> Layer {
        Layer::new(LayerType::Primary, specs)
    }

    fn session(specs: Vec<Species>, cv: Vec<i32>) -> ProcessingSession {
        ProcessingSession::new(
            &control(),
            &ControlVariables::new(cv).unwrap(),
            &layer(specs),
            &BecDefinition::new("SBS", Region::Interior),
        )
        .unwrap()
    }

    fn details(height: f32) -> PrimarySpeciesDetails {
        PrimarySpeciesDetails {
            lorey_height: 18.0,
            dominant_height: height,
            site_index: 16.0,
            age_total: 40.0,
            years_at_breast_height: 34.0,
            years_to_breast_height: 6.0,
        }
    }

    #[test]
    fn test_equation_groups_replace_group_ten() {
        let s = session(vec![species("PL", 60.0, None), species("S", 40.0, None)], vec![]);
        let pl = s.bank().slot_of("PL").unwrap();
        let sp = s.bank().slot_of("S").unwrap();
        assert_eq!(s.volume_group(pl), 3);
        assert_eq!(s.volume_group(sp), 11);
        assert_eq!(s.decay_group(sp), 5);
        assert_eq!(s.breakage_group(pl), 7);
    }

    #[test]
    fn test_ranking_is_set_once() {
        let c = control();
        let mut s = session(vec![species("PL", 60.0, None), species("S", 40.0, None)], vec![]);
        assert!(matches!(s.ranking(), Err(YieldError::InvalidState(_))));
        assert_eq!(s.determine_rankings(&c).unwrap().primary_genus, "PL");
        assert!(matches!(
            s.determine_rankings(&c),
            Err(YieldError::InvalidState(_))
        ));
    }

    #[test]
    fn test_site_curve_slot_zero_follows_primary() {
        let c = control();
        let mut s = session(vec![species("PL", 40.0, None), species("S", 60.0, None)], vec![]);
        assert!(s.site_curve_number(1).is_err());
        s.set_site_curve_numbers(vec![None, Some(11), Some(22)]).unwrap();
        assert!(s.site_curve_number(0).is_err());
        s.determine_rankings(&c).unwrap();
        assert_eq!(s.site_curve_number(0).unwrap(), Some(22));
        assert_eq!(s.site_curve_number(1).unwrap(), Some(11));
        assert!(s.set_site_curve_numbers(vec![None, None, None]).is_err());
    }

    #[test]
    fn test_primary_details_locked_unless_growth_updates_enabled() {
        let c = control();
        let mut locked = session(vec![species("PL", 100.0, None)], vec![]);
        locked.determine_rankings(&c).unwrap();
        locked.set_primary_details(details(20.0)).unwrap();
        assert!(locked.set_primary_details(details(21.0)).is_err());

        let mut growing = session(vec![species("PL", 100.0, None)], vec![0, 0, 0, 0, 0, 1]);
        growing.determine_rankings(&c).unwrap();
        growing.set_primary_details(details(20.0)).unwrap();
        growing.set_primary_details(details(21.0)).unwrap();
        assert_eq!(growing.primary_details().unwrap().dominant_height, 21.0);
    }

    #[test]
    fn test_primary_details_fill_empty_bank_values() {
        let c = control();
        let mut s = session(vec![species("PL", 100.0, Some(site(50.0, None)))], vec![]);
        s.determine_rankings(&c).unwrap();
        s.set_primary_details(details(20.0)).unwrap();
        let bank = s.bank();
        assert_eq!(bank.dominant_heights[1], Some(20.0));
        assert_eq!(bank.site_indices[1], Some(16.0));
        // Already known, so kept.
        assert_eq!(bank.age_totals[1], Some(50.0));
        assert_eq!(s.phase(), SessionPhase::Active);
    }

    #[test]
    fn test_derive_details_borrows_from_secondary() {
        let c = control();
        let mut s = session(
            vec![
                species("PL", 70.0, None),
                species("S", 20.0, Some(site(45.0, None))),
                species("B", 10.0, Some(site(90.0, Some(14.0)))),
            ],
            vec![],
        );
        s.determine_rankings(&c).unwrap();
        let est = Estimator::new(&c);
        let d = s.derive_primary_details(&est).unwrap();
        assert_eq!(d.age_total, 45.0);
        assert_eq!(d.years_at_breast_height, 39.0);
        assert_eq!(d.years_to_breast_height, 6.0);
        assert_eq!(d.site_index, 14.0);
        // A neutral height multiplier leaves lorey and dominant height equal.
        assert_approx_eq!(d.dominant_height, 18.0, 1e-5);
    }

    #[test]
    fn test_derive_details_without_ages_fails() {
        let c = control();
        let mut s = session(vec![species("PL", 100.0, None)], vec![]);
        s.determine_rankings(&c).unwrap();
        let err = s.derive_primary_details(&Estimator::new(&c)).unwrap_err();
        assert!(err.to_string().contains("Age data unavailable"));
    }

    #[test]
    fn test_growth_update() {
        let c = control();
        let mut s = session(vec![species("PL", 100.0, None)], vec![]);
        assert!(s.update_primary_details_after_growth(21.0).is_err());
        s.determine_rankings(&c).unwrap();
        s.set_primary_details(details(20.0)).unwrap();
        s.update_primary_details_after_growth(21.5).unwrap();
        let d = s.primary_details().unwrap();
        assert_eq!(d.dominant_height, 21.5);
        assert_eq!(d.age_total, 41.0);
        assert_eq!(d.years_at_breast_height, 35.0);
        assert_eq!(d.years_to_breast_height, 6.0);
    }

    #[test]
    fn test_compatibility_variables_decay() {
        let mut s = session(vec![species("PL", 100.0, None)], vec![]);
        assert!(s.compatibility_variables(1).is_err());
        let mut cv = CompatibilityVariables::default();
        cv.basal_area = [1.0, 2.0, 3.0, 4.0];
        s.set_compatibility_variables(vec![cv]).unwrap();
        assert!(s.set_compatibility_variables(vec![cv]).is_err());

        let adjustments =
            CompVarAdjustments::new([(5, 0.5), (6, 0.5)].into_iter().collect()).unwrap();
        s.update_compatibility_variables_after_growth(&adjustments).unwrap();
        let decayed = s.compatibility_variables(1).unwrap();
        assert_approx_eq!(decayed.basal_area[0], 0.5, 1e-6);
        assert_approx_eq!(decayed.basal_area[1], 1.0, 1e-6);
        assert_approx_eq!(decayed.basal_area[3], 4.0, 1e-6);
    }

    #[test]
    fn test_materialize_keeps_session_usable() {
        let mut s = session(vec![species("PL", 100.0, None)], vec![]);
        assert_eq!(s.phase(), SessionPhase::Constructed);
        let layer = s.materialize();
        assert_eq!(s.phase(), SessionPhase::Materialized);
        assert_eq!(layer.species.len(), 1);
        s.bank_mut()
            .set(UtilizationField::BasalArea, 1, UtilizationClass::Over225, 5.0);
        assert_eq!(s.phase(), SessionPhase::Materialized);
        assert_eq!(
            s.materialize().species[0].utilization.basal_area.large(),
            5.0
        );
    }
}
