use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// Diameter utilization class into which stand metrics are decomposed.
///
/// Variants are declared in storage order: `Small` first, then the
/// all-merchantable aggregate, then the four diameter bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum UtilizationClass {
    /// Trees below 7.5 cm DBH
    #[serde(rename = "SMALL")]
    Small,
    /// All trees of 7.5 cm DBH and above
    #[serde(rename = "ALL")]
    All,
    #[serde(rename = "U75TO125")]
    U75To125,
    #[serde(rename = "U125TO175")]
    U125To175,
    #[serde(rename = "U175TO225")]
    U175To225,
    #[serde(rename = "OVER225")]
    Over225,
}

impl UtilizationClass {
    /// Every class in storage order.
    pub const ALL_CLASSES: [UtilizationClass; 6] = [
        UtilizationClass::Small,
        UtilizationClass::All,
        UtilizationClass::U75To125,
        UtilizationClass::U125To175,
        UtilizationClass::U175To225,
        UtilizationClass::Over225,
    ];

    /// The four diameter bands.
    pub const BANDS: [UtilizationClass; 4] = [
        UtilizationClass::U75To125,
        UtilizationClass::U125To175,
        UtilizationClass::U175To225,
        UtilizationClass::Over225,
    ];

    pub const BANDS_BUT_LARGEST: [UtilizationClass; 3] = [
        UtilizationClass::U75To125,
        UtilizationClass::U125To175,
        UtilizationClass::U175To225,
    ];

    pub const ALL_BUT_SMALL: [UtilizationClass; 5] = [
        UtilizationClass::All,
        UtilizationClass::U75To125,
        UtilizationClass::U125To175,
        UtilizationClass::U175To225,
        UtilizationClass::Over225,
    ];

    pub const ALL_BUT_LARGEST: [UtilizationClass; 5] = [
        UtilizationClass::Small,
        UtilizationClass::All,
        UtilizationClass::U75To125,
        UtilizationClass::U125To175,
        UtilizationClass::U175To225,
    ];

    /// Position in storage order (0 for `Small` through 5 for `Over225`).
    pub fn ordinal(self) -> usize {
        self as usize
    }

    /// Coefficient key index: -1 for `Small`, 0 for `All`, 1..=4 for the bands.
    pub fn index(self) -> i32 {
        self as i32 - 1
    }

    pub fn low_bound(self) -> f32 {
        match self {
            UtilizationClass::Small => 0.0,
            UtilizationClass::All | UtilizationClass::U75To125 => 7.5,
            UtilizationClass::U125To175 => 12.5,
            UtilizationClass::U175To225 => 17.5,
            UtilizationClass::Over225 => 22.5,
        }
    }

    pub fn high_bound(self) -> f32 {
        match self {
            UtilizationClass::Small => 7.5,
            UtilizationClass::U75To125 => 12.5,
            UtilizationClass::U125To175 => 17.5,
            UtilizationClass::U175To225 => 22.5,
            UtilizationClass::All | UtilizationClass::Over225 => 10000.0,
        }
    }

    /// The class immediately below this one, where `All` precedes the lowest band.
    pub fn previous(self) -> Option<UtilizationClass> {
        match self {
            UtilizationClass::Small => None,
            UtilizationClass::All => Some(UtilizationClass::Small),
            UtilizationClass::U75To125 => Some(UtilizationClass::All),
            UtilizationClass::U125To175 => Some(UtilizationClass::U75To125),
            UtilizationClass::U175To225 => Some(UtilizationClass::U125To175),
            UtilizationClass::Over225 => Some(UtilizationClass::U175To225),
        }
    }

    pub fn is_band(self) -> bool {
        !matches!(self, UtilizationClass::Small | UtilizationClass::All)
    }

    pub fn name(self) -> &'static str {
        match self {
            UtilizationClass::Small => "<7.5 cm",
            UtilizationClass::All => "7.5+ cm",
            UtilizationClass::U75To125 => "7.5-12.5 cm",
            UtilizationClass::U125To175 => "12.5-17.5 cm",
            UtilizationClass::U175To225 => "17.5-22.5 cm",
            UtilizationClass::Over225 => "22.5+ cm",
        }
    }
}

impl std::fmt::Display for UtilizationClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Rule deciding which classes of a freshly estimated vector replace the
/// values already held by a species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyRule {
    /// Only the four diameter bands are overwritten.
    IfBand,
    /// Everything except the small class is overwritten.
    IfNotSmall,
}

impl CopyRule {
    pub fn select(self, uc: UtilizationClass, old: f32, new: f32) -> f32 {
        let copy = match self {
            CopyRule::IfBand => uc.is_band(),
            CopyRule::IfNotSmall => uc != UtilizationClass::Small,
        };
        if copy {
            new
        } else {
            old
        }
    }
}

/// One value per utilization class, serialized as
/// `[small, all, 7.5-12.5, 12.5-17.5, 17.5-22.5, 22.5+]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct UtilizationVector([f32; 6]);

impl UtilizationVector {
    pub fn new(small: f32, all: f32, u75: f32, u125: f32, u175: f32, over225: f32) -> Self {
        Self([small, all, u75, u125, u175, over225])
    }

    /// A vector whose ALL value is the sum of the four given bands.
    pub fn from_bands(small: f32, u75: f32, u125: f32, u175: f32, over225: f32) -> Self {
        Self::new(small, u75 + u125 + u175 + over225, u75, u125, u175, over225)
    }

    pub fn zeros() -> Self {
        Self([0.0; 6])
    }

    pub fn get(&self, uc: UtilizationClass) -> f32 {
        self.0[uc.ordinal()]
    }

    pub fn set(&mut self, uc: UtilizationClass, value: f32) {
        self.0[uc.ordinal()] = value;
    }

    pub fn small(&self) -> f32 {
        self.get(UtilizationClass::Small)
    }

    pub fn all(&self) -> f32 {
        self.get(UtilizationClass::All)
    }

    pub fn large(&self) -> f32 {
        self.get(UtilizationClass::Over225)
    }

    pub fn set_small(&mut self, value: f32) {
        self.set(UtilizationClass::Small, value);
    }

    pub fn set_all(&mut self, value: f32) {
        self.set(UtilizationClass::All, value);
    }

    pub fn set_large(&mut self, value: f32) {
        self.set(UtilizationClass::Over225, value);
    }

    /// Sum of the four bands, accumulated in double precision.
    pub fn band_sum(&self) -> f32 {
        UtilizationClass::BANDS
            .iter()
            .map(|&uc| self.get(uc) as f64)
            .sum::<f64>() as f32
    }

    /// Overwrite ALL with the sum of the bands and return that sum.
    pub fn store_band_sum(&mut self) -> f32 {
        let sum = self.band_sum();
        self.set_all(sum);
        sum
    }

    pub fn scale(&mut self, factor: f32) {
        for v in self.0.iter_mut() {
            *v *= factor;
        }
    }

    /// Add another vector class by class.
    pub fn add_assign(&mut self, other: &UtilizationVector) {
        for (a, b) in self.0.iter_mut().zip(other.0.iter()) {
            *a += *b;
        }
    }

    /// Merge freshly estimated values into this vector following `rule`.
    pub fn merge_from(&mut self, estimated: &UtilizationVector, rule: CopyRule) {
        for uc in UtilizationClass::ALL_CLASSES {
            let merged = rule.select(uc, self.get(uc), estimated.get(uc));
            self.set(uc, merged);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (UtilizationClass, f32)> + '_ {
        UtilizationClass::ALL_CLASSES
            .iter()
            .map(move |&uc| (uc, self.get(uc)))
    }

    pub fn as_array(&self) -> [f32; 6] {
        self.0
    }
}

impl Index<UtilizationClass> for UtilizationVector {
    type Output = f32;

    fn index(&self, uc: UtilizationClass) -> &f32 {
        &self.0[uc.ordinal()]
    }
}

impl IndexMut<UtilizationClass> for UtilizationVector {
    fn index_mut(&mut self, uc: UtilizationClass) -> &mut f32 {
        &mut self.0[uc.ordinal()]
    }
}

/// Lorey height is only meaningful for the small class and the 7.5 cm+ total.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LoreyHeightVector {
    pub small: f32,
    pub all: f32,
}

impl LoreyHeightVector {
    pub fn new(small: f32, all: f32) -> Self {
        Self { small, all }
    }
}

/// The utilization vectors other than lorey height, enumerated explicitly so
/// bulk operations can walk them without introspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UtilizationField {
    BasalArea,
    TreesPerHectare,
    QuadMeanDiameter,
    WholeStemVolume,
    CloseUtilizationVolume,
    NetOfDecay,
    NetOfDecayAndWaste,
    NetOfDecayWasteAndBreakage,
}

impl UtilizationField {
    pub const ALL: [UtilizationField; 8] = [
        UtilizationField::BasalArea,
        UtilizationField::TreesPerHectare,
        UtilizationField::QuadMeanDiameter,
        UtilizationField::WholeStemVolume,
        UtilizationField::CloseUtilizationVolume,
        UtilizationField::NetOfDecay,
        UtilizationField::NetOfDecayAndWaste,
        UtilizationField::NetOfDecayWasteAndBreakage,
    ];

    /// Fields whose layer value is the sum of its species' values.
    pub const SUMMABLE: [UtilizationField; 7] = [
        UtilizationField::BasalArea,
        UtilizationField::TreesPerHectare,
        UtilizationField::WholeStemVolume,
        UtilizationField::CloseUtilizationVolume,
        UtilizationField::NetOfDecay,
        UtilizationField::NetOfDecayAndWaste,
        UtilizationField::NetOfDecayWasteAndBreakage,
    ];

    pub const VOLUMES: [UtilizationField; 5] = [
        UtilizationField::WholeStemVolume,
        UtilizationField::CloseUtilizationVolume,
        UtilizationField::NetOfDecay,
        UtilizationField::NetOfDecayAndWaste,
        UtilizationField::NetOfDecayWasteAndBreakage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            UtilizationField::BasalArea => "basal_area",
            UtilizationField::TreesPerHectare => "trees_per_hectare",
            UtilizationField::QuadMeanDiameter => "quad_mean_diameter",
            UtilizationField::WholeStemVolume => "whole_stem_volume",
            UtilizationField::CloseUtilizationVolume => "close_utilization_volume",
            UtilizationField::NetOfDecay => "cu_volume_net_of_decay",
            UtilizationField::NetOfDecayAndWaste => "cu_volume_net_of_decay_and_waste",
            UtilizationField::NetOfDecayWasteAndBreakage => {
                "cu_volume_net_of_decay_waste_and_breakage"
            }
        }
    }
}

/// The full set of utilization vectors held by a layer or a species.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UtilizationSet {
    /// Basal area, m²/ha
    pub basal_area: UtilizationVector,
    /// Live trees per hectare
    pub trees_per_hectare: UtilizationVector,
    /// Quadratic mean diameter, cm
    pub quad_mean_diameter: UtilizationVector,
    /// Lorey height, m
    pub lorey_height: LoreyHeightVector,
    /// Whole-stem volume, m³/ha
    pub whole_stem_volume: UtilizationVector,
    /// Close-utilization volume, m³/ha
    pub close_utilization_volume: UtilizationVector,
    pub cu_volume_net_of_decay: UtilizationVector,
    pub cu_volume_net_of_decay_and_waste: UtilizationVector,
    pub cu_volume_net_of_decay_waste_and_breakage: UtilizationVector,
}

impl UtilizationSet {
    pub fn vector(&self, field: UtilizationField) -> &UtilizationVector {
        match field {
            UtilizationField::BasalArea => &self.basal_area,
            UtilizationField::TreesPerHectare => &self.trees_per_hectare,
            UtilizationField::QuadMeanDiameter => &self.quad_mean_diameter,
            UtilizationField::WholeStemVolume => &self.whole_stem_volume,
            UtilizationField::CloseUtilizationVolume => &self.close_utilization_volume,
            UtilizationField::NetOfDecay => &self.cu_volume_net_of_decay,
            UtilizationField::NetOfDecayAndWaste => &self.cu_volume_net_of_decay_and_waste,
            UtilizationField::NetOfDecayWasteAndBreakage => {
                &self.cu_volume_net_of_decay_waste_and_breakage
            }
        }
    }

    pub fn vector_mut(&mut self, field: UtilizationField) -> &mut UtilizationVector {
        match field {
            UtilizationField::BasalArea => &mut self.basal_area,
            UtilizationField::TreesPerHectare => &mut self.trees_per_hectare,
            UtilizationField::QuadMeanDiameter => &mut self.quad_mean_diameter,
            UtilizationField::WholeStemVolume => &mut self.whole_stem_volume,
            UtilizationField::CloseUtilizationVolume => &mut self.close_utilization_volume,
            UtilizationField::NetOfDecay => &mut self.cu_volume_net_of_decay,
            UtilizationField::NetOfDecayAndWaste => &mut self.cu_volume_net_of_decay_and_waste,
            UtilizationField::NetOfDecayWasteAndBreakage => {
                &mut self.cu_volume_net_of_decay_waste_and_breakage
            }
        }
    }

    /// Multiply every summable vector by `factor`.
    pub fn scale_summable(&mut self, factor: f32) {
        for field in UtilizationField::SUMMABLE {
            self.vector_mut(field).scale(factor);
        }
    }

    /// Sum the summable vectors of the given sets.
    pub fn sum_summable<'a>(sets: impl IntoIterator<Item = &'a UtilizationSet>) -> UtilizationSet {
        let mut total = UtilizationSet::default();
        for set in sets {
            for field in UtilizationField::SUMMABLE {
                total.vector_mut(field).add_assign(set.vector(field));
            }
        }
        total
    }
}
