mod bec;
mod coefficients;
mod compat;
pub mod genus;
mod layer;
mod polygon;
mod species;
mod utilization;

pub use bec::{BecDefinition, Region};
pub use coefficients::Coefficients;
pub use compat::{CompVarAdjustments, CompatibilityVariables, UtilizationClassVariable, VolumeVariable};
pub use layer::{Layer, LayerType};
pub use polygon::Polygon;
pub use species::{Site, Species};
pub use utilization::{
    CopyRule, LoreyHeightVector, UtilizationClass, UtilizationField, UtilizationSet,
    UtilizationVector,
};
