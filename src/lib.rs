pub mod config;
pub mod control;
pub mod error;
pub mod estimation;
pub mod io;
pub mod models;
pub mod processing;
pub mod visualization;

pub use config::{CompatibilityVariableMode, ControlVariables, ProcessingContext, RunSettings, VolumeComputeMode};
pub use control::ControlMap;
pub use error::YieldError;
pub use estimation::{Estimator, UtilizationComputer};
pub use io::{PolygonReader, PolygonWriter};
pub use models::{Layer, LayerType, Polygon, Species, UtilizationClass, UtilizationSet, UtilizationVector};
pub use processing::{process_polygon, Bank, PolygonReport, ProcessingSession, SpeciesRanking};
