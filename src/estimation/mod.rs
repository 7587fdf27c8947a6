//! Empirical estimators and the orchestration that chains them into full
//! utilization vectors for a layer.

pub mod adjust;
pub mod components;
pub mod diameter;
pub mod empirical;
pub mod float_math;
pub mod primary;
pub mod reconcile;
pub mod small;
pub mod volume;

use crate::control::ControlMap;

pub use adjust::apply_post_create_adjustments;
pub use components::{compute_layer_from_species, UtilizationComputer};
pub use empirical::EMPIRICAL_OCCUPANCY;
pub use reconcile::reconcile_components;

/// Entry point to the empirical equations. Every estimator reads its
/// coefficients from the borrowed control map and holds no other state.
#[derive(Debug, Clone, Copy)]
pub struct Estimator<'a> {
    control: &'a ControlMap,
}

impl<'a> Estimator<'a> {
    pub fn new(control: &'a ControlMap) -> Self {
        Self { control }
    }

    pub fn control(&self) -> &'a ControlMap {
        self.control
    }
}
