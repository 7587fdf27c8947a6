//! Start processing of a polygon, and the session state carried over a
//! layer once its utilization components are known.

pub mod bank;
pub mod ranking;
pub mod state;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RunSettings;
use crate::control::ControlMap;
use crate::error::YieldError;
use crate::estimation::primary::percent_total;
use crate::estimation::{apply_post_create_adjustments, UtilizationComputer};
use crate::models::{LayerType, Polygon};

pub use bank::{Bank, MIN_BASAL_AREA};
pub use ranking::{determine_rankings, find_inventory_type_group, SpeciesRanking};
pub use state::{PrimarySpeciesDetails, ProcessingSession, SessionPhase};

/// Outcome of processing one polygon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonReport {
    pub polygon: Polygon,
    pub ranking: SpeciesRanking,
    /// Present when at least one primary-layer species carries age and site data
    pub primary_details: Option<PrimarySpeciesDetails>,
}

/// Build the full utilization state of `polygon` from its inventory values.
pub fn process_polygon(
    mut polygon: Polygon,
    control: &ControlMap,
    settings: &RunSettings,
) -> Result<PolygonReport, YieldError> {
    info!(polygon = %polygon.identifier, "processing polygon");

    let bec = control.bec(&polygon.bec)?.clone();
    polygon.validate()?;
    percent_total(&polygon.identifier, polygon.primary_layer()?)?;

    let computer = UtilizationComputer::new(control, settings.context);
    let estimator = computer.estimator();

    let percent_available = estimator.estimate_percent_forest_land(&polygon, &bec)?;
    polygon.percent_available = Some(percent_available);

    for layer in polygon.layers.iter_mut() {
        estimator.assign_equation_groups(layer, &bec)?;
    }

    let primary = polygon.primary_layer_mut()?;
    if settings.estimate_small_components {
        estimator.estimate_small_components(primary, bec.region, Some(percent_available))?;
    }
    computer.compute_primary(
        &bec,
        primary,
        settings.volume_mode,
        settings.compatibility_mode,
    )?;

    if let Some(veteran) = polygon.layer_mut(LayerType::Veteran) {
        computer.compute_veteran(&bec, veteran)?;
    }

    if settings.post_create_adjustments {
        apply_post_create_adjustments(&mut polygon)?;
    }

    let primary = polygon.primary_layer()?;
    let mut session = ProcessingSession::new(control, &settings.control_variables, primary, &bec)?;
    let ranking = session.determine_rankings(control)?.clone();
    let curves = session.bank().site_curve_numbers.clone();
    session.set_site_curve_numbers(curves)?;

    let bank = session.bank();
    let has_site_data = bank.indices().any(|i| bank.age_totals[i].is_some())
        && bank.indices().any(|i| bank.site_indices[i].is_some());
    let primary_details = if has_site_data {
        Some(session.derive_primary_details(&estimator)?)
    } else {
        debug!(polygon = %polygon.identifier, "no age or site data, primary details not derived");
        None
    };

    info!(
        polygon = %polygon.identifier,
        primary = %ranking.primary_genus,
        inventory_type_group = ranking.inventory_type_group,
        "polygon processed"
    );

    Ok(PolygonReport {
        polygon,
        ranking,
        primary_details,
    })
}
