use std::io::Write;
use std::path::Path;

use crate::error::YieldError;
use crate::models::{Polygon, UtilizationClass, UtilizationSet};

/// Genus column value for the rows of the layer itself.
const LAYER_ROW: &str = "*";

/// One utilization class of one layer or species.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct UtilizationRow {
    polygon: String,
    layer: String,
    genus: String,
    class: String,
    basal_area: f32,
    trees_per_hectare: f32,
    quad_mean_diameter: f32,
    /// Lorey height is only held for the small class and ALL
    lorey_height: Option<f32>,
    whole_stem_volume: f32,
    close_utilization_volume: f32,
    cu_volume_net_of_decay: f32,
    cu_volume_net_of_decay_and_waste: f32,
    cu_volume_net_of_decay_waste_and_breakage: f32,
}

fn rows_for(polygon: &str, layer: &str, genus: &str, u: &UtilizationSet) -> Vec<UtilizationRow> {
    UtilizationClass::ALL_CLASSES
        .iter()
        .map(|&uc| UtilizationRow {
            polygon: polygon.to_string(),
            layer: layer.to_string(),
            genus: genus.to_string(),
            class: uc.name().to_string(),
            basal_area: u.basal_area[uc],
            trees_per_hectare: u.trees_per_hectare[uc],
            quad_mean_diameter: u.quad_mean_diameter[uc],
            lorey_height: match uc {
                UtilizationClass::Small => Some(u.lorey_height.small),
                UtilizationClass::All => Some(u.lorey_height.all),
                _ => None,
            },
            whole_stem_volume: u.whole_stem_volume[uc],
            close_utilization_volume: u.close_utilization_volume[uc],
            cu_volume_net_of_decay: u.cu_volume_net_of_decay[uc],
            cu_volume_net_of_decay_and_waste: u.cu_volume_net_of_decay_and_waste[uc],
            cu_volume_net_of_decay_waste_and_breakage: u.cu_volume_net_of_decay_waste_and_breakage[uc],
        })
        .collect()
}

/// Write the utilization vectors of every layer and species of `polygons`,
/// one row per utilization class.
pub fn write_utilization<W: Write>(polygons: &[Polygon], writer: W) -> Result<(), YieldError> {
    let mut wtr = csv::Writer::from_writer(writer);

    for polygon in polygons {
        for layer in &polygon.layers {
            let layer_name = layer.layer_type.to_string();
            for row in rows_for(&polygon.identifier, &layer_name, LAYER_ROW, &layer.utilization) {
                wtr.serialize(&row)?;
            }
            for spec in &layer.species {
                for row in rows_for(&polygon.identifier, &layer_name, &spec.genus, &spec.utilization) {
                    wtr.serialize(&row)?;
                }
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

/// Write utilization rows for `polygons` to a CSV file.
pub fn write_utilization_csv(polygons: &[Polygon], path: impl AsRef<Path>) -> Result<(), YieldError> {
    let file = std::fs::File::create(path.as_ref())?;
    write_utilization(polygons, file)
}
