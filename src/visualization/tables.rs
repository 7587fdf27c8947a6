use colored::Colorize;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, ContentArrangement, Table};

use crate::models::{UtilizationClass, UtilizationSet};
use crate::processing::{PolygonReport, PrimarySpeciesDetails, SpeciesRanking};

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn section(title: &str) -> String {
    format!("\n{}\n{}\n", title.bold().green(), "=".repeat(50))
}

/// Format one layer's or species' utilization vectors as a string, a row
/// per utilization class.
pub fn format_utilization_table(title: &str, u: &UtilizationSet) -> String {
    let mut output = section(title);

    let mut table = new_table(vec![
        "Class", "BA", "TPH", "DQ", "LH", "WS Vol", "CU Vol", "CU-D", "CU-DW", "CU-DWB",
    ]);

    for uc in UtilizationClass::ALL_CLASSES {
        let lorey_height = match uc {
            UtilizationClass::Small => format!("{:.2}", u.lorey_height.small),
            UtilizationClass::All => format!("{:.2}", u.lorey_height.all),
            _ => String::new(),
        };
        table.add_row(vec![
            Cell::new(uc.name()),
            Cell::new(format!("{:.4}", u.basal_area[uc])),
            Cell::new(format!("{:.2}", u.trees_per_hectare[uc])),
            Cell::new(format!("{:.1}", u.quad_mean_diameter[uc])),
            Cell::new(lorey_height),
            Cell::new(format!("{:.1}", u.whole_stem_volume[uc])),
            Cell::new(format!("{:.1}", u.close_utilization_volume[uc])),
            Cell::new(format!("{:.1}", u.cu_volume_net_of_decay[uc])),
            Cell::new(format!("{:.1}", u.cu_volume_net_of_decay_and_waste[uc])),
            Cell::new(format!("{:.1}", u.cu_volume_net_of_decay_waste_and_breakage[uc])),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

pub fn print_utilization_table(title: &str, u: &UtilizationSet) {
    print!("{}", format_utilization_table(title, u));
}

/// Format the species ranking and, when known, the primary species'
/// details as a string.
pub fn format_ranking_summary(ranking: &SpeciesRanking, details: Option<&PrimarySpeciesDetails>) -> String {
    let mut output = section("Species Ranking");

    let mut table = new_table(vec!["Item", "Value"]);
    table.add_row(vec![
        Cell::new("Primary genus"),
        Cell::new(format!("{} ({:.1}%)", ranking.primary_genus, ranking.primary_percent)),
    ]);
    table.add_row(vec![
        Cell::new("Secondary genus"),
        Cell::new(ranking.secondary_genus.as_deref().unwrap_or("-")),
    ]);
    table.add_row(vec![
        Cell::new("Inventory type group"),
        Cell::new(ranking.inventory_type_group),
    ]);
    table.add_row(vec![
        Cell::new("Basal area group 1"),
        Cell::new(ranking.basal_area_group_1),
    ]);
    table.add_row(vec![
        Cell::new("Basal area group 3"),
        Cell::new(ranking.basal_area_group_3),
    ]);

    if let Some(d) = details {
        table.add_row(vec![Cell::new("Dominant height"), Cell::new(format!("{:.2} m", d.dominant_height))]);
        table.add_row(vec![Cell::new("Site index"), Cell::new(format!("{:.2} m", d.site_index))]);
        table.add_row(vec![Cell::new("Total age"), Cell::new(format!("{:.1}", d.age_total))]);
        table.add_row(vec![
            Cell::new("Breast height age"),
            Cell::new(format!("{:.1}", d.years_at_breast_height)),
        ]);
    }

    output.push_str(&format!("{table}"));
    output
}

pub fn print_ranking_summary(ranking: &SpeciesRanking, details: Option<&PrimarySpeciesDetails>) {
    print!("{}", format_ranking_summary(ranking, details));
}

/// Format everything computed for a polygon: every layer's totals, every
/// species and the ranking.
pub fn format_polygon_report(report: &PolygonReport) -> String {
    let polygon = &report.polygon;
    let mut output = format!(
        "\n{}\n",
        format!("Polygon {} ({})", polygon.identifier, polygon.bec)
            .bold()
            .cyan()
    );
    if let Some(pct) = polygon.percent_available {
        output.push_str(&format!("{}\n", format!("Percent forest land: {pct:.1}%").dimmed()));
    }
    for layer in &polygon.layers {
        output.push_str(&format_utilization_table(
            &format!("{} layer", layer.layer_type),
            &layer.utilization,
        ));
        for spec in &layer.species {
            output.push_str(&format_utilization_table(
                &format!("{} layer, {} ({:.1}%)", layer.layer_type, spec.genus, spec.percent_genus),
                &spec.utilization,
            ));
        }
    }
    output.push_str(&format_ranking_summary(&report.ranking, report.primary_details.as_ref()));
    output
}

pub fn print_polygon_report(report: &PolygonReport) {
    print!("{}", format_polygon_report(report));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Layer, LayerType, LoreyHeightVector, Polygon, Species, UtilizationVector};

    fn utilization() -> UtilizationSet {
        let mut u = UtilizationSet::default();
        u.basal_area = UtilizationVector::new(0.0123, 10.0, 1.0, 2.0, 3.0, 4.0);
        u.lorey_height = LoreyHeightVector::new(5.25, 21.5);
        u.close_utilization_volume.set_large(42.0);
        u
    }

    fn ranking() -> SpeciesRanking {
        SpeciesRanking {
            primary_index: 2,
            secondary_index: Some(1),
            primary_genus: "PL".to_string(),
            secondary_genus: Some("B".to_string()),
            primary_percent: 65.0,
            inventory_type_group: 30,
            basal_area_group_1: 17,
            basal_area_group_3: 8,
        }
    }

    #[test]
    fn test_utilization_table_lists_every_class() {
        let output = format_utilization_table("Primary layer", &utilization());
        assert!(output.contains("Primary layer"));
        for uc in UtilizationClass::ALL_CLASSES {
            assert!(output.contains(uc.name()));
        }
        assert!(output.contains("0.0123"));
        assert!(output.contains("21.50"));
        assert!(output.contains("42.0"));
    }

    #[test]
    fn test_ranking_summary_without_details() {
        let output = format_ranking_summary(&ranking(), None);
        assert!(output.contains("Species Ranking"));
        assert!(output.contains("PL (65.0%)"));
        assert!(output.contains("Inventory type group"));
        assert!(!output.contains("Site index"));
    }

    #[test]
    fn test_ranking_summary_with_details() {
        let details = PrimarySpeciesDetails {
            lorey_height: 20.0,
            dominant_height: 23.456,
            site_index: 17.0,
            age_total: 60.0,
            years_at_breast_height: 53.0,
            years_to_breast_height: 7.0,
        };
        let output = format_ranking_summary(&ranking(), Some(&details));
        assert!(output.contains("23.46 m"));
        assert!(output.contains("Breast height age"));
    }

    #[test]
    fn test_polygon_report_covers_layers_and_species() {
        let mut spec = Species::new("PL", 100.0);
        spec.utilization = utilization();
        let mut layer = Layer::new(LayerType::Primary, vec![spec]);
        layer.utilization = utilization();
        let mut polygon = Polygon::new("P9", "SBS");
        polygon.percent_available = Some(90.0);
        polygon.layers.push(layer);
        let report = PolygonReport {
            polygon,
            ranking: ranking(),
            primary_details: None,
        };
        let output = format_polygon_report(&report);
        assert!(output.contains("P9"));
        assert!(output.contains("Primary layer, PL (100.0%)"));
        assert!(output.contains("Percent forest land: 90.0%"));
    }
}
