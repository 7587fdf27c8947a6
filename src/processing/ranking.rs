//! Choice of primary and secondary species and the groups that follow from it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::bank::Bank;
use crate::control::ControlMap;
use crate::error::YieldError;
use crate::models::genus::{
    is_hardwood, pure_inventory_type_group, DEFAULT_EQUATION_GROUPS, INTERIOR_STRATUM_GENERA,
    PRIMARY_SPECIES_TO_COMBINE,
};
use crate::models::Region;

/// Share of the layer above which a stand is typed by its primary genus alone.
const PURE_STAND_PERCENT: f32 = 79.999;

/// Offset applied to the basal area group of interior stratum genera.
const INTERIOR_STRATUM_OFFSET: i32 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRanking {
    /// Bank slot of the primary species
    pub primary_index: usize,
    /// Bank slot of the secondary species, if the layer has one
    pub secondary_index: Option<usize>,
    pub primary_genus: String,
    pub secondary_genus: Option<String>,
    /// Combined percentage of the primary genus
    pub primary_percent: f32,
    pub inventory_type_group: i32,
    pub basal_area_group_1: i32,
    pub basal_area_group_3: i32,
}

/// Pool the percentages of genera that are ranked together. When both of a
/// pair are present the larger takes the sum and the other drops to zero;
/// on a tie the later genus wins.
pub fn combine_percentages(names: &[String], pair: [&str; 2], percentages: &mut [f32]) {
    let first = names.iter().position(|n| n == pair[0]);
    let second = names.iter().position(|n| n == pair[1]);
    let (Some(a), Some(b)) = (first, second) else {
        return;
    };
    let (i, j) = if a < b { (a, b) } else { (b, a) };
    let (higher, lower) = if percentages[i] > percentages[j] {
        (i, j)
    } else {
        (j, i)
    };
    percentages[higher] += percentages[lower];
    percentages[lower] = 0.0;
}

/// Inventory type group of a layer from its primary and secondary genus and
/// the primary genus' share of the layer.
pub fn find_inventory_type_group(
    primary: &str,
    secondary: Option<&str>,
    primary_percent: f32,
) -> Result<i32, YieldError> {
    if secondary == Some(primary) {
        return Err(YieldError::processing(format!(
            "Primary and secondary genus are both {primary}"
        )));
    }

    if primary_percent > PURE_STAND_PERCENT {
        return pure_inventory_type_group(primary).ok_or_else(|| {
            YieldError::processing(format!("Unrecognized primary genus {primary}"))
        });
    }

    let second = secondary.unwrap_or("");
    let hardwood = secondary.is_some_and(is_hardwood);

    let itg = match primary {
        "F" => match second {
            "C" | "Y" => 2,
            "B" | "H" => 3,
            "S" => 4,
            "PL" | "PA" => 5,
            "PY" => 6,
            "L" | "PW" => 7,
            _ => 8,
        },
        "C" | "Y" => match second {
            "H" | "B" | "S" => 11,
            _ => 10,
        },
        "H" => match second {
            "C" | "Y" => 14,
            "B" => 15,
            "S" => 16,
            _ => 13,
        },
        "B" => match second {
            "C" | "Y" | "H" => 19,
            _ => 20,
        },
        "S" => match second {
            "C" | "Y" | "H" => 23,
            "B" => 24,
            "PL" => 25,
            _ if hardwood => 26,
            _ => 22,
        },
        "PW" => 27,
        "PL" | "PA" => match second {
            "PL" | "PA" => 28,
            "F" | "PW" | "L" | "PY" => 29,
            _ if hardwood => 31,
            _ => 30,
        },
        "PY" => 32,
        "L" => match second {
            "F" => 33,
            _ => 34,
        },
        "AC" => {
            if hardwood {
                36
            } else {
                35
            }
        }
        "D" => {
            if hardwood {
                38
            } else {
                37
            }
        }
        "MB" => 39,
        "E" => 40,
        "AT" => {
            if hardwood {
                42
            } else {
                41
            }
        }
        _ => {
            return Err(YieldError::processing(format!(
                "Unrecognized primary genus {primary}"
            )))
        }
    };
    Ok(itg)
}

/// Rank the species of a bank by their pooled percentages.
pub fn determine_rankings(bank: &Bank, control: &ControlMap) -> Result<SpeciesRanking, YieldError> {
    let mut percentages = bank.percentages.clone();
    for pair in PRIMARY_SPECIES_TO_COMBINE {
        combine_percentages(&bank.species_names, pair, &mut percentages);
    }

    let mut highest: Option<usize> = None;
    let mut highest_percent = 0.0f32;
    let mut second: Option<usize> = None;
    let mut second_percent = 0.0f32;
    for i in bank.indices() {
        let pct = percentages[i];
        if pct > highest_percent {
            second = highest;
            second_percent = highest_percent;
            highest = Some(i);
            highest_percent = pct;
        } else if pct > second_percent {
            second = Some(i);
            second_percent = pct;
        }
    }

    let primary_index = highest.ok_or_else(|| {
        YieldError::processing("There are no species with covering percentage greater than 0")
    })?;

    let primary_genus = bank.species_names[primary_index].clone();
    let secondary_genus = second.map(|i| bank.species_names[i].clone());

    let inventory_type_group =
        find_inventory_type_group(&primary_genus, secondary_genus.as_deref(), highest_percent)?;

    let bec = bank.bec();
    let default_group = control.default_equation_group(&primary_genus, &bec.alias)?;
    let basal_area_group_1 = control
        .equation_modifier_group(default_group, inventory_type_group)
        .unwrap_or(default_group);

    let primary_species_index = bank.species_indices[primary_index];
    let mut basal_area_group_3 = DEFAULT_EQUATION_GROUPS
        .get(primary_species_index)
        .copied()
        .ok_or_else(|| YieldError::processing(format!("Unrecognized primary genus {primary_genus}")))?;
    if bec.region == Region::Interior && INTERIOR_STRATUM_GENERA.contains(&primary_species_index) {
        basal_area_group_3 += INTERIOR_STRATUM_OFFSET;
    }

    debug!(
        primary = %primary_genus,
        secondary = ?secondary_genus,
        inventory_type_group,
        basal_area_group_1,
        basal_area_group_3,
        "ranked species"
    );

    Ok(SpeciesRanking {
        primary_index,
        secondary_index: second,
        primary_genus,
        secondary_genus,
        primary_percent: highest_percent,
        inventory_type_group,
        basal_area_group_1,
        basal_area_group_3,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BecDefinition, Layer, LayerType, Species, UtilizationVector};

    fn names(genera: &[&str]) -> Vec<String> {
        std::iter::once("")
            .chain(genera.iter().copied())
            .map(String::from)
            .collect()
    }

    fn bank(species: &[(&str, f32)], region: Region) -> Bank {
        let layer = Layer::new(
            LayerType::Primary,
            species
                .iter()
                .map(|(g, p)| {
                    let mut spec = Species::new(*g, *p);
                    spec.utilization.basal_area = UtilizationVector::from_bands(0.0, 1.0, 1.0, 1.0, 1.0);
                    spec
                })
                .collect(),
        );
        Bank::with_minimum_basal_area(&layer, &BecDefinition::new("IDF", region))
    }

    fn control() -> ControlMap {
        let mut c = ControlMap::default();
        for genus in ["B", "C", "F", "PA", "PL", "S", "Y", "AT", "H"] {
            c.default_equation_groups
                .insert((genus.to_string(), "IDF".to_string()), 17);
        }
        c.equation_modifiers.insert((17, 5), 40);
        c
    }

    #[test]
    fn test_combine_pools_into_larger() {
        let n = names(&["C", "PA", "PL", "Y"]);
        let mut pct = vec![0.0, 10.0, 15.0, 30.0, 45.0];
        combine_percentages(&n, ["PL", "PA"], &mut pct);
        combine_percentages(&n, ["C", "Y"], &mut pct);
        assert_eq!(pct, vec![0.0, 0.0, 0.0, 45.0, 55.0]);
    }

    #[test]
    fn test_combine_tie_goes_to_later() {
        let n = names(&["PA", "PL"]);
        let mut pct = vec![0.0, 20.0, 20.0];
        combine_percentages(&n, ["PL", "PA"], &mut pct);
        assert_eq!(pct, vec![0.0, 0.0, 40.0]);
    }

    #[test]
    fn test_combine_needs_both() {
        let n = names(&["PL", "S"]);
        let mut pct = vec![0.0, 40.0, 60.0];
        combine_percentages(&n, ["PL", "PA"], &mut pct);
        assert_eq!(pct, vec![0.0, 40.0, 60.0]);
    }

    #[test]
    fn test_inventory_type_groups() {
        assert_eq!(find_inventory_type_group("F", None, 100.0).unwrap(), 1);
        assert_eq!(find_inventory_type_group("F", Some("C"), 60.0).unwrap(), 2);
        assert_eq!(find_inventory_type_group("F", Some("PA"), 60.0).unwrap(), 5);
        assert_eq!(find_inventory_type_group("F", None, 60.0).unwrap(), 8);
        assert_eq!(find_inventory_type_group("Y", Some("S"), 60.0).unwrap(), 11);
        assert_eq!(find_inventory_type_group("H", Some("B"), 60.0).unwrap(), 15);
        assert_eq!(find_inventory_type_group("S", Some("AT"), 60.0).unwrap(), 26);
        assert_eq!(find_inventory_type_group("S", Some("F"), 60.0).unwrap(), 22);
        assert_eq!(find_inventory_type_group("PA", Some("PL"), 60.0).unwrap(), 28);
        assert_eq!(find_inventory_type_group("PL", Some("D"), 60.0).unwrap(), 31);
        assert_eq!(find_inventory_type_group("L", Some("F"), 60.0).unwrap(), 33);
        assert_eq!(find_inventory_type_group("AT", Some("E"), 60.0).unwrap(), 42);
        assert_eq!(find_inventory_type_group("AT", Some("S"), 60.0).unwrap(), 41);
        assert_eq!(find_inventory_type_group("S", Some("B"), 80.0).unwrap(), 21);
    }

    #[test]
    fn test_inventory_type_group_errors() {
        assert!(find_inventory_type_group("S", Some("S"), 60.0).is_err());
        assert!(find_inventory_type_group("ZZ", None, 60.0).is_err());
        assert!(find_inventory_type_group("ZZ", None, 90.0).is_err());
    }

    #[test]
    fn test_rankings_with_combined_pine() {
        let b = bank(&[("PA", 30.0), ("PL", 20.0), ("S", 40.0), ("B", 10.0)], Region::Interior);
        let ranking = determine_rankings(&b, &control()).unwrap();
        assert_eq!(ranking.primary_genus, "PA");
        assert_eq!(ranking.secondary_genus.as_deref(), Some("S"));
        assert_eq!(ranking.primary_percent, 50.0);
        assert_eq!(ranking.inventory_type_group, 30);
        assert_eq!(ranking.basal_area_group_1, 17);
        // PA is genus 11 which is not an interior stratum genus.
        assert_eq!(ranking.basal_area_group_3, DEFAULT_EQUATION_GROUPS[11]);
        assert_eq!(b.species_names[ranking.primary_index], "PA");
    }

    #[test]
    fn test_basal_area_groups() {
        let b = bank(&[("F", 60.0), ("PL", 40.0)], Region::Interior);
        let ranking = determine_rankings(&b, &control()).unwrap();
        assert_eq!(ranking.inventory_type_group, 5);
        assert_eq!(ranking.basal_area_group_1, 40);
        assert_eq!(ranking.basal_area_group_3, DEFAULT_EQUATION_GROUPS[7]);

        let b = bank(&[("C", 70.0), ("H", 30.0)], Region::Interior);
        let ranking = determine_rankings(&b, &control()).unwrap();
        assert_eq!(ranking.basal_area_group_3, DEFAULT_EQUATION_GROUPS[4] + 20);

        let b = bank(&[("C", 70.0), ("H", 30.0)], Region::Coastal);
        let ranking = determine_rankings(&b, &control()).unwrap();
        assert_eq!(ranking.basal_area_group_3, DEFAULT_EQUATION_GROUPS[4]);
    }

    #[test]
    fn test_single_species_has_no_secondary() {
        let b = bank(&[("S", 100.0)], Region::Interior);
        let ranking = determine_rankings(&b, &control()).unwrap();
        assert_eq!(ranking.secondary_index, None);
        assert_eq!(ranking.inventory_type_group, 21);
    }

    #[test]
    fn test_no_covering_species() {
        let b = bank(&[("S", 0.0)], Region::Interior);
        assert!(determine_rankings(&b, &control()).is_err());
    }
}
