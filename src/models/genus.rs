//! Reference tables for the sixteen genera (SP0 codes) the engine knows.

/// Genus codes in preference order. A genus' index is its position here plus one.
pub const GENERA: [&str; 16] = [
    "AC", "AT", "B", "C", "D", "E", "F", "H", "L", "MB", "PA", "PL", "PW", "PY", "S", "Y",
];

/// Genera that are hardwoods.
pub const HARDWOODS: [&str; 5] = ["AC", "AT", "D", "E", "MB"];

/// Pairs of genera whose percentages are pooled before the primary genus is chosen.
pub const PRIMARY_SPECIES_TO_COMBINE: [[&str; 2]; 2] = [["PL", "PA"], ["C", "Y"]];

/// Default equation group by one-based genus index; slot 0 is a placeholder.
pub const DEFAULT_EQUATION_GROUPS: [i32; 17] = [0, 1, 2, 3, 4, 1, 2, 5, 6, 7, 1, 9, 8, 9, 9, 10, 4];

/// Genus indices whose basal area stratum moves up by 20 in the interior region.
pub const INTERIOR_STRATUM_GENERA: [usize; 5] = [3, 4, 5, 6, 10];

/// One-based index of a genus code.
pub fn genus_index(genus: &str) -> Option<usize> {
    GENERA.iter().position(|g| *g == genus).map(|i| i + 1)
}

pub fn is_known_genus(genus: &str) -> bool {
    genus_index(genus).is_some()
}

pub fn is_hardwood(genus: &str) -> bool {
    HARDWOODS.contains(&genus)
}

/// Inventory type group of a stand that is more than 80% one genus.
pub fn pure_inventory_type_group(genus: &str) -> Option<i32> {
    let itg = match genus {
        "AC" => 36,
        "AT" => 42,
        "B" => 18,
        "C" => 9,
        "D" => 38,
        "E" => 40,
        "F" => 1,
        "H" => 12,
        "L" => 34,
        "MB" => 39,
        "PA" => 28,
        "PL" => 28,
        "PW" => 27,
        "PY" => 32,
        "S" => 21,
        "Y" => 9,
        _ => return None,
    };
    Some(itg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_genus_index_is_one_based() {
        assert_eq!(genus_index("AC"), Some(1));
        assert_eq!(genus_index("H"), Some(8));
        assert_eq!(genus_index("Y"), Some(16));
        assert_eq!(genus_index("ZZ"), None);
    }

    #[test]
    fn test_every_genus_has_a_pure_group() {
        for genus in GENERA {
            assert!(pure_inventory_type_group(genus).is_some(), "{genus}");
        }
    }

    #[test]
    fn test_default_equation_group_table_covers_genera() {
        assert_eq!(DEFAULT_EQUATION_GROUPS.len(), GENERA.len() + 1);
        assert_eq!(DEFAULT_EQUATION_GROUPS[genus_index("S").unwrap()], 10);
    }

    #[test]
    fn test_hardwoods() {
        assert!(is_hardwood("MB"));
        assert!(!is_hardwood("F"));
    }
}
