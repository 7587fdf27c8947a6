use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::control::ControlMap;
use crate::error::YieldError;
use crate::models::Polygon;

/// A polygon file holds either one polygon or a list of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum PolygonFile {
    Many(Vec<Polygon>),
    One(Box<Polygon>),
}

fn to_json<T: Serialize + ?Sized>(value: &T, pretty: bool) -> Result<String, YieldError> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

/// Parse polygons from JSON text, sorting each layer's species into
/// processing order.
pub fn read_polygons_from_str(content: &str) -> Result<Vec<Polygon>, YieldError> {
    let mut polygons = match serde_json::from_str(content)? {
        PolygonFile::Many(polygons) => polygons,
        PolygonFile::One(polygon) => vec![*polygon],
    };
    for polygon in polygons.iter_mut() {
        for layer in polygon.layers.iter_mut() {
            layer.sort_species();
        }
    }
    Ok(polygons)
}

/// Read every polygon in a JSON file.
pub fn read_polygons(path: impl AsRef<Path>) -> Result<Vec<Polygon>, YieldError> {
    let content = std::fs::read_to_string(path.as_ref())?;
    read_polygons_from_str(&content)
}

/// Read a JSON file holding exactly one polygon.
pub fn read_polygon(path: impl AsRef<Path>) -> Result<Polygon, YieldError> {
    let path = path.as_ref();
    let mut polygons = read_polygons(path)?;
    if polygons.len() != 1 {
        return Err(YieldError::ParseError(format!(
            "{} holds {} polygons, expected one",
            path.display(),
            polygons.len()
        )));
    }
    Ok(polygons.remove(0))
}

pub fn write_polygon(polygon: &Polygon, path: impl AsRef<Path>, pretty: bool) -> Result<(), YieldError> {
    std::fs::write(path.as_ref(), to_json(polygon, pretty)?)?;
    Ok(())
}

pub fn write_polygons(polygons: &[Polygon], path: impl AsRef<Path>, pretty: bool) -> Result<(), YieldError> {
    std::fs::write(path.as_ref(), to_json(polygons, pretty)?)?;
    Ok(())
}

pub fn read_control_map(path: impl AsRef<Path>) -> Result<ControlMap, YieldError> {
    ControlMap::load(path.as_ref())
}

pub fn write_control_map(control: &ControlMap, path: impl AsRef<Path>, pretty: bool) -> Result<(), YieldError> {
    std::fs::write(path.as_ref(), to_json(control, pretty)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BecDefinition, LayerType, Region};

    const ONE: &str = r#"{
        "identifier": "082F074 0071",
        "bec": "IDF",
        "layers": [{
            "layer_type": "PRIMARY",
            "crown_closure": 60.0,
            "species": [
                {"genus": "S", "percent_genus": 40.0},
                {"genus": "B", "percent_genus": 60.0}
            ]
        }]
    }"#;

    #[test]
    fn test_single_polygon_species_sorted() {
        let polygons = read_polygons_from_str(ONE).unwrap();
        assert_eq!(polygons.len(), 1);
        let layer = polygons[0].layer(LayerType::Primary).unwrap();
        assert_eq!(layer.genera(), vec!["B", "S"]);
    }

    #[test]
    fn test_list_of_polygons() {
        let text = format!("[{ONE}, {ONE}]");
        assert_eq!(read_polygons_from_str(&text).unwrap().len(), 2);
    }

    #[test]
    fn test_read_polygon_rejects_many() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("many.json");
        std::fs::write(&path, format!("[{ONE}, {ONE}]")).unwrap();
        let err = read_polygon(&path).unwrap_err();
        assert!(matches!(err, YieldError::ParseError(_)));
    }

    #[test]
    fn test_polygon_file_roundtrip() {
        let polygon = read_polygons_from_str(ONE).unwrap().remove(0);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.json");
        write_polygon(&polygon, &path, true).unwrap();
        assert_eq!(read_polygon(&path).unwrap(), polygon);
    }

    #[test]
    fn test_control_map_file() {
        let mut control = ControlMap::default();
        control.becs.push(BecDefinition::new("IDF", Region::Interior));
        control
            .net_breakage
            .insert(7, vec![-0.5, 2.0, 1.0, 5.0]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.json");
        write_control_map(&control, &path, false).unwrap();
        let loaded = read_control_map(&path).unwrap();
        assert_eq!(loaded.bec("IDF").unwrap().region, Region::Interior);
        assert!(loaded.net_breakage_coefficients(7).is_ok());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            read_polygons_from_str("{not json"),
            Err(YieldError::Json(_))
        ));
    }
}
