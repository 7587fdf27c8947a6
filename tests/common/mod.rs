#![allow(dead_code)]

use std::path::{Path, PathBuf};

use forest_yield_engine::{
    estimation::diameter::trees_per_hectare,
    io,
    models::{
        BecDefinition, Layer, LayerType, LoreyHeightVector, Polygon, Region, Site, Species,
        UtilizationClass, UtilizationVector,
    },
    ControlMap,
};

pub const ZONE: &str = "CWH";
const GROUP: i32 = 7;
const GENERA: [&str; 2] = ["L", "PL"];

/// Coefficient tables covering the L and PL genera in the CWH zone.
pub fn control_map() -> ControlMap {
    let mut c = ControlMap::default();
    c.becs.push(BecDefinition::new(ZONE, Region::Coastal));

    for genus in GENERA {
        let g = genus.to_string();
        let zone_key = (g.clone(), ZONE.to_string());
        for (index, ba, dq) in [
            (1, vec![0.5, -0.1], vec![4.0, -0.5, 1.0]),
            (2, vec![1.0, -0.05], vec![0.0, 0.1, 1.0]),
            (3, vec![0.5, -0.05], vec![-1.0, 0.1, 1.0]),
            (4, vec![0.0, 0.0], vec![5.0, -0.2, 0.0, 0.5]),
        ] {
            c.basal_area_by_utilization
                .insert((index, g.clone(), ZONE.to_string()), ba);
            c.quad_mean_diameter_by_utilization
                .insert((index, g.clone(), ZONE.to_string()), dq);
        }
        c.net_decay_waste
            .insert(g.clone(), vec![1.0, 0.0, -1.0, 0.0, 0.0, 0.5]);
        c.veteran_volume_adjustments
            .insert(g.clone(), vec![0.0, 0.0, 0.0, 0.0]);

        c.small_probability.insert(g.clone(), vec![0.0, 0.0, 0.0, 0.0]);
        c.small_basal_area.insert(g.clone(), vec![0.5, 1.0, 0.01, 0.0]);
        c.small_quad_mean_diameter.insert(g.clone(), vec![0.0, 0.0]);
        c.small_lorey_height.insert(g.clone(), vec![0.0, 1.0]);
        c.small_whole_stem_volume
            .insert(g.clone(), vec![-5.0, 0.0, 0.0, 0.0]);

        c.volume_groups.insert(zone_key.clone(), GROUP);
        c.decay_groups.insert(zone_key.clone(), GROUP);
        c.breakage_groups.insert(zone_key.clone(), GROUP);
        c.default_equation_groups.insert(zone_key, 9);
        c.primary_height
            .insert((g, Region::Coastal), vec![1.0, 0.0, 0.0]);
    }

    c.total_stand_whole_stem_volume
        .insert(GROUP, vec![-10.0, 2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    for uc in UtilizationClass::BANDS {
        c.whole_stem_by_utilization
            .insert((uc.index(), GROUP), vec![-1.0, 0.5, 0.2, 0.1]);
        c.close_utilization
            .insert((uc.index(), GROUP), vec![2.0, 0.0, 0.0]);
        c.net_decay.insert((uc.index(), GROUP), vec![1.0, 0.0, 0.0]);
    }
    c.net_breakage.insert(GROUP, vec![5.0, 0.0, 1.0, 10.0]);
    c
}

fn primary_species(genus: &str, pct: f32, ba: f32, dq: f32, hl: f32, site: Site) -> Species {
    let mut spec = Species::new(genus, pct);
    let u = &mut spec.utilization;
    u.basal_area.set_all(ba);
    u.trees_per_hectare.set_all(trees_per_hectare(ba, dq));
    u.quad_mean_diameter.set_all(dq);
    u.lorey_height = LoreyHeightVector::new(0.0, hl);
    spec.site = Some(site);
    spec
}

fn site(site_index: f32, height: f32, age: f32, ytbh: f32, curve: i32) -> Site {
    Site {
        site_index: Some(site_index),
        height: Some(height),
        age_total: Some(age),
        years_to_breast_height: Some(ytbh),
        site_curve_number: Some(curve),
    }
}

/// A two-species coastal polygon with a veteran larch layer.
pub fn sample_polygon(identifier: &str) -> Polygon {
    let mut primary = Layer::new(
        LayerType::Primary,
        vec![
            primary_species("L", 40.0, 15.0, 22.0, 24.0, site(18.0, 28.0, 70.0, 5.0, 11)),
            primary_species("PL", 60.0, 25.0, 14.0, 18.0, site(20.0, 25.0, 60.0, 6.0, 97)),
        ],
    );
    primary.crown_closure = 65.0;
    primary.height = Some(25.0);
    primary.age_total = Some(60.0);
    primary.years_to_breast_height = Some(6.0);

    let mut vet = Species::new("L", 100.0);
    let u = &mut vet.utilization;
    u.basal_area = UtilizationVector::new(0.0, 4.0, 0.0, 0.0, 0.0, 4.0);
    u.trees_per_hectare = UtilizationVector::new(0.0, 40.0, 0.0, 0.0, 0.0, 40.0);
    u.quad_mean_diameter = UtilizationVector::new(0.0, 35.7, 0.0, 0.0, 0.0, 35.7);
    u.lorey_height = LoreyHeightVector::new(0.0, 30.0);
    let mut veteran = Layer::new(LayerType::Veteran, vec![vet]);
    veteran.crown_closure = 5.0;
    veteran.age_total = Some(200.0);
    veteran.years_to_breast_height = Some(10.0);

    let mut polygon = Polygon::new(identifier, ZONE);
    polygon.percent_available = Some(90.0);
    polygon.layers = vec![primary, veteran];
    polygon
}

pub fn write_control(dir: &Path) -> PathBuf {
    let path = dir.join("control.json");
    io::write_control_map(&control_map(), &path, true).unwrap();
    path
}

pub fn write_polygons(dir: &Path, polygons: &[Polygon]) -> PathBuf {
    let path = dir.join("polygons.json");
    io::write_polygons(polygons, &path, true).unwrap();
    path
}
