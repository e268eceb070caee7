//! Region centroids and great-circle distance
//!
//! Centroids are derived once from a GeoJSON boundary file: one Polygon or
//! MultiPolygon feature per region, keyed by a `GEOID` property holding the
//! 5-digit region identifier. The centroid is the area-weighted planar
//! centroid in lon/lat space, holes subtracted.

use crate::{QueryError, Result};
use geojson::{GeoJson, Value};
use resilience_pipeline::{CriRecord, RegionKey};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Mean Earth radius in statute miles
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Boundary feature property holding the region identifier
pub const GEOID_PROPERTY: &str = "GEOID";

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Centroid {
    pub lat: f64,
    pub lon: f64,
}

/// Great-circle distance in miles (haversine)
pub fn haversine_miles(a: Centroid, b: Centroid) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push h a hair past 1 for antipodal points
    2.0 * EARTH_RADIUS_MILES * h.sqrt().min(1.0).asin()
}

/// Region identifier -> centroid
#[derive(Debug, Clone, Default)]
pub struct CentroidIndex {
    centroids: HashMap<String, Centroid>,
}

impl CentroidIndex {
    pub fn new(centroids: HashMap<String, Centroid>) -> Self {
        Self { centroids }
    }

    pub fn get(&self, fips: &str) -> Option<Centroid> {
        self.centroids.get(fips).copied()
    }

    pub fn len(&self) -> usize {
        self.centroids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centroids.is_empty()
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading region boundaries from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        Self::from_geojson_str(&text)
    }

    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let geojson: GeoJson = text
            .parse()
            .map_err(|e: geojson::Error| QueryError::Boundaries(e.to_string()))?;
        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(QueryError::Boundaries(
                "expected a FeatureCollection".to_string(),
            ));
        };

        let mut centroids = HashMap::new();
        for feature in &collection.features {
            let Some(fips) = feature.property(GEOID_PROPERTY).and_then(geoid) else {
                warn!("Skipping boundary feature without a usable {}", GEOID_PROPERTY);
                continue;
            };
            let centroid = feature
                .geometry
                .as_ref()
                .and_then(|g| geometry_centroid(&g.value));
            match centroid {
                Some(c) => {
                    centroids.insert(fips, c);
                }
                None => debug!("No areal geometry for region {}", fips),
            }
        }

        info!("Computed {} region centroids", centroids.len());
        Ok(Self { centroids })
    }
}

/// GEOID as a padded region identifier; numeric GEOIDs lose their
/// leading zero and are re-padded here
fn geoid(value: &serde_json::Value) -> Option<String> {
    let raw = match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        _ => return None,
    };
    RegionKey::from_fips(&raw).ok().map(|k| k.fips())
}

/// Signed area and centroid of a closed ring (shoelace)
fn ring_moments(ring: &[Vec<f64>]) -> (f64, f64, f64) {
    let mut area2 = 0.0;
    let (mut cx, mut cy) = (0.0, 0.0);
    for pair in ring.windows(2) {
        let (x0, y0) = (pair[0][0], pair[0][1]);
        let (x1, y1) = (pair[1][0], pair[1][1]);
        let cross = x0 * y1 - x1 * y0;
        area2 += cross;
        cx += (x0 + x1) * cross;
        cy += (y0 + y1) * cross;
    }
    (area2 / 2.0, cx / 6.0, cy / 6.0)
}

/// Accumulated `(area, area·x, area·y)` of one polygon, holes subtracted
fn polygon_moments(rings: &[Vec<Vec<f64>>]) -> (f64, f64, f64) {
    let mut total = (0.0, 0.0, 0.0);
    for (i, ring) in rings.iter().enumerate() {
        if ring.len() < 3 || ring.iter().any(|p| p.len() < 2) {
            continue;
        }
        let (area, mx, my) = ring_moments(ring);
        // Orientation-independent: shell adds, holes subtract
        let sign = if (i == 0) == (area >= 0.0) { 1.0 } else { -1.0 };
        total.0 += sign * area;
        total.1 += sign * mx;
        total.2 += sign * my;
    }
    total
}

fn geometry_centroid(value: &Value) -> Option<Centroid> {
    let polygons: Vec<&Vec<Vec<Vec<f64>>>> = match value {
        Value::Polygon(rings) => vec![rings],
        Value::MultiPolygon(polys) => polys.iter().collect(),
        _ => return None,
    };

    let (mut area, mut mx, mut my) = (0.0, 0.0, 0.0);
    for rings in &polygons {
        let (a, x, y) = polygon_moments(rings);
        area += a;
        mx += x;
        my += y;
    }

    if area.abs() > f64::EPSILON {
        return Some(Centroid {
            lat: my / area,
            lon: mx / area,
        });
    }

    // Degenerate (zero-area) shapes fall back to the mean shell vertex
    let shell: Vec<&Vec<f64>> = polygons
        .iter()
        .filter_map(|rings| rings.first())
        .flatten()
        .filter(|p| p.len() >= 2)
        .collect();
    if shell.is_empty() {
        return None;
    }
    let n = shell.len() as f64;
    Some(Centroid {
        lat: shell.iter().map(|p| p[1]).sum::<f64>() / n,
        lon: shell.iter().map(|p| p[0]).sum::<f64>() / n,
    })
}

/// A candidate within the search radius
#[derive(Debug, Clone, Serialize)]
pub struct Nearby<'a> {
    pub record: &'a CriRecord,
    pub distance_miles: f64,
}

/// Candidates whose centroid lies within `radius_miles` of `center`.
///
/// Candidates without a centroid are skipped. Order follows `candidates`.
pub fn within_radius<'a>(
    centroids: &CentroidIndex,
    center: &str,
    radius_miles: f64,
    candidates: &[&'a CriRecord],
) -> Result<Vec<Nearby<'a>>> {
    let origin = centroids
        .get(center)
        .ok_or_else(|| QueryError::UnknownRegion(center.to_string()))?;

    Ok(candidates
        .iter()
        .filter_map(|&record| {
            let point = centroids.get(&record.fips())?;
            let distance_miles = haversine_miles(origin, point);
            (distance_miles <= radius_miles).then_some(Nearby {
                record,
                distance_miles,
            })
        })
        .collect())
}
