//! Resilience clustering
//!
//! Lloyd's k-means over the three resilience sub-scores (the CRI itself is
//! not a feature). Centroids are seeded with k-means++ from a fixed-seed
//! ChaCha8 stream, so the same table and `k` always produce the same
//! labels. Regions missing any sub-score are left unlabeled.

use crate::{QueryError, Result};
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use resilience_pipeline::{round_for_display, CriRecord};
use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

/// Seed for centroid initialization
pub const CLUSTER_SEED: u64 = 0;

/// Iteration cap for Lloyd's relocation loop
pub const MAX_ITERATIONS: usize = 300;

/// Cluster count used when a caller does not choose one
pub const DEFAULT_CLUSTERS: usize = 4;

type Point = Vector3<f64>;

/// Label attached to one region for this invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterAssignment {
    pub state_id: String,
    pub region_id: String,
    pub region_name: String,
    pub label: usize,
}

/// Display form of a centroid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterCenter {
    pub label: usize,
    pub socioeconomic_resilience: f64,
    pub food_resilience: f64,
    pub healthcare_resilience: f64,
    pub members: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClusterResult {
    pub assignments: Vec<ClusterAssignment>,
    pub centers: Vec<ClusterCenter>,
    /// Full-precision centroids, `[socio, food, health]`
    #[serde(skip)]
    pub centroids: Vec<[f64; 3]>,
    pub iterations: usize,
    /// Regions left out for a missing sub-score
    pub unlabeled: usize,
}

impl ClusterResult {
    pub fn label_of(&self, fips: &str) -> Option<usize> {
        self.assignments
            .iter()
            .find(|a| format!("{}{}", a.state_id, a.region_id) == fips)
            .map(|a| a.label)
    }
}

fn squared_distance(a: &Point, b: &Point) -> f64 {
    (a - b).norm_squared()
}

/// Index of the nearest centroid; ties go to the lowest index
fn nearest(point: &Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_d = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(point, c);
        if d < best_d {
            best = i;
            best_d = d;
        }
    }
    best
}

fn distinct_points(points: &[Point]) -> usize {
    points
        .iter()
        .map(|p| [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()])
        .collect::<HashSet<_>>()
        .len()
}

/// k-means++ seeding. Requires at least `k` distinct points.
fn seed_centroids(points: &[Point], k: usize, rng: &mut ChaCha8Rng) -> Vec<Point> {
    let mut centroids = vec![points[rng.gen_range(0..points.len())]];

    while centroids.len() < k {
        let weights: Vec<f64> = points
            .iter()
            .map(|p| squared_distance(p, &centroids[nearest(p, &centroids)]))
            .collect();
        let total: f64 = weights.iter().sum();

        let mut target = rng.gen::<f64>() * total;
        let mut chosen = None;
        for (i, w) in weights.iter().enumerate() {
            if *w <= 0.0 {
                continue;
            }
            chosen = Some(i);
            if target < *w {
                break;
            }
            target -= w;
        }

        match chosen {
            Some(i) => centroids.push(points[i]),
            None => break,
        }
    }

    centroids
}

/// Partition regions into `k` clusters over their sub-scores
pub fn cluster(records: &[CriRecord], k: usize) -> Result<ClusterResult> {
    let labeled: Vec<(&CriRecord, Point)> = records
        .iter()
        .filter_map(|r| r.sub_scores().map(|s| (r, Point::from(s))))
        .collect();
    let points: Vec<Point> = labeled.iter().map(|(_, p)| *p).collect();

    let available = distinct_points(&points);
    if k == 0 || available < k {
        return Err(QueryError::InsufficientData {
            requested: k,
            available,
        });
    }

    let mut rng = ChaCha8Rng::seed_from_u64(CLUSTER_SEED);
    let mut centroids = seed_centroids(&points, k, &mut rng);

    let mut labels: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;

        // Relocate; an empty cluster keeps its previous centroid
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let members: Vec<&Point> = points
                .iter()
                .zip(&labels)
                .filter(|(_, l)| **l == c)
                .map(|(p, _)| p)
                .collect();
            if !members.is_empty() {
                let sum = members.iter().fold(Point::zeros(), |acc, p| acc + *p);
                *centroid = sum / members.len() as f64;
            }
        }

        let next: Vec<usize> = points.iter().map(|p| nearest(p, &centroids)).collect();
        if next == labels {
            break;
        }
        labels = next;
    }

    debug!("k-means k={} converged after {} iterations", k, iterations);

    let assignments = labeled
        .iter()
        .zip(&labels)
        .map(|((r, _), &label)| ClusterAssignment {
            state_id: r.state_id.clone(),
            region_id: r.region_id.clone(),
            region_name: r.region_name.clone(),
            label,
        })
        .collect();

    let centers = centroids
        .iter()
        .enumerate()
        .map(|(label, c)| ClusterCenter {
            label,
            socioeconomic_resilience: round_for_display(c.x),
            food_resilience: round_for_display(c.y),
            healthcare_resilience: round_for_display(c.z),
            members: labels.iter().filter(|l| **l == label).count(),
        })
        .collect();

    Ok(ClusterResult {
        assignments,
        centers,
        centroids: centroids.iter().map(|c| [c.x, c.y, c.z]).collect(),
        iterations,
        unlabeled: records.len() - labeled.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(county: &str, scores: Option<[f64; 3]>) -> CriRecord {
        let [s, f, h] = scores.map_or([None; 3], |v| v.map(Some));
        CriRecord {
            state_id: "13".to_string(),
            state_name: "Georgia".to_string(),
            region_id: county.to_string(),
            region_name: format!("County {}", county),
            socioeconomic_resilience: s,
            food_resilience: f,
            healthcare_resilience: h,
            cri: scores.map(|v| v.iter().sum::<f64>() / 3.0),
        }
    }

    fn two_groups() -> Vec<CriRecord> {
        vec![
            record("001", Some([0.10, 0.12, 0.11])),
            record("003", Some([0.90, 0.88, 0.91])),
            record("005", Some([0.12, 0.10, 0.13])),
            record("007", Some([0.92, 0.90, 0.89])),
            record("009", Some([0.11, 0.11, 0.10])),
            record("011", None),
        ]
    }

    #[test]
    fn test_separates_obvious_groups() {
        let result = cluster(&two_groups(), 2).unwrap();

        let low = result.label_of("13001").unwrap();
        let high = result.label_of("13003").unwrap();
        assert_ne!(low, high);
        assert_eq!(result.label_of("13005"), Some(low));
        assert_eq!(result.label_of("13009"), Some(low));
        assert_eq!(result.label_of("13007"), Some(high));

        assert_eq!(result.unlabeled, 1);
        assert_eq!(result.label_of("13011"), None);

        let members: usize = result.centers.iter().map(|c| c.members).sum();
        assert_eq!(members, 5);
        assert_eq!(result.centers[high].members, 2);
        assert!((result.centroids[high][0] - 0.91).abs() < 1e-12);
    }

    #[test]
    fn test_deterministic() {
        let table = vec![
            record("001", Some([0.1, 0.5, 0.3])),
            record("003", Some([0.7, 0.2, 0.9])),
            record("005", Some([0.4, 0.4, 0.4])),
            record("007", Some([0.8, 0.9, 0.1])),
            record("009", Some([0.2, 0.3, 0.6])),
            record("011", Some([0.6, 0.1, 0.5])),
            record("013", Some([0.3, 0.8, 0.7])),
            record("015", Some([0.9, 0.6, 0.2])),
        ];
        let a = cluster(&table, 4).unwrap();
        let b = cluster(&table, 4).unwrap();
        assert_eq!(a.assignments, b.assignments);
        assert_eq!(a.centroids, b.centroids);
    }

    #[test]
    fn test_display_centers_rounded() {
        let table = vec![
            record("001", Some([0.123456, 0.2, 0.3])),
            record("003", Some([0.9, 0.8, 0.7])),
        ];
        let result = cluster(&table, 2).unwrap();
        let center = result
            .centers
            .iter()
            .find(|c| c.members == 1 && c.food_resilience == 0.2)
            .unwrap();
        assert_eq!(center.socioeconomic_resilience, 0.1235);
    }

    #[test]
    fn test_insufficient_distinct_regions() {
        let table = vec![
            record("001", Some([0.5, 0.5, 0.5])),
            record("003", Some([0.5, 0.5, 0.5])),
            record("005", Some([0.2, 0.2, 0.2])),
            record("007", None),
        ];
        match cluster(&table, 3) {
            Err(QueryError::InsufficientData { requested, available }) => {
                assert_eq!(requested, 3);
                assert_eq!(available, 2);
            }
            other => panic!("expected InsufficientData, got {:?}", other.map(|r| r.iterations)),
        }
        assert!(cluster(&table, 2).is_ok());
    }

    #[test]
    fn test_zero_clusters_rejected() {
        assert!(matches!(
            cluster(&two_groups(), 0),
            Err(QueryError::InsufficientData { requested: 0, .. })
        ));
    }
}
