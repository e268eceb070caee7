//! Immutable reference data shared by every query

use crate::cluster::{self, ClusterResult};
use crate::geo::{self, CentroidIndex, Nearby};
use crate::{filter, phrase, QueryError, Result};
use resilience_pipeline::canonical::load_canonical;
use resilience_pipeline::{CriRecord, PipelineError};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Canonical CRI table plus region centroids, loaded once
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    records: Vec<CriRecord>,
    by_fips: HashMap<String, usize>,
    centroids: CentroidIndex,
}

impl ReferenceStore {
    /// Build a store over `records`; a repeated region resolves to its
    /// first row
    pub fn new(records: Vec<CriRecord>, centroids: CentroidIndex) -> Self {
        let mut by_fips = HashMap::with_capacity(records.len());
        for (i, r) in records.iter().enumerate() {
            if by_fips.contains_key(&r.fips()) {
                warn!("Region {} appears more than once; keeping the first row", r.fips());
                continue;
            }
            by_fips.insert(r.fips(), i);
        }
        Self {
            records,
            by_fips,
            centroids,
        }
    }

    /// Load the canonical table and, when given, the region boundaries
    ///
    /// A table naming the same region twice is rejected.
    pub fn load(table: impl AsRef<Path>, boundaries: Option<&Path>) -> Result<Self> {
        let records = load_canonical(table)?;
        let mut seen = HashSet::with_capacity(records.len());
        if let Some(dup) = records.iter().find(|r| !seen.insert(r.fips())) {
            return Err(PipelineError::DuplicateRegion {
                stage: "canonical",
                region: dup.fips(),
            }
            .into());
        }

        let centroids = match boundaries {
            Some(path) => CentroidIndex::from_path(path)?,
            None => CentroidIndex::default(),
        };

        let missing = records
            .iter()
            .filter(|r| centroids.get(&r.fips()).is_none())
            .count();
        info!(
            "Reference store: {} regions, {} centroids ({} regions without one)",
            records.len(),
            centroids.len(),
            missing
        );

        Ok(Self::new(records, centroids))
    }

    pub fn records(&self) -> &[CriRecord] {
        &self.records
    }

    pub fn centroids(&self) -> &CentroidIndex {
        &self.centroids
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Region detail by 5-digit identifier
    pub fn region(&self, fips: &str) -> Result<&CriRecord> {
        self.by_fips
            .get(fips)
            .map(|&i| &self.records[i])
            .ok_or_else(|| QueryError::UnknownRegion(fips.to_string()))
    }

    pub fn filter(&self, lo: f64, hi: f64) -> Result<Vec<&CriRecord>> {
        filter::filter(&self.records, lo, hi)
    }

    /// Parse a range phrase and apply it; nothing is filtered on a parse failure
    pub fn query(&self, text: &str) -> Result<((f64, f64), Vec<&CriRecord>)> {
        let (lo, hi) = phrase::parse(text)?;
        Ok(((lo, hi), self.filter(lo, hi)?))
    }

    /// Regions of the whole table within `radius_miles` of `center`
    pub fn nearby(&self, center: &str, radius_miles: f64) -> Result<Vec<Nearby<'_>>> {
        let candidates: Vec<&CriRecord> = self.records.iter().collect();
        geo::within_radius(&self.centroids, center, radius_miles, &candidates)
    }

    pub fn cluster(&self, k: usize) -> Result<ClusterResult> {
        cluster::cluster(&self.records, k)
    }
}
