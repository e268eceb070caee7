//! Index composer
//!
//! Joins the three stage outputs on region key and applies the composite
//! weights. The socioeconomic stage is the base of a left-outer join: a
//! region missing from it never reaches the canonical table, even when the
//! food and healthcare stages know about it.

use crate::canonical::CriRecord;
use crate::region::state_name;
use crate::stage::{Keyed, StageOutput};
use crate::table::RawTable;
use crate::{food, healthcare, socioeconomic};
use crate::{PipelineError, RegionKey, Result, DEFAULT_MIN_JOIN_COVERAGE};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

/// Composite weights (sum = 1.0)
pub const W_SOCIOECONOMIC: f64 = 1.0 / 3.0;
pub const W_FOOD: f64 = 1.0 / 3.0;
pub const W_HEALTHCARE: f64 = 1.0 / 3.0;

/// Weights applied to each sub-score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeWeights {
    pub socioeconomic: f64,
    pub food: f64,
    pub healthcare: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            socioeconomic: W_SOCIOECONOMIC,
            food: W_FOOD,
            healthcare: W_HEALTHCARE,
        }
    }
}

impl CompositeWeights {
    pub fn total(&self) -> f64 {
        self.socioeconomic + self.food + self.healthcare
    }

    /// Weighted sum; missing if any sub-score is missing
    pub fn combine(&self, socio: Option<f64>, food: Option<f64>, health: Option<f64>) -> Option<f64> {
        Some(self.socioeconomic * socio? + self.food * food? + self.healthcare * health?)
    }
}

/// One resilience sub-score for one region
#[derive(Debug, Clone, PartialEq)]
pub struct SubScore {
    pub key: RegionKey,
    pub region_name: Option<String>,
    pub resilience: Option<f64>,
}

/// A stage's sub-scores, as seen by the composer
#[derive(Debug, Clone)]
pub struct SubScoreTable {
    pub stage: &'static str,
    pub scores: Vec<SubScore>,
}

/// A stage row that carries a resilience sub-score
pub trait ResilienceRow: Keyed {
    fn region_name(&self) -> Option<&str>;
    fn resilience(&self) -> Option<f64>;
}

impl ResilienceRow for socioeconomic::SocioeconomicScore {
    fn region_name(&self) -> Option<&str> {
        Some(&self.region_name)
    }
    fn resilience(&self) -> Option<f64> {
        self.resilience_socio
    }
}

impl ResilienceRow for healthcare::HealthcareScore {
    fn region_name(&self) -> Option<&str> {
        Some(&self.region_name).filter(|n| !n.is_empty()).map(String::as_str)
    }
    fn resilience(&self) -> Option<f64> {
        self.resilience_health
    }
}

impl ResilienceRow for food::FoodScore {
    fn region_name(&self) -> Option<&str> {
        None
    }
    fn resilience(&self) -> Option<f64> {
        self.resilience_food
    }
}

impl SubScoreTable {
    pub fn from_stage<T: ResilienceRow>(output: &StageOutput<T>) -> Self {
        Self {
            stage: output.stage,
            scores: output
                .rows
                .iter()
                .map(|row| SubScore {
                    key: row.key().clone(),
                    region_name: row.region_name().map(str::to_string),
                    resilience: row.resilience(),
                })
                .collect(),
        }
    }

    /// Read a persisted stage table (`state_id`, `region_id`, sub-score column)
    pub fn from_csv(stage: &'static str, path: impl AsRef<Path>, resilience_column: &str) -> Result<Self> {
        let table = RawTable::from_path(stage, path)?;
        let state = table.column("state_id")?;
        let region = table.column("region_id")?;
        let score = table.column(resilience_column)?;
        let name = table.column("region_name").ok();

        let scores = (0..table.len())
            .map(|row| {
                Ok(SubScore {
                    key: RegionKey::new(state.text(row), region.text(row))?,
                    region_name: name.map(|c| c.text(row).to_string()).filter(|n| !n.is_empty()),
                    resilience: score.numeric(row),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut seen = HashSet::with_capacity(scores.len());
        for score in &scores {
            if !seen.insert(&score.key) {
                return Err(PipelineError::DuplicateRegion {
                    stage,
                    region: score.key.fips(),
                });
            }
        }

        Ok(Self { stage, scores })
    }

    fn lookup(&self) -> HashMap<&RegionKey, Option<f64>> {
        self.scores.iter().map(|s| (&s.key, s.resilience)).collect()
    }
}

/// Composer settings
#[derive(Debug, Clone, Copy)]
pub struct ComposeOptions {
    pub weights: CompositeWeights,
    /// Below this fraction of base regions with a present sub-score from a
    /// joined stage, the join is treated as a key-format mismatch
    pub min_join_coverage: f64,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            weights: CompositeWeights::default(),
            min_join_coverage: DEFAULT_MIN_JOIN_COVERAGE,
        }
    }
}

/// Join statistics for a composed table
///
/// `*_matched` count base regions that received a present sub-score.
#[derive(Debug, Clone, Serialize)]
pub struct CompositionReport {
    pub regions: usize,
    pub food_matched: usize,
    pub healthcare_matched: usize,
    pub missing_cri: usize,
    pub excluded_food_only: usize,
    pub excluded_healthcare_only: usize,
}

/// Canonical table plus how the join went
#[derive(Debug, Clone)]
pub struct Composition {
    pub records: Vec<CriRecord>,
    pub report: CompositionReport,
}

/// Join the three sub-score tables and compute the CRI
pub fn compose(
    socio: &SubScoreTable,
    food: &SubScoreTable,
    health: &SubScoreTable,
    options: &ComposeOptions,
) -> Result<Composition> {
    let food_by_key = food.lookup();
    let health_by_key = health.lookup();

    let mut records = Vec::with_capacity(socio.scores.len());
    let mut food_matched = 0;
    let mut healthcare_matched = 0;

    for base in &socio.scores {
        // A partner row without a score does not count as matched
        let food_resilience = food_by_key.get(&base.key).copied().flatten();
        let healthcare_resilience = health_by_key.get(&base.key).copied().flatten();
        food_matched += usize::from(food_resilience.is_some());
        healthcare_matched += usize::from(healthcare_resilience.is_some());

        records.push(CriRecord {
            state_id: base.key.state().to_string(),
            state_name: state_name(base.key.state()).unwrap_or_default().to_string(),
            region_id: base.key.county().to_string(),
            region_name: base.region_name.clone().unwrap_or_default(),
            socioeconomic_resilience: base.resilience,
            food_resilience,
            healthcare_resilience,
            cri: options
                .weights
                .combine(base.resilience, food_resilience, healthcare_resilience),
        });
    }

    let total = records.len();
    check_coverage(food.stage, food_matched, total, options.min_join_coverage)?;
    check_coverage(health.stage, healthcare_matched, total, options.min_join_coverage)?;

    let report = CompositionReport {
        regions: total,
        food_matched,
        healthcare_matched,
        missing_cri: records.iter().filter(|r| r.cri.is_none()).count(),
        excluded_food_only: total_excluded(socio, food),
        excluded_healthcare_only: total_excluded(socio, health),
    };

    if report.excluded_food_only + report.excluded_healthcare_only > 0 {
        warn!(
            "{} food and {} healthcare regions absent from the socioeconomic base were dropped",
            report.excluded_food_only, report.excluded_healthcare_only
        );
    }
    info!(
        "Composed {} regions ({} with missing CRI)",
        report.regions, report.missing_cri
    );

    Ok(Composition { records, report })
}

/// Reject a join where too few base regions found a partner row
fn check_coverage(stage: &'static str, matched: usize, total: usize, min_coverage: f64) -> Result<()> {
    if total == 0 {
        return Ok(());
    }
    let coverage = matched as f64 / total as f64;
    if coverage < min_coverage {
        return Err(PipelineError::JoinKeyMismatch { stage, matched, total });
    }
    Ok(())
}

fn total_excluded(base: &SubScoreTable, other: &SubScoreTable) -> usize {
    let base_keys = base.lookup();
    other
        .scores
        .iter()
        .filter(|s| !base_keys.contains_key(&s.key))
        .count()
}
