//! Healthcare resilience stage
//!
//! ```text
//! uninsured_rate(r) = uninsured_under65 / total_under65
//! R_health(r)       = 1 − norm(uninsured_rate)
//! ```
//!
//! Population under 65 is used because Medicare covers everyone older.

use crate::normalize::{complement, min_max};
use crate::stage::{Keyed, StageOutput};
use crate::table::RawTable;
use crate::{PipelineError, RegionKey, Result};
use serde::Serialize;
use tracing::info;

pub const STAGE: &str = "healthcare";

/// Input column names
pub const COL_STATE: &str = "state";
pub const COL_COUNTY: &str = "county";
pub const COL_COUNTY_NAME: &str = "county_name";
pub const COL_UNINSURED: &str = "uninsured_under65";
pub const COL_TOTAL: &str = "total_under65";

/// Output column carrying the sub-score
pub const RESILIENCE_COLUMN: &str = "resilience_health";

/// Per-region healthcare scores
#[derive(Debug, Clone, Serialize)]
pub struct HealthcareScore {
    #[serde(skip)]
    pub key: RegionKey,
    pub state_id: String,
    pub region_id: String,
    pub region_name: String,
    pub uninsured_under65: Option<f64>,
    pub total_under65: Option<f64>,
    pub uninsured_rate: Option<f64>,
    pub norm_uninsured_rate: Option<f64>,
    pub resilience_health: Option<f64>,
}

impl Keyed for HealthcareScore {
    fn key(&self) -> &RegionKey {
        &self.key
    }
}

/// Run the stage over a full batch of uninsured counts
pub fn compute(table: &RawTable) -> Result<StageOutput<HealthcareScore>> {
    let state = table.column(COL_STATE)?;
    let county = table.column(COL_COUNTY)?;
    let uninsured = table.column(COL_UNINSURED)?;
    let total = table.column(COL_TOTAL)?;
    // Display name is optional for this source
    let name = table.column(COL_COUNTY_NAME).ok();

    let mut faults = Vec::new();
    let mut keys = Vec::with_capacity(table.len());
    let mut counts = Vec::with_capacity(table.len());
    let mut rates = Vec::with_capacity(table.len());

    for row in 0..table.len() {
        let key = RegionKey::new(state.text(row), county.text(row))?;
        let u = uninsured.numeric(row);
        let t = total.numeric(row);

        let rate = match (u, t) {
            (_, Some(t)) if t == 0.0 => {
                faults.push(PipelineError::DivisionByZeroSource {
                    stage: STAGE,
                    region: key.fips(),
                });
                None
            }
            (Some(u), Some(t)) => Some(u / t),
            _ => None,
        };

        keys.push(key);
        counts.push((u, t));
        rates.push(rate);
    }

    let normalized = min_max(&rates);

    let rows: Vec<HealthcareScore> = keys
        .into_iter()
        .enumerate()
        .map(|(i, key)| HealthcareScore {
            state_id: key.state().to_string(),
            region_id: key.county().to_string(),
            region_name: name.map(|c| c.text(i).to_string()).unwrap_or_default(),
            key,
            uninsured_under65: counts[i].0,
            total_under65: counts[i].1,
            uninsured_rate: rates[i],
            norm_uninsured_rate: normalized[i],
            resilience_health: complement(normalized[i]),
        })
        .collect();

    info!(
        "Healthcare stage: {} regions, {} zero-population faults",
        rows.len(),
        faults.len()
    );

    StageOutput::new(STAGE, rows, faults)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader("healthcare", csv.as_bytes()).unwrap()
    }

    const HEADER: &str = "state,county,county_name,uninsured_under65,total_under65\n";

    #[test]
    fn test_rate_and_resilience() {
        let t = table(&format!("{HEADER}13,1,A,100,1000\n13,3,B,300,1000\n13,5,C,200,1000\n"));
        let out = compute(&t).unwrap();

        assert_eq!(out.rows[0].uninsured_rate, Some(0.1));
        assert_eq!(out.rows[0].resilience_health, Some(1.0));
        assert_eq!(out.rows[1].resilience_health, Some(0.0));
        let mid = out.rows[2].resilience_health.unwrap();
        assert!((mid - 0.5).abs() < 1e-9);
        assert!(out.faults.is_empty());
    }

    #[test]
    fn test_zero_population_recorded_as_missing() {
        let t = table(&format!("{HEADER}13,1,A,100,1000\n13,3,B,0,0\n13,5,C,200,1000\n"));
        let out = compute(&t).unwrap();

        // Row kept, rate missing, batch continues
        assert_eq!(out.len(), 3);
        assert_eq!(out.rows[1].uninsured_rate, None);
        assert_eq!(out.rows[1].resilience_health, None);
        assert_eq!(out.faults.len(), 1);
        assert!(matches!(
            &out.faults[0],
            PipelineError::DivisionByZeroSource { region, .. } if region == "13003"
        ));

        // The missing row does not affect normalization of the others
        assert_eq!(out.rows[0].resilience_health, Some(1.0));
        assert_eq!(out.rows[2].resilience_health, Some(0.0));
    }

    #[test]
    fn test_zero_population_without_uninsured_count() {
        let t = table(&format!("{HEADER}13,1,A,100,1000\n13,3,B,,0\n13,5,C,200,1000\n"));
        let out = compute(&t).unwrap();

        assert_eq!(out.rows[1].uninsured_rate, None);
        assert_eq!(out.faults.len(), 1);
        assert!(matches!(
            &out.faults[0],
            PipelineError::DivisionByZeroSource { region, .. } if region == "13003"
        ));
    }

    #[test]
    fn test_single_region_constant_rate() {
        let t = table(&format!("{HEADER}13,1,A,150,1000\n"));
        let out = compute(&t).unwrap();
        // Degenerate batch: normalized value is the raw rate
        assert_eq!(out.rows[0].norm_uninsured_rate, Some(0.15));
        let r = out.rows[0].resilience_health.unwrap();
        assert!((r - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_missing_total_column() {
        let t = table("state,county,uninsured_under65\n13,1,100\n");
        assert!(matches!(
            compute(&t),
            Err(PipelineError::MissingSourceColumn { .. })
        ));
    }
}
