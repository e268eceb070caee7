//! Socioeconomic Vulnerability (SEV) stage
//!
//! ```text
//! SEV(r)     = mean(norm poverty_rate, norm education_no_hs_rate, norm housing_cost_burden)
//! R_socio(r) = 1 − SEV(r)
//! ```
//!
//! Missing indicators are left out of the mean rather than counted as zero.
//! This stage also defines the base population of regions for the index.

use crate::normalize::{complement, mean_present, min_max};
use crate::stage::{Keyed, StageOutput};
use crate::table::RawTable;
use crate::{RegionKey, Result};
use serde::Serialize;
use tracing::info;

pub const STAGE: &str = "socioeconomic";

/// Input column names
pub const COL_STATE: &str = "state";
pub const COL_COUNTY: &str = "county";
pub const COL_COUNTY_NAME: &str = "county_name";
pub const COL_POVERTY_RATE: &str = "poverty_rate";
pub const COL_NO_HS_RATE: &str = "education_no_hs_rate";
pub const COL_HOUSING_BURDEN: &str = "housing_cost_burden";

/// Output column carrying the sub-score
pub const RESILIENCE_COLUMN: &str = "resilience_socio";

/// Per-region socioeconomic scores
#[derive(Debug, Clone, Serialize)]
pub struct SocioeconomicScore {
    #[serde(skip)]
    pub key: RegionKey,
    pub state_id: String,
    pub region_id: String,
    pub region_name: String,
    pub poverty_rate: Option<f64>,
    pub education_no_hs_rate: Option<f64>,
    pub housing_cost_burden: Option<f64>,
    pub norm_poverty_rate: Option<f64>,
    pub norm_education_no_hs_rate: Option<f64>,
    pub norm_housing_cost_burden: Option<f64>,
    pub sev: Option<f64>,
    pub resilience_socio: Option<f64>,
}

impl Keyed for SocioeconomicScore {
    fn key(&self) -> &RegionKey {
        &self.key
    }
}

/// Run the stage over a full batch of raw socioeconomic rows
pub fn compute(table: &RawTable) -> Result<StageOutput<SocioeconomicScore>> {
    // Every required column must exist before any row is read
    let state = table.column(COL_STATE)?;
    let county = table.column(COL_COUNTY)?;
    let name = table.column(COL_COUNTY_NAME)?;
    let poverty = table.column(COL_POVERTY_RATE)?;
    let no_hs = table.column(COL_NO_HS_RATE)?;
    let housing = table.column(COL_HOUSING_BURDEN)?;

    let keys = (0..table.len())
        .map(|row| RegionKey::new(state.text(row), county.text(row)))
        .collect::<Result<Vec<_>>>()?;

    let poverty_raw: Vec<Option<f64>> = (0..table.len()).map(|r| poverty.numeric(r)).collect();
    let no_hs_raw: Vec<Option<f64>> = (0..table.len()).map(|r| no_hs.numeric(r)).collect();
    let housing_raw: Vec<Option<f64>> = (0..table.len()).map(|r| housing.numeric(r)).collect();

    let poverty_norm = min_max(&poverty_raw);
    let no_hs_norm = min_max(&no_hs_raw);
    let housing_norm = min_max(&housing_raw);

    let rows: Vec<SocioeconomicScore> = keys
        .into_iter()
        .enumerate()
        .map(|(i, key)| {
            let sev = mean_present(&[poverty_norm[i], no_hs_norm[i], housing_norm[i]]);
            SocioeconomicScore {
                state_id: key.state().to_string(),
                region_id: key.county().to_string(),
                region_name: name.text(i).to_string(),
                key,
                poverty_rate: poverty_raw[i],
                education_no_hs_rate: no_hs_raw[i],
                housing_cost_burden: housing_raw[i],
                norm_poverty_rate: poverty_norm[i],
                norm_education_no_hs_rate: no_hs_norm[i],
                norm_housing_cost_burden: housing_norm[i],
                sev,
                resilience_socio: complement(sev),
            }
        })
        .collect();

    let scored = rows.iter().filter(|r| r.resilience_socio.is_some()).count();
    info!("Socioeconomic stage: {} regions, {} scored", rows.len(), scored);

    StageOutput::new(STAGE, rows, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;

    fn table(csv: &str) -> RawTable {
        RawTable::from_reader("socioeconomic", csv.as_bytes()).unwrap()
    }

    const HEADER: &str = "state,county,county_name,poverty_rate,education_no_hs_rate,housing_cost_burden\n";

    #[test]
    fn test_sev_and_resilience() {
        let t = table(&format!(
            "{HEADER}13,1,Appling County,0.10,0.20,0.30\n13,3,Atkinson County,0.30,0.40,0.50\n"
        ));
        let out = compute(&t).unwrap();

        assert_eq!(out.len(), 2);
        // Lowest on every indicator: zero vulnerability
        assert_eq!(out.rows[0].sev, Some(0.0));
        assert_eq!(out.rows[0].resilience_socio, Some(1.0));
        assert_eq!(out.rows[1].sev, Some(1.0));
        assert_eq!(out.rows[1].resilience_socio, Some(0.0));
        assert_eq!(out.rows[0].key.fips(), "13001");
        assert_eq!(out.rows[0].region_id, "001");
    }

    #[test]
    fn test_missing_indicator_excluded_from_mean() {
        let t = table(&format!(
            "{HEADER}13,1,A,0.10,0.20,\n13,3,B,0.30,0.40,0.50\n13,5,C,0.20,0.30,0.10\n"
        ));
        let out = compute(&t).unwrap();

        // A: norm poverty 0, norm no-hs 0, housing missing -> SEV 0
        assert_eq!(out.rows[0].norm_housing_cost_burden, None);
        assert_eq!(out.rows[0].sev, Some(0.0));
    }

    #[test]
    fn test_all_indicators_missing_gives_missing_score() {
        let t = table(&format!("{HEADER}13,1,A,,,\n13,3,B,0.3,0.4,0.5\n"));
        let out = compute(&t).unwrap();
        assert_eq!(out.rows[0].sev, None);
        assert_eq!(out.rows[0].resilience_socio, None);
    }

    #[test]
    fn test_missing_column_aborts() {
        let t = table("state,county,county_name,poverty_rate,education_no_hs_rate\n13,1,A,0.1,0.2\n");
        match compute(&t) {
            Err(PipelineError::MissingSourceColumn { column, .. }) => {
                assert_eq!(column, COL_HOUSING_BURDEN)
            }
            other => panic!("expected MissingSourceColumn, got {:?}", other.map(|o| o.len())),
        }
    }

    #[test]
    fn test_resilience_in_unit_interval() {
        let t = table(&format!(
            "{HEADER}13,1,A,0.12,0.22,0.31\n13,3,B,0.25,0.14,0.45\n13,5,C,0.08,0.30,0.28\n13,7,D,0.19,0.19,0.19\n"
        ));
        let out = compute(&t).unwrap();
        for row in &out.rows {
            let r = row.resilience_socio.unwrap();
            assert!((0.0..=1.0).contains(&r), "{} out of range: {}", row.region_name, r);
        }
    }
}
