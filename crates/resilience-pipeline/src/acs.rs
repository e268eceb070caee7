//! American Community Survey extraction
//!
//! Pulls 2021 ACS 5-year county estimates from the Census API and derives
//! the raw inputs of the socioeconomic and healthcare stages.
//!
//! | Derived field          | ACS variables |
//! |------------------------|---------------|
//! | poverty_rate           | B17001_002E / B17001_001E |
//! | education_no_hs_rate   | Σ B15003_002E..B15003_015E / B15003_001E |
//! | housing_cost_burden    | B25070_010E / B25070_001E |
//! | uninsured_under65      | B27010_017E |
//! | total_under65          | B27010_001E |
//!
//! The API answers with an array of string arrays, header row first.
//! Negative values are Census annotation codes (e.g. -666666666) and count
//! as missing.

use crate::table::parse_numeric;
use crate::{PipelineError, Result};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

pub const ACS_BASE_URL: &str = "https://api.census.gov/data/2021/acs/acs5";

pub const POVERTY_COUNT: &str = "B17001_002E";
pub const POVERTY_UNIVERSE: &str = "B17001_001E";
pub const EDUCATION_UNIVERSE: &str = "B15003_001E";
pub const HOUSING_BURDENED: &str = "B25070_010E";
pub const HOUSING_UNIVERSE: &str = "B25070_001E";
pub const INSURANCE_UNIVERSE_UNDER65: &str = "B27010_001E";
pub const UNINSURED_UNDER65: &str = "B27010_017E";
pub const NAME: &str = "NAME";

/// B15003_002E through B15003_015E: no high school diploma
pub fn no_hs_variables() -> Vec<String> {
    (2..=15).map(|i| format!("B15003_{:03}E", i)).collect()
}

pub fn socioeconomic_variables() -> Vec<String> {
    let mut vars = vec![
        NAME.to_string(),
        POVERTY_COUNT.to_string(),
        POVERTY_UNIVERSE.to_string(),
        EDUCATION_UNIVERSE.to_string(),
    ];
    vars.extend(no_hs_variables());
    vars.push(HOUSING_BURDENED.to_string());
    vars.push(HOUSING_UNIVERSE.to_string());
    vars
}

pub fn healthcare_variables() -> Vec<String> {
    vec![
        NAME.to_string(),
        INSURANCE_UNIVERSE_UNDER65.to_string(),
        UNINSURED_UNDER65.to_string(),
    ]
}

/// Tabular Census API response
#[derive(Debug, Clone)]
pub struct AcsFrame {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl AcsFrame {
    /// Build from the raw response body, header row first
    pub fn from_rows(mut rows: Vec<Vec<Option<String>>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(PipelineError::CensusApi("empty response".to_string()));
        }
        let headers = rows
            .remove(0)
            .into_iter()
            .map(|h| h.unwrap_or_default())
            .collect();
        Ok(Self { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn column(&self, name: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PipelineError::MissingSourceColumn {
                table: "acs".to_string(),
                column: name.to_string(),
            })
    }

    fn text(&self, row: usize, col: usize) -> &str {
        self.rows[row]
            .get(col)
            .and_then(|v| v.as_deref())
            .unwrap_or("")
    }

    /// Estimate value, with annotation codes treated as missing
    fn estimate(&self, row: usize, col: usize) -> Option<f64> {
        parse_numeric(self.text(row, col)).filter(|v| *v >= 0.0)
    }
}

/// Raw socioeconomic row, in the socioeconomic stage's input layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSocioeconomicRow {
    pub state: String,
    pub county: String,
    pub county_name: String,
    pub poverty_rate: Option<f64>,
    pub education_no_hs_rate: Option<f64>,
    pub housing_cost_burden: Option<f64>,
}

/// Raw uninsured counts, in the healthcare stage's input layout
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawHealthcareRow {
    pub state: String,
    pub county: String,
    pub county_name: String,
    pub uninsured_under65: Option<f64>,
    pub total_under65: Option<f64>,
}

fn ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    match (numerator, denominator) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

pub fn derive_socioeconomic(frame: &AcsFrame) -> Result<Vec<RawSocioeconomicRow>> {
    let name = frame.column(NAME)?;
    let state = frame.column("state")?;
    let county = frame.column("county")?;
    let poverty = frame.column(POVERTY_COUNT)?;
    let poverty_total = frame.column(POVERTY_UNIVERSE)?;
    let edu_total = frame.column(EDUCATION_UNIVERSE)?;
    let no_hs = no_hs_variables()
        .iter()
        .map(|v| frame.column(v))
        .collect::<Result<Vec<_>>>()?;
    let burdened = frame.column(HOUSING_BURDENED)?;
    let housing_total = frame.column(HOUSING_UNIVERSE)?;

    let rows = (0..frame.len())
        .map(|row| {
            // A single missing attainment bucket makes the sum unknown
            let no_hs_count = no_hs
                .iter()
                .map(|col| frame.estimate(row, *col))
                .sum::<Option<f64>>();

            RawSocioeconomicRow {
                state: frame.text(row, state).to_string(),
                county: frame.text(row, county).to_string(),
                county_name: frame.text(row, name).to_string(),
                poverty_rate: ratio(frame.estimate(row, poverty), frame.estimate(row, poverty_total)),
                education_no_hs_rate: ratio(no_hs_count, frame.estimate(row, edu_total)),
                housing_cost_burden: ratio(frame.estimate(row, burdened), frame.estimate(row, housing_total)),
            }
        })
        .collect();

    Ok(rows)
}

pub fn derive_healthcare(frame: &AcsFrame) -> Result<Vec<RawHealthcareRow>> {
    let name = frame.column(NAME)?;
    let state = frame.column("state")?;
    let county = frame.column("county")?;
    let total = frame.column(INSURANCE_UNIVERSE_UNDER65)?;
    let uninsured = frame.column(UNINSURED_UNDER65)?;

    Ok((0..frame.len())
        .map(|row| RawHealthcareRow {
            state: frame.text(row, state).to_string(),
            county: frame.text(row, county).to_string(),
            county_name: frame.text(row, name).to_string(),
            uninsured_under65: frame.estimate(row, uninsured),
            total_under65: frame.estimate(row, total),
        })
        .collect())
}

/// Census API client
pub struct CensusClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CensusClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::CensusApi(e.to_string()))?;

        Ok(Self {
            client,
            base_url: ACS_BASE_URL.to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch `variables` for every county of `state`
    pub async fn fetch_counties(&self, variables: &[String], state: &str) -> Result<AcsFrame> {
        info!("Fetching {} ACS variables for state {}", variables.len(), state);

        let get = variables.join(",");
        let within = format!("state:{}", state);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("get", get.as_str()),
                ("for", "county:*"),
                ("in", within.as_str()),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::CensusApi(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PipelineError::CensusApi(format!(
                "Census API returned status: {}",
                response.status()
            )));
        }

        let rows: Vec<Vec<Option<String>>> = response
            .json()
            .await
            .map_err(|e| PipelineError::CensusApi(e.to_string()))?;

        let frame = AcsFrame::from_rows(rows)?;
        info!("Received {} county rows", frame.len());
        Ok(frame)
    }
}
