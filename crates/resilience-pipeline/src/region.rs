//! Region keys and state display names
//!
//! A region is a county keyed by its zero-padded state (2 digit) and county
//! (3 digit) codes. Padding happens here, at construction, so every join in
//! the pipeline compares keys of the same width.

use crate::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const STATE_CODE_WIDTH: usize = 2;
pub const COUNTY_CODE_WIDTH: usize = 3;
pub const REGION_ID_WIDTH: usize = STATE_CODE_WIDTH + COUNTY_CODE_WIDTH;
pub const TRACT_ID_WIDTH: usize = 11;

/// Zero-padded `(state, county)` join key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionKey {
    state: String,
    county: String,
}

impl RegionKey {
    /// Build a key from separate state and county codes, padding each
    pub fn new(state: &str, county: &str) -> Result<Self> {
        Ok(Self {
            state: pad_code(state, STATE_CODE_WIDTH)?,
            county: pad_code(county, COUNTY_CODE_WIDTH)?,
        })
    }

    /// Parse a 5-digit region identifier ("13057")
    ///
    /// A 4-digit value is accepted as a region identifier that lost its
    /// leading zero on a numeric round trip.
    pub fn from_fips(fips: &str) -> Result<Self> {
        let padded = pad_code(fips, REGION_ID_WIDTH)?;
        let (state, county) = padded.split_at(STATE_CODE_WIDTH);
        Ok(Self {
            state: state.to_string(),
            county: county.to_string(),
        })
    }

    /// Derive the county key from an 11-digit census tract identifier
    pub fn from_tract(tract: &str) -> Result<Self> {
        let padded = pad_code(tract, TRACT_ID_WIDTH)?;
        Ok(Self {
            state: padded[..STATE_CODE_WIDTH].to_string(),
            county: padded[STATE_CODE_WIDTH..REGION_ID_WIDTH].to_string(),
        })
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn county(&self) -> &str {
        &self.county
    }

    /// Concatenated region identifier used across every stage
    pub fn fips(&self) -> String {
        format!("{}{}", self.state, self.county)
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.state, self.county)
    }
}

/// Left-pad a numeric code with zeros to `width`
///
/// Codes read from spreadsheets sometimes arrive as "13.0"; a trailing
/// ".0" is stripped before padding.
fn pad_code(raw: &str, width: usize) -> Result<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_suffix(".0").unwrap_or(trimmed);

    if digits.is_empty() || digits.len() > width || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PipelineError::InvalidRegionKey(format!(
            "'{}' is not a code of at most {} digits",
            raw, width
        )));
    }

    Ok(format!("{:0>width$}", digits, width = width))
}

/// State FIPS code to display name
const STATE_NAMES: [(&str, &str); 52] = [
    ("01", "Alabama"),
    ("02", "Alaska"),
    ("04", "Arizona"),
    ("05", "Arkansas"),
    ("06", "California"),
    ("08", "Colorado"),
    ("09", "Connecticut"),
    ("10", "Delaware"),
    ("11", "District of Columbia"),
    ("12", "Florida"),
    ("13", "Georgia"),
    ("15", "Hawaii"),
    ("16", "Idaho"),
    ("17", "Illinois"),
    ("18", "Indiana"),
    ("19", "Iowa"),
    ("20", "Kansas"),
    ("21", "Kentucky"),
    ("22", "Louisiana"),
    ("23", "Maine"),
    ("24", "Maryland"),
    ("25", "Massachusetts"),
    ("26", "Michigan"),
    ("27", "Minnesota"),
    ("28", "Mississippi"),
    ("29", "Missouri"),
    ("30", "Montana"),
    ("31", "Nebraska"),
    ("32", "Nevada"),
    ("33", "New Hampshire"),
    ("34", "New Jersey"),
    ("35", "New Mexico"),
    ("36", "New York"),
    ("37", "North Carolina"),
    ("38", "North Dakota"),
    ("39", "Ohio"),
    ("40", "Oklahoma"),
    ("41", "Oregon"),
    ("42", "Pennsylvania"),
    ("44", "Rhode Island"),
    ("45", "South Carolina"),
    ("46", "South Dakota"),
    ("47", "Tennessee"),
    ("48", "Texas"),
    ("49", "Utah"),
    ("50", "Vermont"),
    ("51", "Virginia"),
    ("53", "Washington"),
    ("54", "West Virginia"),
    ("55", "Wisconsin"),
    ("56", "Wyoming"),
    ("72", "Puerto Rico"),
];

/// Display name for a zero-padded state code
pub fn state_name(state_code: &str) -> Option<&'static str> {
    STATE_NAMES
        .iter()
        .find(|(code, _)| *code == state_code)
        .map(|(_, name)| *name)
}
