//! Canonical CRI table
//!
//! One row per region. The file keeps full precision; rounding to
//! [`DISPLAY_DECIMALS`](crate::DISPLAY_DECIMALS) happens only when a score
//! is shown.

use crate::stage::write_rows;
use crate::table::RawTable;
use crate::{RegionKey, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Column order of the canonical table
pub const COLUMNS: [&str; 8] = [
    "state_id",
    "state_name",
    "region_id",
    "region_name",
    "socioeconomic_resilience",
    "food_resilience",
    "healthcare_resilience",
    "cri",
];

/// One region of the canonical table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriRecord {
    pub state_id: String,
    pub state_name: String,
    pub region_id: String,
    pub region_name: String,
    pub socioeconomic_resilience: Option<f64>,
    pub food_resilience: Option<f64>,
    pub healthcare_resilience: Option<f64>,
    pub cri: Option<f64>,
}

impl CriRecord {
    /// 5-digit region identifier
    pub fn fips(&self) -> String {
        format!("{}{}", self.state_id, self.region_id)
    }

    pub fn key(&self) -> Result<RegionKey> {
        RegionKey::new(&self.state_id, &self.region_id)
    }

    /// The three sub-scores, if all are present
    pub fn sub_scores(&self) -> Option<[f64; 3]> {
        Some([
            self.socioeconomic_resilience?,
            self.food_resilience?,
            self.healthcare_resilience?,
        ])
    }
}

/// Publish the canonical table
pub fn write_canonical(path: impl AsRef<Path>, records: &[CriRecord]) -> Result<()> {
    write_rows(path, records)
}

/// Load a canonical table, re-padding keys and coercing scores
pub fn load_canonical(path: impl AsRef<Path>) -> Result<Vec<CriRecord>> {
    let table = RawTable::from_path("canonical", path)?;
    from_table(&table)
}

pub fn from_table(table: &RawTable) -> Result<Vec<CriRecord>> {
    let [state_id, state_name, region_id, region_name, socio, food, health, cri] =
        COLUMNS.map(|c| table.column(c));
    let (state_id, state_name, region_id, region_name) = (state_id?, state_name?, region_id?, region_name?);
    let (socio, food, health, cri) = (socio?, food?, health?, cri?);

    let records = (0..table.len())
        .map(|row| {
            let key = RegionKey::new(state_id.text(row), region_id.text(row))?;
            Ok(CriRecord {
                state_id: key.state().to_string(),
                state_name: state_name.text(row).to_string(),
                region_id: key.county().to_string(),
                region_name: region_name.text(row).to_string(),
                socioeconomic_resilience: socio.numeric(row),
                food_resilience: food.numeric(row),
                healthcare_resilience: health.numeric(row),
                cri: cri.numeric(row),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded canonical table with {} regions", records.len());
    Ok(records)
}
