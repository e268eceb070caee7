//! Food resilience stage
//!
//! Tract-level low-income/low-access flags (USDA Food Access Research
//! Atlas, `LILATracts_1And10`) are rolled up to counties:
//!
//! ```text
//! FIS(r)    = flagged tracts in r / tracts in r
//! R_food(r) = 1 − FIS(r)
//! ```
//!
//! A region in the batch with no tracts in the atlas gets a missing score.

use crate::stage::{Keyed, StageOutput};
use crate::table::RawTable;
use crate::{RegionKey, Result};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info};

pub const STAGE: &str = "food";

/// Input column names
pub const COL_TRACT: &str = "CensusTract";
pub const COL_LILA_FLAG: &str = "LILATracts_1And10";

/// Output column carrying the sub-score
pub const RESILIENCE_COLUMN: &str = "resilience_food";

/// Per-region food access scores
#[derive(Debug, Clone, Serialize)]
pub struct FoodScore {
    #[serde(skip)]
    pub key: RegionKey,
    pub state_id: String,
    pub region_id: String,
    pub tract_count: usize,
    pub flagged_tracts: usize,
    pub fis: Option<f64>,
    pub resilience_food: Option<f64>,
}

impl Keyed for FoodScore {
    fn key(&self) -> &RegionKey {
        &self.key
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct TractTally {
    tracts: usize,
    flagged: usize,
}

impl FoodScore {
    fn from_tally(key: RegionKey, tally: Option<TractTally>) -> Self {
        let tally = tally.unwrap_or_default();
        let fis = if tally.tracts == 0 {
            None
        } else {
            Some(tally.flagged as f64 / tally.tracts as f64)
        };

        Self {
            state_id: key.state().to_string(),
            region_id: key.county().to_string(),
            key,
            tract_count: tally.tracts,
            flagged_tracts: tally.flagged,
            fis,
            resilience_food: fis.map(|f| 1.0 - f),
        }
    }
}

/// Parse a LILA flag cell; anything other than 0 or 1 is missing
fn parse_flag(raw: &str) -> Option<bool> {
    match crate::table::parse_numeric(raw) {
        Some(v) if v == 1.0 => Some(true),
        Some(v) if v == 0.0 => Some(false),
        _ => None,
    }
}

/// Run the stage
///
/// `universe` is the batch's region population (normally the socioeconomic
/// regions); each gets a row, in that order. Regions that only appear in the
/// atlas follow in key order. `state_filter` restricts tracts to one state.
pub fn compute(
    tracts: &RawTable,
    universe: &[RegionKey],
    state_filter: Option<&str>,
) -> Result<StageOutput<FoodScore>> {
    let tract_col = tracts.column(COL_TRACT)?;
    let flag_col = tracts.column(COL_LILA_FLAG)?;

    let mut tallies: BTreeMap<RegionKey, TractTally> = BTreeMap::new();
    let mut skipped = 0usize;

    for row in 0..tracts.len() {
        let key = match RegionKey::from_tract(tract_col.text(row)) {
            Ok(k) => k,
            Err(e) => {
                debug!("Skipping tract row {}: {}", row, e);
                skipped += 1;
                continue;
            }
        };

        if state_filter.is_some_and(|s| s != key.state()) {
            continue;
        }

        let Some(flagged) = parse_flag(flag_col.text(row)) else {
            skipped += 1;
            continue;
        };

        let tally = tallies.entry(key).or_default();
        tally.tracts += 1;
        if flagged {
            tally.flagged += 1;
        }
    }

    let mut rows: Vec<FoodScore> = Vec::with_capacity(universe.len().max(tallies.len()));
    let mut placed: HashSet<&RegionKey> = HashSet::with_capacity(universe.len());

    for key in universe {
        if placed.insert(key) {
            rows.push(FoodScore::from_tally(key.clone(), tallies.get(key).copied()));
        }
    }
    for (key, tally) in &tallies {
        if !placed.contains(key) {
            rows.push(FoodScore::from_tally(key.clone(), Some(*tally)));
        }
    }

    let without_tracts = rows.iter().filter(|r| r.tract_count == 0).count();
    info!(
        "Food stage: {} regions from {} tracts ({} skipped, {} regions without tracts)",
        rows.len(),
        tracts.len(),
        skipped,
        without_tracts
    );

    StageOutput::new(STAGE, rows, Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PipelineError;

    fn atlas(csv: &str) -> RawTable {
        RawTable::from_reader("food atlas", csv.as_bytes()).unwrap()
    }

    fn key(fips: &str) -> RegionKey {
        RegionKey::from_fips(fips).unwrap()
    }

    const ATLAS: &str = "CensusTract,LILATracts_1And10\n\
        13001950100,1\n\
        13001950200,0\n\
        13001950300,0\n\
        13001950400,1\n\
        13003960100,0\n\
        13005970100,1\n\
        01001020100,1\n";

    #[test]
    fn test_fraction_of_flagged_tracts() {
        let out = compute(&atlas(ATLAS), &[key("13001"), key("13003"), key("13005")], Some("13")).unwrap();

        assert_eq!(out.rows[0].tract_count, 4);
        assert_eq!(out.rows[0].fis, Some(0.5));
        assert_eq!(out.rows[0].resilience_food, Some(0.5));
        assert_eq!(out.rows[1].resilience_food, Some(1.0));
        assert_eq!(out.rows[2].resilience_food, Some(0.0));
        // Alabama tract filtered out
        assert_eq!(out.len(), 3);
    }

    #[test]
    fn test_region_without_tracts_is_missing() {
        let out = compute(&atlas(ATLAS), &[key("13001"), key("13007")], Some("13")).unwrap();

        let empty = out.rows.iter().find(|r| r.key.fips() == "13007").unwrap();
        assert_eq!(empty.tract_count, 0);
        assert_eq!(empty.fis, None);
        assert_eq!(empty.resilience_food, None);
    }

    #[test]
    fn test_atlas_only_regions_follow_universe() {
        let out = compute(&atlas(ATLAS), &[key("13005")], None).unwrap();
        let fips: Vec<String> = out.rows.iter().map(|r| r.key.fips()).collect();
        assert_eq!(fips, vec!["13005", "01001", "13001", "13003"]);
    }

    #[test]
    fn test_unpadded_tract_ids() {
        let csv = "CensusTract,LILATracts_1And10\n1001020100,1\n1001020200,0\n";
        let out = compute(&atlas(csv), &[key("01001")], None).unwrap();
        assert_eq!(out.rows[0].tract_count, 2);
        assert_eq!(out.rows[0].fis, Some(0.5));
    }

    #[test]
    fn test_bad_flags_skipped() {
        let csv = "CensusTract,LILATracts_1And10\n13001950100,1\n13001950200,\n13001950300,yes\n";
        let out = compute(&atlas(csv), &[key("13001")], None).unwrap();
        assert_eq!(out.rows[0].tract_count, 1);
        assert_eq!(out.rows[0].fis, Some(1.0));
    }

    #[test]
    fn test_missing_flag_column() {
        let csv = "CensusTract,LA1and10\n13001950100,1\n";
        assert!(matches!(
            compute(&atlas(csv), &[], None),
            Err(PipelineError::MissingSourceColumn { .. })
        ));
    }
}
