//! Community Resilience Index Pipeline
//!
//! Normalizes three independent county-level source datasets, derives a
//! resilience sub-score from each, and joins them into the canonical CRI
//! table consumed by the query engine.
//!
//! # Composite Model
//!
//! ```text
//! CRI(r) = w₁·R_socio + w₂·R_food + w₃·R_health
//! ```
//!
//! | Factor   | Weight | Description |
//! |----------|--------|-------------|
//! | R_socio  | 1/3    | 1 − mean(norm poverty, norm no-HS, norm housing burden) |
//! | R_food   | 1/3    | 1 − fraction of LILA tracts (FIS) |
//! | R_health | 1/3    | 1 − normalized uninsured rate (under 65) |
//!
//! Every stage is a full batch: a complete table in, a complete table out.
//! Per-region arithmetic faults become missing values; structural faults
//! (absent columns, key mismatches) abort the run before anything is
//! published.

use thiserror::Error;

pub mod acs;
pub mod canonical;
pub mod composer;
pub mod config;
pub mod food;
pub mod healthcare;
pub mod normalize;
pub mod pipeline;
pub mod region;
pub mod socioeconomic;
pub mod stage;
pub mod table;

pub use canonical::CriRecord;
pub use composer::CompositeWeights;
pub use config::PipelineConfig;
pub use region::RegionKey;
pub use stage::StageOutput;

/// Decimal places used when a score is shown to a person
pub const DISPLAY_DECIMALS: i32 = 4;

/// Minimum fraction of base regions that must find a partner row in each
/// joined stage before the composer accepts the join
pub const DEFAULT_MIN_JOIN_COVERAGE: f64 = 0.5;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Missing source column '{column}' in {table}")]
    MissingSourceColumn { table: String, column: String },
    #[error("Zero denominator in {stage} for region {region}")]
    DivisionByZeroSource { stage: &'static str, region: String },
    #[error("Join key mismatch against {stage}: {matched} of {total} base regions matched")]
    JoinKeyMismatch {
        stage: &'static str,
        matched: usize,
        total: usize,
    },
    #[error("Duplicate region {region} in {stage} output")]
    DuplicateRegion { stage: &'static str, region: String },
    #[error("Invalid region key: {0}")]
    InvalidRegionKey(String),
    #[error("Census API error: {0}")]
    CensusApi(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Round a score for display; computation always keeps full precision
pub fn round_for_display(value: f64) -> f64 {
    let scale = 10f64.powi(DISPLAY_DECIMALS);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_for_display() {
        assert_eq!(round_for_display(0.123456), 0.1235);
        assert_eq!(round_for_display(0.7), 0.7);
        assert_eq!(round_for_display(1.0 / 3.0), 0.3333);
    }

    #[test]
    fn test_error_messages_name_the_problem() {
        let err = PipelineError::MissingSourceColumn {
            table: "socioeconomic".to_string(),
            column: "poverty_rate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Missing source column 'poverty_rate' in socioeconomic"
        );
    }
}
