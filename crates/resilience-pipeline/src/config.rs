//! Pipeline configuration
//!
//! Defaults mirror the on-disk layout of a `data/` directory. A JSON file
//! can override any field; paths are resolved relative to `data_dir`.

use crate::composer::{ComposeOptions, CompositeWeights};
use crate::{Result, DEFAULT_MIN_JOIN_COVERAGE};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::info;

/// Georgia, the jurisdiction the index was first built for
pub const DEFAULT_STATE_FIPS: &str = "13";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data_dir: PathBuf,

    // Raw inputs
    pub socioeconomic_input: PathBuf,
    pub healthcare_input: PathBuf,
    pub food_atlas_input: PathBuf,

    // Intermediate stage outputs
    pub socioeconomic_output: PathBuf,
    pub healthcare_output: PathBuf,
    pub food_output: PathBuf,

    /// Canonical CRI table
    pub canonical_output: PathBuf,

    /// State FIPS code the batch is restricted to (`None` = all states)
    pub jurisdiction: Option<String>,

    pub weights: CompositeWeights,
    pub min_join_coverage: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            socioeconomic_input: PathBuf::from("socioeconomic_full.csv"),
            healthcare_input: PathBuf::from("healthcare_uninsured_counts.csv"),
            food_atlas_input: PathBuf::from("food_access_research_atlas.csv"),
            socioeconomic_output: PathBuf::from("socioeconomic_sev.csv"),
            healthcare_output: PathBuf::from("healthcare_resilience.csv"),
            food_output: PathBuf::from("food_access_score.csv"),
            canonical_output: PathBuf::from("community_resilience_index.csv"),
            jurisdiction: Some(DEFAULT_STATE_FIPS.to_string()),
            weights: CompositeWeights::default(),
            min_join_coverage: DEFAULT_MIN_JOIN_COVERAGE,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a JSON file; absent fields take defaults
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading pipeline config from {:?}", path);
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    /// Resolve a configured path against `data_dir`
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.data_dir.join(path)
        }
    }

    pub fn compose_options(&self) -> ComposeOptions {
        ComposeOptions {
            weights: self.weights,
            min_join_coverage: self.min_join_coverage,
        }
    }
}
