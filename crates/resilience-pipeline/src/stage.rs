//! Shared stage plumbing: keyed rows, stage output tables, CSV persistence

use crate::{PipelineError, RegionKey, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use tracing::{info, warn};

/// A row that belongs to exactly one region
pub trait Keyed {
    fn key(&self) -> &RegionKey;
}

/// Complete output of one pipeline stage
///
/// `faults` holds per-region problems that were absorbed into missing
/// values; they never abort the batch.
#[derive(Debug)]
pub struct StageOutput<T> {
    pub stage: &'static str,
    pub rows: Vec<T>,
    pub faults: Vec<PipelineError>,
}

impl<T: Keyed> StageOutput<T> {
    /// Build a stage output, rejecting duplicate region keys
    pub fn new(stage: &'static str, rows: Vec<T>, faults: Vec<PipelineError>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            if !seen.insert(row.key()) {
                return Err(PipelineError::DuplicateRegion {
                    stage,
                    region: row.key().fips(),
                });
            }
        }

        for fault in &faults {
            warn!("{}: {}", stage, fault);
        }

        Ok(Self { stage, rows, faults })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl<T: Serialize> StageOutput<T> {
    /// Persist the stage table for the next stage to pick up
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        write_rows(path, &self.rows)?;
        Ok(())
    }
}

/// Write serializable rows as CSV, creating parent directories
pub fn write_rows<T: Serialize>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_writer(BufWriter::new(File::create(path)?));
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}
