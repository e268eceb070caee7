//! Full batch run: raw tables -> stages -> composer -> canonical table
//!
//! Stages run one after another on complete tables. Nothing is written until
//! the composer has accepted the join; then the intermediate tables and the
//! canonical table are written together.

use crate::canonical::{write_canonical, CriRecord};
use crate::composer::{compose, ComposeOptions, CompositionReport, SubScoreTable};
use crate::food::{self, FoodScore};
use crate::healthcare::{self, HealthcareScore};
use crate::socioeconomic::{self, SocioeconomicScore};
use crate::stage::StageOutput;
use crate::table::RawTable;
use crate::{PipelineConfig, RegionKey, Result};
use serde::Serialize;
use tracing::info;

/// Raw source tables for one batch
#[derive(Debug, Clone)]
pub struct SourceTables {
    pub socioeconomic: RawTable,
    pub healthcare: RawTable,
    pub food_atlas: RawTable,
}

impl SourceTables {
    pub fn load(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            socioeconomic: RawTable::from_path(
                socioeconomic::STAGE,
                config.resolve(&config.socioeconomic_input),
            )?,
            healthcare: RawTable::from_path(healthcare::STAGE, config.resolve(&config.healthcare_input))?,
            food_atlas: RawTable::from_path(food::STAGE, config.resolve(&config.food_atlas_input))?,
        })
    }
}

/// Everything a batch run produced
#[derive(Debug)]
pub struct PipelineRun {
    pub socioeconomic: StageOutput<SocioeconomicScore>,
    pub healthcare: StageOutput<HealthcareScore>,
    pub food: StageOutput<FoodScore>,
    pub records: Vec<CriRecord>,
    pub report: CompositionReport,
}

/// Run statistics reported once a batch finishes
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub composition: CompositionReport,
    pub healthcare_faults: usize,
}

impl PipelineRun {
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            generated_at: chrono::Utc::now().to_rfc3339(),
            composition: self.report.clone(),
            healthcare_faults: self.healthcare.faults.len(),
        }
    }
}

/// Run every stage and the composer in memory
pub fn run_tables(
    sources: &SourceTables,
    jurisdiction: Option<&str>,
    options: &ComposeOptions,
) -> Result<PipelineRun> {
    let socio = socioeconomic::compute(&sources.socioeconomic)?;
    let health = healthcare::compute(&sources.healthcare)?;

    let universe: Vec<RegionKey> = socio.rows.iter().map(|r| r.key.clone()).collect();
    let food_out = food::compute(&sources.food_atlas, &universe, jurisdiction)?;

    let composition = compose(
        &SubScoreTable::from_stage(&socio),
        &SubScoreTable::from_stage(&food_out),
        &SubScoreTable::from_stage(&health),
        options,
    )?;

    Ok(PipelineRun {
        socioeconomic: socio,
        healthcare: health,
        food: food_out,
        records: composition.records,
        report: composition.report,
    })
}

/// Load the configured inputs, run the batch and persist every table
pub fn run(config: &PipelineConfig) -> Result<PipelineRun> {
    info!("{}", "=".repeat(60));
    info!("Community Resilience Index batch");
    info!("{}", "=".repeat(60));

    let sources = SourceTables::load(config)?;
    let run = run_tables(&sources, config.jurisdiction.as_deref(), &config.compose_options())?;

    run.socioeconomic
        .write_csv(config.resolve(&config.socioeconomic_output))?;
    run.healthcare.write_csv(config.resolve(&config.healthcare_output))?;
    run.food.write_csv(config.resolve(&config.food_output))?;
    write_canonical(config.resolve(&config.canonical_output), &run.records)?;

    Ok(run)
}

/// Compose from previously persisted stage tables
pub fn compose_from_intermediates(config: &PipelineConfig) -> Result<Vec<CriRecord>> {
    let socio = SubScoreTable::from_csv(
        socioeconomic::STAGE,
        config.resolve(&config.socioeconomic_output),
        socioeconomic::RESILIENCE_COLUMN,
    )?;
    let food_scores = SubScoreTable::from_csv(
        food::STAGE,
        config.resolve(&config.food_output),
        food::RESILIENCE_COLUMN,
    )?;
    let health = SubScoreTable::from_csv(
        healthcare::STAGE,
        config.resolve(&config.healthcare_output),
        healthcare::RESILIENCE_COLUMN,
    )?;

    let composition = compose(&socio, &food_scores, &health, &config.compose_options())?;
    write_canonical(config.resolve(&config.canonical_output), &composition.records)?;
    Ok(composition.records)
}
