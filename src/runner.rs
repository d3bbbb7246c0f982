//! Batch runs over training files
//!
//! A run reads whichever domain files it is given, pushes them through the
//! domain pipelines and writes the dated outputs. Fit runs persist every
//! fitted transform afterwards; transform runs load them first and fail
//! before reading any data if one is missing.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{Local, NaiveDate};

use crate::codebook::CodeBook;
use crate::config::{ServingConfig, TrainingConfig};
use crate::encoding::{EncoderRegistry, Mode, TransformKey, TransformSource};
use crate::error::util::ensure_directory;
use crate::error::{FeatureError, Result};
use crate::models::{RawLabRow, RawRadiologyRow, RawVisitRow, RawVitalRow};
use crate::pipeline::{
    LabPipeline, PipelineOptions, RadiologyPipeline, VisitPipeline, VitalsPipeline,
};
use crate::utils::arrow::rows_to_batch;
use crate::utils::io::{dated_output_path, default_output_dir, read_records, write_table};
use crate::utils::logging::{log_operation_complete, log_operation_start, log_warning};

/// Input files of one run; absent domains are skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunInputs {
    pub lab: Option<PathBuf>,
    pub vitals: Option<PathBuf>,
    pub visits: Option<PathBuf>,
    pub radiology: Option<PathBuf>,
}

impl RunInputs {
    fn first(&self) -> Option<&Path> {
        [&self.lab, &self.vitals, &self.visits, &self.radiology]
            .into_iter()
            .find_map(|p| p.as_deref())
    }

    fn is_empty(&self) -> bool {
        self.first().is_none()
    }
}

/// Files written by a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outputs: Vec<PathBuf>,
}

/// Runs the domain pipelines over files, in fit or transform-only mode
#[derive(Debug, Clone)]
pub struct TrainingRunner<'a> {
    codebook: &'a CodeBook,
    training: TrainingConfig,
    registries: ServingConfig,
    run_date: NaiveDate,
}

impl<'a> TrainingRunner<'a> {
    /// `registries` names the directories fitted transforms are written to and read from
    #[must_use]
    pub fn new(codebook: &'a CodeBook, training: TrainingConfig, registries: ServingConfig) -> Self {
        Self {
            codebook,
            training,
            registries,
            run_date: Local::now().date_naive(),
        }
    }

    /// Date used in output file names
    #[must_use]
    pub const fn with_run_date(mut self, date: NaiveDate) -> Self {
        self.run_date = date;
        self
    }

    /// Fit every transform on the inputs, persist them and write the outputs
    pub fn fit(&self, inputs: &RunInputs) -> Result<RunSummary> {
        let mut encoders = EncoderRegistry::new(&self.registries.feature_encoders_dir);
        let mut lab_scalers = EncoderRegistry::new(&self.registries.lab_scalers_dir);
        let mut vital_scalers = EncoderRegistry::new(&self.registries.vitals_scaler_dir);

        let summary = self.run(
            inputs,
            Mode::Fit,
            &mut TransformSource::Fit(&mut encoders),
            &mut TransformSource::Fit(&mut lab_scalers),
            &mut TransformSource::Fit(&mut vital_scalers),
        )?;

        if inputs.visits.is_some() {
            encoders.persist()?;
        }
        if inputs.lab.is_some() {
            lab_scalers.persist()?;
        }
        if inputs.vitals.is_some() {
            vital_scalers.persist()?;
        }
        Ok(summary)
    }

    /// Apply persisted transforms to the inputs and write the outputs
    pub fn transform(&self, inputs: &RunInputs) -> Result<RunSummary> {
        let load = |present: bool, dir: &Path, required: Vec<TransformKey>| {
            if present {
                EncoderRegistry::load(dir, &required)
            } else {
                Ok(EncoderRegistry::new(dir))
            }
        };
        let encoders = load(
            inputs.visits.is_some(),
            &self.registries.feature_encoders_dir,
            VisitPipeline::required_transforms(),
        )?;
        let lab_scalers = load(
            inputs.lab.is_some(),
            &self.registries.lab_scalers_dir,
            LabPipeline::required_transforms(self.codebook),
        )?;
        let vital_scalers = load(
            inputs.vitals.is_some(),
            &self.registries.vitals_scaler_dir,
            VitalsPipeline::required_transforms(self.codebook),
        )?;

        self.run(
            inputs,
            Mode::TransformOnly,
            &mut TransformSource::Fitted(&encoders),
            &mut TransformSource::Fitted(&lab_scalers),
            &mut TransformSource::Fitted(&vital_scalers),
        )
    }

    fn output_dir(&self, inputs: &RunInputs) -> Result<PathBuf> {
        let dir = match (&self.training.output_dir, inputs.first()) {
            (Some(dir), _) => dir.clone(),
            (None, Some(input)) => default_output_dir(input),
            (None, None) => {
                return Err(FeatureError::Config("no input files given".to_string()));
            }
        };
        ensure_directory(&dir)?;
        Ok(dir)
    }

    fn output_path(&self, dir: &Path, name: &str) -> PathBuf {
        dated_output_path(dir, self.run_date, name, self.training.output_format)
    }

    fn run(
        &self,
        inputs: &RunInputs,
        mode: Mode,
        encoders: &mut TransformSource<'_>,
        lab_scalers: &mut TransformSource<'_>,
        vital_scalers: &mut TransformSource<'_>,
    ) -> Result<RunSummary> {
        if inputs.is_empty() {
            return Err(FeatureError::Config("no input files given".to_string()));
        }
        let dir = self.output_dir(inputs)?;
        let options = PipelineOptions::from(&self.training);
        let format = self.training.output_format;
        let mut summary = RunSummary::default();
        log::info!("{mode:?} run ({options}) writing to {}", dir.display());

        if let Some(path) = &inputs.lab {
            let start = Instant::now();
            log_operation_start("Processing LAB", path);
            let rows = read_records::<RawLabRow>(path)?;
            let count = rows.len();
            let output = LabPipeline::new(self.codebook)
                .with_options(options.clone())
                .run(rows, lab_scalers)?;

            let processed = self.output_path(&dir, "LAB_processed");
            write_table(&processed, &rows_to_batch(&output.observations)?, format)?;
            let features = self.output_path(&dir, "LAB_features");
            write_table(&features, &output.features.to_record_batch()?, format)?;
            summary.outputs.extend([processed, features]);
            log_operation_complete("Processed", path, count, start);
        }

        if let Some(path) = &inputs.vitals {
            let start = Instant::now();
            log_operation_start("Processing VITALS", path);
            let rows = read_records::<RawVitalRow>(path)?;
            let count = rows.len();
            let output = VitalsPipeline::new(self.codebook).run(rows, vital_scalers)?;

            let processed = self.output_path(&dir, "VITALS_processed");
            output.write_observations(&processed, self.training.vitals_batch_size, format)?;
            let features = self.output_path(&dir, "VITALS_features");
            write_table(&features, &output.features.to_record_batch()?, format)?;
            summary.outputs.extend([processed, features]);
            log_operation_complete("Processed", path, count, start);
        }

        if let Some(path) = &inputs.visits {
            let start = Instant::now();
            log_operation_start("Processing SEH", path);
            let rows = read_records::<RawVisitRow>(path)?;
            let count = rows.len();
            let output = VisitPipeline::new(self.codebook)
                .with_options(options.clone())
                .run(rows, encoders)?;
            if output.features.rows.is_empty() {
                log_warning("No visits survived the SEH pipeline", Some(path));
            }

            let processed = self.output_path(&dir, "SEH_processed");
            write_table(&processed, &output.features.to_record_batch()?, format)?;
            let times = self.output_path(&dir, "time_processed");
            write_table(&times, &rows_to_batch(&output.times)?, format)?;
            summary.outputs.extend([processed, times]);
            log_operation_complete("Processed", path, count, start);
        }

        if let Some(path) = &inputs.radiology {
            let start = Instant::now();
            log_operation_start("Processing RAD", path);
            let rows = read_records::<RawRadiologyRow>(path)?;
            let count = rows.len();
            let reports = RadiologyPipeline::new(self.codebook)
                .with_options(options)
                .run(rows, mode)?;

            let processed = self.output_path(&dir, "RAD_processed");
            write_table(&processed, &rows_to_batch(&reports)?, format)?;
            summary.outputs.push(processed);
            log_operation_complete("Processed", path, count, start);
        }

        Ok(summary)
    }
}
