//! VITALS pipeline
//!
//! Vital sign readings are mapped onto canonical labels, parsed (decimal
//! comma tolerated), range checked, scaled per label and reduced to the
//! latest reading per (patient, label).

use std::path::Path;

use chrono::NaiveDateTime;

use crate::codebook::CodeBook;
use crate::encoding::{TransformKey, TransformSource};
use crate::error::Result;
use crate::models::{FeatureTable, RawVitalRow, SourceRecord, VitalObservation};
use crate::pipeline::{RequiredField, Scalable, present, retain_required, scale_per_metric};
use crate::transform::{Observation, TimeMerger, latest_per_group, parse_decimal_comma, pivot};
use crate::utils::arrow::rows_to_batch;
use crate::utils::io::{OutputFormat, TableWriter};
use crate::utils::logging::{create_main_progress_bar, finish_progress_bar, log_stage};

const DOMAIN: &str = RawVitalRow::DOMAIN;

/// Output of one VITALS run
#[derive(Debug, Clone)]
pub struct VitalsOutput {
    /// Every cleaned and scaled reading, before deduplication
    pub observations: Vec<VitalObservation>,
    /// Latest reading per patient and label
    pub features: FeatureTable,
}

impl VitalsOutput {
    /// Write the long table in fixed-size row batches, header once
    pub fn write_observations(
        &self,
        path: &Path,
        batch_size: usize,
        format: OutputFormat,
    ) -> Result<usize> {
        // An empty first batch carries the header even when nothing survived
        let first = rows_to_batch(&self.observations[..0])?;
        let mut writer = TableWriter::create(path, first.schema(), format)?;
        writer.write(&first)?;

        let pb = create_main_progress_bar(self.observations.len() as u64, Some("VITALS"));
        for chunk in self.observations.chunks(batch_size.max(1)) {
            writer.write(&rows_to_batch(chunk)?)?;
            pb.inc(chunk.len() as u64);
        }
        finish_progress_bar(&pb, Some("VITALS written"));

        writer.finish()
    }
}

impl Scalable for VitalObservation {
    fn metric(&self) -> &str {
        &self.label
    }

    fn scalable_value(&self) -> Option<f64> {
        Some(self.value)
    }

    fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}

impl Observation for VitalObservation {
    fn patient_id(&self) -> &str {
        &self.patient_id
    }

    fn metric(&self) -> &str {
        &self.label
    }

    fn observed_at(&self) -> Option<NaiveDateTime> {
        self.recorded_at
    }
}

/// Vital sign cleaning for one codebook
#[derive(Debug, Clone)]
pub struct VitalsPipeline<'a> {
    codebook: &'a CodeBook,
    times: TimeMerger,
}

impl<'a> VitalsPipeline<'a> {
    #[must_use]
    pub fn new(codebook: &'a CodeBook) -> Self {
        Self {
            codebook,
            times: TimeMerger::default(),
        }
    }

    /// Scalers a transform-only run needs: one per scaled vital label
    #[must_use]
    pub fn required_transforms(codebook: &CodeBook) -> Vec<TransformKey> {
        codebook
            .scaled_vital_labels()
            .iter()
            .map(|label| TransformKey::scaler(label))
            .collect()
    }

    /// Run every stage
    pub fn run(
        &self,
        rows: Vec<RawVitalRow>,
        source: &mut TransformSource<'_>,
    ) -> Result<VitalsOutput> {
        log_stage(DOMAIN, "loading", rows.len());

        // Aliases first, so every alias passes the known-label filter
        let mut rows: Vec<RawVitalRow> = rows
            .into_iter()
            .map(|mut row| {
                row.label = present(row.label.as_ref())
                    .and_then(|raw| self.codebook.canonical_vital_label(raw))
                    .map(str::to_string);
                row
            })
            .collect();
        log_stage(DOMAIN, "label merging", rows.len());

        let required: [RequiredField<RawVitalRow>; 3] = [
            ("PATIENTNR", |r| r.patient_id.as_ref()),
            ("LABEL", |r| r.label.as_ref()),
            ("Value1", |r| r.value.as_ref()),
        ];
        rows = retain_required(DOMAIN, rows, &required);

        let mut readings: Vec<VitalObservation> = rows
            .into_iter()
            .filter_map(|row| {
                let Some(value) = present(row.value.as_ref()).and_then(parse_decimal_comma) else {
                    log::debug!("[{DOMAIN}] unparseable reading {:?}", row.value);
                    return None;
                };
                Some(VitalObservation {
                    recorded_at: present(row.recorded_at.as_ref())
                        .and_then(|ts| self.times.parse_datetime(ts)),
                    arrival: self.times.merge(
                        present(row.arrival_date.as_ref()),
                        present(row.arrival_time.as_ref()),
                    ),
                    patient_id: row.patient_id.unwrap_or_default(),
                    label: row.label.unwrap_or_default(),
                    value,
                })
            })
            .collect();
        log_stage(DOMAIN, "numeric parsing", readings.len());

        readings.retain(|reading| {
            self.codebook
                .vital(&reading.label)
                .is_some_and(|spec| spec.in_range(reading.value))
        });
        log_stage(DOMAIN, "range filtering", readings.len());

        scale_per_metric(
            DOMAIN,
            &mut readings,
            &self.codebook.scaled_vital_labels(),
            source,
        )?;

        let latest = latest_per_group(readings.clone());
        log_stage(DOMAIN, "deduplication", latest.len());

        let features = pivot(
            "PATIENTNR",
            &self.codebook.vital_labels(),
            latest
                .into_iter()
                .map(|obs| (obs.patient_id, obs.label, Some(obs.value))),
        )?;
        log_stage(DOMAIN, "reshaping", features.len());

        Ok(VitalsOutput {
            observations: readings,
            features,
        })
    }
}
