//! LAB pipeline
//!
//! Raw lab results are filtered, anchored in time, mapped onto canonical
//! labels, parsed into numbers and scaled per label. The cleaned long table
//! is kept for training; the latest result per (patient, label) is pivoted
//! into the tidy feature table.

use chrono::NaiveDateTime;

use crate::codebook::CodeBook;
use crate::encoding::{Mode, TransformKey, TransformSource};
use crate::error::Result;
use crate::models::{FeatureTable, LabObservation, RawLabRow, SourceRecord};
use crate::pipeline::{
    PipelineOptions, RequiredField, Scalable, before_cutoff, present, retain_required,
    scale_per_metric,
};
use crate::transform::{
    CodeResolver, Observation, PENDING_VALUE, TimeMerger, ValueNormalizer, latest_per_group,
    pivot,
};
use crate::utils::logging::log_stage;

const DOMAIN: &str = RawLabRow::DOMAIN;

/// Output of one LAB run
#[derive(Debug, Clone)]
pub struct LabOutput {
    /// Every cleaned and scaled result, before deduplication
    pub observations: Vec<LabObservation>,
    /// Latest result per patient and label
    pub features: FeatureTable,
}

/// A result being cleaned; pending results are kept out of scaling
struct LabRow {
    observation: LabObservation,
    pending: bool,
}

impl Scalable for LabRow {
    fn metric(&self) -> &str {
        &self.observation.label
    }

    fn scalable_value(&self) -> Option<f64> {
        if self.pending {
            None
        } else {
            self.observation.value
        }
    }

    fn set_value(&mut self, value: f64) {
        self.observation.value = Some(value);
    }
}

impl Observation for LabObservation {
    fn patient_id(&self) -> &str {
        &self.patient_id
    }

    fn metric(&self) -> &str {
        &self.label
    }

    fn observed_at(&self) -> Option<NaiveDateTime> {
        self.reported.or(self.drawn)
    }
}

/// Lab cleaning for one codebook
#[derive(Debug, Clone)]
pub struct LabPipeline<'a> {
    codebook: &'a CodeBook,
    resolver: CodeResolver,
    times: TimeMerger,
    options: PipelineOptions,
}

impl<'a> LabPipeline<'a> {
    #[must_use]
    pub fn new(codebook: &'a CodeBook) -> Self {
        Self {
            codebook,
            resolver: CodeResolver::new(&codebook.lab_groups),
            times: TimeMerger::default(),
            options: PipelineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Scalers a transform-only run needs: one per lab label
    #[must_use]
    pub fn required_transforms(codebook: &CodeBook) -> Vec<TransformKey> {
        codebook
            .lab_labels()
            .iter()
            .map(|label| TransformKey::scaler(label))
            .collect()
    }

    /// Run every stage
    pub fn run(&self, rows: Vec<RawLabRow>, source: &mut TransformSource<'_>) -> Result<LabOutput> {
        let mode = source.mode();
        log_stage(DOMAIN, "loading", rows.len());

        let required: [RequiredField<RawLabRow>; 5] = [
            ("PATIENTNR", |r| r.patient_id.as_ref()),
            ("BEPCODE", |r| r.code.as_ref()),
            ("UITSLAG", |r| r.result.as_ref()),
            ("AFDATUM", |r| r.draw_date.as_ref()),
            ("AFTIJD", |r| r.draw_time.as_ref()),
        ];
        let mut rows = retain_required(DOMAIN, rows, &required);

        rows.retain(|row| {
            before_cutoff(
                mode,
                &self.times,
                present(row.arrival_date.as_ref()),
                self.options.arrival_cutoff,
            )
        });
        log_stage(DOMAIN, "arrival cutoff", rows.len());

        let timed = self.resolve_times(rows);
        log_stage(DOMAIN, "time resolution", timed.len());

        let resolved = self.resolver.resolve_rows(timed, |row| row.observation.code.as_str());
        log_stage(DOMAIN, "code resolution", resolved.len());

        let normalizer = ValueNormalizer::for_mode(mode);
        let mut cleaned: Vec<LabRow> = resolved
            .into_iter()
            .map(|(mut row, label)| {
                let raw = row.raw_result;
                row.observation.label = label;
                row.observation.value = normalizer.normalize(&raw);
                if row.observation.value.is_none() {
                    log::debug!("[{DOMAIN}] unparseable result {raw:?}");
                }
                LabRow {
                    pending: normalizer.is_pending(&raw),
                    observation: row.observation,
                }
            })
            .collect();
        log_stage(DOMAIN, "value cleaning", cleaned.len());

        let pending = cleaned.iter().filter(|row| row.pending).count();
        if pending > 0 {
            log::warn!("[{DOMAIN}] {pending} pending results emitted unscaled as {PENDING_VALUE}");
        }

        scale_per_metric(DOMAIN, &mut cleaned, &self.codebook.lab_labels(), source)?;

        let observations: Vec<LabObservation> =
            cleaned.into_iter().map(|row| row.observation).collect();

        let latest = latest_per_group(observations.clone());
        log_stage(DOMAIN, "deduplication", latest.len());

        let features = pivot(
            "PATIENTNR",
            &self.codebook.lab_labels(),
            latest
                .into_iter()
                .map(|obs| (obs.patient_id, obs.label, obs.value)),
        )?;
        log_stage(DOMAIN, "reshaping", features.len());

        if mode == Mode::Fit {
            log::info!("[{DOMAIN}] fitted on {} results", observations.len());
        }
        Ok(LabOutput {
            observations,
            features,
        })
    }

    /// Merge arrival, draw and result times; drop results drawn at or before arrival
    fn resolve_times(&self, rows: Vec<RawLabRow>) -> Vec<TimedLabRow> {
        rows.into_iter()
            .filter_map(|row| {
                let drawn = self.times.merge(
                    present(row.draw_date.as_ref()),
                    present(row.draw_time.as_ref()),
                )?;
                let arrival = self.times.merge(
                    present(row.arrival_date.as_ref()),
                    present(row.arrival_time.as_ref()),
                );
                if arrival.is_some_and(|arrival| drawn <= arrival) {
                    return None;
                }

                let reported = match present(row.result_date.as_ref()) {
                    Some(date) => self
                        .times
                        .merge(Some(date), present(row.result_time.as_ref())),
                    None => self
                        .times
                        .resolve_after(drawn, present(row.result_time.as_ref())),
                };

                Some(TimedLabRow {
                    raw_result: row.result.unwrap_or_default(),
                    observation: LabObservation {
                        visit_id: row.visit_id,
                        patient_id: row.patient_id.unwrap_or_default(),
                        code: row.code.unwrap_or_default(),
                        label: String::new(),
                        value: None,
                        arrival,
                        drawn: Some(drawn),
                        reported,
                    },
                })
            })
            .collect()
    }
}

/// A result with resolved timestamps and its raw result text
struct TimedLabRow {
    raw_result: String,
    observation: LabObservation,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::EncoderRegistry;

    fn lab(patient: &str, code: &str, result: &str, draw_time: &str) -> RawLabRow {
        RawLabRow {
            visit_id: Some("S1".to_string()),
            patient_id: Some(patient.to_string()),
            code: Some(code.to_string()),
            result: Some(result.to_string()),
            arrival_date: Some("2022-03-01".to_string()),
            arrival_time: Some("10:00:00".to_string()),
            draw_date: Some("2022-03-01".to_string()),
            draw_time: Some(draw_time.to_string()),
            result_date: None,
            result_time: Some("00:30:00".to_string()),
        }
    }

    #[test]
    fn test_draws_before_arrival_are_dropped() {
        let codebook = CodeBook::default();
        let pipeline = LabPipeline::new(&codebook);
        let mut registry = EncoderRegistry::new("unused");

        let rows = vec![
            lab("1", "CS000168", "4.1", "09:00:00"),
            lab("1", "CS000168", "4.5", "10:00:00"),
            lab("1", "CS000168", "3.9", "11:00:00"),
        ];
        let output = pipeline
            .run(rows, &mut TransformSource::Fit(&mut registry))
            .unwrap();

        assert_eq!(output.observations.len(), 1);
        let obs = &output.observations[0];
        assert_eq!(obs.label, "Kalium");
        // The result time rolls over to the next day
        assert_eq!(
            obs.reported.map(|t| t.format("%Y-%m-%d %H:%M").to_string()),
            Some("2022-03-02 00:30".to_string())
        );
    }

    #[test]
    fn test_pending_survives_transform_only() {
        let codebook = CodeBook::default();
        let pipeline = LabPipeline::new(&codebook);

        let mut registry = EncoderRegistry::new("unused");
        pipeline
            .run(
                vec![
                    lab("1", "CS000277", "10", "11:00:00"),
                    lab("2", "CS000277", "30", "11:00:00"),
                ],
                &mut TransformSource::Fit(&mut registry),
            )
            .unwrap();

        let output = pipeline
            .run(
                vec![
                    lab("3", "CS000277", "-volgt-", "11:00:00"),
                    lab("4", "CS000277", "20", "11:00:00"),
                ],
                &mut TransformSource::Fitted(&registry),
            )
            .unwrap();

        assert_eq!(output.features.value("3", "CRP"), Some(-1.0));
        assert_eq!(output.features.value("4", "CRP"), Some(0.5));
    }
}
