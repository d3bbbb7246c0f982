//! SEH (visit) pipeline
//!
//! Turns visit rows into numeric visit features, the normalized complaint
//! text and, when fitting, the admission target. The visit time table is
//! produced alongside for the surviving visits.

use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Builder, StringBuilder, UInt8Builder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDateTime, Timelike, Weekday};

use crate::codebook::CodeBook;
use crate::encoding::{Mode, OneHotEncoder, TransformKey, TransformSource};
use crate::error::Result;
use crate::models::{RawVisitRow, SourceRecord, VisitTimes};
use crate::pipeline::{PipelineOptions, RequiredField, before_cutoff, present, retain_required};
use crate::transform::{TextNormalizer, TimeMerger, parse_decimal_comma};
use crate::utils::logging::log_stage;

const DOMAIN: &str = RawVisitRow::DOMAIN;

/// Label-encoded visit column
pub const SEX_COLUMN: &str = "GESLACHT";
/// One-hot encoded visit columns, in output order
pub const ONE_HOT_COLUMNS: [&str; 2] = ["VVCODE", "SPECIALISM"];

/// Age groups are five years wide; the last group is open-ended
const AGE_GROUP_WIDTH: f64 = 5.0;
const LAST_AGE_GROUP: f64 = 19.0;
/// Hours of the day per arrival time group
const HOURS_PER_TIME_GROUP: u32 = 6;
/// Highest valid triage urgency
const MAX_TRIAGE_CODE: f64 = 5.0;

/// Feature values of one visit
#[derive(Debug, Clone, PartialEq)]
pub struct VisitFeatureRow {
    /// Position of the visit in the input rows
    pub source_index: usize,
    pub visit_id: String,
    pub patient_id: String,
    pub arrival: Option<NaiveDateTime>,
    /// Aligned with [`VisitFeatures::columns`]
    pub values: Vec<Option<f64>>,
    /// Normalized complaint text
    pub complaint: String,
    /// Admission target; fit runs only
    pub admitted: Option<u8>,
}

/// Visit feature table
#[derive(Debug, Clone, PartialEq)]
pub struct VisitFeatures {
    pub columns: Vec<String>,
    pub rows: Vec<VisitFeatureRow>,
}

impl VisitFeatures {
    /// Arrow batch: `SEHID`, `PATIENTNR`, the feature columns, `KLACHT`, and
    /// `OPNAME` when the rows carry a target
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let with_target = self.rows.iter().any(|row| row.admitted.is_some());

        let mut fields = vec![
            Field::new("SEHID", DataType::Utf8, false),
            Field::new("PATIENTNR", DataType::Utf8, false),
        ];
        fields.extend(
            self.columns
                .iter()
                .map(|c| Field::new(c, DataType::Float64, true)),
        );
        fields.push(Field::new("KLACHT", DataType::Utf8, false));

        let mut visit_ids = StringBuilder::new();
        let mut patient_ids = StringBuilder::new();
        let mut complaints = StringBuilder::new();
        for row in &self.rows {
            visit_ids.append_value(&row.visit_id);
            patient_ids.append_value(&row.patient_id);
            complaints.append_value(&row.complaint);
        }

        let mut arrays: Vec<ArrayRef> = vec![
            Arc::new(visit_ids.finish()),
            Arc::new(patient_ids.finish()),
        ];
        for col in 0..self.columns.len() {
            let mut builder = Float64Builder::with_capacity(self.rows.len());
            for row in &self.rows {
                builder.append_option(row.values[col]);
            }
            arrays.push(Arc::new(builder.finish()));
        }
        arrays.push(Arc::new(complaints.finish()));

        if with_target {
            fields.push(Field::new("OPNAME", DataType::UInt8, true));
            let mut targets = UInt8Builder::with_capacity(self.rows.len());
            for row in &self.rows {
                targets.append_option(row.admitted);
            }
            arrays.push(Arc::new(targets.finish()));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Output of one SEH run
#[derive(Debug, Clone)]
pub struct VisitOutput {
    pub features: VisitFeatures,
    /// Timestamps of the surviving visits
    pub times: Vec<VisitTimes>,
}

/// A visit being cleaned
struct VisitRow {
    source_index: usize,
    raw: RawVisitRow,
    admitted: Option<u8>,
    arrival: Option<NaiveDateTime>,
    triage: Option<NaiveDateTime>,
    registration: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
}

/// Visit cleaning for one codebook
#[derive(Debug)]
pub struct VisitPipeline<'a> {
    codebook: &'a CodeBook,
    times: TimeMerger,
    complaint_text: TextNormalizer,
    options: PipelineOptions,
}

impl<'a> VisitPipeline<'a> {
    #[must_use]
    pub fn new(codebook: &'a CodeBook) -> Self {
        Self {
            codebook,
            times: TimeMerger::default(),
            // '#' marks a fracture in complaints
            complaint_text: TextNormalizer::dutch(&codebook.preserved_acronym).keeping('#'),
            options: PipelineOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Encoders a transform-only run needs
    #[must_use]
    pub fn required_transforms() -> Vec<TransformKey> {
        let mut keys = vec![TransformKey::label_encoder(SEX_COLUMN)];
        keys.extend(ONE_HOT_COLUMNS.iter().map(|c| TransformKey::one_hot_encoder(c)));
        keys
    }

    /// Run every stage
    pub fn run(
        &self,
        rows: Vec<RawVisitRow>,
        source: &mut TransformSource<'_>,
    ) -> Result<VisitOutput> {
        let mode = source.mode();
        log_stage(DOMAIN, "loading", rows.len());

        let indexed: Vec<(usize, RawVisitRow)> = rows.into_iter().enumerate().collect();
        let mut rows = match mode {
            Mode::Fit => {
                let required: [RequiredField<(usize, RawVisitRow)>; 8] = [
                    ("SEHID", |(_, r)| r.visit_id.as_ref()),
                    ("PATIENTNR", |(_, r)| r.patient_id.as_ref()),
                    ("BESTEMMING", |(_, r)| r.disposition.as_ref()),
                    ("AANKSDATUM", |(_, r)| r.arrival_date.as_ref()),
                    ("TRIADATUM", |(_, r)| r.triage_date.as_ref()),
                    ("TRIAGETIJD", |(_, r)| r.triage_time.as_ref()),
                    ("AGE", |(_, r)| r.age.as_ref()),
                    ("KLACHT", |(_, r)| r.complaint.as_ref()),
                ];
                retain_required(DOMAIN, indexed, &required)
            }
            Mode::TransformOnly => {
                let required: [RequiredField<(usize, RawVisitRow)>; 4] = [
                    ("SEHID", |(_, r)| r.visit_id.as_ref()),
                    ("PATIENTNR", |(_, r)| r.patient_id.as_ref()),
                    ("AANKSDATUM", |(_, r)| r.arrival_date.as_ref()),
                    ("AANKSTIJD", |(_, r)| r.arrival_time.as_ref()),
                ];
                retain_required(DOMAIN, indexed, &required)
            }
        };

        // Target label
        let mut targeted: Vec<(usize, RawVisitRow, Option<u8>)> = Vec::with_capacity(rows.len());
        for (idx, raw) in rows.drain(..) {
            let admitted = match mode {
                Mode::Fit => {
                    let disposition = present(raw.disposition.as_ref()).unwrap_or_default();
                    match self.codebook.dispositions.target(disposition) {
                        Some(target) => Some(target),
                        None => continue,
                    }
                }
                Mode::TransformOnly => None,
            };
            targeted.push((idx, raw, admitted));
        }
        log_stage(DOMAIN, "target label", targeted.len());

        targeted.retain(|(_, raw, _)| {
            before_cutoff(
                mode,
                &self.times,
                present(raw.arrival_date.as_ref()),
                self.options.arrival_cutoff,
            )
        });
        log_stage(DOMAIN, "arrival cutoff", targeted.len());

        let visits = self.resolve_times(targeted);
        log_stage(DOMAIN, "time resolution", visits.len());

        self.build_features(visits, source)
    }

    /// Merge visit timestamps; visits without a parseable arrival date are dropped
    fn resolve_times(&self, rows: Vec<(usize, RawVisitRow, Option<u8>)>) -> Vec<VisitRow> {
        rows.into_iter()
            .filter_map(|(source_index, raw, admitted)| {
                present(raw.arrival_date.as_ref()).and_then(|d| self.times.parse_date(d))?;

                let arrival = self.times.merge(
                    present(raw.arrival_date.as_ref()),
                    present(raw.arrival_time.as_ref()),
                );
                let triage = self.times.merge(
                    present(raw.triage_date.as_ref()),
                    present(raw.triage_time.as_ref()),
                );
                let (registration, end) = match arrival {
                    Some(arrival) => (
                        self.times
                            .resolve_after(arrival, present(raw.registration_time.as_ref())),
                        self.times.resolve_after(arrival, present(raw.end_time.as_ref())),
                    ),
                    None => (None, None),
                };

                Some(VisitRow {
                    source_index,
                    raw,
                    admitted,
                    arrival,
                    triage,
                    registration,
                    end,
                })
            })
            .collect()
    }

    fn build_features(
        &self,
        visits: Vec<VisitRow>,
        source: &mut TransformSource<'_>,
    ) -> Result<VisitOutput> {
        let mode = source.mode();

        let sex_encoder = source.label_encoder(
            SEX_COLUMN,
            visits.iter().filter_map(|v| present(v.raw.sex.as_ref())),
        )?;
        let arrival_mode_encoder = source.one_hot_encoder(
            ONE_HOT_COLUMNS[0],
            visits.iter().map(|v| present(v.raw.arrival_mode.as_ref())),
            self.options.one_hot_min_count,
        )?;
        let specialism_encoder = source.one_hot_encoder(
            ONE_HOT_COLUMNS[1],
            visits.iter().map(|v| present(v.raw.specialism.as_ref())),
            self.options.one_hot_min_count,
        )?;
        log_stage(DOMAIN, "category encoding", visits.len());

        let columns = feature_columns(&arrival_mode_encoder, &specialism_encoder);

        let mut rows = Vec::with_capacity(visits.len());
        let mut times = Vec::with_capacity(visits.len());

        for visit in visits {
            let raw = &visit.raw;
            let complaint = self
                .complaint_text
                .normalize_to_string(present(raw.complaint.as_ref()).unwrap_or_default());
            if mode == Mode::Fit && complaint.is_empty() {
                continue;
            }

            let sex = present(raw.sex.as_ref()).and_then(|s| sex_encoder.transform(s));
            if sex.is_none() {
                log::debug!("[{DOMAIN}] unknown {SEX_COLUMN} {:?}", raw.sex);
            }

            let mut values = vec![
                self.arrival_time_group(raw),
                sex.map(f64::from),
                present(raw.age.as_ref()).and_then(age_group),
                present(raw.previous_visits.as_ref()).and_then(parse_decimal_comma),
                present(raw.previous_admission_percentage.as_ref())
                    .and_then(parse_decimal_comma),
                self.weekend(raw),
            ];
            values.extend(
                arrival_mode_encoder
                    .transform(present(raw.arrival_mode.as_ref()))
                    .into_iter()
                    .map(Some),
            );
            values.extend(
                specialism_encoder
                    .transform(present(raw.specialism.as_ref()))
                    .into_iter()
                    .map(Some),
            );
            values.push(present(raw.triage_code.as_ref()).and_then(triage_code));

            let visit_id = raw.visit_id.clone().unwrap_or_default();
            times.push(VisitTimes {
                visit_id: visit_id.clone(),
                arrival: visit.arrival,
                triage: visit.triage,
                registration: visit.registration,
                end: visit.end,
            });
            rows.push(VisitFeatureRow {
                source_index: visit.source_index,
                visit_id,
                patient_id: raw.patient_id.clone().unwrap_or_default(),
                arrival: visit.arrival,
                values,
                complaint,
                admitted: visit.admitted,
            });
        }
        log_stage(DOMAIN, "complaint text", rows.len());

        Ok(VisitOutput {
            features: VisitFeatures { columns, rows },
            times,
        })
    }

    /// Arrival hour grouped into quarters of the day
    fn arrival_time_group(&self, raw: &RawVisitRow) -> Option<f64> {
        let time = self.times.parse_time(present(raw.arrival_time.as_ref())?)?;
        Some(f64::from(time.hour() / HOURS_PER_TIME_GROUP))
    }

    fn weekend(&self, raw: &RawVisitRow) -> Option<f64> {
        let date = self.times.parse_date(present(raw.arrival_date.as_ref())?)?;
        let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
        Some(if weekend { 1.0 } else { 0.0 })
    }
}

/// Visit feature columns in output order for the fitted one-hot encoders
#[must_use]
pub fn feature_columns(arrival_mode: &OneHotEncoder, specialism: &OneHotEncoder) -> Vec<String> {
    let mut columns: Vec<String> = [
        "AANKSTIJD",
        SEX_COLUMN,
        "AGE",
        "PreviousVisits",
        "PrevAdmissionPercentage",
        "WEEKEND",
    ]
    .iter()
    .map(|c| (*c).to_string())
    .collect();
    columns.extend(arrival_mode.feature_names());
    columns.extend(specialism.feature_names());
    columns.push("TRIANIVCOD".to_string());
    columns
}

/// Age group index: `[0, 5)` is 0, `[95, inf)` is 19; negative ages are missing
#[must_use]
pub fn age_group(raw: &str) -> Option<f64> {
    let age = parse_decimal_comma(raw)?;
    if age < 0.0 {
        return None;
    }
    Some((age / AGE_GROUP_WIDTH).floor().min(LAST_AGE_GROUP))
}

/// Triage urgency from a code such as `U2`; valid codes are 0 to 5
#[must_use]
pub fn triage_code(raw: &str) -> Option<f64> {
    let code: f64 = raw.trim().trim_matches('U').trim().parse().ok()?;
    (code.fract() == 0.0 && (0.0..=MAX_TRIAGE_CODE).contains(&code)).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_groups() {
        assert_eq!(age_group("0"), Some(0.0));
        assert_eq!(age_group("4.9"), Some(0.0));
        assert_eq!(age_group("5"), Some(1.0));
        assert_eq!(age_group("67"), Some(13.0));
        assert_eq!(age_group("95"), Some(19.0));
        assert_eq!(age_group("104"), Some(19.0));
        assert_eq!(age_group("-1"), None);
        assert_eq!(age_group("onbekend"), None);
    }

    #[test]
    fn test_triage_codes() {
        assert_eq!(triage_code("U2"), Some(2.0));
        assert_eq!(triage_code("0"), Some(0.0));
        assert_eq!(triage_code("U6"), None);
        assert_eq!(triage_code("U"), None);
        assert_eq!(triage_code("2.5"), None);
    }
}
