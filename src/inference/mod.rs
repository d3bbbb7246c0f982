//! Serving-side scoring of live visits
//!
//! The engine loads every persisted transform and model once and answers
//! requests against that read-only state. A request runs the transform-only
//! variant of the SEH, LAB and VITALS pipelines, left-joins the lab and vital
//! features onto the visits by patient, adds the complaint classifier's
//! probability and scores each visit with the model of its elapsed-time
//! bucket. A visit that cannot be scored gets an empty prediction; the other
//! visits of the request are unaffected.

pub mod buckets;
pub mod text;
pub mod tree;

use std::path::Path;
use std::time::Instant;

use chrono::NaiveDateTime;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::codebook::CodeBook;
use crate::config::ServingConfig;
use crate::encoding::{EncoderRegistry, TransformSource};
use crate::error::util::{safe_read_to_string, validate_directory};
use crate::error::{FeatureError, Result};
use crate::models::{FeatureTable, RawLabRow, RawVisitRow, RawVitalRow};
use crate::pipeline::visit::{self, ONE_HOT_COLUMNS};
use crate::pipeline::{LabPipeline, VisitFeatureRow, VisitPipeline, VitalsPipeline, present};

pub use buckets::{BucketTable, bucket_for};
pub use text::ComplaintClassifier;
pub use tree::TreeEnsemble;

/// Feature holding the complaint classifier's probability
pub const COMPLAINT_FEATURE: &str = "KLACHT_PRED";

/// Raw observations of a batch of visits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    #[serde(default)]
    pub seh_data: Vec<RawVisitRow>,
    #[serde(default)]
    pub lab_data: Vec<RawLabRow>,
    #[serde(default)]
    pub vital_data: Vec<RawVitalRow>,
}

impl PredictionRequest {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = safe_read_to_string(path, "prediction request")?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Why a visit received no prediction
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictionFailure {
    /// The SEH pipeline dropped the visit row
    #[error("visit row rejected by the SEH filters")]
    RowRejected,
    #[error("arrival lies after the scoring time")]
    ArrivalInFuture,
    #[error("arrival time could not be resolved")]
    MissingArrival,
    #[error("no model for the {0} minute bucket")]
    NoModelForBucket(u32),
    #[error("scoring failed: {0}")]
    Scoring(String),
}

/// Successful score of one visit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f64,
    /// Elapsed-time bucket whose model scored the visit
    pub bucket: u32,
}

/// One response entry; empty fields mark a visit without a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(rename = "SEHID")]
    pub visit_id: Option<String>,
    #[serde(rename = "PREDICTION")]
    pub prediction: Option<f64>,
    #[serde(rename = "TIMEDELTA")]
    pub time_delta: Option<u32>,
}

impl PredictionRecord {
    fn from_outcome(
        visit_id: Option<String>,
        outcome: std::result::Result<Prediction, PredictionFailure>,
    ) -> Self {
        match outcome {
            Ok(prediction) => Self {
                visit_id,
                prediction: Some(prediction.probability),
                time_delta: Some(prediction.bucket),
            },
            Err(failure) => {
                log::warn!(
                    "Failed to obtain prediction for {}: {failure}",
                    visit_id.as_deref().unwrap_or("<unknown>")
                );
                Self {
                    visit_id,
                    prediction: None,
                    time_delta: None,
                }
            }
        }
    }
}

/// Response envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub result: Vec<PredictionRecord>,
}

/// Loaded transforms and models, shared read-only across requests
#[derive(Debug)]
pub struct InferenceEngine {
    codebook: CodeBook,
    encoders: EncoderRegistry,
    lab_scalers: EncoderRegistry,
    vital_scalers: EncoderRegistry,
    classifier: ComplaintClassifier,
    models: BucketTable<TreeEnsemble>,
    layout: Vec<String>,
    bucket_minutes: u32,
    max_bucket_minutes: u32,
}

impl InferenceEngine {
    /// Load every transform and model named by the serving configuration
    ///
    /// Fails if any persisted transform or bucket model is missing.
    pub fn load(config: &ServingConfig, codebook: CodeBook) -> Result<Self> {
        let start = Instant::now();
        if config.bucket_minutes == 0 {
            return Err(FeatureError::Config(
                "bucket_minutes must be positive".to_string(),
            ));
        }

        let encoders = EncoderRegistry::load(
            &config.feature_encoders_dir,
            &VisitPipeline::required_transforms(),
        )?;
        let lab_scalers = EncoderRegistry::load(
            &config.lab_scalers_dir,
            &LabPipeline::required_transforms(&codebook),
        )?;
        let vital_scalers = EncoderRegistry::load(
            &config.vitals_scaler_dir,
            &VitalsPipeline::required_transforms(&codebook),
        )?;

        let layout = feature_layout(&codebook, &encoders)?;
        let classifier = ComplaintClassifier::from_json_file(&config.nlp_model)?;

        validate_directory(&config.model_dir, "bucket models")?;
        let mut entries = Vec::new();
        let mut bound = 0;
        while bound <= config.max_bucket_minutes {
            let path = config.model_dir.join(format!("{bound}_min_xgboost.json"));
            entries.push((bound, TreeEnsemble::from_json_file(&path, &layout)?));
            bound += config.bucket_minutes;
        }
        let models = BucketTable::new(entries);

        log::info!(
            "Loaded {} bucket models over {} features in {:?}",
            models.len(),
            layout.len(),
            start.elapsed()
        );

        Ok(Self {
            codebook,
            encoders,
            lab_scalers,
            vital_scalers,
            classifier,
            models,
            layout,
            bucket_minutes: config.bucket_minutes,
            max_bucket_minutes: config.max_bucket_minutes,
        })
    }

    /// Feature names in the order the models see them
    #[must_use]
    pub fn feature_layout(&self) -> &[String] {
        &self.layout
    }

    /// Score every visit row of a request, in input order
    ///
    /// Structural failures (a duplicate lab or vital observation reaching
    /// the reshape stage) fail the whole request.
    pub fn predict(
        &self,
        request: PredictionRequest,
        now: NaiveDateTime,
    ) -> Result<Vec<PredictionRecord>> {
        let visit_ids: Vec<Option<String>> = request
            .seh_data
            .iter()
            .map(|row| present(row.visit_id.as_ref()).map(str::to_string))
            .collect();

        let visits = VisitPipeline::new(&self.codebook)
            .run(request.seh_data, &mut TransformSource::Fitted(&self.encoders))?;
        let labs = LabPipeline::new(&self.codebook)
            .run(request.lab_data, &mut TransformSource::Fitted(&self.lab_scalers))?;
        let vitals = VitalsPipeline::new(&self.codebook)
            .run(request.vital_data, &mut TransformSource::Fitted(&self.vital_scalers))?;

        let by_source: FxHashMap<usize, &VisitFeatureRow> = visits
            .features
            .rows
            .iter()
            .map(|row| (row.source_index, row))
            .collect();

        Ok(visit_ids
            .into_iter()
            .enumerate()
            .map(|(index, visit_id)| {
                let outcome = by_source
                    .get(&index)
                    .ok_or(PredictionFailure::RowRejected)
                    .and_then(|row| self.score(row, &labs.features, &vitals.features, now));
                PredictionRecord::from_outcome(visit_id, outcome)
            })
            .collect())
    }

    fn score(
        &self,
        visit: &VisitFeatureRow,
        labs: &FeatureTable,
        vitals: &FeatureTable,
        now: NaiveDateTime,
    ) -> std::result::Result<Prediction, PredictionFailure> {
        let arrival = visit.arrival.ok_or(PredictionFailure::MissingArrival)?;
        let bucket = bucket_for(arrival, now, self.bucket_minutes, self.max_bucket_minutes)
            .ok_or(PredictionFailure::ArrivalInFuture)?;
        let model = self
            .models
            .select(bucket)
            .ok_or(PredictionFailure::NoModelForBucket(bucket))?;

        let mut features = visit.values.clone();
        features.extend(labs.values_or_missing(&visit.patient_id));
        features.extend(vitals.values_or_missing(&visit.patient_id));
        features.push(Some(self.classifier.predict_proba(&visit.complaint)));

        let probability = model
            .predict_proba(&features)
            .map_err(PredictionFailure::Scoring)?;
        Ok(Prediction {
            probability,
            bucket,
        })
    }
}

/// Model feature layout: visit columns, lab labels, vital labels, complaint score
pub fn feature_layout(codebook: &CodeBook, encoders: &EncoderRegistry) -> Result<Vec<String>> {
    let mut layout = visit::feature_columns(
        encoders.one_hot_encoder(ONE_HOT_COLUMNS[0])?,
        encoders.one_hot_encoder(ONE_HOT_COLUMNS[1])?,
    );
    layout.extend(codebook.lab_labels());
    layout.extend(codebook.vital_labels());
    layout.push(COMPLAINT_FEATURE.to_string());
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_rows_have_empty_fields() {
        let record = PredictionRecord::from_outcome(
            Some("S9".to_string()),
            Err(PredictionFailure::ArrivalInFuture),
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "SEHID": "S9", "PREDICTION": null, "TIMEDELTA": null })
        );
    }

    #[test]
    fn test_request_accepts_numeric_fields() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{ "seh_data": [ { "SEHID": 17, "PATIENTNR": "p1", "AGE": 54 } ] }"#,
        )
        .unwrap();
        assert_eq!(request.seh_data[0].visit_id.as_deref(), Some("17"));
        assert_eq!(request.seh_data[0].age.as_deref(), Some("54"));
        assert!(request.lab_data.is_empty());
    }
}
