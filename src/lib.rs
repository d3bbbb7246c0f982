//! Feature engineering for emergency-department admission prediction.
//!
//! Raw lab results, vital signs, visit records and radiology reports are
//! cleaned into a tidy numeric feature table. The same pipelines run when
//! fitting on historical data and when scoring live visits, with the fitted
//! encoders and scalers persisted in between so both sides transform
//! identically.

pub mod codebook;
pub mod config;
pub mod encoding;
pub mod error;
pub mod inference;
pub mod models;
pub mod pipeline;
pub mod runner;
pub mod transform;
pub mod utils;

// Core types
pub use codebook::CodeBook;
pub use config::{Config, ServingConfig, TrainingConfig};
pub use error::{FeatureError, Result};

// Transforms and their registry
pub use encoding::{
    EncoderRegistry, LabelEncoder, MinMaxScaler, Mode, OneHotEncoder, TransformKey,
    TransformSource,
};

// Pipelines
pub use pipeline::{
    LabPipeline, PipelineOptions, RadiologyPipeline, VisitPipeline, VitalsPipeline,
};
pub use runner::{RunInputs, RunSummary, TrainingRunner};

// Serving
pub use inference::{
    InferenceEngine, PredictionFailure, PredictionRecord, PredictionRequest, PredictionResponse,
};

// Arrow types
pub use arrow::record_batch::RecordBatch;
